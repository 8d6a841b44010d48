/// Terminal host for the STL model viewer
use anyhow::Context;
use crossterm::{
    cursor,
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
        MouseEvent, MouseEventKind,
    },
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};
use log::{debug, info};
use std::io::{self, stdout, Stdout, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};
use stlview_core::catalog::{Project, PROJECTS};
use stlview_core::stl::write_binary_stl;
use stlview_core::{
    LoadError, LoadTicket, Mesh, MeshSource, MountRegion, ViewerConfig, ViewerError, ViewerSlot,
    ViewerState,
};

pub mod renderer;
pub mod scheduler;

pub use renderer::{AsciiRenderer, SAMPLES_PER_CELL};
pub use scheduler::TickScheduler;

/// Rows above the viewport used by the status line
pub const STATUS_ROWS: u16 = 1;

const SPINNER: &[char] = &['|', '/', '-', '\\'];

type Completion = (LoadTicket, Result<Vec<u8>, LoadError>);

/// What the app displays and where its bytes come from
#[derive(Debug, Clone, PartialEq)]
pub enum Playlist {
    /// A single STL file
    File(PathBuf),
    /// Showcased projects, resolved against a models directory
    Catalog { models_dir: PathBuf, index: usize },
    /// Built-in cube
    Demo,
}

impl Playlist {
    pub fn catalog(models_dir: impl Into<PathBuf>, index: usize) -> Self {
        Playlist::Catalog {
            models_dir: models_dir.into(),
            index: index % PROJECTS.len(),
        }
    }

    pub fn project(&self) -> Option<&'static Project> {
        match self {
            Playlist::Catalog { index, .. } => PROJECTS.get(*index),
            _ => None,
        }
    }

    pub fn title(&self) -> String {
        match self {
            Playlist::File(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Playlist::Catalog { .. } => self.project().map(|p| p.title.to_string()).unwrap_or_default(),
            Playlist::Demo => "Demo cube".to_string(),
        }
    }

    pub fn source(&self) -> MeshSource {
        match self {
            Playlist::File(path) => MeshSource::new(path.display().to_string()),
            Playlist::Catalog { .. } => self
                .project()
                .map(Project::mesh_source)
                .unwrap_or_else(|| MeshSource::new("")),
            Playlist::Demo => MeshSource::new("builtin:cube"),
        }
    }

    /// Move through the catalog, wrapping around; other playlists stay put
    pub fn step(&mut self, forward: bool) -> bool {
        let Playlist::Catalog { index, .. } = self else {
            return false;
        };
        let len = PROJECTS.len();
        *index = if forward { (*index + 1) % len } else { (*index + len - 1) % len };
        true
    }

    /// Read the mesh bytes; blocking, meant for the loader thread
    pub fn read(&self) -> Result<Vec<u8>, LoadError> {
        match self {
            Playlist::File(path) => Ok(std::fs::read(path)?),
            Playlist::Catalog { models_dir, index } => {
                let project = &PROJECTS[*index % PROJECTS.len()];
                Ok(std::fs::read(models_dir.join(project.relative_path()))?)
            }
            Playlist::Demo => Ok(write_binary_stl(&Mesh::cube(2.0))),
        }
    }
}

/// Keyboard actions understood by the app
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Quit,
    Rotate { left: f32, up: f32 },
    /// Wheel-equivalent step; negative zooms in
    Zoom(f32),
    NextProject,
    PreviousProject,
    Reload,
}

pub fn command_for(code: KeyCode) -> Option<Command> {
    let command = match code {
        KeyCode::Char('q') | KeyCode::Esc => Command::Quit,
        KeyCode::Char('a') | KeyCode::Left => Command::Rotate { left: 1.0, up: 0.0 },
        KeyCode::Char('d') | KeyCode::Right => Command::Rotate { left: -1.0, up: 0.0 },
        KeyCode::Char('w') | KeyCode::Up => Command::Rotate { left: 0.0, up: 1.0 },
        KeyCode::Char('s') | KeyCode::Down => Command::Rotate { left: 0.0, up: -1.0 },
        KeyCode::Char('+') | KeyCode::Char('=') => Command::Zoom(-1.0),
        KeyCode::Char('-') => Command::Zoom(1.0),
        KeyCode::Char('n') => Command::NextProject,
        KeyCode::Char('p') => Command::PreviousProject,
        KeyCode::Char('r') => Command::Reload,
        _ => return None,
    };
    Some(command)
}

/// Mount region for a terminal of `columns x rows` character cells
pub fn viewport_region(columns: u16, rows: u16) -> Result<MountRegion, ViewerError> {
    let rows = rows.saturating_sub(STATUS_ROWS);
    MountRegion::new(u32::from(columns), u32::from(rows) * SAMPLES_PER_CELL)
}

/// Main application struct for terminal 3D rendering
pub struct TerminalApp {
    slot: ViewerSlot<AsciiRenderer<Stdout>, TickScheduler>,
    playlist: Playlist,
    config: ViewerConfig,
    target_fps: u32,
    loads_tx: Sender<Completion>,
    loads_rx: Receiver<Completion>,
    running: bool,
    last_sample: Instant,
    frame_count: u32,
    fps: f32,
    tick: usize,
}

impl TerminalApp {
    pub fn new(playlist: Playlist, config: ViewerConfig, target_fps: u32) -> Self {
        let (loads_tx, loads_rx) = mpsc::channel();
        Self {
            slot: ViewerSlot::new(),
            playlist,
            config,
            target_fps: target_fps.max(1),
            loads_tx,
            loads_rx,
            running: true,
            last_sample: Instant::now(),
            frame_count: 0,
            fps: 0.0,
            tick: 0,
        }
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), terminal::EnterAlternateScreen, cursor::Hide, EnableMouseCapture)?;

        let result = self.mount_current().and_then(|()| self.main_loop());

        // Cleanup
        self.slot.unmount();
        terminal::disable_raw_mode()?;
        execute!(stdout(), DisableMouseCapture, terminal::LeaveAlternateScreen, cursor::Show)?;

        result
    }

    /// Mount the current playlist entry and start loading it in the background
    fn mount_current(&mut self) -> anyhow::Result<()> {
        let (columns, rows) = terminal::size()?;
        let region = viewport_region(columns, rows).context("terminal too small for the viewer")?;
        let surface = AsciiRenderer::new(stdout()).with_top_margin(STATUS_ROWS);

        let ticket = self.slot.mount(
            self.playlist.source(),
            region,
            surface,
            TickScheduler::new(),
            self.config.clone(),
        );
        info!("mounted {} (generation {})", ticket.source(), ticket.generation());

        let playlist = self.playlist.clone();
        let loads_tx = self.loads_tx.clone();
        thread::Builder::new()
            .name("stl-loader".to_string())
            .spawn(move || {
                let result = playlist.read();
                // The app may have exited while the file was read
                let _ = loads_tx.send((ticket, result));
            })
            .context("failed to spawn loader thread")?;
        Ok(())
    }

    fn main_loop(&mut self) -> anyhow::Result<()> {
        let target_frame_time = Duration::from_secs_f64(1.0 / f64::from(self.target_fps));

        while self.running {
            let frame_start = Instant::now();

            // Handle input
            while event::poll(Duration::ZERO)? {
                let event = event::read()?;
                self.handle_event(event)?;
            }

            self.drain_loads();

            if self.slot.frame() {
                self.frame_count += 1;
            }
            self.draw_status()?;
            self.tick = self.tick.wrapping_add(1);

            // Frame timing
            let elapsed = frame_start.elapsed();
            if elapsed < target_frame_time {
                thread::sleep(target_frame_time - elapsed);
            }

            // Update FPS counter
            let now = Instant::now();
            if (now - self.last_sample).as_secs() >= 1 {
                self.fps = self.frame_count as f32 / (now - self.last_sample).as_secs_f32();
                self.frame_count = 0;
                self.last_sample = now;
            }
        }

        Ok(())
    }

    fn drain_loads(&mut self) {
        while let Ok((ticket, result)) = self.loads_rx.try_recv() {
            let outcome = self.slot.complete_load(&ticket, result);
            debug!("load of {} completed: {outcome:?}", ticket.source());
        }
    }

    fn handle_event(&mut self, event: Event) -> anyhow::Result<()> {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if let Some(command) = command_for(key.code) {
                    self.apply(command)?;
                }
            }
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            Event::Resize(columns, rows) => match viewport_region(columns, rows) {
                Ok(region) => {
                    execute!(stdout(), Clear(ClearType::All))?;
                    self.slot.resize(region);
                }
                Err(err) => debug!("ignoring resize: {err}"),
            },
            _ => {}
        }
        Ok(())
    }

    fn apply(&mut self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Quit => self.running = false,
            Command::Rotate { left, up } => {
                if let Some(viewer) = self.slot.viewer_mut() {
                    viewer.controls_mut().key_rotate(left, up);
                }
            }
            Command::Zoom(delta) => {
                if let Some(viewer) = self.slot.viewer_mut() {
                    viewer.controls_mut().wheel(delta);
                }
            }
            Command::NextProject | Command::PreviousProject => {
                if self.playlist.step(command == Command::NextProject) {
                    self.mount_current()?;
                } else {
                    debug!("no other projects to switch to");
                }
            }
            Command::Reload => self.mount_current()?,
        }
        Ok(())
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let Some(viewer) = self.slot.viewer_mut() else {
            return;
        };
        let height = viewer.region().height() as f32;
        let x = f32::from(mouse.column);
        let y = f32::from(mouse.row.saturating_sub(STATUS_ROWS)) * SAMPLES_PER_CELL as f32;

        let controls = viewer.controls_mut();
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => controls.pointer_down(x, y),
            MouseEventKind::Drag(MouseButton::Left) => controls.pointer_move(x, y, height),
            MouseEventKind::Up(MouseButton::Left) => controls.pointer_up(),
            MouseEventKind::ScrollUp => controls.wheel(-1.0),
            MouseEventKind::ScrollDown => controls.wheel(1.0),
            _ => {}
        }
    }

    fn status_line(&self) -> Option<(Color, String)> {
        let line = match self.slot.state()? {
            ViewerState::Loading => (
                Color::Cyan,
                format!("{} Loading {}...", SPINNER[self.tick / 4 % SPINNER.len()], self.playlist.title()),
            ),
            ViewerState::Failed(message) => (Color::Red, format!("Error: {message}")),
            ViewerState::Ready => (
                Color::Yellow,
                format!(
                    "{} | FPS: {:.1} | Drag/Arrows=Rotate Wheel/+/-=Zoom N/P=Project Q=Quit",
                    self.playlist.title(),
                    self.fps
                ),
            ),
        };
        Some(line)
    }

    fn draw_status(&self) -> io::Result<()> {
        let Some((color, text)) = self.status_line() else {
            return Ok(());
        };
        let (columns, _) = terminal::size()?;
        let text: String = text.chars().take(usize::from(columns)).collect();

        let mut stdout = stdout();
        queue!(
            stdout,
            cursor::MoveTo(0, 0),
            Clear(ClearType::CurrentLine),
            SetForegroundColor(color),
            Print(text),
            ResetColor
        )?;
        stdout.flush()
    }
}
