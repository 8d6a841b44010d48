/// stlview Terminal - interactive STL viewer
///
/// Controls:
///   - Mouse drag / WASD / Arrow Keys: Orbit the model
///   - Mouse wheel / +/-: Zoom
///   - N/P: Next / previous showcased project
///   - R: Reload
///   - Q/ESC: Quit
use anyhow::{bail, Context};
use clap::Parser;
use env_logger::{Builder, Env};
use std::path::PathBuf;
use stlview_core::catalog::PROJECTS;
use stlview_core::ViewerConfig;
use stlview_terminal::{Playlist, TerminalApp};

#[derive(Parser, Debug)]
#[command(name = "stlview-terminal", version, about = "Interactive STL viewer for the terminal")]
struct Cli {
    /// STL file to display; the built-in cube is shown without one
    path: Option<PathBuf>,

    /// Show a showcased project by index instead of a file
    #[arg(short, long, conflicts_with = "path")]
    project: Option<usize>,

    /// Directory holding the showcased projects' STL files
    #[arg(long, default_value = "public")]
    models_dir: PathBuf,

    /// List the showcased projects and exit
    #[arg(long)]
    list: bool,

    /// Target frames per second
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Orbit damping factor
    #[arg(long, default_value_t = 0.05)]
    damping: f32,

    /// Stop orbiting as soon as input ends
    #[arg(long)]
    no_damping: bool,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    Builder::from_env(Env::default().default_filter_or(level)).init();

    if cli.list {
        for (index, project) in PROJECTS.iter().enumerate() {
            println!("{index}: {} ({})", project.title, project.stl_url);
        }
        return Ok(());
    }

    let playlist = match (cli.path, cli.project) {
        (Some(path), _) => {
            if !path.is_file() {
                bail!("{} is not a file", path.display());
            }
            Playlist::File(path)
        }
        (None, Some(index)) => {
            if index >= PROJECTS.len() {
                bail!("project index {index} out of range, see --list");
            }
            Playlist::catalog(cli.models_dir, index)
        }
        (None, None) => Playlist::Demo,
    };

    if !(0.0..=1.0).contains(&cli.damping) {
        bail!("damping must be within 0..=1, got {}", cli.damping);
    }
    let config = ViewerConfig {
        enable_damping: !cli.no_damping,
        damping_factor: cli.damping,
        ..ViewerConfig::default()
    };

    log::info!("starting viewer for {}", playlist.title());
    let mut app = TerminalApp::new(playlist, config, cli.fps);
    app.run().context("terminal viewer failed")?;

    println!("Thank you for using stlview!");
    Ok(())
}
