/// stlview Web - WebGL2 model viewer for browsers
///
/// Exposes `WebModelViewer` to JavaScript. The viewer mounts a canvas into a
/// host element, fetches the STL with `fetch`, and renders it with orbit
/// controls until `unmount` is called or the object is freed.
use std::cell::{BorrowError, RefCell};
use std::rc::{Rc, Weak};

use js_sys::{Array, Object, Reflect};
use stlview_core::catalog::PROJECTS;
use stlview_core::{MeshSource, MountRegion, OrbitControls, ViewerConfig, ViewerSlot, ViewerState};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Document, HtmlCanvasElement, HtmlElement, PointerEvent, WheelEvent, Window};

mod fetch;
mod frame;
pub mod gl;
mod listener;
mod overlay;

use fetch::fetch_bytes;
use frame::RafScheduler;
use gl::WebGlSurface;
use listener::Listener;
use overlay::Overlay;

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    // Already set when the module is instantiated twice
    let _ = console_log::init_with_level(log::Level::Info);
    Ok(())
}

/// Shared state behind the exported viewer and its DOM callbacks
struct Host {
    window: Window,
    document: Document,
    mount: HtmlElement,
    overlay: Overlay,
    config: ViewerConfig,
    slot: ViewerSlot<WebGlSurface, RafScheduler>,
    /// Pointer and wheel listeners on the mounted canvas
    canvas_listeners: Vec<Listener>,
}

impl Host {
    fn region(&self) -> Result<MountRegion, JsValue> {
        let width = self.mount.client_width().max(0) as u32;
        let height = self.mount.client_height().max(0) as u32;
        let region = MountRegion::new(width, height).map_err(|err| JsValue::from_str(&err.to_string()))?;
        Ok(region.with_pixel_ratio(self.window.device_pixel_ratio() as f32))
    }

    fn sync_overlay(&self) {
        self.overlay.sync(self.slot.state());
    }

    fn unmount(&mut self) {
        self.canvas_listeners.clear();
        self.slot.unmount();
        self.sync_overlay();
    }
}

#[wasm_bindgen]
pub struct WebModelViewer {
    host: Rc<RefCell<Host>>,
    _resize: Listener,
}

#[wasm_bindgen]
impl WebModelViewer {
    /// Attach to the element with id `mount_id`; nothing is shown until `setSource`
    #[wasm_bindgen(constructor)]
    pub fn new(mount_id: &str) -> Result<WebModelViewer, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let mount: HtmlElement = document
            .get_element_by_id(mount_id)
            .ok_or_else(|| JsValue::from_str(&format!("no element with id {mount_id}")))?
            .dyn_into()?;
        // Overlays are positioned against the mount element
        mount.style().set_property("position", "relative")?;
        let overlay = Overlay::new(&document, &mount)?;

        let host = Rc::new(RefCell::new(Host {
            window: window.clone(),
            document,
            mount,
            overlay,
            config: ViewerConfig::default(),
            slot: ViewerSlot::new(),
            canvas_listeners: Vec::new(),
        }));

        let weak = Rc::downgrade(&host);
        let resize = Listener::new(&window, "resize", move |_| {
            let Some(host) = weak.upgrade() else {
                return;
            };
            let Ok(mut host) = host.try_borrow_mut() else {
                log::warn!("resize while the viewer is busy");
                return;
            };
            let region = host.region();
            match region {
                Ok(region) => host.slot.resize(region),
                Err(err) => log::debug!("ignoring resize: {err:?}"),
            }
        })?;

        Ok(Self {
            host,
            _resize: resize,
        })
    }

    /// Show the STL at `url`, replacing whatever is displayed
    #[wasm_bindgen(js_name = setSource)]
    pub fn set_source(&self, url: &str) -> Result<(), JsValue> {
        mount_source(&self.host, MeshSource::from(url))
    }

    /// Stop rendering and remove the canvas; safe to call repeatedly
    pub fn unmount(&self) {
        match self.host.try_borrow_mut() {
            Ok(mut host) => host.unmount(),
            Err(_) => log::warn!("unmount while the viewer is busy"),
        }
    }

    /// One of `idle`, `loading`, `ready` or `failed`
    pub fn state(&self) -> Result<String, JsValue> {
        read_shared(&self.host, |host| state_name(host.slot.state()).to_string()).map_err(busy)
    }

    #[wasm_bindgen(js_name = errorMessage)]
    pub fn error_message(&self) -> Result<Option<String>, JsValue> {
        read_shared(&self.host, |host| {
            host.slot
                .state()
                .and_then(ViewerState::error_message)
                .map(str::to_string)
        })
        .map_err(busy)
    }
}

impl Drop for WebModelViewer {
    fn drop(&mut self) {
        if let Ok(mut host) = self.host.try_borrow_mut() {
            host.unmount();
            host.overlay.remove();
        }
    }
}

/// Showcased projects as plain objects
#[wasm_bindgen]
pub fn projects() -> Result<Array, JsValue> {
    PROJECTS
        .iter()
        .map(|project| {
            let entry = Object::new();
            Reflect::set(&entry, &"title".into(), &project.title.into())?;
            Reflect::set(&entry, &"description".into(), &project.description.into())?;
            Reflect::set(&entry, &"imageUrl".into(), &project.image_url.into())?;
            Reflect::set(&entry, &"stlUrl".into(), &project.stl_url.into())?;
            let tags: Array = project.tags.iter().map(|tag| JsValue::from_str(tag)).collect();
            Reflect::set(&entry, &"tags".into(), &tags)?;
            Ok(JsValue::from(entry))
        })
        .collect()
}

/// Read through a shared cell without panicking when it is mutably borrowed
fn read_shared<H, T>(cell: &RefCell<H>, read: impl FnOnce(&H) -> T) -> Result<T, BorrowError> {
    let guard = cell.try_borrow()?;
    Ok(read(&guard))
}

fn busy(_: BorrowError) -> JsValue {
    log::warn!("viewer queried while busy");
    JsValue::from_str("viewer is busy")
}

fn state_name(state: Option<&ViewerState>) -> &'static str {
    match state {
        None => "idle",
        Some(ViewerState::Loading) => "loading",
        Some(ViewerState::Ready) => "ready",
        Some(ViewerState::Failed(_)) => "failed",
    }
}

fn mount_source(host_rc: &Rc<RefCell<Host>>, source: MeshSource) -> Result<(), JsValue> {
    let ticket = {
        let mut guard = host_rc
            .try_borrow_mut()
            .map_err(|_| JsValue::from_str("viewer is busy"))?;
        let host = &mut *guard;
        host.unmount();

        let region = host.region()?;
        let canvas: HtmlCanvasElement = host.document.create_element("canvas")?.dyn_into()?;
        canvas.style().set_property("display", "block")?;
        // Below the overlays
        host.mount
            .insert_before(&canvas, host.mount.first_child().as_ref())?;
        let surface = match WebGlSurface::new(canvas.clone()) {
            Ok(surface) => surface,
            Err(err) => {
                canvas.remove();
                return Err(err);
            }
        };

        let weak = Rc::downgrade(host_rc);
        let scheduler = RafScheduler::new(host.window.clone(), move || {
            let Some(host) = weak.upgrade() else {
                return;
            };
            let Ok(mut host) = host.try_borrow_mut() else {
                log::warn!("frame skipped while the viewer is busy");
                return;
            };
            host.slot.frame();
        });

        let ticket = host
            .slot
            .mount(source, region, surface, scheduler, host.config.clone());
        host.canvas_listeners = canvas_listeners(&canvas, Rc::downgrade(host_rc))?;
        host.sync_overlay();
        ticket
    };

    log::info!("loading {} (generation {})", ticket.source(), ticket.generation());
    let weak = Rc::downgrade(host_rc);
    spawn_local(async move {
        let result = fetch_bytes(ticket.source().as_str()).await;
        let Some(host) = weak.upgrade() else {
            log::debug!("viewer freed before {} arrived", ticket.source());
            return;
        };
        let Ok(mut host) = host.try_borrow_mut() else {
            log::warn!("dropping load of {}: viewer is busy", ticket.source());
            return;
        };
        let outcome = host.slot.complete_load(&ticket, result);
        log::debug!("load of {} completed: {outcome:?}", ticket.source());
        host.sync_overlay();
    });
    Ok(())
}

/// Run `apply` on the mounted viewer's controls with the viewport height
fn with_controls(host: &Weak<RefCell<Host>>, apply: impl FnOnce(&mut OrbitControls, f32)) {
    let Some(host) = host.upgrade() else {
        return;
    };
    let Ok(mut host) = host.try_borrow_mut() else {
        return;
    };
    if let Some(viewer) = host.slot.viewer_mut() {
        let height = viewer.region().height() as f32;
        apply(viewer.controls_mut(), height);
    }
}

fn canvas_listeners(canvas: &HtmlCanvasElement, host: Weak<RefCell<Host>>) -> Result<Vec<Listener>, JsValue> {
    let down = {
        let host = host.clone();
        let target = canvas.clone();
        Listener::new(canvas, "pointerdown", move |event| {
            let Some(event) = event.dyn_ref::<PointerEvent>() else {
                return;
            };
            // Keep receiving moves after the pointer leaves the canvas
            if target.set_pointer_capture(event.pointer_id()).is_err() {
                log::debug!("pointer capture unavailable");
            }
            let (x, y) = (event.offset_x() as f32, event.offset_y() as f32);
            with_controls(&host, |controls, _| controls.pointer_down(x, y));
        })?
    };

    let moved = {
        let host = host.clone();
        Listener::new(canvas, "pointermove", move |event| {
            let Some(event) = event.dyn_ref::<PointerEvent>() else {
                return;
            };
            let (x, y) = (event.offset_x() as f32, event.offset_y() as f32);
            with_controls(&host, |controls, height| controls.pointer_move(x, y, height));
        })?
    };

    let mut listeners = vec![down, moved];
    for name in ["pointerup", "pointercancel"] {
        let host = host.clone();
        listeners.push(Listener::new(canvas, name, move |_| {
            with_controls(&host, |controls, _| controls.pointer_up());
        })?);
    }

    listeners.push(Listener::new(canvas, "wheel", move |event| {
        let Some(event) = event.dyn_ref::<WheelEvent>() else {
            return;
        };
        event.prevent_default();
        let delta = event.delta_y() as f32;
        with_controls(&host, |controls, _| controls.wheel(delta));
    })?);

    Ok(listeners)
}
