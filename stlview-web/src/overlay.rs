/// Loading and error overlays stacked above the canvas
use stlview_core::ViewerState;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlElement};

const OVERLAY_STYLE: &str = "position:absolute;inset:0;display:none;align-items:center;\
justify-content:center;color:#fff;text-align:center;padding:1rem;pointer-events:none;";

pub struct Overlay {
    loading: HtmlElement,
    error: HtmlElement,
}

impl Overlay {
    pub fn new(document: &Document, mount: &HtmlElement) -> Result<Self, JsValue> {
        let loading = overlay_element(document, "rgba(17,24,39,0.8)")?;
        loading.set_text_content(Some("Loading 3D model..."));
        let error = overlay_element(document, "rgba(127,29,29,0.9)")?;

        mount.append_child(&loading)?;
        mount.append_child(&error)?;
        Ok(Self { loading, error })
    }

    /// Show whichever overlay matches `state`; nothing when no viewer is mounted
    pub fn sync(&self, state: Option<&ViewerState>) {
        let loading = matches!(state, Some(ViewerState::Loading));
        let message = state.and_then(ViewerState::error_message);

        show(&self.loading, loading);
        show(&self.error, message.is_some());
        self.error
            .set_text_content(message.map(|m| format!("Error: {m}")).as_deref());
    }

    pub fn remove(&self) {
        self.loading.remove();
        self.error.remove();
    }
}

fn overlay_element(document: &Document, background: &str) -> Result<HtmlElement, JsValue> {
    let element: HtmlElement = document.create_element("div")?.dyn_into()?;
    element
        .style()
        .set_css_text(&format!("{OVERLAY_STYLE}background:{background};"));
    Ok(element)
}

fn show(element: &HtmlElement, visible: bool) {
    let display = if visible { "flex" } else { "none" };
    if element.style().set_property("display", display).is_err() {
        log::warn!("failed to toggle overlay");
    }
}
