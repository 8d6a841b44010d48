/// `requestAnimationFrame` backed frame scheduler
use stlview_core::FrameScheduler;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::Window;

/// Schedules one callback per display refresh
///
/// The callback is owned here, so dropping the scheduler after its pending
/// frame was cancelled releases it without a dangling registration.
pub struct RafScheduler {
    window: Window,
    callback: Closure<dyn FnMut()>,
}

impl RafScheduler {
    pub fn new(window: Window, on_frame: impl FnMut() + 'static) -> Self {
        Self {
            window,
            callback: Closure::wrap(Box::new(on_frame) as Box<dyn FnMut()>),
        }
    }
}

impl FrameScheduler for RafScheduler {
    type Handle = i32;

    fn request_frame(&mut self) -> Option<i32> {
        match self
            .window
            .request_animation_frame(self.callback.as_ref().unchecked_ref())
        {
            Ok(handle) => Some(handle),
            Err(err) => {
                log::warn!("requestAnimationFrame failed: {err:?}");
                None
            }
        }
    }

    fn cancel_frame(&mut self, handle: i32) {
        if let Err(err) = self.window.cancel_animation_frame(handle) {
            log::warn!("cancelAnimationFrame failed: {err:?}");
        }
    }
}
