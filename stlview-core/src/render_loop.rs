/// Cancelable per-frame loop driven by the host's frame primitive
use std::fmt::Debug;

/// Host facility that invokes the viewer once per display refresh
///
/// Implementations arrange for a single future callback per request; the
/// callback itself is wired by the host and ends up calling
/// [`RenderLoop::begin_frame`].
pub trait FrameScheduler {
    type Handle: Copy + Debug + PartialEq;

    /// Request the next frame; `None` if the host refused
    fn request_frame(&mut self) -> Option<Self::Handle>;

    fn cancel_frame(&mut self, handle: Self::Handle);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Cancelled,
}

/// Owned repeating task: one pending frame at a time, cancelable exactly once
#[derive(Debug)]
pub struct RenderLoop<F: FrameScheduler> {
    scheduler: F,
    pending: Option<F::Handle>,
    state: LoopState,
}

impl<F: FrameScheduler> RenderLoop<F> {
    pub fn new(scheduler: F) -> Self {
        Self {
            scheduler,
            pending: None,
            state: LoopState::Idle,
        }
    }

    /// Schedule the first frame
    pub fn start(&mut self) {
        if self.state != LoopState::Idle {
            return;
        }
        self.state = LoopState::Running;
        self.schedule();
    }

    /// Consume the pending frame and schedule the next one
    ///
    /// Returns `false` when no frame was pending or the loop is cancelled;
    /// the caller must not render in that case.
    pub fn begin_frame(&mut self) -> bool {
        if self.state != LoopState::Running || self.pending.take().is_none() {
            return false;
        }
        self.schedule();
        true
    }

    /// Cancel the pending frame; later calls are no-ops
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.scheduler.cancel_frame(handle);
        }
        self.state = LoopState::Cancelled;
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn pending(&self) -> Option<F::Handle> {
        self.pending
    }

    pub fn scheduler(&self) -> &F {
        &self.scheduler
    }

    fn schedule(&mut self) {
        self.pending = self.scheduler.request_frame();
        if self.pending.is_none() {
            log::warn!("frame request refused, render loop stopped");
            self.state = LoopState::Cancelled;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Counter {
        next: u32,
        live: Vec<u32>,
        refuse: bool,
    }

    impl FrameScheduler for Counter {
        type Handle = u32;

        fn request_frame(&mut self) -> Option<u32> {
            if self.refuse {
                return None;
            }
            self.next += 1;
            self.live.push(self.next);
            Some(self.next)
        }

        fn cancel_frame(&mut self, handle: u32) {
            self.live.retain(|h| *h != handle);
        }
    }

    #[test]
    fn test_frames_reschedule() {
        let mut render_loop = RenderLoop::new(Counter::default());
        assert!(!render_loop.begin_frame());

        render_loop.start();
        assert_eq!(render_loop.pending(), Some(1));
        assert!(render_loop.begin_frame());
        assert_eq!(render_loop.pending(), Some(2));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut render_loop = RenderLoop::new(Counter::default());
        render_loop.start();
        render_loop.cancel();
        render_loop.cancel();

        assert_eq!(render_loop.state(), LoopState::Cancelled);
        assert!(render_loop.scheduler().live.is_empty());
        assert!(!render_loop.begin_frame());

        render_loop.start();
        assert_eq!(render_loop.pending(), None);
    }

    #[test]
    fn test_refused_request_stops_loop() {
        let mut render_loop = RenderLoop::new(Counter { refuse: true, ..Default::default() });
        render_loop.start();
        assert_eq!(render_loop.state(), LoopState::Cancelled);
    }
}
