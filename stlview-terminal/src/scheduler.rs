/// Frame scheduler for the fixed-rate terminal loop
use stlview_core::FrameScheduler;

/// Hands out tick numbers; the app loop fires at most one pending tick per pass
#[derive(Debug, Default)]
pub struct TickScheduler {
    issued: u64,
    pending: Option<u64>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<u64> {
        self.pending
    }
}

impl FrameScheduler for TickScheduler {
    type Handle = u64;

    fn request_frame(&mut self) -> Option<u64> {
        self.issued += 1;
        self.pending = Some(self.issued);
        self.pending
    }

    fn cancel_frame(&mut self, handle: u64) {
        if self.pending == Some(handle) {
            self.pending = None;
        }
    }
}
