//! Animation-frame scheduling.
//!
//! The engine loop is driven by frame callbacks, each carrying a timestamp
//! in milliseconds. A [`FrameScheduler`] hands them out:
//! - [`TickScheduler`] is the timer-based fallback, a `crossbeam_channel`
//!   ticker that blocks until the next frame is due,
//! - [`ManualScheduler`] replays scripted timestamps for tests and headless
//!   runs.
//!
//! [`ClockTimer`] turns the callbacks into loop deltas: the first frame only
//! records its timestamp, later deltas are rounded to whole milliseconds and
//! clamped to `max_advance`, and a callback for anything but the pending
//! request (say, one that was in flight when the timer stopped) does nothing.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, tick};
use log::{debug, info, warn};

use crate::resources::engineconfig::DEFAULT_MAX_ADVANCE_MS;

/// Handle for one requested frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequest(pub u64);

pub trait FrameScheduler {
    /// Ask for one more frame callback.
    fn request_frame(&mut self) -> FrameRequest;
    /// Drop a pending request. Unknown requests are ignored.
    fn cancel_frame(&mut self, request: FrameRequest);
    /// Wait for the next due frame. `None` once no frame will come.
    fn next_frame(&mut self) -> Option<(FrameRequest, f64)>;
}

/// Frames at a fixed wall-clock interval.
pub struct TickScheduler {
    ticker: Receiver<Instant>,
    origin: Instant,
    pending: Option<FrameRequest>,
    next_id: u64,
}

impl TickScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            ticker: tick(interval),
            origin: Instant::now(),
            pending: None,
            next_id: 0,
        }
    }

    /// Roughly 60 frames per second.
    pub fn sixty_hertz() -> Self {
        Self::new(Duration::from_micros(16_667))
    }
}

impl FrameScheduler for TickScheduler {
    fn request_frame(&mut self) -> FrameRequest {
        self.next_id += 1;
        let request = FrameRequest(self.next_id);
        self.pending = Some(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.pending == Some(request) {
            self.pending = None;
        }
    }

    fn next_frame(&mut self) -> Option<(FrameRequest, f64)> {
        let request = self.pending.take()?;
        let at = self.ticker.recv().ok()?;
        let timestamp = at.saturating_duration_since(self.origin).as_secs_f64() * 1000.0;
        Some((request, timestamp))
    }
}

/// Frames at scripted timestamps.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    timestamps: VecDeque<f64>,
    pending: Option<FrameRequest>,
    next_id: u64,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames at the given timestamps, in order.
    pub fn with_timestamps(timestamps: impl IntoIterator<Item = f64>) -> Self {
        Self {
            timestamps: timestamps.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Frames spaced by `deltas`, starting at `0`.
    pub fn with_deltas(deltas: impl IntoIterator<Item = f64>) -> Self {
        let mut at = 0.0;
        let mut timestamps = VecDeque::from([at]);
        for delta in deltas {
            at += delta;
            timestamps.push_back(at);
        }
        Self {
            timestamps,
            ..Self::default()
        }
    }

    pub fn push(&mut self, timestamp: f64) {
        self.timestamps.push_back(timestamp);
    }

    pub fn remaining(&self) -> usize {
        self.timestamps.len()
    }

    pub fn pending(&self) -> Option<FrameRequest> {
        self.pending
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameRequest {
        self.next_id += 1;
        let request = FrameRequest(self.next_id);
        self.pending = Some(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.pending == Some(request) {
            self.pending = None;
        }
    }

    fn next_frame(&mut self) -> Option<(FrameRequest, f64)> {
        let request = self.pending?;
        let timestamp = self.timestamps.pop_front()?;
        self.pending = None;
        Some((request, timestamp))
    }
}

/// Running state of the frame loop.
#[derive(Debug, Clone)]
pub struct ClockTimer {
    running: bool,
    last_timestamp: Option<f64>,
    pending: Option<FrameRequest>,
    max_advance: f64,
}

impl Default for ClockTimer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ADVANCE_MS)
    }
}

impl ClockTimer {
    pub fn new(max_advance_ms: f64) -> Self {
        Self {
            running: false,
            last_timestamp: None,
            pending: None,
            max_advance: max_advance_ms,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn max_advance(&self) -> f64 {
        self.max_advance
    }

    pub fn pending(&self) -> Option<FrameRequest> {
        self.pending
    }

    pub fn start(&mut self, scheduler: &mut dyn FrameScheduler) {
        if self.running {
            return;
        }
        self.running = true;
        self.last_timestamp = None;
        self.pending = Some(scheduler.request_frame());
        info!("Clock started");
    }

    pub fn stop(&mut self, scheduler: &mut dyn FrameScheduler) {
        if !self.running {
            return;
        }
        self.running = false;
        if let Some(request) = self.pending.take() {
            scheduler.cancel_frame(request);
        }
        info!("Clock stopped");
    }

    /// Handle a frame callback and request the next one.
    ///
    /// Returns the delta in milliseconds to feed the loop.
    pub fn on_frame(
        &mut self,
        scheduler: &mut dyn FrameScheduler,
        request: FrameRequest,
        timestamp: f64,
    ) -> Option<f64> {
        if !self.running || self.pending != Some(request) {
            warn!("Ignoring stale frame callback {:?}", request);
            return None;
        }
        self.pending = Some(scheduler.request_frame());

        let delta = match self.last_timestamp.replace(timestamp) {
            Some(last) => (timestamp - last + 0.5).trunc().clamp(0.0, self.max_advance),
            None => 0.0,
        };
        debug!("Frame {:?} at {}ms, delta {}ms", request, timestamp, delta);
        Some(delta)
    }
}
