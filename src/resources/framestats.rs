//! Loop diagnostics: frames per second and rolling phase durations.

use arrayvec::ArrayVec;

const WINDOW: usize = 10;
const FPS_PERIOD_MS: f64 = 1000.0;

#[derive(Debug, Clone)]
pub struct FrameStats {
    fps: f64,
    renderings: u32,
    last_fps_update: Option<f64>,
    update_times: ArrayVec<f64, WINDOW>,
    render_times: ArrayVec<f64, WINDOW>,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Newest first; the oldest sample drops out once the window is full.
fn push_sample(window: &mut ArrayVec<f64, WINDOW>, sample: f64) {
    if window.is_full() {
        window.pop();
    }
    window.insert(0, sample);
}

impl FrameStats {
    pub fn new() -> Self {
        Self {
            fps: -1.0,
            renderings: 0,
            last_fps_update: None,
            update_times: ArrayVec::new(),
            render_times: ArrayVec::new(),
        }
    }

    /// Rounded moving average, `-1` before the first full second.
    pub fn fps(&self) -> i64 {
        self.fps.round() as i64
    }

    pub fn record_update(&mut self, duration_ms: f64) {
        push_sample(&mut self.update_times, duration_ms);
    }

    pub fn record_render(&mut self, duration_ms: f64) {
        push_sample(&mut self.render_times, duration_ms);
        self.renderings += 1;
    }

    /// Fold the renders counted so far into the average once a second has
    /// passed since the last fold. `now` is in milliseconds.
    pub fn sample_fps(&mut self, now: f64) {
        let last = *self.last_fps_update.get_or_insert(now);
        if now - last < FPS_PERIOD_MS {
            return;
        }
        let sampled = f64::from(self.renderings) * FPS_PERIOD_MS / (now - last);
        if self.fps < 0.0 {
            self.fps = sampled;
        }
        self.fps = (4.0 * sampled + self.fps) / 5.0;
        self.renderings = 0;
        self.last_fps_update = Some(now);
    }

    /// Update-phase durations in milliseconds, newest first.
    pub fn update_times(&self) -> &[f64] {
        &self.update_times
    }

    pub fn render_times(&self) -> &[f64] {
        &self.render_times
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_starts_unknown() {
        let stats = FrameStats::new();
        assert_eq!(stats.fps(), -1);
    }

    #[test]
    fn test_fps_moving_average() {
        let mut stats = FrameStats::new();
        stats.sample_fps(0.0);
        for _ in 0..60 {
            stats.record_render(1.0);
        }
        stats.sample_fps(1000.0);
        assert_eq!(stats.fps(), 60);

        for _ in 0..30 {
            stats.record_render(1.0);
        }
        stats.sample_fps(1500.0);
        assert_eq!(stats.fps(), 60);
        stats.sample_fps(2000.0);
        // (4 * 30 + 60) / 5
        assert_eq!(stats.fps(), 36);
    }

    #[test]
    fn test_windows_keep_ten_newest_first() {
        let mut stats = FrameStats::new();
        for i in 0..15 {
            stats.record_update(f64::from(i));
        }
        let times = stats.update_times();
        assert_eq!(times.len(), 10);
        assert_eq!(times[0], 14.0);
        assert_eq!(times[9], 5.0);
        assert!(stats.render_times().is_empty());
    }
}
