use std::time::{Duration, Instant};

/// Loop rates averaged over one reporting window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub tps: f32,
    pub frame_time_ms: f32,
    pub busiest_frame_ticks: u32,
    pub dropped_backlog_ms: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct WindowTotals {
    frames: u32,
    ticks: u32,
    busiest_frame_ticks: u32,
    frame_time: Duration,
    dropped_backlog: Duration,
}

/// Collects per-frame counters and emits a snapshot once per `window`.
#[derive(Debug)]
pub(crate) struct LoopMetrics {
    window: Duration,
    window_start: Instant,
    totals: WindowTotals,
}

impl LoopMetrics {
    pub(crate) fn new(window: Duration) -> Self {
        Self::starting_at(window, Instant::now())
    }

    pub(crate) fn starting_at(window: Duration, start: Instant) -> Self {
        Self {
            window,
            window_start: start,
            totals: WindowTotals::default(),
        }
    }

    pub(crate) fn record_frame(&mut self, frame_delta: Duration, ticks_run: u32) {
        let totals = &mut self.totals;
        totals.frames = totals.frames.saturating_add(1);
        totals.ticks = totals.ticks.saturating_add(ticks_run);
        totals.busiest_frame_ticks = totals.busiest_frame_ticks.max(ticks_run);
        totals.frame_time = totals.frame_time.saturating_add(frame_delta);
    }

    pub(crate) fn record_dropped_backlog(&mut self, dropped: Duration) {
        self.totals.dropped_backlog = self.totals.dropped_backlog.saturating_add(dropped);
    }

    /// Closes the window when it has run its length; counters restart from zero.
    pub(crate) fn take_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window {
            return None;
        }
        let totals = std::mem::take(&mut self.totals);
        self.window_start = now;

        let seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = match totals.frames {
            0 => 0.0,
            frames => totals.frame_time.as_secs_f32() * 1000.0 / frames as f32,
        };
        Some(LoopMetricsSnapshot {
            fps: totals.frames as f32 / seconds,
            tps: totals.ticks as f32 / seconds,
            frame_time_ms,
            busiest_frame_ticks: totals.busiest_frame_ticks,
            dropped_backlog_ms: totals.dropped_backlog.as_millis() as u64,
        })
    }
}
