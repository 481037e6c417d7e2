use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::constants::{MAX_TICK_DELTA_MS, TICK_MS, TICK_RATE_REPORT_TICKS, TICK_RATE_WINDOW};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickRateStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Self-rescheduling tick timer. The next deadline is armed only when the
/// previous tick has finished, so at most one tick is ever pending and a slow
/// tick pushes the following ones back instead of overlapping them.
#[derive(Clone, Debug)]
pub struct SimulationClock {
    interval: Duration,
    max_delta: Duration,
    running: bool,
    next_deadline: Option<Instant>,
    last_tick: Option<Instant>,
    ticks: u64,
    rates: VecDeque<f64>,
    ticks_since_report: u64,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(TICK_MS),
            Duration::from_millis(MAX_TICK_DELTA_MS),
        )
    }
}

impl SimulationClock {
    pub fn new(interval: Duration, max_delta: Duration) -> Self {
        Self {
            interval,
            max_delta,
            running: false,
            next_deadline: None,
            last_tick: None,
            ticks: 0,
            rates: VecDeque::with_capacity(TICK_RATE_WINDOW),
            ticks_since_report: 0,
        }
    }

    pub fn start(&mut self, now: Instant) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        self.last_tick = None;
        self.rates.clear();
        self.ticks_since_report = 0;
        self.next_deadline = Some(now + self.interval);
        true
    }

    pub fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        self.next_deadline = None;
        self.last_tick = None;
        true
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.next_deadline
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Consumes the pending deadline and returns the seconds elapsed since
    /// the previous tick start, clamped to the maximum delta. The first tick
    /// after a start reports the nominal interval.
    pub fn begin_tick(&mut self, now: Instant) -> Option<f64> {
        if !self.running {
            return None;
        }
        self.next_deadline = None;
        let delta = match self.last_tick {
            Some(previous) => {
                let measured = now.saturating_duration_since(previous);
                self.record_rate(measured);
                measured.min(self.max_delta)
            }
            None => self.interval,
        };
        self.last_tick = Some(now);
        self.ticks += 1;
        self.ticks_since_report += 1;
        Some(delta.as_secs_f64())
    }

    fn record_rate(&mut self, measured: Duration) {
        if measured.is_zero() {
            return;
        }
        if self.rates.len() >= TICK_RATE_WINDOW {
            self.rates.pop_front();
        }
        self.rates.push_back(1.0 / measured.as_secs_f64());
    }

    pub fn tick_rate(&self) -> Option<TickRateStats> {
        if self.rates.is_empty() {
            return None;
        }
        let (sum, min, max) = self.rates.iter().fold(
            (0.0, f64::INFINITY, f64::NEG_INFINITY),
            |(sum, min, max), &rate| (sum + rate, min.min(rate), max.max(rate)),
        );
        Some(TickRateStats {
            mean: sum / self.rates.len() as f64,
            min,
            max,
        })
    }

    /// Window stats once every `TICK_RATE_REPORT_TICKS` ticks.
    pub fn take_tick_rate_report(&mut self) -> Option<TickRateStats> {
        if self.ticks_since_report < TICK_RATE_REPORT_TICKS {
            return None;
        }
        self.ticks_since_report = 0;
        self.tick_rate()
    }

    pub fn finish_tick(&mut self, now: Instant) {
        if self.running {
            self.next_deadline = Some(now + self.interval);
        }
    }
}
