use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use tracing::info;

const LOG_INTERVAL: Duration = Duration::from_secs(10);
const WINDOW: usize = 5;

/// Periodic sync-rate log line: current height, blocks per second over a
/// sliding window, causality-cache misses so far, and the remaining time to
/// `end_height` when one is set (backfills).
pub(crate) struct Progress {
    window: VecDeque<(Instant, u64)>,
    last_logged: Instant,
    end_height: Option<u64>,
}

impl Progress {
    pub(crate) fn new(end_height: Option<u64>) -> Self {
        Self {
            window: VecDeque::new(),
            last_logged: Instant::now(),
            end_height,
        }
    }

    pub(crate) fn tick(&mut self, height: u64, cache_misses: u64) {
        if self.last_logged.elapsed() < LOG_INTERVAL {
            return;
        }
        self.last_logged = Instant::now();

        self.window.push_back((Instant::now(), height));
        if self.window.len() > WINDOW {
            self.window.pop_front();
        }
        if self.window.len() < 2 {
            info!(height, cache_misses, "syncing");
            return;
        }

        let (first_at, first_height) = self.window.front().unwrap();
        let (last_at, last_height) = self.window.back().unwrap();
        let elapsed = last_at.duration_since(*first_at).as_secs_f64();
        let blocks = last_height.saturating_sub(*first_height);
        let bps = if elapsed > 0.0 { blocks as f64 / elapsed } else { 0.0 };

        match self.end_height {
            Some(end) if bps > 0.0 && end > height => {
                let eta = Duration::from_secs(((end - height) as f64 / bps) as u64);
                info!(
                    height,
                    bps = format!("{bps:.1}"),
                    cache_misses,
                    eta = %humantime::Duration::from(eta),
                    "syncing"
                );
            }
            _ => info!(height, bps = format!("{bps:.1}"), cache_misses, "syncing"),
        }
    }
}
