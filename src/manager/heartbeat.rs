// CLASSIFICATION: COMMUNITY
// Filename: heartbeat.rs v0.5
// Author: Lukas Bower
// Date Modified: 2026-08-15

//! Primary-manager liveness watchdog.
//!
//! The secondary counts consecutive check periods without a primary beat
//! and promotes itself once the miss threshold is crossed. A single beat
//! resets the count. Promotion is one-way; the demoted primary is expected
//! to notice on its own and stand down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::config::HeartbeatConfig;

/// Manager role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Owns the fabric; the only writer.
    Primary,
    /// Mirrors state, promotes on primary loss.
    Secondary,
}

/// Shared timestamp of the last observed primary beat.
#[derive(Debug, Clone)]
pub struct Pulse(Arc<Mutex<Instant>>);

impl Default for Pulse {
    fn default() -> Self {
        Self::new()
    }
}

impl Pulse {
    /// Fresh pulse, counted as beating right now.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Instant::now())))
    }

    /// Record a beat.
    pub fn beat(&self) {
        let mut t = self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *t = Instant::now();
    }

    /// Time since the last beat.
    #[must_use]
    pub fn age(&self) -> Duration {
        let t = self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        t.elapsed()
    }
}

/// Miss counter over a [`Pulse`].
#[derive(Debug)]
pub struct Watchdog {
    pulse: Pulse,
    period: Duration,
    threshold: u32,
    miss_count: u32,
}

impl Watchdog {
    /// Watchdog over `pulse` with the configured period and threshold.
    #[must_use]
    pub fn new(pulse: Pulse, cfg: &HeartbeatConfig) -> Self {
        Self {
            pulse,
            period: Duration::from_millis(cfg.period_ms),
            threshold: cfg.miss_threshold,
            miss_count: 0,
        }
    }

    /// One check: count a miss if no beat landed within the last period.
    /// Returns `true` when the threshold is crossed.
    pub fn check(&mut self) -> bool {
        if self.pulse.age() > self.period {
            self.miss_count += 1;
            debug!("heartbeat miss {}/{}", self.miss_count, self.threshold);
        } else {
            self.miss_count = 0;
        }
        self.miss_count >= self.threshold
    }

    /// Run the check loop on its own thread until promotion or until
    /// `stop` is raised. Sends one message on `promote` when the primary
    /// is declared lost.
    pub fn run(mut self, promote: Sender<()>, stop: Arc<AtomicBool>) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                thread::sleep(self.period);
                if self.check() {
                    info!("primary manager lost, promoting");
                    let _ = promote.send(());
                    return;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn fast_cfg() -> HeartbeatConfig {
        HeartbeatConfig {
            period_ms: 5,
            miss_threshold: 3,
        }
    }

    #[test]
    fn beats_hold_off_promotion() {
        let pulse = Pulse::new();
        let mut dog = Watchdog::new(pulse.clone(), &fast_cfg());
        for _ in 0..5 {
            thread::sleep(Duration::from_millis(2));
            pulse.beat();
            assert!(!dog.check());
        }
        assert_eq!(dog.miss_count, 0);
    }

    #[test]
    fn silence_promotes_after_threshold() {
        let pulse = Pulse::new();
        let mut dog = Watchdog::new(pulse.clone(), &fast_cfg());
        thread::sleep(Duration::from_millis(8));
        assert!(!dog.check());
        assert!(!dog.check());
        assert!(dog.check());
    }

    #[test]
    fn a_late_beat_resets_the_count() {
        let pulse = Pulse::new();
        let mut dog = Watchdog::new(pulse.clone(), &fast_cfg());
        thread::sleep(Duration::from_millis(8));
        assert!(!dog.check());
        assert!(!dog.check());
        pulse.beat();
        assert!(!dog.check());
        assert_eq!(dog.miss_count, 0);
    }

    #[test]
    fn run_sends_exactly_one_promotion() {
        let pulse = Pulse::new();
        let dog = Watchdog::new(pulse, &fast_cfg());
        let (tx, rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let handle = dog.run(tx, Arc::clone(&stop));
        rx.recv_timeout(Duration::from_secs(2)).expect("promotion");
        handle.join().expect("join");
        assert!(rx.try_recv().is_err());
    }
}
