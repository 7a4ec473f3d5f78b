//! Periodic timer backed by a scoped thread
//!
//! The thread plays the part of the timer interrupt: it sleeps until the
//! armed period elapses, disarms itself, runs the controller's timer
//! callback and re-arms if asked to. It exits once the [`ThreadTimer`]
//! handle is dropped.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::Scope;
use std::time::{Duration, Instant};

use ispclone_core::controller::{on_timer_expired, SharedState, TimerAction};
use ispclone_core::programmer::{Indicators, PeriodicTimer};

enum TimerCommand {
    Enable(u32),
    Disable,
}

/// Handle used by the main flow to arm and disarm the timer thread
pub struct ThreadTimer {
    tx: Sender<TimerCommand>,
}

impl ThreadTimer {
    /// Start the timer thread inside `scope`
    pub fn spawn<'scope, 'env, L>(
        scope: &'scope Scope<'scope, 'env>,
        shared: &'env SharedState,
        leds: &'env L,
        blink_ms: u32,
    ) -> Self
    where
        L: Indicators + ?Sized,
    {
        let (tx, rx) = mpsc::channel();

        scope.spawn(move || {
            let mut deadline: Option<Instant> = None;
            loop {
                let command = match deadline {
                    None => match rx.recv() {
                        Ok(command) => Some(command),
                        Err(_) => break,
                    },
                    Some(at) => match rx.recv_timeout(at.saturating_duration_since(Instant::now())) {
                        Ok(command) => Some(command),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => break,
                    },
                };

                deadline = match command {
                    Some(TimerCommand::Enable(ms)) => Some(after(ms)),
                    Some(TimerCommand::Disable) => None,
                    None => match on_timer_expired(shared, leds, blink_ms) {
                        TimerAction::Stop => None,
                        TimerAction::Rearm(ms) => Some(after(ms)),
                    },
                };
            }
            log::trace!("timer thread stopped");
        });

        Self { tx }
    }
}

fn after(ms: u32) -> Instant {
    Instant::now() + Duration::from_millis(ms as u64)
}

impl PeriodicTimer for ThreadTimer {
    fn enable(&mut self, period_ms: u32) {
        // The thread only goes away after this handle is dropped
        let _ = self.tx.send(TimerCommand::Enable(period_ms));
    }

    fn disable(&mut self) {
        let _ = self.tx.send(TimerCommand::Disable);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ispclone_core::controller::ControllerState;
    use ispclone_core::programmer::Leds;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingLeds {
        toggles: AtomicU32,
    }

    impl Indicators for CountingLeds {
        fn set(&self, _leds: Leds, _on: bool) {}

        fn toggle(&self, _leds: Leds) {
            self.toggles.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_detected_demoted_after_period() {
        let shared = SharedState::new();
        let leds = CountingLeds::default();
        shared.set(ControllerState::Detected);

        std::thread::scope(|s| {
            let mut timer = ThreadTimer::spawn(s, &shared, &leds, 5);
            timer.enable(10);
            let start = Instant::now();
            while shared.get() != ControllerState::Idle {
                assert!(start.elapsed() < Duration::from_secs(5));
                std::thread::sleep(Duration::from_millis(1));
            }
        });
        assert_eq!(leds.toggles.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_blinks_while_copying_until_disabled() {
        let shared = SharedState::new();
        let leds = CountingLeds::default();
        shared.set(ControllerState::Copying);

        std::thread::scope(|s| {
            let mut timer = ThreadTimer::spawn(s, &shared, &leds, 2);
            timer.enable(2);
            let start = Instant::now();
            while leds.toggles.load(Ordering::Relaxed) < 3 {
                assert!(start.elapsed() < Duration::from_secs(5));
                std::thread::sleep(Duration::from_millis(1));
            }
            timer.disable();
        });
        assert_eq!(shared.get(), ControllerState::Copying);
    }
}
