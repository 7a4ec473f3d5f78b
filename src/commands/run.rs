//! Unattended copier loop

use std::time::Duration;

use crate::programmers::Programmer;
use crate::timer::ThreadTimer;
use ispclone_core::controller::{Controller, ControllerState, CopierConfig, SharedState};

/// Pause between polls while waiting for a chip or the trigger
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Run the controller until `cycles` copy cycles completed, or forever
pub fn run_copier(
    programmer: Programmer<'_>,
    config: CopierConfig,
    cycles: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let shared = SharedState::new();
    let leds = programmer.leds;
    let mut failures = 0u32;

    log::info!(
        "Copier running ({:?}), insert a chip and pull the trigger",
        config.direction
    );

    std::thread::scope(|s| {
        let timer = ThreadTimer::spawn(s, &shared, leds, config.blink_ms);
        let mut controller = Controller::new(programmer.board, timer, leds, &shared, config);
        let mut completed = 0u32;

        loop {
            let before = controller.state();
            let after = controller.step();

            if before == ControllerState::Copying {
                completed += 1;
                match controller.last_cycle() {
                    Some(Ok(params)) => println!(
                        "Cycle {}: copied {} pages, {} bytes EEPROM",
                        completed, params.page_count, params.eeprom_size
                    ),
                    Some(Err(e)) => {
                        failures += 1;
                        println!("Cycle {}: failed: {}", completed, e);
                    }
                    None => {}
                }
                if cycles.is_some_and(|n| completed >= n) {
                    // Skip the error dwell on the way out
                    controller.reset_state();
                    break;
                }
            }

            if matches!(after, ControllerState::Idle | ControllerState::Detected) {
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    });

    if failures > 0 {
        return Err(format!("{} copy cycle(s) failed", failures).into());
    }
    Ok(())
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::programmers::with_programmer;

    #[test]
    fn test_run_stops_after_cycle_count() {
        // Blank socket chip, programmed bus chip, trigger held by another node
        with_programmer("dummy", |p| run_copier(p, CopierConfig::default(), Some(2))).unwrap();
    }

    #[test]
    fn test_run_reports_failed_cycles() {
        let err = with_programmer("dummy:bus=none", |p| {
            run_copier(p, CopierConfig::default(), Some(1))
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "1 copy cycle(s) failed");
    }

    #[test]
    fn test_run_reverse_direction() {
        let config = CopierConfig {
            direction: crate::commands::direction(true),
            ..CopierConfig::default()
        };
        with_programmer("dummy:socket=ATtiny44,bus=ATtiny84", |p| {
            run_copier(p, config, Some(1))
        })
        .unwrap();
    }
}
