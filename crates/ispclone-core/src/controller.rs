//! Copier state machine
//!
//! The [`Controller`] runs on the main flow and owns every programming
//! line, the chip records and the staging buffer. The timer callback,
//! [`on_timer_expired`], runs preemptively and only reads or swaps the
//! shared state and toggles LEDs; it never performs ISP I/O.
//!
//! ```text
//! Idle --chip in socket--> Detected --trigger low--> Copying --ok--> Idle
//!   ^                         |                         |
//!   +------re-check timer-----+                        err
//!   |                                                   v
//!   +-------------------------dwell------------------ Error
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

use crate::chip::Port;
use crate::copy::{self, CopyDirection, NoProgress, Session, SessionParams};
use crate::error::{Error, Result};
use crate::programmer::{Indicators, IspMaster, Leds, PeriodicTimer, TriggerLine};

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControllerState {
    /// Waiting for a chip in the socket
    Idle = 0,
    /// Chip present, waiting for the trigger
    Detected = 1,
    /// Copy cycle running
    Copying = 2,
    /// Last cycle failed, dwelling before retrying
    Error = 3,
}

impl ControllerState {
    const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => ControllerState::Detected,
            2 => ControllerState::Copying,
            3 => ControllerState::Error,
            _ => ControllerState::Idle,
        }
    }

    /// Human-readable name
    pub const fn name(self) -> &'static str {
        match self {
            ControllerState::Idle => "idle",
            ControllerState::Detected => "detected",
            ControllerState::Copying => "copying",
            ControllerState::Error => "error",
        }
    }
}

/// The only state crossing the timer callback boundary
#[derive(Debug)]
pub struct SharedState {
    state: AtomicU8,
}

impl SharedState {
    /// New shared state in [`ControllerState::Idle`]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(ControllerState::Idle as u8),
        }
    }

    /// Current state
    pub fn get(&self) -> ControllerState {
        ControllerState::from_raw(self.state.load(Ordering::Acquire))
    }

    /// Unconditionally enter `state`
    pub fn set(&self, state: ControllerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Move from `from` to `to` only if nobody changed the state meanwhile
    ///
    /// Both the main flow's Detected -> Copying claim and the callback's
    /// Detected -> Idle demotion go through here, so exactly one wins.
    pub fn transition(&self, from: ControllerState, to: ControllerState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// What the timer should do after its callback ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Stay disabled
    Stop,
    /// Expire again after the given number of milliseconds
    Rearm(u32),
}

/// Timer callback
///
/// The timer disables itself before calling this and applies the returned
/// action afterwards. A blink that lands after the main flow left the
/// blinking state is undone, so a reset always ends with the LED off.
pub fn on_timer_expired<L: Indicators + ?Sized>(
    shared: &SharedState,
    leds: &L,
    blink_ms: u32,
) -> TimerAction {
    let (state, led) = match shared.get() {
        ControllerState::Idle => return TimerAction::Stop,
        ControllerState::Detected => {
            // Loses against a concurrent claim by the main flow
            shared.transition(ControllerState::Detected, ControllerState::Idle);
            return TimerAction::Stop;
        }
        ControllerState::Copying => (ControllerState::Copying, Leds::READY),
        ControllerState::Error => (ControllerState::Error, Leds::ERROR),
    };

    leds.toggle(led);
    if shared.get() != state {
        // The main flow's reset may have cleared the LEDs before the toggle
        leds.set(led, false);
        return TimerAction::Stop;
    }
    TimerAction::Rearm(blink_ms)
}

/// Copier configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopierConfig {
    /// Which port is copied onto which
    pub direction: CopyDirection,
    /// Abort when Programming Enable is not echoed
    pub strict_ack: bool,
    /// Time a detected chip may wait for the trigger before re-detection
    pub recheck_ms: u32,
    /// LED blink half period while copying or in error
    pub blink_ms: u32,
    /// Time spent in the error state
    pub error_dwell_ms: u32,
    /// Delay after latching the trigger so other bus nodes can react
    pub trigger_settle_ms: u32,
}

impl Default for CopierConfig {
    fn default() -> Self {
        Self {
            direction: CopyDirection::BusToSocket,
            strict_ack: false,
            recheck_ms: 1000,
            blink_ms: 250,
            error_dwell_ms: 5000,
            trigger_settle_ms: 10,
        }
    }
}

/// Main-flow half of the copier
pub struct Controller<'a, M, T, L: ?Sized> {
    master: M,
    timer: T,
    leds: &'a L,
    shared: &'a SharedState,
    session: Session,
    config: CopierConfig,
    last_cycle: Option<Result<SessionParams>>,
}

impl<'a, M, T, L> Controller<'a, M, T, L>
where
    M: IspMaster + TriggerLine,
    T: PeriodicTimer,
    L: Indicators + ?Sized,
{
    /// Create a controller and put everything into the idle state
    pub fn new(
        master: M,
        timer: T,
        leds: &'a L,
        shared: &'a SharedState,
        config: CopierConfig,
    ) -> Self {
        let mut controller = Self {
            master,
            timer,
            leds,
            shared,
            session: Session::new(config.strict_ack),
            config,
            last_cycle: None,
        };
        controller.reset_state();
        controller
    }

    /// Current state
    pub fn state(&self) -> ControllerState {
        self.shared.get()
    }

    /// Configuration in use
    pub fn config(&self) -> &CopierConfig {
        &self.config
    }

    /// Session context
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Outcome of the most recent copy cycle
    pub fn last_cycle(&self) -> Option<Result<SessionParams>> {
        self.last_cycle
    }

    /// Borrow the ISP master
    pub fn master(&self) -> &M {
        &self.master
    }

    /// Mutably borrow the ISP master
    pub fn master_mut(&mut self) -> &mut M {
        &mut self.master
    }

    /// Consume the controller and return the master and timer
    pub fn into_parts(self) -> (M, T) {
        (self.master, self.timer)
    }

    /// Return to idle: trigger released, LEDs off, timer stopped
    pub fn reset_state(&mut self) {
        self.timer.disable();
        self.shared.set(ControllerState::Idle);
        self.master.release();
        self.leds.set(Leds::READY | Leds::ERROR, false);
    }

    /// Run one step of the state machine and return the resulting state
    pub fn step(&mut self) -> ControllerState {
        match self.shared.get() {
            ControllerState::Idle => self.poll_socket(),
            ControllerState::Detected => {
                self.leds.set(Leds::READY, true);
                if self.master.is_asserted()
                    && self
                        .shared
                        .transition(ControllerState::Detected, ControllerState::Copying)
                {
                    log::info!("trigger asserted");
                }
            }
            ControllerState::Copying => self.run_cycle(),
            ControllerState::Error => {
                self.master.delay_ms(self.config.error_dwell_ms);
                self.reset_state();
            }
        }
        self.shared.get()
    }

    fn poll_socket(&mut self) {
        match self.session.identify(&mut self.master, Port::Socket) {
            Ok(params) => {
                log::debug!("chip detected in socket (signature 0x{:06X})", params.signature);
                self.shared.set(ControllerState::Detected);
                self.timer.enable(self.config.recheck_ms);
            }
            Err(_) => self.leds.set(Leds::READY, false),
        }
    }

    fn run_cycle(&mut self) {
        if !self.master.latch() {
            log::error!("copy cycle aborted: trigger line could not be latched");
            self.fail(Error::TriggerLatchFailed);
            return;
        }
        self.master.delay_ms(self.config.trigger_settle_ms);
        self.timer.enable(self.config.blink_ms);

        log::info!("copy cycle started ({:?})", self.config.direction);
        let result = copy::clone_chip(
            &mut self.master,
            &mut self.session,
            self.config.direction,
            &mut NoProgress,
        );

        match result {
            Ok(params) => {
                log::info!(
                    "copy cycle finished: {} pages, {} bytes EEPROM",
                    params.page_count,
                    params.eeprom_size
                );
                self.last_cycle = Some(result);
                self.reset_state();
            }
            Err(e) => {
                log::error!("copy cycle failed: {}", e);
                self.fail(e);
            }
        }
    }

    fn fail(&mut self, error: Error) {
        self.last_cycle = Some(Err(error));
        self.shared.set(ControllerState::Error);
        self.leds.set(Leds::READY, false);
        self.timer.enable(self.config.blink_ms);
    }
}
