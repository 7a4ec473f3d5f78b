//! Controller cycle against simulated chips

use crate::commands::list::format_size;
use ispclone_core::chip::{self, Port};
use ispclone_core::controller::{Controller, ControllerState, CopierConfig, SharedState};
use ispclone_core::copy::{CopyDirection, Roles};
use ispclone_core::isp::Fuse;
use ispclone_core::programmer::BitbangIsp;
use ispclone_dummy::{DummyAvr, DummyBoard, DummyLeds, DummyTimer};

/// Steps after which a cycle that never started counts as stuck
const MAX_STEPS: usize = 16;

/// What to put on the simulated board
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub source: String,
    pub target: String,
    pub seed: u8,
    pub corrupt_flash: Option<usize>,
    pub corrupt_eeprom: Option<u8>,
    pub corrupt_fuse: Option<Fuse>,
    pub direction: CopyDirection,
}

/// Run one full controller cycle on a simulated board and report the outcome
pub fn run_simulate(
    opts: &SimulateOptions,
    config: CopierConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let source_info =
        chip::find_by_name(&opts.source).ok_or_else(|| format!("Unknown chip: {}", opts.source))?;
    let target_info =
        chip::find_by_name(&opts.target).ok_or_else(|| format!("Unknown chip: {}", opts.target))?;

    let mut target = DummyAvr::new(target_info);
    if let Some(addr) = opts.corrupt_flash {
        target.inject_flash_fault(addr);
    }
    if let Some(addr) = opts.corrupt_eeprom {
        target.inject_eeprom_fault(addr);
    }
    if let Some(fuse) = opts.corrupt_fuse {
        target.inject_fuse_fault(fuse);
    }

    let roles = Roles::assign(opts.direction);
    let mut board = DummyBoard::new()
        .with_chip(roles.source(), DummyAvr::with_test_image(source_info, opts.seed))
        .with_chip(roles.target(), target);
    board.pull_trigger(true);

    println!(
        "Simulating {} ({} port) -> {} ({} port)",
        source_info.name,
        roles.source(),
        target_info.name,
        roles.target()
    );

    let shared = SharedState::new();
    let leds = DummyLeds::new();
    let (socket, bus) = board.bindings();
    let mut controller = Controller::new(
        BitbangIsp::new(board, socket, bus),
        DummyTimer::new(),
        &leds,
        &shared,
        config,
    );

    let mut steps = 0;
    while controller.last_cycle().is_none() {
        if steps == MAX_STEPS {
            return Err(format!("Copy never started (stuck in {})", controller.state().name()).into());
        }
        let state = controller.step();
        log::debug!("step {}: {}", steps, state.name());
        steps += 1;
    }

    let outcome = controller.last_cycle();
    if controller.state() == ControllerState::Error {
        controller.step();
    }
    let (isp, timer) = controller.into_parts();
    let board = isp.into_inner();

    println!("Simulated time: {:.3} s", board.elapsed_us() as f64 / 1e6);
    println!("Timer periods:  {:?} ms", timer.history());

    match outcome {
        Some(Ok(params)) => {
            report(&board, roles.source(), roles.target());
            println!(
                "Copied {} of flash and {} of EEPROM",
                format_size(params.flash_bytes()),
                format_size(params.eeprom_size as usize)
            );
            Ok(())
        }
        Some(Err(e)) => Err(format!("Simulated copy failed: {}", e).into()),
        None => Err("Copy never ran".into()),
    }
}

fn report(board: &DummyBoard, source: Port, target: Port) {
    let (Some(source), Some(target)) = (board.chip(source), board.chip(target)) else {
        return;
    };
    let len = source.flash().len().min(target.flash().len());
    let flash_ok = source.flash()[..len] == target.flash()[..len];
    println!(
        "Flash {}, EEPROM {}, fuses {}",
        verdict(flash_ok),
        verdict(source.eeprom() == target.eeprom()),
        verdict(source.fuses() == target.fuses())
    );
}

fn verdict(ok: bool) -> &'static str {
    if ok {
        "match"
    } else {
        "differ"
    }
}
