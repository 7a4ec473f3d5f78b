//! Single copy cycle with progress bars

use crate::programmers::Programmer;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use ispclone_core::copy::{self, CopyDirection, CopyProgress, Phase, Session};

/// Create a progress bar with custom phase message
fn create_progress_bar_with_phase(
    total: u64,
    phase: &str,
) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Progress reporter using indicatif progress bars
pub struct IndicatifProgress {
    multi: MultiProgress,
    current_bar: Option<ProgressBar>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            current_bar: None,
        }
    }

    /// Abandon the current bar, leaving it visible where it stopped
    fn abandon(&mut self) {
        if let Some(pb) = self.current_bar.take() {
            pb.abandon_with_message("failed");
        }
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl CopyProgress for IndicatifProgress {
    fn started(&mut self, phase: Phase, total_bytes: usize) {
        let label = format!("Copying {}", phase.name());
        let pb = self.multi.add(
            create_progress_bar_with_phase(total_bytes as u64, &label)
                .unwrap_or_else(|_| ProgressBar::new(total_bytes as u64)),
        );
        self.current_bar = Some(pb);
    }

    fn advanced(&mut self, bytes: usize) {
        if let Some(pb) = &self.current_bar {
            pb.inc(bytes as u64);
        }
    }

    fn finished(&mut self, phase: Phase) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish_with_message(format!("{} verified", phase.name()));
        }
    }
}

/// Copy one chip onto the other right away
pub fn run_clone(
    programmer: Programmer<'_>,
    direction: CopyDirection,
    strict_ack: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let board = programmer.board;
    let mut session = Session::new(strict_ack);
    let mut progress = IndicatifProgress::new();

    match copy::clone_chip(board, &mut session, direction, &mut progress) {
        Ok(params) => {
            let roles = session.roles();
            println!(
                "Copied {} port to {} port: {} bytes flash, 3 fuses, {} bytes EEPROM",
                roles.source(),
                roles.target(),
                params.flash_bytes(),
                params.eeprom_size
            );
            Ok(())
        }
        Err(e) => {
            progress.abandon();
            Err(Box::new(e))
        }
    }
}
