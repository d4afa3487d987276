use std::sync::Mutex;
use std::time::Duration;

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use txsync::sync::SyncProgress;

use super::item_label;

/// Bars of the phase currently running.
#[derive(Default)]
struct ProgressState {
    /// Spinner for the phase, counting transferred files.
    phase_bar: Option<ProgressBar>,
    /// One status line per worker slot.
    slots: Vec<ProgressBar>,
}

/// Interactive progress reporter using indicatif.
///
/// Item results (downloads, uploads, skips, failures) are printed above the
/// bars so they stay on screen after the bars are cleared.
pub struct InteractiveReporter {
    multi: MultiProgress,
    state: Mutex<ProgressState>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            state: Mutex::new(ProgressState::default()),
        }
    }

    pub fn handle(&self, event: SyncProgress) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        match event {
            SyncProgress::ResourcesSelected { count, branch } => {
                let branch = branch
                    .map(|b| format!(" on branch {}", style(b).cyan()))
                    .unwrap_or_default();
                self.println(format!("{} resource(s) selected{branch}", style(count).bold()));
            }

            SyncProgress::PhaseStarted {
                phase,
                tasks,
                workers,
            } => {
                Self::clear_phase(&mut state);
                let bar = self.multi.add(ProgressBar::new_spinner());
                bar.set_style(Self::counter_style());
                bar.set_prefix(format!("{:24}", phase.label()));
                bar.set_message(format!("{tasks} task(s)"));
                bar.enable_steady_tick(Duration::from_millis(100));
                state.phase_bar = Some(bar);

                for _ in 0..workers.min(tasks) {
                    let slot = self.multi.add(ProgressBar::new_spinner());
                    slot.set_style(Self::slot_style());
                    state.slots.push(slot);
                }
            }

            SyncProgress::PhaseComplete {
                phase,
                completed,
                skipped,
            } => {
                for slot in state.slots.drain(..) {
                    slot.finish_and_clear();
                }
                // The finished phase line stays as a record of the run.
                if let Some(bar) = state.phase_bar.take() {
                    let note = if skipped > 0 {
                        format!(", {} not started", style(skipped).yellow())
                    } else {
                        String::new()
                    };
                    bar.finish_with_message(format!("{completed} task(s) done{note}"));
                }
                tracing::debug!(phase = phase.label(), completed, skipped, "Phase complete");
            }

            SyncProgress::TaskStatus { slot, message } => {
                if let Some(bar) = state.slots.get(slot) {
                    bar.set_message(message);
                    bar.tick();
                }
            }

            SyncProgress::Downloaded {
                resource,
                language,
                path,
            } => {
                Self::count(&state);
                self.println(format!(
                    "{} {} → {}",
                    style("↓").green(),
                    item_label(&resource, language.as_deref()),
                    style(path.display()).dim()
                ));
            }

            SyncProgress::Uploaded { resource, language } => {
                Self::count(&state);
                self.println(format!(
                    "{} {}",
                    style("↑").green(),
                    item_label(&resource, language.as_deref())
                ));
            }

            SyncProgress::Skipped {
                resource,
                language,
                reason,
            } => {
                self.println(format!(
                    "{} {}: {}",
                    style("-").dim(),
                    item_label(&resource, language.as_deref()),
                    style(reason).dim()
                ));
            }

            SyncProgress::ResourceCreated { resource } => {
                self.println(format!("{} created {resource}", style("+").green()));
            }

            SyncProgress::LanguagesCreated { project, codes } => {
                self.println(format!(
                    "{} added {} to {project}",
                    style("+").green(),
                    codes.join(", ")
                ));
            }

            SyncProgress::ItemFailed {
                resource,
                language,
                error,
            } => {
                self.println(format!(
                    "{} {}: {}",
                    style("✗").red(),
                    item_label(&resource, language.as_deref()),
                    style(error).red()
                ));
            }

            SyncProgress::Throttled {
                target,
                remaining_secs,
                ..
            } => {
                if let Some(bar) = &state.phase_bar {
                    bar.set_message(format!(
                        "{} retrying {target} in {remaining_secs}s",
                        style("throttled,").yellow()
                    ));
                }
            }

            SyncProgress::Warning { message } => {
                self.println(format!("{} {message}", style("!").yellow()));
            }

            _ => {}
        }
    }

    pub fn finish(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Self::clear_phase(&mut state);
    }

    fn clear_phase(state: &mut ProgressState) {
        for slot in state.slots.drain(..) {
            slot.finish_and_clear();
        }
        if let Some(bar) = state.phase_bar.take()
            && !bar.is_finished()
        {
            bar.finish_and_clear();
        }
    }

    fn count(state: &ProgressState) {
        if let Some(bar) = &state.phase_bar {
            bar.inc(1);
        }
    }

    fn println(&self, line: String) {
        // Only fails when the terminal is gone.
        let _ = self.multi.println(line);
    }

    fn counter_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {pos:>4} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }

    fn slot_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("  {spinner:.dim} {msg:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicatif::ProgressDrawTarget;
    use txsync::sync::SyncPhase;

    fn hidden() -> InteractiveReporter {
        InteractiveReporter {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            state: Mutex::new(ProgressState::default()),
        }
    }

    #[test]
    fn phase_creates_one_line_per_busy_slot() {
        let reporter = hidden();
        reporter.handle(SyncProgress::PhaseStarted {
            phase: SyncPhase::Pull,
            tasks: 2,
            workers: 5,
        });
        assert_eq!(reporter.state.lock().unwrap().slots.len(), 2);

        reporter.handle(SyncProgress::TaskStatus {
            slot: 1,
            message: "downloading".into(),
        });
        // Out-of-range slots are ignored.
        reporter.handle(SyncProgress::TaskStatus {
            slot: 9,
            message: "ignored".into(),
        });

        reporter.handle(SyncProgress::PhaseComplete {
            phase: SyncPhase::Pull,
            completed: 2,
            skipped: 0,
        });
        let state = reporter.state.lock().unwrap();
        assert!(state.slots.is_empty());
        assert!(state.phase_bar.is_none());
    }

    #[test]
    fn transfers_advance_the_phase_counter() {
        let reporter = hidden();
        reporter.handle(SyncProgress::PhaseStarted {
            phase: SyncPhase::SourceUpload,
            tasks: 1,
            workers: 1,
        });
        reporter.handle(SyncProgress::Uploaded {
            resource: "r".into(),
            language: None,
        });
        let state = reporter.state.lock().unwrap();
        assert_eq!(state.phase_bar.as_ref().map(ProgressBar::position), Some(1));
    }
}
