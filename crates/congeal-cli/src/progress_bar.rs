//! Terminal progress bar over the whole schedule.

use congeal_registration::{ProgressCallback, StageProfile, StepInfo};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub struct ProgressBarCallback {
    bar: ProgressBar,
}

impl ProgressBarCallback {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} solver calls {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        Self { bar }
    }

    #[cfg(test)]
    fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    #[cfg(test)]
    fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl ProgressCallback for ProgressBarCallback {
    fn on_step(&self, info: &StepInfo) {
        self.bar.set_position(info.compute_index as u64);
        self.bar.set_message(format!(
            "{} {}/{} {} objective {:.4}",
            info.stage, info.step, info.total_steps, info.subspace, info.objective
        ));
    }

    fn on_start(&self, total_computes: usize) {
        self.bar.set_length(total_computes as u64);
        self.bar.set_position(0);
    }

    fn on_stage_start(&self, profile: &StageProfile) {
        self.bar.set_message(format!("{} starting", profile.stage));
    }

    fn on_checkpoint(&self, label: &str) {
        self.bar.println(format!("checkpoint {}", label));
    }

    fn on_complete(&self, elapsed: Duration) {
        self.bar
            .finish_with_message(format!("done in {:.1}s", elapsed.as_secs_f64()));
    }

    fn on_error(&self, error: &str) {
        self.bar.abandon_with_message(format!("failed: {}", error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use congeal_core::Subspace;
    use congeal_registration::Stage;

    #[test]
    fn test_bar_follows_compute_index() {
        let callback = ProgressBarCallback::hidden();
        callback.on_start(48);
        callback.on_step(&StepInfo {
            stage: Stage::Medium,
            step: 1,
            total_steps: 3,
            subspace: Subspace::Scale,
            compute_index: 23,
            total_computes: Some(48),
            objective: 1.5,
            elapsed: Duration::from_secs(2),
        });
        assert_eq!(callback.position(), 23);
    }
}
