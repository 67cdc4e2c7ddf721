use std::time::Duration;

use tracing::warn;

use crate::config::PipelineConfig;
use crate::database::models::step_kind::StepKind;
use crate::runner::sandbox::Sandbox;
use crate::runner::step::{Step, StepRecord};

/// Records produced by one pipeline phase, and whether the phase ran to
/// completion or aborted at the last record.
#[derive(Debug)]
pub struct PhaseOutcome {
    pub steps: Vec<StepRecord>,
    pub aborted: bool,
}

/// The step sequence a worker drives a run through.
///
/// A `Pipeline` is pure configuration: building one never touches the
/// filesystem, and the same config always yields the same step sequence.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    step_timeout: Duration,
}

impl Pipeline {
    #[must_use]
    pub const fn new(config: PipelineConfig, step_timeout: Duration) -> Self {
        Self {
            config,
            step_timeout,
        }
    }

    /// Provisioning phase: project snapshot, then runtime verification.
    #[must_use]
    pub fn provision_steps(&self) -> Vec<Step> {
        vec![
            Step::checkout(self.config.project_dir.clone()),
            Step::runtime(&self.config.runtime),
        ]
    }

    /// Install phase: the dependency manifest first, so the browser
    /// installer can already import the automation library.
    #[must_use]
    pub fn install_steps(&self) -> Vec<Step> {
        vec![
            Step::dependencies(&self.config.runtime, self.config.manifest.clone()),
            Step::system_packages(&self.config.system_packages),
            Step::browsers(&self.config.runtime, &self.config.browsers),
        ]
    }

    #[must_use]
    pub fn bot_step(&self) -> Step {
        Step::bot(&self.config.bot)
    }

    /// The full canonical step order for this pipeline.
    #[must_use]
    pub fn step_kinds(&self) -> Vec<StepKind> {
        let mut kinds: Vec<StepKind> =
            self.provision_steps().iter().map(|step| step.kind).collect();
        kinds.extend(self.install_steps().iter().map(|step| step.kind));
        kinds.push(self.bot_step().kind);
        kinds
    }

    /// Execute a phase's steps in order, stopping at the first one that does
    /// not succeed. Nothing after a failed step runs.
    pub async fn run_phase(&self, sandbox: &Sandbox, steps: Vec<Step>) -> PhaseOutcome {
        let mut records = Vec::with_capacity(steps.len());

        for step in steps {
            let record = step.execute(sandbox.path(), self.step_timeout).await;
            let succeeded = record.succeeded();

            if !succeeded {
                warn!(
                    "⚠️ step {} {}: {}",
                    record.step,
                    record.outcome,
                    record.failure_reason.as_deref().unwrap_or("no reason"),
                );
            }

            records.push(record);

            if !succeeded {
                return PhaseOutcome {
                    steps: records,
                    aborted: true,
                };
            }
        }

        PhaseOutcome {
            steps: records,
            aborted: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        BotConfig, BrowsersConfig, PipelineConfig, RuntimeConfig, SystemPackagesConfig,
    };
    use crate::database::models::step_outcome::StepOutcome;
    use std::path::Path;

    /// A pipeline whose external commands are all `echo`/`sh`, so tests run
    /// with nothing but a POSIX userland.
    fn echo_pipeline(project_dir: &Path, bot_script: &str) -> Pipeline {
        let config = PipelineConfig {
            project_dir: project_dir.to_path_buf(),
            manifest: "requirements.txt".into(),
            runtime: RuntimeConfig {
                command: "echo".to_string(),
                version_pin: String::new(),
            },
            system_packages: SystemPackagesConfig {
                installer: vec!["echo".to_string(), "install".to_string()],
                packages: vec!["libasound2".to_string()],
            },
            browsers: BrowsersConfig {
                installer_args: vec![
                    "-m".to_string(),
                    "playwright".to_string(),
                    "install".to_string(),
                ],
                engines: vec!["firefox".to_string(), "chromium".to_string()],
            },
            bot: BotConfig {
                command: "sh".to_string(),
                args: vec!["-c".to_string(), bot_script.to_string()],
            },
        };
        Pipeline::new(config, Duration::from_secs(10))
    }

    fn project_with_manifest(contents: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("requirements.txt"), contents).unwrap();
        dir
    }

    async fn execute_to_completion(pipeline: &Pipeline) -> (Vec<StepRecord>, bool) {
        let sandbox = Sandbox::create().unwrap();
        let mut records = Vec::new();

        for steps in [pipeline.provision_steps(), pipeline.install_steps()] {
            let outcome = pipeline.run_phase(&sandbox, steps).await;
            let aborted = outcome.aborted;
            records.extend(outcome.steps);
            if aborted {
                return (records, false);
            }
        }

        let outcome = pipeline.run_phase(&sandbox, vec![pipeline.bot_step()]).await;
        let aborted = outcome.aborted;
        records.extend(outcome.steps);
        (records, !aborted)
    }

    #[tokio::test]
    async fn full_pipeline_executes_every_step_in_order() {
        let project = project_with_manifest("requests==2.32.3\n");
        let pipeline = echo_pipeline(project.path(), "exit 0");

        let (records, succeeded) = execute_to_completion(&pipeline).await;

        assert!(succeeded);
        let executed: Vec<StepKind> = records.iter().map(|r| r.step).collect();
        assert_eq!(executed, StepKind::SEQUENCE.to_vec());
        assert!(records.iter().all(StepRecord::succeeded));
    }

    #[tokio::test]
    async fn step_selection_is_deterministic_across_builds() {
        let project = project_with_manifest("requests\n");
        let first = echo_pipeline(project.path(), "exit 0");
        let second = echo_pipeline(project.path(), "exit 0");

        assert_eq!(first.step_kinds(), second.step_kinds());
        assert_eq!(first.step_kinds(), StepKind::SEQUENCE.to_vec());
    }

    #[tokio::test]
    async fn malformed_manifest_stops_before_packages_and_browsers() {
        let project = project_with_manifest("!!!not a specifier!!!\n");
        let pipeline = echo_pipeline(project.path(), "exit 0");

        let (records, succeeded) = execute_to_completion(&pipeline).await;

        assert!(!succeeded);
        let executed: Vec<StepKind> = records.iter().map(|r| r.step).collect();
        assert_eq!(
            executed,
            vec![StepKind::Checkout, StepKind::Runtime, StepKind::Dependencies]
        );
        assert_eq!(records.last().unwrap().outcome, StepOutcome::Failed);
    }

    #[tokio::test]
    async fn failing_bot_fails_the_run_and_nothing_follows_it() {
        let project = project_with_manifest("requests\n");
        let pipeline = echo_pipeline(project.path(), "exit 3");

        let (records, succeeded) = execute_to_completion(&pipeline).await;

        assert!(!succeeded);
        let last = records.last().unwrap();
        assert_eq!(last.step, StepKind::Bot);
        assert_eq!(last.exit_code, Some(3));
        assert_eq!(records.len(), StepKind::SEQUENCE.len());
    }

    #[tokio::test]
    async fn two_runs_can_execute_simultaneously() {
        // Nothing in the pipeline serializes runs: a scheduled firing and a
        // manual dispatch may overlap, and both complete.
        let project = project_with_manifest("requests\n");
        let first = echo_pipeline(project.path(), "sleep 0.2");
        let second = echo_pipeline(project.path(), "sleep 0.2");

        let (first_result, second_result) =
            tokio::join!(execute_to_completion(&first), execute_to_completion(&second));

        assert!(first_result.1);
        assert!(second_result.1);
    }
}
