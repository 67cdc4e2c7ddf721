use std::io;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use tokio::time::timeout;
use tracing::debug;

use crate::config::{BotConfig, BrowsersConfig, RuntimeConfig, SystemPackagesConfig};
use crate::database::models::{step_kind::StepKind, step_outcome::StepOutcome};
use crate::runner::manifest::Manifest;
use crate::runner::sandbox;

/// What one executed step left behind; persisted as a `step_execution` row.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub step: StepKind,
    pub outcome: StepOutcome,
    pub exit_code: Option<i32>,
    pub started_at: NaiveDateTime,
    pub finished_at: NaiveDateTime,
    pub duration: Duration,
    pub failure_reason: Option<String>,
}

impl StepRecord {
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.outcome.is_successful()
    }
}

struct StepFailure {
    exit_code: Option<i32>,
    reason: String,
}

enum StepAction {
    /// Copy the project into the sandbox. Runs in-process.
    Snapshot { source: PathBuf },
    /// Run `<program> --version` and compare the reported version against
    /// the pin prefix. An empty pin only checks the interpreter launches.
    VerifyRuntime { program: String, version_pin: String },
    /// Validate the manifest, then hand it to the installer. Validation
    /// failures never spawn a process.
    InstallManifest { program: String, manifest: PathBuf },
    /// Spawn a child process in the sandbox and require a zero exit.
    Process { program: String, args: Vec<String> },
}

pub struct Step {
    pub kind: StepKind,
    action: StepAction,
}

impl Step {
    pub fn checkout(source: PathBuf) -> Self {
        Self {
            kind: StepKind::Checkout,
            action: StepAction::Snapshot { source },
        }
    }

    pub fn runtime(config: &RuntimeConfig) -> Self {
        Self {
            kind: StepKind::Runtime,
            action: StepAction::VerifyRuntime {
                program: config.command.clone(),
                version_pin: config.version_pin.clone(),
            },
        }
    }

    pub fn dependencies(runtime: &RuntimeConfig, manifest: PathBuf) -> Self {
        Self {
            kind: StepKind::Dependencies,
            action: StepAction::InstallManifest {
                program: runtime.command.clone(),
                manifest,
            },
        }
    }

    pub fn system_packages(config: &SystemPackagesConfig) -> Self {
        let mut parts = config.installer.clone();
        parts.extend(config.packages.iter().cloned());
        let program = if parts.is_empty() {
            String::new()
        } else {
            parts.remove(0)
        };
        Self {
            kind: StepKind::SystemPackages,
            action: StepAction::Process {
                program,
                args: parts,
            },
        }
    }

    pub fn browsers(runtime: &RuntimeConfig, config: &BrowsersConfig) -> Self {
        let mut args = config.installer_args.clone();
        args.extend(config.engines.iter().cloned());
        Self {
            kind: StepKind::Browsers,
            action: StepAction::Process {
                program: runtime.command.clone(),
                args,
            },
        }
    }

    /// The bot inherits the daemon's full environment; secrets reach it the
    /// same way they reached us.
    pub fn bot(config: &BotConfig) -> Self {
        Self {
            kind: StepKind::Bot,
            action: StepAction::Process {
                program: config.command.clone(),
                args: config.args.clone(),
            },
        }
    }

    /// Execute the step inside the sandbox, bounded by `step_timeout`.
    ///
    /// Never returns an error: every way a step can end is folded into the
    /// returned record.
    pub async fn execute(&self, sandbox_path: &Path, step_timeout: Duration) -> StepRecord {
        debug!("▶ step {} starting", self.kind);

        let started_at = chrono::Utc::now().naive_utc();
        let start = Instant::now();

        let result = timeout(step_timeout, self.run(sandbox_path)).await;

        let duration = start.elapsed();
        let finished_at = chrono::Utc::now().naive_utc();

        let (outcome, exit_code, failure_reason) = match result {
            Ok(Ok(exit_code)) => (StepOutcome::Succeeded, exit_code, None),
            Ok(Err(failure)) => (StepOutcome::Failed, failure.exit_code, Some(failure.reason)),
            Err(_) => (
                StepOutcome::TimedOut,
                None,
                Some(format!(
                    "step exceeded the {}s wall-clock limit",
                    step_timeout.as_secs()
                )),
            ),
        };

        StepRecord {
            step: self.kind,
            outcome,
            exit_code,
            started_at,
            finished_at,
            duration,
            failure_reason,
        }
    }

    async fn run(&self, sandbox_path: &Path) -> Result<Option<i32>, StepFailure> {
        match &self.action {
            StepAction::Snapshot { source } => {
                let source = source.clone();
                let dest = sandbox_path.to_path_buf();
                let copied = tokio::task::spawn_blocking(move || sandbox::copy_tree(&source, &dest))
                    .await
                    .map_err(|e| StepFailure {
                        exit_code: None,
                        reason: format!("snapshot task panicked: {e}"),
                    })?
                    .map_err(|e: io::Error| StepFailure {
                        exit_code: None,
                        reason: format!("failed to snapshot project: {e}"),
                    })?;
                debug!("▶ snapshot copied {} files", copied);
                Ok(None)
            }
            StepAction::VerifyRuntime {
                program,
                version_pin,
            } => {
                let output = run_command(program, &[String::from("--version")], sandbox_path).await?;
                let exit_code = expect_zero_exit(program, &output)?;

                if !version_pin.is_empty() {
                    let reported = String::from_utf8_lossy(&output.stdout).to_string()
                        + &String::from_utf8_lossy(&output.stderr);
                    let matches_pin = reported
                        .split_whitespace()
                        .any(|token| token.starts_with(version_pin.as_str()));
                    if !matches_pin {
                        return Err(StepFailure {
                            exit_code,
                            reason: format!(
                                "runtime reported `{}`, expected version {version_pin}",
                                reported.trim()
                            ),
                        });
                    }
                }
                Ok(exit_code)
            }
            StepAction::InstallManifest { program, manifest } => {
                let manifest_path = sandbox_path.join(manifest);
                let parsed = Manifest::load(&manifest_path).map_err(|e| StepFailure {
                    exit_code: None,
                    reason: e.to_string(),
                })?;

                if parsed.is_empty() {
                    debug!("▶ manifest lists no packages, nothing to install");
                    return Ok(None);
                }

                let args: Vec<String> = ["-m", "pip", "install", "-r"]
                    .into_iter()
                    .map(String::from)
                    .chain([manifest.to_string_lossy().into_owned()])
                    .collect();
                let output = run_command(program, &args, sandbox_path).await?;
                expect_zero_exit(program, &output)
            }
            StepAction::Process { program, args } => {
                let output = run_command(program, args, sandbox_path).await?;
                expect_zero_exit(program, &output)
            }
        }
    }
}

async fn run_command(
    program: &str,
    args: &[String],
    cwd: &Path,
) -> Result<Output, StepFailure> {
    tokio::process::Command::new(program)
        .args(args)
        .current_dir(cwd)
        .output()
        .await
        .map_err(|source| StepFailure {
            exit_code: None,
            reason: format!("failed to spawn `{program}`: {source}"),
        })
}

fn expect_zero_exit(program: &str, output: &Output) -> Result<Option<i32>, StepFailure> {
    if output.status.success() {
        Ok(output.status.code())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(StepFailure {
            exit_code: output.status.code(),
            reason: format!(
                "`{program}` exited with {}: {}",
                output
                    .status
                    .code()
                    .map_or_else(|| "signal".to_string(), |c| format!("code {c}")),
                stderr.trim()
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::sandbox::Sandbox;

    fn sh(script: &str) -> BotConfig {
        BotConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
        }
    }

    #[tokio::test]
    async fn process_step_records_a_zero_exit() {
        let sandbox = Sandbox::create().unwrap();
        let record = Step::bot(&sh("exit 0"))
            .execute(sandbox.path(), Duration::from_secs(5))
            .await;

        assert!(record.succeeded());
        assert_eq!(record.exit_code, Some(0));
        assert!(record.failure_reason.is_none());
    }

    #[tokio::test]
    async fn process_step_records_the_nonzero_exit_code() {
        let sandbox = Sandbox::create().unwrap();
        let record = Step::bot(&sh("exit 7"))
            .execute(sandbox.path(), Duration::from_secs(5))
            .await;

        assert_eq!(record.outcome, StepOutcome::Failed);
        assert_eq!(record.exit_code, Some(7));
        assert!(record.failure_reason.is_some());
    }

    #[tokio::test]
    async fn step_times_out_when_the_limit_is_hit() {
        let sandbox = Sandbox::create().unwrap();
        let record = Step::bot(&sh("sleep 5"))
            .execute(sandbox.path(), Duration::from_millis(100))
            .await;

        assert_eq!(record.outcome, StepOutcome::TimedOut);
        assert_eq!(record.exit_code, None);
    }

    #[tokio::test]
    async fn spawn_failure_is_a_step_failure_not_a_panic() {
        let sandbox = Sandbox::create().unwrap();
        let missing = BotConfig {
            command: "relais-no-such-binary".to_string(),
            args: vec![],
        };
        let record = Step::bot(&missing)
            .execute(sandbox.path(), Duration::from_secs(5))
            .await;

        assert_eq!(record.outcome, StepOutcome::Failed);
        assert_eq!(record.exit_code, None);
        assert!(record.failure_reason.unwrap().contains("failed to spawn"));
    }

    #[tokio::test]
    async fn runtime_verification_fails_on_pin_mismatch() {
        let sandbox = Sandbox::create().unwrap();
        // `echo --version` exits zero but reports no 3.11 token
        let config = RuntimeConfig {
            command: "echo".to_string(),
            version_pin: "3.11".to_string(),
        };
        let record = Step::runtime(&config)
            .execute(sandbox.path(), Duration::from_secs(5))
            .await;

        assert_eq!(record.outcome, StepOutcome::Failed);
        assert!(record
            .failure_reason
            .unwrap()
            .contains("expected version 3.11"));
    }

    #[tokio::test]
    async fn empty_pin_only_checks_the_interpreter_launches() {
        let sandbox = Sandbox::create().unwrap();
        let config = RuntimeConfig {
            command: "echo".to_string(),
            version_pin: String::new(),
        };
        let record = Step::runtime(&config)
            .execute(sandbox.path(), Duration::from_secs(5))
            .await;

        assert!(record.succeeded());
    }

    #[tokio::test]
    async fn malformed_manifest_fails_before_any_process_spawns() {
        let sandbox = Sandbox::create().unwrap();
        std::fs::write(
            sandbox.path().join("requirements.txt"),
            "requests\n???broken???\n",
        )
        .unwrap();

        let runtime = RuntimeConfig {
            command: "echo".to_string(),
            version_pin: String::new(),
        };
        let record = Step::dependencies(&runtime, "requirements.txt".into())
            .execute(sandbox.path(), Duration::from_secs(5))
            .await;

        assert_eq!(record.outcome, StepOutcome::Failed);
        assert_eq!(record.exit_code, None);
        assert!(record
            .failure_reason
            .unwrap()
            .contains("invalid package specifier"));
    }
}
