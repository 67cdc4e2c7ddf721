use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub tracing: TracingConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub runner: RunnerConfig,
    pub schedule: ScheduleConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TracingConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

/// When and in which civil timezone the scheduler fires.
///
/// The expression may use the classic five-field cron form; a seconds field
/// is prepended during parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_schedule_expression")]
    pub expression: String,
    #[serde(default = "default_schedule_timezone")]
    pub timezone: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            expression: default_schedule_expression(),
            timezone: default_schedule_timezone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Number of concurrent worker tasks (default: 1)
    #[serde(default = "default_worker_count")]
    pub workers: u32,
    /// Seconds between queue polls when no pending run was found (default: 5)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Wall-clock limit per pipeline step in seconds (default: 1800)
    #[serde(default = "default_step_timeout")]
    pub step_timeout_seconds: u64,
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workers: default_worker_count(),
            poll_interval_seconds: default_poll_interval(),
            step_timeout_seconds: default_step_timeout(),
            cleanup: CleanupConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Interval between cleanup runs in seconds (default: 3600 = 1 hour)
    #[serde(default = "default_cleanup_interval")]
    pub interval_seconds: u64,
    /// Retention period for succeeded runs in seconds (default: 7200 = 2 hours)
    #[serde(default = "default_succeeded_retention")]
    pub succeeded_retention_seconds: u64,
    /// Retention period for failed runs in seconds (default: 172800 = 2 days)
    #[serde(default = "default_failed_retention")]
    pub failed_retention_seconds: u64,
    /// Maximum number of runs to delete in a single batch (default: 1000)
    #[serde(default = "default_cleanup_batch_size")]
    pub batch_size: usize,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_cleanup_interval(),
            succeeded_retention_seconds: default_succeeded_retention(),
            failed_retention_seconds: default_failed_retention(),
            batch_size: default_cleanup_batch_size(),
        }
    }
}

/// Everything a worker needs to execute one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory snapshotted into the sandbox by the checkout step (default: ".")
    #[serde(default = "default_project_dir")]
    pub project_dir: PathBuf,
    /// Manifest path relative to the project root (default: "requirements.txt")
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub system_packages: SystemPackagesConfig,
    #[serde(default)]
    pub browsers: BrowsersConfig,
    pub bot: BotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Interpreter executable (default: "python3")
    #[serde(default = "default_runtime_command")]
    pub command: String,
    /// Version prefix the interpreter must report. An empty pin only checks
    /// that the interpreter launches. (default: "3.11")
    #[serde(default = "default_runtime_pin")]
    pub version_pin: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command: default_runtime_command(),
            version_pin: default_runtime_pin(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemPackagesConfig {
    /// Installer command prefix; the package list is appended to it.
    #[serde(default = "default_package_installer")]
    pub installer: Vec<String>,
    /// Shared-library packages the headless engines link against.
    #[serde(default = "default_system_packages")]
    pub packages: Vec<String>,
}

impl Default for SystemPackagesConfig {
    fn default() -> Self {
        Self {
            installer: default_package_installer(),
            packages: default_system_packages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowsersConfig {
    /// Arguments passed to the runtime to invoke the automation library's
    /// installer; the engine names are appended to them.
    #[serde(default = "default_browser_installer_args")]
    pub installer_args: Vec<String>,
    /// Engine names to download (default: firefox and chromium)
    #[serde(default = "default_browser_engines")]
    pub engines: Vec<String>,
}

impl Default for BrowsersConfig {
    fn default() -> Self {
        Self {
            installer_args: default_browser_installer_args(),
            engines: default_browser_engines(),
        }
    }
}

/// Invocation contract for the external bot: a command, executed in the
/// sandbox, inheriting the daemon's environment. Secrets reach it the same
/// way they reach the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_schedule_expression() -> String {
    "15 */3 * * *".to_string()
}

fn default_schedule_timezone() -> String {
    "Europe/Paris".to_string()
}

const fn default_worker_count() -> u32 {
    1
}

const fn default_poll_interval() -> u64 {
    5
}

const fn default_step_timeout() -> u64 {
    1800 // 30 minutes
}

const fn default_cleanup_interval() -> u64 {
    3600 // 1 hour
}

const fn default_succeeded_retention() -> u64 {
    7200 // 2 hours
}

const fn default_failed_retention() -> u64 {
    172_800 // 2 days
}

const fn default_cleanup_batch_size() -> usize {
    1000
}

fn default_project_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_manifest() -> PathBuf {
    PathBuf::from("requirements.txt")
}

fn default_runtime_command() -> String {
    "python3".to_string()
}

fn default_runtime_pin() -> String {
    "3.11".to_string()
}

fn default_package_installer() -> Vec<String> {
    vec![
        "apt-get".to_string(),
        "install".to_string(),
        "--yes".to_string(),
    ]
}

fn default_system_packages() -> Vec<String> {
    // audio, GUI toolkit and desktop-bus libraries the engines dlopen
    vec![
        "libasound2".to_string(),
        "libgtk-3-0".to_string(),
        "libdbus-glib-1-2".to_string(),
    ]
}

fn default_browser_installer_args() -> Vec<String> {
    vec![
        "-m".to_string(),
        "playwright".to_string(),
        "install".to_string(),
    ]
}

fn default_browser_engines() -> Vec<String> {
    vec!["firefox".to_string(), "chromium".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_pipeline_section_fills_defaults() {
        let toml = r#"
            [bot]
            command = "python3"
            args = ["news_bot.py"]
        "#;
        let pipeline: PipelineConfig = config_rs::Config::builder()
            .add_source(config_rs::File::from_str(toml, config_rs::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(pipeline.manifest, PathBuf::from("requirements.txt"));
        assert_eq!(pipeline.runtime.command, "python3");
        assert_eq!(pipeline.runtime.version_pin, "3.11");
        assert_eq!(pipeline.browsers.engines, vec!["firefox", "chromium"]);
        assert_eq!(pipeline.system_packages.packages.len(), 3);
        assert_eq!(pipeline.bot.args, vec!["news_bot.py"]);
    }

    #[test]
    fn schedule_defaults_to_every_third_hour_in_paris() {
        let schedule = ScheduleConfig::default();
        assert_eq!(schedule.expression, "15 */3 * * *");
        assert_eq!(schedule.timezone, "Europe/Paris");
    }
}
