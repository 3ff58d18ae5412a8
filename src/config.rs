//! # Run configuration.
//!
//! Provides [`RunConfig`], the settings for one run, plus the small value types it is built from.
//! Fields are public; build it as a struct literal over `..RunConfig::default()` or with the
//! `with_*` helpers.
//!
//! ## Sentinel values
//! - `port = 0` → allocate an ephemeral port before anything else runs
//! - `destination = Destination::Stdout` → the reserved `"stdout"` destination

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::policies::ReadinessPolicy;

/// Environment variable naming the worker binary.
pub const WORKER_ENV: &str = "AUDITVISOR_WORKER";

/// Worker binary used when [`WORKER_ENV`] is unset.
pub const DEFAULT_WORKER_PROGRAM: &str = "chromium";

/// Default remote-debugging port.
pub const DEFAULT_PORT: u16 = 9222;

/// Output format handed to the result writer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Machine-readable JSON.
    Json,
    /// Standalone HTML document.
    Html,
    /// Human-readable summary; also produces an HTML copy per address.
    #[default]
    Pretty,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::Json => "json",
            OutputMode::Html => "html",
            OutputMode::Pretty => "pretty",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputMode::Json),
            "html" => Ok(OutputMode::Html),
            "pretty" => Ok(OutputMode::Pretty),
            other => Err(format!("unknown output mode {other:?} (json, html, pretty)")),
        }
    }
}

/// Where the primary result goes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Destination {
    /// Standard output stream.
    #[default]
    Stdout,
    /// A file path.
    File(PathBuf),
}

impl Destination {
    /// Reserved destination string meaning standard output.
    pub const STDOUT: &'static str = "stdout";

    /// Parses a destination; the reserved value `"stdout"` maps to [`Destination::Stdout`].
    pub fn parse(s: &str) -> Self {
        if s == Self::STDOUT {
            Destination::Stdout
        } else {
            Destination::File(PathBuf::from(s))
        }
    }
}

impl From<&str> for Destination {
    fn from(s: &str) -> Self {
        Destination::parse(s)
    }
}

/// Log verbosity requested by the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Errors only.
    Silent,
    #[default]
    Info,
    Verbose,
}

impl LogLevel {
    /// Maximum `tracing` level for this verbosity.
    pub fn as_tracing(&self) -> tracing::Level {
        match self {
            LogLevel::Silent => tracing::Level::ERROR,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Verbose => tracing::Level::DEBUG,
        }
    }

    /// Directive string usable with an `EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Silent => "error",
            LogLevel::Info => "info",
            LogLevel::Verbose => "debug",
        }
    }
}

/// Worker binary and extra arguments.
///
/// `--remote-debugging-port=<port>` is appended by the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl Default for WorkerCommand {
    /// `$AUDITVISOR_WORKER`, else `chromium`, with headless flags.
    fn default() -> Self {
        let program = std::env::var(WORKER_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_WORKER_PROGRAM.to_string());
        Self {
            program,
            args: vec![
                "--headless".to_string(),
                "--no-first-run".to_string(),
                "--disable-gpu".to_string(),
            ],
        }
    }
}

/// Settings for one run.
///
/// ## Field semantics
/// - `addresses`: audited in order, one at a time (may be empty)
/// - `port`: requested worker port (`0` = allocate)
/// - `auto_launch`: start a worker when none answers on `port`
/// - `prefer_external`: without auto-launch, keep polling for an externally started worker
///   instead of failing on the first refused probe
/// - `output` / `destination`: forwarded to the result writer
/// - `log_level`: verbosity for the embedding binary
/// - `readiness`: probe bound
/// - `worker`: how to start the worker
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `allow_empty`: an empty address list passes [`RunConfig::validate`]; the run
///   only brings the worker up and tears it down
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub addresses: Vec<String>,
    pub port: u16,
    pub auto_launch: bool,
    pub prefer_external: bool,
    pub output: OutputMode,
    pub destination: Destination,
    pub log_level: LogLevel,
    pub readiness: ReadinessPolicy,
    pub worker: WorkerCommand,
    pub bus_capacity: usize,
    pub allow_empty: bool,
}

impl Default for RunConfig {
    /// Default configuration:
    ///
    /// - no addresses
    /// - `port = 9222`
    /// - `auto_launch = true`, `prefer_external = false`
    /// - `output = Pretty` to stdout
    /// - `log_level = Info`
    /// - `readiness = ReadinessPolicy::default()`
    /// - `bus_capacity = 1024`
    /// - `allow_empty = false`
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            port: DEFAULT_PORT,
            auto_launch: true,
            prefer_external: false,
            output: OutputMode::default(),
            destination: Destination::default(),
            log_level: LogLevel::default(),
            readiness: ReadinessPolicy::default(),
            worker: WorkerCommand::default(),
            bus_capacity: 1024,
            allow_empty: false,
        }
    }
}

impl RunConfig {
    /// Returns a config auditing the given addresses, defaults otherwise.
    pub fn for_addresses<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            addresses: addresses.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_auto_launch(mut self, auto_launch: bool) -> Self {
        self.auto_launch = auto_launch;
        self
    }

    pub fn with_output(mut self, output: OutputMode, destination: Destination) -> Self {
        self.output = output;
        self.destination = destination;
        self
    }

    pub fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    /// Lets [`RunConfig::validate`] accept an empty address list.
    pub fn with_allow_empty(mut self, allow_empty: bool) -> Self {
        self.allow_empty = allow_empty;
        self
    }

    /// `true` when the port must be allocated before use.
    #[inline]
    pub fn needs_port(&self) -> bool {
        self.port == 0
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Checks what the caller must guarantee before a run.
    ///
    /// The runner accepts an empty address list; front ends that require at least one
    /// address call this first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.addresses.is_empty() && !self.allow_empty {
            return Err(ConfigError::NoAddresses);
        }
        if self.worker.program.trim().is_empty() {
            return Err(ConfigError::EmptyWorkerProgram);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_stdout_destination() {
        assert_eq!(Destination::parse("stdout"), Destination::Stdout);
        assert_eq!(
            Destination::parse("out/report.json"),
            Destination::File(PathBuf::from("out/report.json"))
        );
    }

    #[test]
    fn test_output_mode_parsing() {
        assert_eq!("JSON".parse::<OutputMode>(), Ok(OutputMode::Json));
        assert_eq!("pretty".parse::<OutputMode>(), Ok(OutputMode::Pretty));
        assert!("xml".parse::<OutputMode>().is_err());
        assert_eq!(OutputMode::default(), OutputMode::Pretty);
    }

    #[test]
    fn test_validate_requires_addresses() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.validate(), Err(ConfigError::NoAddresses));

        let cfg = RunConfig::for_addresses(["https://example.com"]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_accepts_empty_list_when_allowed() {
        let cfg = RunConfig::default().with_allow_empty(true);
        assert!(cfg.validate().is_ok());

        let mut cfg = cfg;
        cfg.worker = WorkerCommand::new("");
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyWorkerProgram));
    }

    #[test]
    fn test_validate_rejects_empty_program() {
        let mut cfg = RunConfig::for_addresses(["https://example.com"]);
        cfg.worker = WorkerCommand::new("  ");
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyWorkerProgram));
    }

    #[test]
    fn test_port_sentinel() {
        assert!(RunConfig::default().with_port(0).needs_port());
        assert!(!RunConfig::default().needs_port());
    }

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(LogLevel::Verbose.as_tracing(), tracing::Level::DEBUG);
        assert_eq!(LogLevel::Silent.as_directive(), "error");
    }
}
