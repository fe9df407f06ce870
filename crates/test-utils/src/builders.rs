#![allow(dead_code)]

use std::time::Duration;

use killcord::config::{
    CommandSpec, ConfigFile, MonitorSection, RawCommand, RawConfigFile, ShutdownConfig,
    ShutdownSection,
};
use killcord::types::{ExecMode, FinalAction};

/// Builder for `ShutdownConfig` to simplify test setup.
pub struct ShutdownConfigBuilder {
    timeout: Duration,
    commands: Vec<CommandSpec>,
    final_action: FinalAction,
}

impl ShutdownConfigBuilder {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            commands: Vec::new(),
            final_action: FinalAction::Exit,
        }
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout = Duration::from_millis(ms);
        self
    }

    pub fn power_off(mut self) -> Self {
        self.final_action = FinalAction::PowerOff;
        self
    }

    /// Add a command line using the `!` marker convention.
    pub fn line(mut self, line: &str) -> Self {
        self.commands
            .push(CommandSpec::parse_line(line).expect("test command line should parse"));
        self
    }

    pub fn command(mut self, spec: CommandSpec) -> Self {
        self.commands.push(spec);
        self
    }

    /// Synchronous `sh -c <script>`.
    pub fn sync_sh(self, script: &str) -> Self {
        self.command(sh(script, ExecMode::Sync))
    }

    /// Asynchronous `sh -c <script>`.
    pub fn async_sh(self, script: &str) -> Self {
        self.command(sh(script, ExecMode::Async))
    }

    pub fn build(self) -> ShutdownConfig {
        ShutdownConfig::new(self.timeout, self.commands, self.final_action)
    }
}

impl Default for ShutdownConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `sh -c <script>` in the given mode.
pub fn sh(script: &str, mode: ExecMode) -> CommandSpec {
    CommandSpec::new("sh", vec!["-c".to_string(), script.to_string()], mode)
}

/// Builder for `ConfigFile`, going through the same validation as a file.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                shutdown: ShutdownSection::default(),
                monitor: MonitorSection::default(),
            },
        }
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.shutdown.timeout_ms = ms;
        self
    }

    pub fn power_off(mut self, val: bool) -> Self {
        self.config.shutdown.power_off = val;
        self
    }

    pub fn power_off_command(mut self, cmd: &[&str]) -> Self {
        self.config.shutdown.power_off_command =
            Some(cmd.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_line(mut self, line: &str) -> Self {
        self.config
            .shutdown
            .commands
            .push(RawCommand::Line(line.to_string()));
        self
    }

    pub fn with_structured(mut self, program: &str, args: &[&str], mode: ExecMode) -> Self {
        self.config.shutdown.commands.push(RawCommand::Structured {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            mode,
        });
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.monitor.poll_interval_ms = ms;
        self
    }

    pub fn watch_location(mut self, location: &str) -> Self {
        self.config.monitor.devices.push(location.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
