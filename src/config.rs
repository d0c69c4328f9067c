use crate::app::SessionOptions;
use crate::services::shell::{detect_shell, ShellCommand, DEFAULT_READ_CHUNK_BYTES};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Panel configuration, stored as JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PanelConfig {
    /// Shell program to launch. When unset the platform default is used
    /// (`bash` on Linux and macOS, `cmd.exe` on Windows, `sh` elsewhere).
    #[serde(default)]
    pub shell: Option<String>,

    /// Arguments passed to the shell. Ignored when `shell` is unset and the
    /// platform default supplies its own (`/K` for `cmd.exe`).
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory of the shell (default: inherited)
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// How long closing the panel waits for the shell before killing it
    #[serde(default = "default_terminate_grace_ms")]
    pub terminate_grace_ms: u64,

    /// Enable typing this long after start even if the shell printed nothing
    /// (shells without a terminal often print no prompt). `null` disables.
    #[serde(default = "default_startup_unlock_ms")]
    pub startup_unlock_ms: Option<u64>,

    /// Enable typing again if a command produced no output for this long.
    /// `null` (the default) keeps the panel read-only until output arrives.
    #[serde(default)]
    pub idle_unlock_ms: Option<u64>,

    /// Size of a single read from the shell's output pipes
    #[serde(default = "default_read_chunk_bytes")]
    pub read_chunk_bytes: usize,

    /// Print "Starting terminal with: ..." when the panel opens
    #[serde(default = "default_true")]
    pub show_banner: bool,
}

fn default_terminate_grace_ms() -> u64 {
    1000
}

fn default_startup_unlock_ms() -> Option<u64> {
    Some(200)
}

fn default_read_chunk_bytes() -> usize {
    DEFAULT_READ_CHUNK_BYTES
}

fn default_true() -> bool {
    true
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            shell: None,
            args: Vec::new(),
            working_dir: None,
            terminate_grace_ms: default_terminate_grace_ms(),
            startup_unlock_ms: default_startup_unlock_ms(),
            idle_unlock_ms: None,
            read_chunk_bytes: default_read_chunk_bytes(),
            show_banner: true,
        }
    }
}

impl PanelConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: PanelConfig =
            serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Save configuration to a JSON file, creating the parent directory
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }
        std::fs::write(path.as_ref(), contents).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Default location: `<config dir>/shell-panel/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("shell-panel").join("config.json"))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read_chunk_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "read_chunk_bytes must be greater than 0".to_string(),
            ));
        }

        if let Some(shell) = &self.shell {
            if shell.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "shell cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Resolve the command the panel launches.
    pub fn shell_command(&self) -> ShellCommand {
        let command = match &self.shell {
            Some(shell) => ShellCommand::new(shell.trim()).with_args(self.args.iter().cloned()),
            None if self.args.is_empty() => ShellCommand::platform_default(),
            None => ShellCommand::new(detect_shell().0).with_args(self.args.iter().cloned()),
        };
        match &self.working_dir {
            Some(dir) => command.with_working_dir(dir),
            None => command,
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            terminate_grace: Duration::from_millis(self.terminate_grace_ms),
            startup_unlock: self.startup_unlock_ms.map(Duration::from_millis),
            idle_unlock: self.idle_unlock_ms.map(Duration::from_millis),
            read_chunk_bytes: self.read_chunk_bytes,
            show_banner: self.show_banner,
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Serialize error: {0}")]
    SerializeError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}
