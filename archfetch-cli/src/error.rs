//! CLI error type and exit codes.

use std::fmt;

use archfetch::config::ConfigError;
use archfetch::logging::LoggingError;
use archfetch::FetchError;

/// Exit code for configuration errors.
pub const EXIT_CONFIG: u8 = 2;

/// Exit code for any other fatal error.
pub const EXIT_FAILURE: u8 = 1;

/// Exit code after an interrupt.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Errors that end the CLI with a non-zero exit code.
#[derive(Debug)]
pub enum CliError {
    /// Invalid option or environment problem detected by the CLI itself.
    Config(String),
    /// Fatal error from the fetch engine.
    Fetch(FetchError),
    /// Logging could not be set up.
    Logging(LoggingError),
    /// The Ctrl+C handler could not be installed.
    Signal(ctrlc::Error),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Config(_) => EXIT_CONFIG,
            CliError::Fetch(e) if e.is_configuration() => EXIT_CONFIG,
            CliError::Fetch(_) | CliError::Logging(_) | CliError::Signal(_) => EXIT_FAILURE,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Fetch(e) => write!(f, "{}", e),
            CliError::Logging(e) => write!(f, "Logging error: {}", e),
            CliError::Signal(e) => write!(f, "Failed to set signal handler: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(_) => None,
            CliError::Fetch(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Signal(e) => Some(e),
        }
    }
}

impl From<FetchError> for CliError {
    fn from(e: FetchError) -> Self {
        CliError::Fetch(e)
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Fetch(e.into())
    }
}
