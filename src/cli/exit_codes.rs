//! CLI Exit Codes
//!
//! Exit statuses produced by the error boundary and the `clapx` binary.

use std::process::ExitCode;

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Invalid arguments (clap usage errors)
    pub const USAGE: i32 = 2;

    /// Unhandled error caught by the error boundary
    pub const UNHANDLED: i32 = 3;

    /// Package or file not found
    pub const NOT_FOUND: i32 = 4;

    /// Interrupted by Ctrl-C
    pub const INTERRUPTED: i32 = 130;
}

/// Outcome of a command run through the error boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliResult {
    /// The command returned normally with this status
    Exited(i32),

    /// The command failed; `report` is what was printed
    Failed {
        /// Exit status
        code: i32,
        /// Error report
        report: String,
    },
}

impl CliResult {
    /// Plain success
    pub fn success() -> Self {
        Self::Exited(ExitCodes::SUCCESS)
    }

    /// Failure with code and report
    pub fn failed(code: i32, report: impl Into<String>) -> Self {
        Self::Failed {
            code,
            report: report.into(),
        }
    }

    /// Get exit code
    pub fn code(&self) -> i32 {
        match self {
            Self::Exited(code) | Self::Failed { code, .. } => *code,
        }
    }

    /// Get the error report, if any
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Exited(_) => None,
            Self::Failed { report, .. } => Some(report),
        }
    }

    /// Did the command return normally with status 0?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited(ExitCodes::SUCCESS))
    }

    /// Convert to ExitCode; the status is truncated to 8 bits the way the
    /// operating system does (`-1` becomes 255)
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from(status_byte(self.code()))
    }

    /// Terminate the process with this status
    pub fn exit(&self) -> ! {
        std::process::exit(self.code())
    }
}

impl From<CliResult> for ExitCode {
    fn from(result: CliResult) -> Self {
        result.to_exit_code()
    }
}

/// Low 8 bits of an exit status
pub fn status_byte(code: i32) -> u8 {
    code.to_le_bytes()[0]
}

/// Exit code description
pub fn exit_code_description(code: i32) -> &'static str {
    match code {
        0 => "Success",
        1 => "General error",
        2 => "Invalid arguments",
        3 => "Unhandled error",
        4 => "Not found",
        130 => "Interrupted",
        _ => "Unknown error",
    }
}

/// Print exit code table
pub fn print_exit_codes() {
    println!("Exit Codes:");
    for code in [0, 1, 2, 3, 4, 130] {
        println!("  {:>3}  {}", code, exit_code_description(code));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_result() {
        let success = CliResult::success();
        assert!(success.is_success());
        assert_eq!(success.code(), 0);
        assert_eq!(success.message(), None);

        let error = CliResult::failed(3, "Error: boom");
        assert!(!error.is_success());
        assert_eq!(error.code(), 3);
        assert_eq!(error.message(), Some("Error: boom"));

        assert!(!CliResult::Exited(1).is_success());
    }

    #[test]
    fn test_status_byte() {
        assert_eq!(status_byte(0), 0);
        assert_eq!(status_byte(5), 5);
        assert_eq!(status_byte(-1), 255);
        assert_eq!(status_byte(256), 0);
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(exit_code_description(ExitCodes::UNHANDLED), "Unhandled error");
        assert_eq!(exit_code_description(42), "Unknown error");
    }
}
