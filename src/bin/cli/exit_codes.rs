//! Exit codes for the CLI tool.

use zextract::Error;

/// Exit code constants
pub const SUCCESS: i32 = 0;
/// Some entries were skipped or failed
pub const WARNING: i32 = 1;
/// Fatal error occurred
pub const FATAL_ERROR: i32 = 2;
/// Archive format or data error
pub const BAD_ARCHIVE: i32 = 3;
/// I/O error
pub const IO_ERROR: i32 = 5;
/// Invalid command line arguments
pub const BAD_ARGS: i32 = 255;

/// Exit code enum for structured handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    Warning,
    FatalError,
    BadArchive,
    IoError,
    BadArgs,
}

impl ExitCode {
    /// Returns the numeric exit code
    pub fn code(self) -> i32 {
        match self {
            Self::Success => SUCCESS,
            Self::Warning => WARNING,
            Self::FatalError => FATAL_ERROR,
            Self::BadArchive => BAD_ARCHIVE,
            Self::IoError => IO_ERROR,
            Self::BadArgs => BAD_ARGS,
        }
    }
}

/// Converts a zextract error to an exit code
pub fn error_to_exit_code(error: &Error) -> ExitCode {
    match error {
        Error::Open { .. } | Error::Io(_) | Error::MapUnavailable(_) => ExitCode::IoError,
        Error::CorruptArchive(_)
        | Error::NameDecode { .. }
        | Error::Decode { .. }
        | Error::CrcMismatch { .. } => ExitCode::BadArchive,
        Error::IndexOutOfRange { .. } => ExitCode::BadArgs,
        Error::OutOfMemory { .. } | Error::AlreadySpilled => ExitCode::FatalError,
        // Future error variants - required by #[non_exhaustive]
        _ => ExitCode::FatalError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zextract::{DecoderError, Status};

    #[test]
    fn test_error_mapping() {
        let corrupt = Error::CorruptArchive(DecoderError::new(Status::Archive, "bad"));
        assert_eq!(error_to_exit_code(&corrupt), ExitCode::BadArchive);

        let open = Error::Open {
            path: "missing.7z".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(error_to_exit_code(&open).code(), IO_ERROR);

        let oom = Error::OutOfMemory { requested: 1 };
        assert_eq!(error_to_exit_code(&oom), ExitCode::FatalError);
    }
}
