//! Process exit statuses of the `arcfold` binary.
//!
//! | Status | Meaning |
//! |-------:|---------|
//! | 0 | success |
//! | 1 | finished, but some files failed |
//! | 2 | refused: the operation would overwrite or escape something |
//! | 3 | not a usable archive |
//! | 4 | a named member does not exist |
//! | 5 | filesystem failure |
//! | 130 | declined at the confirmation prompt |
//! | 255 | bad arguments or an empty selection |

use arcfold::Error;

/// Exit status of one command run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    Warning = 1,
    FatalError = 2,
    BadArchive = 3,
    NotFound = 4,
    IoError = 5,
    UserAbort = 130,
    BadArgs = 255,
}

impl ExitCode {
    /// Returns the numeric status.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<&Error> for ExitCode {
    /// Classifies a library error. Damaged input wins over the I/O kind it
    /// surfaced as.
    fn from(error: &Error) -> Self {
        if error.is_corruption() {
            Self::BadArchive
        } else if error.is_user_error() {
            Self::BadArgs
        } else if matches!(error, Error::MemberNotFound { .. }) {
            Self::NotFound
        } else if matches!(error, Error::Io(_)) {
            Self::IoError
        } else {
            Self::FatalError
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        Self::from(code.code())
    }
}
