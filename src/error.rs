use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    #[error("input file {} was not found", .0.display())]
    SourceNotFound(PathBuf),

    #[error("could not read {}: {reason}", .path.display())]
    SourceUnreadable { path: PathBuf, reason: String },

    #[error("patient '{0}' not found")]
    PatientNotFound(String),

    #[error("could not write {}: {reason}", .path.display())]
    WriteFailure { path: PathBuf, reason: String },

    #[error("row {row} has unrecognized status '{status}'")]
    InvalidRecord { row: usize, status: String },

    #[error("invalid configuration in {}: {reason}", .path.display())]
    Config { path: PathBuf, reason: String },
}

impl AttendanceError {
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::SourceUnreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn write_failure(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::WriteFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AttendanceError>;
