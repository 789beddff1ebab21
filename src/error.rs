//! Domain errors surfaced by tasks, the coordinator and device checks

use thiserror::Error;

use crate::tasks::TaskKind;

/// Why a device was rejected before any external command ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedReason {
    NotExt4,
    IsSsd,
}

impl std::fmt::Display for UnsupportedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotExt4 => write!(f, "only EXT4 filesystems are supported"),
            Self::IsSsd => write!(
                f,
                "device is an SSD; defragmentation is discouraged and only wears the flash"
            ),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FragError {
    #[error("required tool `{0}` was not found; install e2fsprogs and polkit")]
    ExternalToolMissing(String),

    #[error("external tool failed: {0}")]
    ExternalToolFailed(String),

    #[error("unsupported device: {0}")]
    UnsupportedDevice(UnsupportedReason),

    #[error("{0} already in progress")]
    OperationAlreadyInProgress(TaskKind),

    #[error("could not read a fragmentation score from the analyzer output")]
    MalformedOutput,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssd_and_filesystem_rejections_read_differently() {
        let ssd = FragError::UnsupportedDevice(UnsupportedReason::IsSsd).to_string();
        let fs = FragError::UnsupportedDevice(UnsupportedReason::NotExt4).to_string();

        assert!(ssd.contains("discouraged"));
        assert!(fs.contains("EXT4"));
        assert_ne!(ssd, fs);
    }

    #[test]
    fn in_progress_names_the_operation() {
        let err = FragError::OperationAlreadyInProgress(TaskKind::Analyze);
        assert_eq!(err.to_string(), "analysis already in progress");
    }
}
