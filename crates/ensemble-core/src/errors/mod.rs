use std::path::PathBuf;

pub type Result<T, E = EnsembleError> = std::result::Result<T, E>;

/// Coarse classification used by callers to decide between aborting the whole
/// run and reporting a single member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Type,
    DirectoryExists,
    UnsupportedMethod,
    UnsupportedBackend,
    SubmissionFailure,
    ProcessSpawnFailure,
    Io,
}

#[derive(Debug, thiserror::Error)]
pub enum EnsembleError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("{path}:{line}: {reason}")]
    Table {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("duplicate parameter name: {0}")]
    DuplicateParameter(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("cannot build product of continuous distributions: {name}")]
    NotDiscrete { name: String },

    #[error("parameter has no distribution to sample from: {name}")]
    NotSampleable { name: String },

    #[error("experiment directory already exists and is not empty: {}", path.display())]
    DirectoryExists { path: PathBuf },

    #[error("members {first} and {second} map to the same run directory: {name}")]
    RundirCollision {
        name: String,
        first: usize,
        second: usize,
    },

    #[error("member index {index} out of range (ensemble has {size} members)")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("cannot build an array job for an empty ensemble")]
    EmptyEnsemble,

    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("unsupported cluster queuing system: {0}")]
    UnsupportedBackend(String),

    #[error("{backend} does not support array jobs")]
    ArrayUnsupported { backend: String },

    #[error("submission failed: {reason}")]
    SubmissionFailure { reason: String, stderr: String },

    #[error("failed to spawn {program}: {source}")]
    ProcessSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl EnsembleError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn submission(reason: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::SubmissionFailure {
            reason: reason.into(),
            stderr: stderr.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(_)
            | Self::Table { .. }
            | Self::DuplicateParameter(_)
            | Self::Template(_)
            | Self::IndexOutOfRange { .. }
            | Self::EmptyEnsemble => ErrorKind::Parse,
            Self::NotDiscrete { .. } | Self::NotSampleable { .. } => ErrorKind::Type,
            Self::DirectoryExists { .. } | Self::RundirCollision { .. } => {
                ErrorKind::DirectoryExists
            }
            Self::UnsupportedMethod(_) => ErrorKind::UnsupportedMethod,
            Self::UnsupportedBackend(_) | Self::ArrayUnsupported { .. } => {
                ErrorKind::UnsupportedBackend
            }
            Self::SubmissionFailure { .. } => ErrorKind::SubmissionFailure,
            Self::ProcessSpawn { .. } => ErrorKind::ProcessSpawnFailure,
            Self::Io { .. } | Self::Serialization(_) => ErrorKind::Io,
        }
    }

    /// Actionable hint printed next to the error, if there is one.
    pub fn remedy(&self) -> Option<&'static str> {
        match self {
            Self::DirectoryExists { .. } => Some("Use -f/--force to bypass this check"),
            Self::RundirCollision { .. } => {
                Some("Use sequential run directories (drop -a/--auto-dir)")
            }
            Self::UnsupportedBackend(_) => Some("Known schedulers: slurm, loadleveler, pbs"),
            Self::UnsupportedMethod(_) => {
                Some("Known methods: lhs, montecarlo (criteria: classic, center, maximin, centermaximin, correlation)")
            }
            Self::SubmissionFailure { .. } => {
                Some("The job may have failed immediately; check the scheduler logs")
            }
            _ => None,
        }
    }
}

impl From<serde_json::Error> for EnsembleError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for EnsembleError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_exists_carries_force_remedy() {
        let err = EnsembleError::DirectoryExists {
            path: PathBuf::from("out"),
        };
        assert_eq!(err.kind(), ErrorKind::DirectoryExists);
        assert!(err.remedy().unwrap().contains("--force"));
        assert!(err.to_string().contains("out"));
    }

    #[test]
    fn spawn_failure_names_program() {
        let err = EnsembleError::ProcessSpawn {
            program: "model.x".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(err.kind(), ErrorKind::ProcessSpawnFailure);
        assert!(err.to_string().contains("model.x"));
    }
}
