use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single analyzer's identify or resolve phase.
///
/// Always confined to the pipeline run that produced it.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("{0}")]
    Failed(String),

    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid finding: {0}")]
    InvalidFinding(String),

    #[error("Invalid resolve result: {0}")]
    InvalidResolve(String),

    #[error("Analyzer panicked: {0}")]
    Panicked(String),
}

impl AnalyzerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AnalyzerError::Io {
            path: path.into(),
            source,
        }
    }
}
