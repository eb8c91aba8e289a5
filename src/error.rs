use {
    std::{io, path::PathBuf},
    thiserror::Error as ThisError,
};

/// Failures raised by the loader core.
///
/// Path discovery and file reading fail synchronously to the caller of
/// [`Loader::load_file`](crate::Loader::load_file); everything that happens
/// on a worker is delivered through the load's completion handle instead, so
/// one bad asset never poisons another.
#[derive(Debug, ThisError)]
pub enum Error {
    /// A planned file could not be opened or read.
    #[error("unable to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,

        #[source]
        source: io::Error,
    },

    /// The OBJ or MTL text is malformed.
    #[error("parse error in {} at byte {offset}: {reason}", .path.display())]
    Parse {
        path: PathBuf,
        offset: usize,
        reason: String,
    },

    /// The primary OBJ path is missing or unreadable.
    #[error("no loadable model at {}", .path.display())]
    Plan { path: PathBuf },

    /// A task was submitted after the pool began shutting down.
    #[error("thread pool is shut down")]
    PoolClosed,

    /// A worker task panicked; the payload message is captured here.
    #[error("worker task panicked: {message}")]
    TaskPanicked { message: String },
}

impl Error {
    pub(crate) fn parse(
        path: impl Into<PathBuf>,
        offset: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self::Parse {
            path: path.into(),
            offset,
            reason: reason.into(),
        }
    }
}
