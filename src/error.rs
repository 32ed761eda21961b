use std::path::PathBuf;

use crate::navigation::NavigationState;
use crate::preview::PreviewError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure the redirector can report.
///
/// `KeyNotFound` and `PreviewEncodingFailed` are the user-facing outcomes;
/// both are recovered where they happen and never take the process down.
/// The remaining variants describe misuse of the navigator or a bad link
/// table at startup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no link is registered under {key:?}")]
    KeyNotFound { key: String },

    #[error("could not render a preview for {key:?}: {source}")]
    PreviewEncodingFailed {
        key: String,
        #[source]
        source: PreviewError,
    },

    #[error("{event} is not accepted while the navigator is {state}")]
    InvalidEvent {
        event: &'static str,
        state: NavigationState,
    },

    #[error("the page load has already been handled")]
    AlreadyLoaded,

    #[error("no search result at position {index} ({len} results)")]
    NoSuchResult { index: usize, len: usize },

    #[error("no preview has been rendered yet")]
    NoPreview,

    #[error("failed to read link table {path}: {source}")]
    DataFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid link record on line {line} of {path}: {source}")]
    DataFormat {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to build the key index: {0}")]
    Index(#[from] fst::Error),
}
