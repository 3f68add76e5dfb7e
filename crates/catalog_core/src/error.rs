use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("catalog driver requires a search backend")]
    MissingSearchBackend,
    #[error("page must be a positive integer, got {0}")]
    InvalidPage(u32),
    #[error("catalog search failed: {source}")]
    Search {
        #[source]
        source: anyhow::Error,
    },
}

impl DriverError {
    pub(crate) fn search(source: anyhow::Error) -> Self {
        Self::Search { source }
    }

    /// The backend's own error, when this is a search failure.
    pub fn search_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Search { source } => Some(source),
            _ => None,
        }
    }
}
