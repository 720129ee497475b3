use merklix_types::Digest;

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// On-disk state that cannot be interpreted: bad magic, bad checksum,
    /// impossible pointer, non-monotonic file indices.
    #[error("corrupt store: {reason}")]
    Corrupt { reason: String },

    /// A requested historical root cannot be found in the meta chain.
    #[error("missing node for root {root}")]
    MissingNode { root: Digest },

    /// A referenced store file does not exist.
    #[error("missing store file {0}")]
    MissingFile(u16),

    /// The store ran out of file indices.
    #[error("too many store files")]
    TooManyFiles,

    /// A single record or blob larger than one store file can hold.
    #[error("record of {size} bytes exceeds the file size cap")]
    RecordTooLarge { size: usize },

    /// Operation performed in the wrong lifecycle or mode.
    #[error("invalid state: {0}")]
    State(&'static str),
}

impl StoreError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::Corrupt {
            reason: reason.into(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
