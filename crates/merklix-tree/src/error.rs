use merklix_store::StoreError;

/// Errors from tree operations.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// Failure in the underlying store.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A key of the wrong width for this tree.
    #[error("key length {actual} does not match configured {expected}")]
    KeyLength { expected: usize, actual: usize },

    /// A value whose length does not fit the on-disk size field.
    #[error("value of {0} bytes does not fit a 32-bit size")]
    ValueLength(usize),

    /// Invalid tree configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Result alias for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;
