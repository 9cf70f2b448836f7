use crate::SequenceKey;

/// Result alias used throughout `tagseq`.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors raised by a sequence or asset store backend.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// No tag format exists for the key.
    #[error("no tag format configured for {0}")]
    NotFound(SequenceKey),

    /// A tag format already exists for the key.
    #[error("a tag format is already configured for {0}")]
    AlreadyExists(SequenceKey),

    /// The asset tag is already used by another asset of the tenant.
    #[error("asset tag `{tag}` is already in use")]
    DuplicateTag { tag: String },

    /// The backend cannot increment a counter atomically.
    #[error("store does not support atomic increments")]
    AtomicUnsupported,

    /// Incrementing the counter would exceed the representable range.
    #[error("counter for {0} is exhausted")]
    Overflow(SequenceKey),

    /// The tag format violates a store invariant.
    #[error("invalid tag format for {key}: {reason}")]
    InvalidConfig { key: SequenceKey, reason: String },

    /// A thread panicked while holding the store's lock. Only produced when
    /// the `parking-lot` feature is disabled.
    #[error("store lock poisoned")]
    LockPoisoned,

    #[cfg(feature = "sqlite")]
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[cfg(not(feature = "parking-lot"))]
impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::LockPoisoned
    }
}

/// All error variants that allocating and reserving tags can produce.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The category has no tag format. Configure one before generating tags.
    #[error("asset tag format is not configured for {0}")]
    NotConfigured(SequenceKey),

    /// Attempted to configure a category twice.
    #[error("asset tag format is already configured for {0}")]
    AlreadyConfigured(SequenceKey),

    /// The asset tag is already used within the tenant.
    #[error("asset tag `{tag}` is already in use")]
    DuplicateTag { tag: String },

    /// Every candidate the collision policy allowed was already in use.
    #[error("no free asset tag for {key} after {attempts} attempts (last tried `{last}`)")]
    CollisionsExhausted {
        key: SequenceKey,
        attempts: u32,
        last: String,
    },

    /// The counter reached `u64::MAX`.
    #[error("tag sequence for {0} is exhausted")]
    CounterOverflow(SequenceKey),

    /// The commit strategy demands atomic increments the store cannot do.
    #[error("store does not support atomic increments")]
    AtomicUnsupported,

    /// Caller supplied an invalid value.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// A workflow event arrived in a state that does not accept it.
    #[error("cannot {event} while {from}")]
    InvalidTransition {
        from: &'static str,
        event: &'static str,
    },

    /// Any other backend failure.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => Self::NotConfigured(key),
            StoreError::AlreadyExists(key) => Self::AlreadyConfigured(key),
            StoreError::DuplicateTag { tag } => Self::DuplicateTag { tag },
            StoreError::AtomicUnsupported => Self::AtomicUnsupported,
            StoreError::Overflow(key) => Self::CounterOverflow(key),
            StoreError::InvalidConfig { reason, .. } => Self::InvalidInput { reason },
            other => Self::Store(other),
        }
    }
}
