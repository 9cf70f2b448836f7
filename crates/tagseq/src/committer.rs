//! Reservation of consumed tags.
//!
//! Once an asset has been durably created with an allocated tag, the
//! [`Committer`] advances the category's stored counter by exactly one.

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{Error, Result, SequenceKey, store::SequenceStore};

/// How the committer advances a counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CommitStrategy {
    /// Single increment-and-return at the store. Fails with
    /// [`Error::AtomicUnsupported`] if the store cannot do it.
    Atomic,
    /// Atomic increment, falling back to [`CommitStrategy::ReadModifyWrite`]
    /// when the store reports [`StoreError::AtomicUnsupported`].
    ///
    /// [`StoreError::AtomicUnsupported`]: crate::StoreError::AtomicUnsupported
    #[default]
    AtomicWithFallback,
    /// Read the counter, add one, write it back.
    ///
    /// Not atomic: two committers that read the same value both write the same
    /// successor and one increment is lost.
    ReadModifyWrite,
}

/// Which path actually advanced the counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitPath {
    Atomic,
    Fallback,
}

/// The counter transition performed by [`Committer::advance`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Advance {
    pub previous: u64,
    pub current: u64,
    pub path: CommitPath,
}

/// Advances stored counters after their tag has been consumed.
#[derive(Clone, Debug)]
pub struct Committer<S> {
    store: S,
    strategy: CommitStrategy,
}

impl<S: SequenceStore> Committer<S> {
    /// Creates a committer with [`CommitStrategy::AtomicWithFallback`].
    pub fn new(store: S) -> Self {
        Self::with_strategy(store, CommitStrategy::default())
    }

    pub const fn with_strategy(store: S, strategy: CommitStrategy) -> Self {
        Self { store, strategy }
    }

    pub const fn strategy(&self) -> CommitStrategy {
        self.strategy
    }

    /// Advances the counter for `key` by one.
    ///
    /// Call only after the asset carrying the tag has been created.
    ///
    /// # Errors
    /// - [`Error::NotConfigured`] if the category has no tag format
    /// - [`Error::AtomicUnsupported`] under [`CommitStrategy::Atomic`] when the
    ///   store cannot increment atomically
    /// - [`Error::CounterOverflow`] when the counter is at its maximum
    /// - [`Error::Store`] on backend failure
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self), fields(strategy = ?self.strategy)))]
    pub fn advance(&self, key: &SequenceKey) -> Result<Advance> {
        match self.strategy {
            CommitStrategy::Atomic => self.advance_atomic(key),
            CommitStrategy::ReadModifyWrite => self.advance_read_modify_write(key),
            CommitStrategy::AtomicWithFallback => match self.advance_atomic(key) {
                Err(Error::AtomicUnsupported) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("store lacks atomic increments, using read-modify-write");
                    self.advance_read_modify_write(key)
                }
                other => other,
            },
        }
    }

    fn advance_atomic(&self, key: &SequenceKey) -> Result<Advance> {
        let previous = self.store.fetch_increment(key)?;
        let current = previous
            .checked_add(1)
            .ok_or_else(|| Error::CounterOverflow(key.clone()))?;
        Ok(Advance {
            previous,
            current,
            path: CommitPath::Atomic,
        })
    }

    fn advance_read_modify_write(&self, key: &SequenceKey) -> Result<Advance> {
        let previous = self.store.get(key)?.current_number;
        let current = previous
            .checked_add(1)
            .ok_or_else(|| Error::CounterOverflow(key.clone()))?;
        self.store.set_current_number(key, current)?;
        Ok(Advance {
            previous,
            current,
            path: CommitPath::Fallback,
        })
    }
}
