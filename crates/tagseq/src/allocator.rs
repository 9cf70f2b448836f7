//! Candidate tag generation.
//!
//! The [`Allocator`] reads a category's [`SequenceConfig`], formats the next
//! tag and checks the [`AssetRegistry`] for a collision. It never writes to
//! the sequence store: the counter only moves once an asset has actually been
//! created with the tag (see [`Committer`](crate::Committer)).
//!
//! [`SequenceConfig`]: crate::SequenceConfig

use core::fmt;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, Result, SequenceKey,
    store::{AssetRegistry, SequenceStore},
};

/// Default number of candidates [`CollisionPolicy::Bounded`] checks.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 16;

/// How the allocator reacts when the formatted candidate is already in use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Increment once and return the second candidate without checking it.
    ///
    /// The second candidate may itself be taken; the insert-time uniqueness
    /// constraint is then the only safeguard.
    SingleRetry,
    /// Keep incrementing until a free candidate is found, checking at most
    /// `max_attempts` candidates in total.
    Bounded { max_attempts: u32 },
}

impl Default for CollisionPolicy {
    fn default() -> Self {
        Self::Bounded {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Advisory attached to an [`Allocation`] when the configured counter pointed
/// at a tag that was already in use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollisionWarning {
    /// The first candidate found in use.
    pub collided_with: String,
    /// How many candidates were passed over.
    pub skipped: u32,
}

impl fmt::Display for CollisionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skipped == 1 {
            write!(
                f,
                "asset tag {} is already in use; the next number was used instead",
                self.collided_with
            )
        } else {
            write!(
                f,
                "asset tag {} is already in use; skipped {} numbers",
                self.collided_with, self.skipped
            )
        }
    }
}

/// A candidate tag handed to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Allocation {
    /// The formatted tag, e.g. `RT-LTP-01`.
    pub identifier: String,
    /// The sequence number embedded in `identifier`.
    pub number: u64,
    pub warning: Option<CollisionWarning>,
}

/// Generates candidate tags without mutating persisted state.
///
/// # Example
/// ```
/// use tagseq::{
///     Allocator, CategoryId, MemoryStore, SequenceConfig, SequenceKey, SequenceStore, TenantId,
/// };
/// use std::sync::Arc;
///
/// let store = Arc::new(MemoryStore::new());
/// store
///     .create(SequenceConfig {
///         tenant_id: TenantId(1),
///         category_id: CategoryId::new("laptops").unwrap(),
///         prefix: "RT-LTP-".to_string(),
///         current_number: 1,
///         zero_padding: 2,
///     })
///     .unwrap();
///
/// let allocator = Allocator::new(Arc::clone(&store), Arc::clone(&store));
/// let key = SequenceKey::new(TenantId(1), CategoryId::new("laptops").unwrap());
/// assert_eq!(allocator.generate(&key).unwrap().identifier, "RT-LTP-01");
/// ```
#[derive(Clone, Debug)]
pub struct Allocator<S, R> {
    store: S,
    registry: R,
    policy: CollisionPolicy,
}

impl<S, R> Allocator<S, R>
where
    S: SequenceStore,
    R: AssetRegistry,
{
    /// Creates an allocator with the default [`CollisionPolicy`].
    pub fn new(store: S, registry: R) -> Self {
        Self::with_policy(store, registry, CollisionPolicy::default())
    }

    pub const fn with_policy(store: S, registry: R, policy: CollisionPolicy) -> Self {
        Self {
            store,
            registry,
            policy,
        }
    }

    pub const fn policy(&self) -> CollisionPolicy {
        self.policy
    }

    /// Returns the next candidate tag for `key`.
    ///
    /// # Errors
    /// - [`Error::NotConfigured`] if the category has no tag format
    /// - [`Error::CollisionsExhausted`] if every candidate allowed by
    ///   [`CollisionPolicy::Bounded`] is taken
    /// - [`Error::CounterOverflow`] if skipping a collision would pass
    ///   `u64::MAX`
    /// - [`Error::Store`] on backend failure
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self), fields(policy = ?self.policy)))]
    pub fn generate(&self, key: &SequenceKey) -> Result<Allocation> {
        let config = self.store.get(key)?;
        let format = config.format();

        let mut number = config.current_number;
        let mut candidate = format.format(number);
        if !self.registry.tag_in_use(key.tenant_id, &candidate)? {
            return Ok(Allocation {
                identifier: candidate,
                number,
                warning: None,
            });
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(%candidate, "asset tag already in use");

        let collided_with = candidate.clone();
        let next = |n: u64| n.checked_add(1).ok_or_else(|| Error::CounterOverflow(key.clone()));

        match self.policy {
            CollisionPolicy::SingleRetry => {
                number = next(number)?;
                Ok(Allocation {
                    identifier: format.format(number),
                    number,
                    warning: Some(CollisionWarning {
                        collided_with,
                        skipped: 1,
                    }),
                })
            }
            CollisionPolicy::Bounded { max_attempts } => {
                for skipped in 1..max_attempts {
                    number = next(number)?;
                    candidate = format.format(number);
                    if !self.registry.tag_in_use(key.tenant_id, &candidate)? {
                        return Ok(Allocation {
                            identifier: candidate,
                            number,
                            warning: Some(CollisionWarning {
                                collided_with,
                                skipped,
                            }),
                        });
                    }
                }
                Err(Error::CollisionsExhausted {
                    key: key.clone(),
                    attempts: max_attempts,
                    last: candidate,
                })
            }
        }
    }
}
