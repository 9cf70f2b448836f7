//! The asset-creation workflow that consumes allocated tags.
//!
//! One allocation attempt moves through:
//!
//! ```text
//! Idle -> Generating -> { Generated, NotConfigured, GenerationFailed }
//! Generated -> EntitySubmitted -> { Committed, CommitFailed }
//! (any) -> Idle on reset
//! ```
//!
//! [`AllocationSession`] tracks that state for a single form, discarding
//! results of generation requests that a later category change superseded.
//! [`AssetCreation`] runs the whole workflow for one request: allocate (or
//! accept a manual tag), insert the asset, then reserve the tag. A failed
//! reservation never fails the creation.

use core::fmt;

use crate::{
    Advance, Allocation, Allocator, Asset, CategoryId, CollisionPolicy, CollisionWarning,
    CommitStrategy, Committer, Error, Result, SequenceKey, TenantId,
    store::{AssetRegistry, SequenceStore},
};

/// Identifies one generation request within an [`AllocationSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestTicket(u64);

/// Where a single allocation attempt currently stands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AllocationState {
    Idle,
    Generating {
        ticket: RequestTicket,
        category_id: CategoryId,
    },
    Generated {
        category_id: CategoryId,
        identifier: String,
        warning: Option<CollisionWarning>,
    },
    /// The category has no tag format; the user must configure one first.
    NotConfigured { category_id: CategoryId },
    GenerationFailed {
        category_id: CategoryId,
        reason: String,
    },
    EntitySubmitted {
        category_id: CategoryId,
        identifier: String,
        warning: Option<CollisionWarning>,
    },
    Committed {
        identifier: String,
        advance: Option<Advance>,
    },
    /// The asset exists but its tag was not reserved. Not fatal.
    CommitFailed { identifier: String, reason: String },
}

impl AllocationState {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Generating { .. } => "generating",
            Self::Generated { .. } => "generated",
            Self::NotConfigured { .. } => "not configured",
            Self::GenerationFailed { .. } => "generation failed",
            Self::EntitySubmitted { .. } => "entity submitted",
            Self::Committed { .. } => "committed",
            Self::CommitFailed { .. } => "commit failed",
        }
    }
}

impl fmt::Display for AllocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The result of reserving a consumed tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed(Advance),
    /// The category has no tag format, so there was no counter to advance.
    Skipped,
    Failed { reason: String },
}

/// Tracks one asset form's allocation attempt.
#[derive(Debug)]
pub struct AllocationSession {
    state: AllocationState,
    latest: u64,
}

impl Default for AllocationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AllocationSession {
    pub const fn new() -> Self {
        Self {
            state: AllocationState::Idle,
            latest: 0,
        }
    }

    pub const fn state(&self) -> &AllocationState {
        &self.state
    }

    /// The identifier currently shown in the form, if any.
    pub fn identifier(&self) -> Option<&str> {
        match &self.state {
            AllocationState::Generated { identifier, .. }
            | AllocationState::EntitySubmitted { identifier, .. }
            | AllocationState::Committed { identifier, .. }
            | AllocationState::CommitFailed { identifier, .. } => Some(identifier),
            _ => None,
        }
    }

    /// Whether the identifier field accepts manual edits.
    pub const fn is_editable(&self) -> bool {
        !matches!(
            self.state,
            AllocationState::Generating { .. } | AllocationState::EntitySubmitted { .. }
        )
    }

    fn invalid(&self, event: &'static str) -> Error {
        Error::InvalidTransition {
            from: self.state.name(),
            event,
        }
    }

    /// Starts generating a tag for `category_id`, superseding any request
    /// still in flight.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTransition`] once the entity has been submitted;
    /// call [`Self::reset`] first.
    pub fn begin_generation(&mut self, category_id: CategoryId) -> Result<RequestTicket> {
        match self.state {
            AllocationState::EntitySubmitted { .. }
            | AllocationState::Committed { .. }
            | AllocationState::CommitFailed { .. } => Err(self.invalid("start generating")),
            _ => {
                self.latest += 1;
                let ticket = RequestTicket(self.latest);
                self.state = AllocationState::Generating {
                    ticket,
                    category_id,
                };
                Ok(ticket)
            }
        }
    }

    /// Applies the result of the generation request identified by `ticket`.
    ///
    /// Returns `false`, leaving the state untouched, when the ticket has been
    /// superseded or generation is no longer pending.
    pub fn complete_generation(
        &mut self,
        ticket: RequestTicket,
        result: &Result<Allocation>,
    ) -> bool {
        let category_id = match &self.state {
            AllocationState::Generating {
                ticket: pending,
                category_id,
            } if *pending == ticket => category_id.clone(),
            _ => return false,
        };

        self.state = match result {
            Ok(allocation) => AllocationState::Generated {
                category_id,
                identifier: allocation.identifier.clone(),
                warning: allocation.warning.clone(),
            },
            Err(Error::NotConfigured(_)) => AllocationState::NotConfigured { category_id },
            Err(e) => AllocationState::GenerationFailed {
                category_id,
                reason: e.to_string(),
            },
        };
        true
    }

    /// Replaces the identifier with one typed by the user.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTransition`] while generation is pending or the
    /// entity has been submitted.
    pub fn enter_manual(&mut self, category_id: CategoryId, identifier: String) -> Result<()> {
        match self.state {
            AllocationState::Generating { .. }
            | AllocationState::EntitySubmitted { .. }
            | AllocationState::Committed { .. }
            | AllocationState::CommitFailed { .. } => Err(self.invalid("edit the identifier")),
            _ => {
                self.state = AllocationState::Generated {
                    category_id,
                    identifier,
                    warning: None,
                };
                Ok(())
            }
        }
    }

    /// Marks the entity as submitted and returns the identifier it carries.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTransition`] unless an identifier has been
    /// generated or entered.
    pub fn submit(&mut self) -> Result<String> {
        match core::mem::replace(&mut self.state, AllocationState::Idle) {
            AllocationState::Generated {
                category_id,
                identifier,
                warning,
            } => {
                self.state = AllocationState::EntitySubmitted {
                    category_id,
                    identifier: identifier.clone(),
                    warning,
                };
                Ok(identifier)
            }
            other => {
                self.state = other;
                Err(self.invalid("submit"))
            }
        }
    }

    /// Entity creation failed: go back to `Generated` so the user can retry or
    /// pick another category. The committer must not run.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTransition`] unless an entity is submitted.
    pub fn entity_failed(&mut self) -> Result<()> {
        match core::mem::replace(&mut self.state, AllocationState::Idle) {
            AllocationState::EntitySubmitted {
                category_id,
                identifier,
                warning,
            } => {
                self.state = AllocationState::Generated {
                    category_id,
                    identifier,
                    warning,
                };
                Ok(())
            }
            other => {
                self.state = other;
                Err(self.invalid("fail the submission"))
            }
        }
    }

    /// Records the outcome of reserving the submitted identifier.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTransition`] unless an entity is submitted.
    pub fn commit_finished(&mut self, outcome: &CommitOutcome) -> Result<()> {
        let identifier = match &self.state {
            AllocationState::EntitySubmitted { identifier, .. } => identifier.clone(),
            _ => return Err(self.invalid("finish the commit")),
        };

        self.state = match outcome {
            CommitOutcome::Committed(advance) => AllocationState::Committed {
                identifier,
                advance: Some(*advance),
            },
            CommitOutcome::Skipped => AllocationState::Committed {
                identifier,
                advance: None,
            },
            CommitOutcome::Failed { reason } => AllocationState::CommitFailed {
                identifier,
                reason: reason.clone(),
            },
        };
        Ok(())
    }

    /// Form reset or cancel.
    pub fn reset(&mut self) {
        self.state = AllocationState::Idle;
    }
}

/// A request to create an asset. Without `asset_tag`, a tag is generated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAsset {
    pub category_id: CategoryId,
    pub name: String,
    pub asset_tag: Option<String>,
}

/// A created asset together with what happened to its tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedAsset {
    pub asset: Asset,
    pub warning: Option<CollisionWarning>,
    pub commit: CommitOutcome,
}

/// Creates assets and reserves the tags they consume.
#[derive(Clone, Debug)]
pub struct AssetCreation<S, R> {
    allocator: Allocator<S, R>,
    committer: Committer<S>,
    registry: R,
}

impl<S, R> AssetCreation<S, R>
where
    S: SequenceStore + Clone,
    R: AssetRegistry + Clone,
{
    pub fn new(store: S, registry: R, policy: CollisionPolicy, strategy: CommitStrategy) -> Self {
        Self {
            allocator: Allocator::with_policy(store.clone(), registry.clone(), policy),
            committer: Committer::with_strategy(store, strategy),
            registry,
        }
    }

    pub const fn allocator(&self) -> &Allocator<S, R> {
        &self.allocator
    }

    pub const fn committer(&self) -> &Committer<S> {
        &self.committer
    }

    /// Creates an asset for `tenant_id`.
    ///
    /// # Errors
    /// - [`Error::InvalidInput`] for a blank name or tag
    /// - [`Error::NotConfigured`] when a tag must be generated for an
    ///   unconfigured category
    /// - [`Error::DuplicateTag`] when the tag is already used; the counter is
    ///   left untouched
    /// - any allocator or registry error
    ///
    /// A failure to reserve the tag afterwards is reported through
    /// [`CreatedAsset::commit`], never as an error.
    pub fn create(&self, tenant_id: TenantId, request: NewAsset) -> Result<CreatedAsset> {
        if request.name.trim().is_empty() {
            return Err(Error::InvalidInput {
                reason: "name must not be empty".to_string(),
            });
        }

        let key = SequenceKey::new(tenant_id, request.category_id.clone());
        let mut session = AllocationSession::new();

        match request.asset_tag {
            Some(tag) => {
                let tag = tag.trim();
                if tag.is_empty() {
                    return Err(Error::InvalidInput {
                        reason: "asset_tag must not be empty".to_string(),
                    });
                }
                session.enter_manual(request.category_id.clone(), tag.to_string())?;
            }
            None => {
                let ticket = session.begin_generation(request.category_id.clone())?;
                let generated = self.allocator.generate(&key);
                session.complete_generation(ticket, &generated);
                generated?;
            }
        }

        let warning = match session.state() {
            AllocationState::Generated { warning, .. } => warning.clone(),
            _ => None,
        };
        let asset_tag = session.submit()?;
        let asset = Asset {
            tenant_id,
            category_id: request.category_id,
            asset_tag,
            name: request.name,
        };

        if let Err(e) = self.registry.insert(asset.clone()) {
            session.entity_failed()?;
            return Err(e.into());
        }

        let commit = match self.committer.advance(&key) {
            Ok(advance) => CommitOutcome::Committed(advance),
            Err(Error::NotConfigured(_)) => CommitOutcome::Skipped,
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::error!(error = %e, tag = %asset.asset_tag, "failed to reserve asset tag");
                CommitOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };
        session.commit_finished(&commit)?;

        Ok(CreatedAsset {
            asset,
            warning,
            commit,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{CommitPath, MemoryStore, SequenceConfig, StoreError};

    fn category(raw: &str) -> CategoryId {
        CategoryId::new(raw).unwrap()
    }

    fn allocation(identifier: &str) -> Allocation {
        Allocation {
            identifier: identifier.to_string(),
            number: 1,
            warning: None,
        }
    }

    fn configured_store(current_number: u64) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .create(SequenceConfig {
                tenant_id: TenantId(1),
                category_id: category("laptops"),
                prefix: "RT-LTP-".to_string(),
                current_number,
                zero_padding: 2,
            })
            .unwrap();
        store
    }

    fn creation<S: SequenceStore + Clone>(
        store: S,
        registry: Arc<MemoryStore>,
    ) -> AssetCreation<S, Arc<MemoryStore>> {
        AssetCreation::new(
            store,
            registry,
            CollisionPolicy::default(),
            CommitStrategy::default(),
        )
    }

    fn laptop(tag: Option<&str>) -> NewAsset {
        NewAsset {
            category_id: category("laptops"),
            name: "ThinkPad X1".to_string(),
            asset_tag: tag.map(str::to_string),
        }
    }

    /// Delegates reads but refuses to advance counters.
    #[derive(Clone)]
    struct BrokenCounters(Arc<MemoryStore>);

    impl SequenceStore for BrokenCounters {
        fn get(&self, key: &SequenceKey) -> Result<SequenceConfig, StoreError> {
            self.0.get(key)
        }

        fn create(&self, config: SequenceConfig) -> Result<(), StoreError> {
            self.0.create(config)
        }

        fn set_current_number(&self, key: &SequenceKey, _: u64) -> Result<(), StoreError> {
            Err(StoreError::Overflow(key.clone()))
        }

        fn fetch_increment(&self, _: &SequenceKey) -> Result<u64, StoreError> {
            Err(StoreError::LockPoisoned)
        }

        fn list(&self, tenant_id: TenantId) -> Result<Vec<SequenceConfig>, StoreError> {
            self.0.list(tenant_id)
        }
    }

    #[test]
    fn full_cycle_walks_every_state() {
        let mut session = AllocationSession::new();
        assert_eq!(session.state(), &AllocationState::Idle);

        let ticket = session.begin_generation(category("laptops")).unwrap();
        assert!(!session.is_editable());
        assert!(session.complete_generation(ticket, &Ok(allocation("RT-LTP-01"))));
        assert_eq!(session.identifier(), Some("RT-LTP-01"));
        assert!(session.is_editable());

        assert_eq!(session.submit().unwrap(), "RT-LTP-01");
        assert!(!session.is_editable());

        let advance = Advance {
            previous: 1,
            current: 2,
            path: CommitPath::Atomic,
        };
        session
            .commit_finished(&CommitOutcome::Committed(advance))
            .unwrap();
        assert_eq!(
            session.state(),
            &AllocationState::Committed {
                identifier: "RT-LTP-01".to_string(),
                advance: Some(advance),
            }
        );

        session.reset();
        assert_eq!(session.state(), &AllocationState::Idle);
    }

    #[test]
    fn superseded_generation_is_discarded() {
        let mut session = AllocationSession::new();
        let stale = session.begin_generation(category("laptops")).unwrap();
        let latest = session.begin_generation(category("desktops")).unwrap();

        assert!(!session.complete_generation(stale, &Ok(allocation("RT-LTP-01"))));
        assert!(matches!(session.state(), AllocationState::Generating { .. }));

        assert!(session.complete_generation(latest, &Ok(allocation("RT-DSK-01"))));
        assert_eq!(session.identifier(), Some("RT-DSK-01"));

        // A late reply after completion changes nothing.
        assert!(!session.complete_generation(stale, &Ok(allocation("RT-LTP-01"))));
        assert_eq!(session.identifier(), Some("RT-DSK-01"));
    }

    #[test]
    fn generation_errors_map_to_states() {
        let mut session = AllocationSession::new();
        let ticket = session.begin_generation(category("laptops")).unwrap();
        let missing = SequenceKey::new(TenantId(1), category("laptops"));
        session.complete_generation(ticket, &Err(Error::NotConfigured(missing)));
        assert!(matches!(
            session.state(),
            AllocationState::NotConfigured { .. }
        ));

        let ticket = session.begin_generation(category("laptops")).unwrap();
        session.complete_generation(
            ticket,
            &Err(Error::Store(StoreError::LockPoisoned)),
        );
        assert!(matches!(
            session.state(),
            AllocationState::GenerationFailed { .. }
        ));
    }

    #[test]
    fn manual_edits_are_locked_while_generating() {
        let mut session = AllocationSession::new();
        session.begin_generation(category("laptops")).unwrap();
        assert!(matches!(
            session.enter_manual(category("laptops"), "MY-TAG".to_string()),
            Err(Error::InvalidTransition { from: "generating", .. })
        ));
    }

    #[test]
    fn entity_failure_allows_regeneration() {
        let mut session = AllocationSession::new();
        session
            .enter_manual(category("laptops"), "RT-LTP-01".to_string())
            .unwrap();
        session.submit().unwrap();
        assert!(session.begin_generation(category("laptops")).is_err());

        session.entity_failed().unwrap();
        assert_eq!(session.identifier(), Some("RT-LTP-01"));
        assert!(session.begin_generation(category("laptops")).is_ok());
    }

    #[test]
    fn submit_requires_an_identifier() {
        let mut session = AllocationSession::new();
        assert!(matches!(
            session.submit(),
            Err(Error::InvalidTransition { from: "idle", event: "submit" })
        ));
        assert_eq!(session.state(), &AllocationState::Idle);
    }

    #[test]
    fn create_generates_inserts_and_commits() {
        let store = configured_store(1);
        let created = creation(Arc::clone(&store), Arc::clone(&store))
            .create(TenantId(1), laptop(None))
            .unwrap();

        assert_eq!(created.asset.asset_tag, "RT-LTP-01");
        assert_eq!(created.warning, None);
        assert!(matches!(created.commit, CommitOutcome::Committed(a) if a.current == 2));
        assert!(store.tag_in_use(TenantId(1), "RT-LTP-01").unwrap());

        let next = creation(Arc::clone(&store), Arc::clone(&store))
            .create(TenantId(1), laptop(None))
            .unwrap();
        assert_eq!(next.asset.asset_tag, "RT-LTP-02");
    }

    #[test]
    fn create_reports_collision_warning() {
        let store = configured_store(1);
        let creation = creation(Arc::clone(&store), Arc::clone(&store));
        creation
            .create(TenantId(1), laptop(Some("RT-LTP-01")))
            .unwrap();
        // The manual tag advanced the counter to 2; put it back to collide.
        store
            .set_current_number(&SequenceKey::new(TenantId(1), category("laptops")), 1)
            .unwrap();

        let created = creation.create(TenantId(1), laptop(None)).unwrap();
        assert_eq!(created.asset.asset_tag, "RT-LTP-02");
        assert_eq!(created.warning.unwrap().collided_with, "RT-LTP-01");
    }

    #[test]
    fn duplicate_tag_does_not_commit() {
        let store = configured_store(1);
        let creation = creation(Arc::clone(&store), Arc::clone(&store));
        creation
            .create(TenantId(1), laptop(Some("CUSTOM-7")))
            .unwrap();
        let key = SequenceKey::new(TenantId(1), category("laptops"));
        let before = store.get(&key).unwrap().current_number;

        let err = creation
            .create(TenantId(1), laptop(Some("CUSTOM-7")))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateTag { tag } if tag == "CUSTOM-7"));
        assert_eq!(store.get(&key).unwrap().current_number, before);
    }

    #[test]
    fn commit_failure_keeps_the_asset() {
        let store = configured_store(1);
        let created = creation(BrokenCounters(Arc::clone(&store)), Arc::clone(&store))
            .create(TenantId(1), laptop(None))
            .unwrap();

        assert!(matches!(created.commit, CommitOutcome::Failed { .. }));
        assert!(store.tag_in_use(TenantId(1), "RT-LTP-01").unwrap());
        let key = SequenceKey::new(TenantId(1), category("laptops"));
        assert_eq!(store.get(&key).unwrap().current_number, 1);
    }

    #[test]
    fn unconfigured_category_needs_manual_tag() {
        let store = Arc::new(MemoryStore::new());
        let creation = creation(Arc::clone(&store), Arc::clone(&store));

        let err = creation.create(TenantId(1), laptop(None)).unwrap_err();
        assert!(matches!(err, Error::NotConfigured(_)));

        let created = creation
            .create(TenantId(1), laptop(Some("LEGACY-1")))
            .unwrap();
        assert_eq!(created.commit, CommitOutcome::Skipped);
    }

    #[test]
    fn blank_input_is_rejected() {
        let store = configured_store(1);
        let creation = creation(Arc::clone(&store), Arc::clone(&store));
        let mut request = laptop(None);
        request.name = "  ".to_string();
        assert!(matches!(
            creation.create(TenantId(1), request),
            Err(Error::InvalidInput { .. })
        ));
        assert!(matches!(
            creation.create(TenantId(1), laptop(Some(" "))),
            Err(Error::InvalidInput { .. })
        ));
    }
}
