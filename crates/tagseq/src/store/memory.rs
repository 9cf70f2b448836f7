use std::collections::HashMap;
use std::sync::Arc;

use portable_atomic::{AtomicU64, Ordering};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Asset, SequenceConfig, SequenceKey, StoreError, TenantId,
    mutex::RwLock,
    store::{AssetRegistry, SequenceStore},
};

// Acquire a std or parking_lot guard; std poisoning maps to `LockPoisoned`.
macro_rules! guard {
    ($lock:expr, $method:ident) => {{
        #[cfg(feature = "parking-lot")]
        {
            $lock.$method()
        }
        #[cfg(not(feature = "parking-lot"))]
        {
            $lock.$method()?
        }
    }};
}

struct Counter {
    prefix: String,
    zero_padding: u32,
    current_number: AtomicU64,
}

impl Counter {
    fn snapshot(&self, key: &SequenceKey) -> SequenceConfig {
        SequenceConfig {
            tenant_id: key.tenant_id,
            category_id: key.category_id.clone(),
            prefix: self.prefix.clone(),
            current_number: self.current_number.load(Ordering::Acquire),
            zero_padding: self.zero_padding,
        }
    }
}

/// An in-process sequence store and asset registry.
///
/// The key map sits behind a read-write lock, while each counter is an
/// [`AtomicU64`] so that [`SequenceStore::fetch_increment`] never takes the
/// write lock.
///
/// ## Features
/// - ✅ Thread-safe
/// - ✅ Atomic increments (unless built with [`MemoryStore::non_atomic`])
/// - ❌ Durable
///
/// ## Recommended When
/// - Tests, demos, or a single-node deployment that can lose its counters
///
/// ## See Also
/// - [`SqliteStore`](crate::store::SqliteStore) (feature `sqlite`)
pub struct MemoryStore {
    sequences: RwLock<HashMap<SequenceKey, Arc<Counter>>>,
    assets: RwLock<HashMap<TenantId, HashMap<String, Asset>>>,
    atomic: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store that supports atomic increments.
    pub fn new() -> Self {
        Self {
            sequences: RwLock::new(HashMap::new()),
            assets: RwLock::new(HashMap::new()),
            atomic: true,
        }
    }

    /// Creates an empty store whose [`SequenceStore::fetch_increment`] always
    /// returns [`StoreError::AtomicUnsupported`], forcing committers onto the
    /// read-modify-write path.
    pub fn non_atomic() -> Self {
        Self {
            atomic: false,
            ..Self::new()
        }
    }

    fn counter(&self, key: &SequenceKey) -> Result<Arc<Counter>, StoreError> {
        let sequences = guard!(self.sequences, read);
        sequences
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }
}

impl SequenceStore for MemoryStore {
    fn get(&self, key: &SequenceKey) -> Result<SequenceConfig, StoreError> {
        Ok(self.counter(key)?.snapshot(key))
    }

    fn create(&self, config: SequenceConfig) -> Result<(), StoreError> {
        super::validate(&config)?;
        let key = config.key();
        let mut sequences = guard!(self.sequences, write);
        if sequences.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key));
        }
        sequences.insert(
            key,
            Arc::new(Counter {
                prefix: config.prefix,
                zero_padding: config.zero_padding,
                current_number: AtomicU64::new(config.current_number),
            }),
        );
        Ok(())
    }

    fn set_current_number(&self, key: &SequenceKey, value: u64) -> Result<(), StoreError> {
        self.counter(key)?
            .current_number
            .store(value, Ordering::Release);
        Ok(())
    }

    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    fn fetch_increment(&self, key: &SequenceKey) -> Result<u64, StoreError> {
        if !self.atomic {
            return Err(StoreError::AtomicUnsupported);
        }

        let counter = self.counter(key)?;
        let mut current = counter.current_number.load(Ordering::Acquire);
        loop {
            let next = current
                .checked_add(1)
                .ok_or_else(|| StoreError::Overflow(key.clone()))?;
            match counter.current_number.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(previous) => return Ok(previous),
                // Another committer won the race; retry from its value.
                Err(actual) => current = actual,
            }
        }
    }

    fn list(&self, tenant_id: TenantId) -> Result<Vec<SequenceConfig>, StoreError> {
        let sequences = guard!(self.sequences, read);
        let mut configs: Vec<_> = sequences
            .iter()
            .filter(|(key, _)| key.tenant_id == tenant_id)
            .map(|(key, counter)| counter.snapshot(key))
            .collect();
        configs.sort_by(|a, b| a.category_id.cmp(&b.category_id));
        Ok(configs)
    }
}

impl AssetRegistry for MemoryStore {
    fn tag_in_use(&self, tenant_id: TenantId, tag: &str) -> Result<bool, StoreError> {
        let assets = guard!(self.assets, read);
        Ok(assets
            .get(&tenant_id)
            .is_some_and(|tags| tags.contains_key(tag)))
    }

    fn insert(&self, asset: Asset) -> Result<(), StoreError> {
        let mut assets = guard!(self.assets, write);
        let tags = assets.entry(asset.tenant_id).or_default();
        if tags.contains_key(&asset.asset_tag) {
            return Err(StoreError::DuplicateTag {
                tag: asset.asset_tag,
            });
        }
        tags.insert(asset.asset_tag.clone(), asset);
        Ok(())
    }
}
