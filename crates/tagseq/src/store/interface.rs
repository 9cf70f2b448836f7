use std::sync::Arc;

use crate::{Asset, SequenceConfig, SequenceKey, StoreError, TenantId};

/// Persistence for [`SequenceConfig`] records keyed by [`SequenceKey`].
///
/// Implementations must enforce at most one config per key at the storage
/// level, not just by checking before inserting.
pub trait SequenceStore: Send + Sync {
    /// Returns the config for `key`, or [`StoreError::NotFound`].
    fn get(&self, key: &SequenceKey) -> Result<SequenceConfig, StoreError>;

    /// Inserts a new config, failing with [`StoreError::AlreadyExists`] if the
    /// key is taken.
    fn create(&self, config: SequenceConfig) -> Result<(), StoreError>;

    /// Overwrites the stored counter for `key`.
    fn set_current_number(&self, key: &SequenceKey, value: u64) -> Result<(), StoreError>;

    /// Atomically increments the stored counter and returns the value it held
    /// before the increment.
    ///
    /// Backends that cannot do this in a single step return
    /// [`StoreError::AtomicUnsupported`].
    fn fetch_increment(&self, key: &SequenceKey) -> Result<u64, StoreError>;

    /// All configs of a tenant, ordered by category.
    fn list(&self, tenant_id: TenantId) -> Result<Vec<SequenceConfig>, StoreError>;
}

/// The entity store whose identifier column the allocator checks for
/// collisions.
pub trait AssetRegistry: Send + Sync {
    /// Whether `tag` is already used by an asset of `tenant_id`.
    fn tag_in_use(&self, tenant_id: TenantId, tag: &str) -> Result<bool, StoreError>;

    /// Persists `asset`, failing with [`StoreError::DuplicateTag`] when its tag
    /// is already used within the tenant.
    fn insert(&self, asset: Asset) -> Result<(), StoreError>;
}

impl<T: SequenceStore + ?Sized> SequenceStore for Arc<T> {
    fn get(&self, key: &SequenceKey) -> Result<SequenceConfig, StoreError> {
        (**self).get(key)
    }

    fn create(&self, config: SequenceConfig) -> Result<(), StoreError> {
        (**self).create(config)
    }

    fn set_current_number(&self, key: &SequenceKey, value: u64) -> Result<(), StoreError> {
        (**self).set_current_number(key, value)
    }

    fn fetch_increment(&self, key: &SequenceKey) -> Result<u64, StoreError> {
        (**self).fetch_increment(key)
    }

    fn list(&self, tenant_id: TenantId) -> Result<Vec<SequenceConfig>, StoreError> {
        (**self).list(tenant_id)
    }
}

impl<T: AssetRegistry + ?Sized> AssetRegistry for Arc<T> {
    fn tag_in_use(&self, tenant_id: TenantId, tag: &str) -> Result<bool, StoreError> {
        (**self).tag_in_use(tenant_id, tag)
    }

    fn insert(&self, asset: Asset) -> Result<(), StoreError> {
        (**self).insert(asset)
    }
}

impl<T: SequenceStore + ?Sized> SequenceStore for &T {
    fn get(&self, key: &SequenceKey) -> Result<SequenceConfig, StoreError> {
        (**self).get(key)
    }

    fn create(&self, config: SequenceConfig) -> Result<(), StoreError> {
        (**self).create(config)
    }

    fn set_current_number(&self, key: &SequenceKey, value: u64) -> Result<(), StoreError> {
        (**self).set_current_number(key, value)
    }

    fn fetch_increment(&self, key: &SequenceKey) -> Result<u64, StoreError> {
        (**self).fetch_increment(key)
    }

    fn list(&self, tenant_id: TenantId) -> Result<Vec<SequenceConfig>, StoreError> {
        (**self).list(tenant_id)
    }
}

impl<T: AssetRegistry + ?Sized> AssetRegistry for &T {
    fn tag_in_use(&self, tenant_id: TenantId, tag: &str) -> Result<bool, StoreError> {
        (**self).tag_in_use(tenant_id, tag)
    }

    fn insert(&self, asset: Asset) -> Result<(), StoreError> {
        (**self).insert(asset)
    }
}
