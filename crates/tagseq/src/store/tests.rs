use std::collections::HashSet;
use std::sync::Arc;
use std::thread::scope;

use crate::{
    Asset, CategoryId, SequenceConfig, SequenceKey, StoreError, TenantId,
    store::{AssetRegistry, MemoryStore, SequenceStore},
};

fn key(tenant: i64, category: &str) -> SequenceKey {
    SequenceKey::new(TenantId(tenant), CategoryId::new(category).unwrap())
}

fn config(tenant: i64, category: &str, current_number: u64) -> SequenceConfig {
    SequenceConfig {
        tenant_id: TenantId(tenant),
        category_id: CategoryId::new(category).unwrap(),
        prefix: "RT-LTP-".to_string(),
        current_number,
        zero_padding: 2,
    }
}

fn asset(tenant: i64, tag: &str) -> Asset {
    Asset {
        tenant_id: TenantId(tenant),
        category_id: CategoryId::new("laptops").unwrap(),
        asset_tag: tag.to_string(),
        name: "ThinkPad".to_string(),
    }
}

fn run_get_returns_created_config<S: SequenceStore>(store: S) {
    store.create(config(1, "laptops", 1)).unwrap();
    assert_eq!(store.get(&key(1, "laptops")).unwrap(), config(1, "laptops", 1));
}

fn run_get_missing_is_not_found<S: SequenceStore>(store: S) {
    store.create(config(1, "laptops", 1)).unwrap();
    assert!(matches!(
        store.get(&key(2, "laptops")),
        Err(StoreError::NotFound(k)) if k == key(2, "laptops")
    ));
    assert!(matches!(
        store.get(&key(1, "desktops")),
        Err(StoreError::NotFound(_))
    ));
}

fn run_create_rejects_duplicate_key<S: SequenceStore>(store: S) {
    store.create(config(1, "laptops", 1)).unwrap();
    let mut other = config(1, "laptops", 50);
    other.prefix = "X-".to_string();
    assert!(matches!(
        store.create(other),
        Err(StoreError::AlreadyExists(_))
    ));
    // The original row is untouched.
    assert_eq!(store.get(&key(1, "laptops")).unwrap().current_number, 1);
    // The same category in another tenant is a different key.
    store.create(config(2, "laptops", 9)).unwrap();
}

fn run_create_rejects_zero_padding<S: SequenceStore>(store: S) {
    let mut bad = config(1, "laptops", 1);
    bad.zero_padding = 0;
    assert!(matches!(
        store.create(bad),
        Err(StoreError::InvalidConfig { key: k, .. }) if k == key(1, "laptops")
    ));
    assert!(store.list(TenantId(1)).unwrap().is_empty());
    // The key is still free.
    store.create(config(1, "laptops", 1)).unwrap();
}

fn run_set_current_number<S: SequenceStore>(store: S) {
    store.create(config(1, "laptops", 1)).unwrap();
    store.set_current_number(&key(1, "laptops"), 40).unwrap();
    assert_eq!(store.get(&key(1, "laptops")).unwrap().current_number, 40);
    assert!(matches!(
        store.set_current_number(&key(1, "missing"), 1),
        Err(StoreError::NotFound(_))
    ));
}

fn run_fetch_increment_returns_previous<S: SequenceStore>(store: S) {
    store.create(config(1, "laptops", 5)).unwrap();
    assert_eq!(store.fetch_increment(&key(1, "laptops")).unwrap(), 5);
    assert_eq!(store.fetch_increment(&key(1, "laptops")).unwrap(), 6);
    assert_eq!(store.get(&key(1, "laptops")).unwrap().current_number, 7);
    assert!(matches!(
        store.fetch_increment(&key(1, "missing")),
        Err(StoreError::NotFound(_))
    ));
}

fn run_fetch_increment_is_atomic_across_threads<S: SequenceStore>(store: S) {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 64;

    store.create(config(1, "laptops", 0)).unwrap();
    let store = Arc::new(store);
    let seen = Arc::new(std::sync::Mutex::new(HashSet::new()));

    scope(|s| {
        for _ in 0..THREADS {
            let store = Arc::clone(&store);
            let seen = Arc::clone(&seen);
            s.spawn(move || {
                for _ in 0..PER_THREAD {
                    let previous = store.fetch_increment(&key(1, "laptops")).unwrap();
                    assert!(seen.lock().unwrap().insert(previous));
                }
            });
        }
    });

    let total = (THREADS * PER_THREAD) as u64;
    assert_eq!(seen.lock().unwrap().len() as u64, total);
    assert_eq!(store.get(&key(1, "laptops")).unwrap().current_number, total);
}

fn run_list_is_tenant_scoped_and_ordered<S: SequenceStore>(store: S) {
    store.create(config(1, "printers", 1)).unwrap();
    store.create(config(1, "desktops", 1)).unwrap();
    store.create(config(2, "laptops", 1)).unwrap();

    let categories: Vec<_> = store
        .list(TenantId(1))
        .unwrap()
        .into_iter()
        .map(|c| c.category_id.to_string())
        .collect();
    assert_eq!(categories, ["desktops", "printers"]);
    assert!(store.list(TenantId(3)).unwrap().is_empty());
}

fn run_registry_enforces_unique_tags<R: AssetRegistry>(registry: R) {
    assert!(!registry.tag_in_use(TenantId(1), "RT-LTP-01").unwrap());
    registry.insert(asset(1, "RT-LTP-01")).unwrap();
    assert!(registry.tag_in_use(TenantId(1), "RT-LTP-01").unwrap());
    assert!(!registry.tag_in_use(TenantId(2), "RT-LTP-01").unwrap());

    assert!(matches!(
        registry.insert(asset(1, "RT-LTP-01")),
        Err(StoreError::DuplicateTag { tag }) if tag == "RT-LTP-01"
    ));
    registry.insert(asset(2, "RT-LTP-01")).unwrap();
}

#[test]
fn memory_get_returns_created_config() {
    run_get_returns_created_config(MemoryStore::new());
}

#[test]
fn memory_get_missing_is_not_found() {
    run_get_missing_is_not_found(MemoryStore::new());
}

#[test]
fn memory_create_rejects_duplicate_key() {
    run_create_rejects_duplicate_key(MemoryStore::new());
}

#[test]
fn memory_create_rejects_zero_padding() {
    run_create_rejects_zero_padding(MemoryStore::new());
}

#[test]
fn memory_set_current_number() {
    run_set_current_number(MemoryStore::new());
}

#[test]
fn memory_fetch_increment_returns_previous() {
    run_fetch_increment_returns_previous(MemoryStore::new());
}

#[test]
fn memory_fetch_increment_is_atomic_across_threads() {
    run_fetch_increment_is_atomic_across_threads(MemoryStore::new());
}

#[test]
fn memory_list_is_tenant_scoped_and_ordered() {
    run_list_is_tenant_scoped_and_ordered(MemoryStore::new());
}

#[test]
fn memory_registry_enforces_unique_tags() {
    run_registry_enforces_unique_tags(MemoryStore::new());
}

#[test]
fn memory_non_atomic_rejects_fetch_increment() {
    let store = MemoryStore::non_atomic();
    store.create(config(1, "laptops", 5)).unwrap();
    assert!(matches!(
        store.fetch_increment(&key(1, "laptops")),
        Err(StoreError::AtomicUnsupported)
    ));
    assert_eq!(store.get(&key(1, "laptops")).unwrap().current_number, 5);
}

#[test]
fn memory_fetch_increment_reports_overflow() {
    let store = MemoryStore::new();
    store.create(config(1, "laptops", u64::MAX)).unwrap();
    assert!(matches!(
        store.fetch_increment(&key(1, "laptops")),
        Err(StoreError::Overflow(_))
    ));
}

#[test]
fn shared_store_works_through_arc() {
    let store: Arc<dyn SequenceStore> = Arc::new(MemoryStore::new());
    run_get_returns_created_config(Arc::clone(&store));
}

#[test]
fn registry_works_through_reference() {
    let store = MemoryStore::new();
    run_registry_enforces_unique_tags(&store);
    assert!(store.tag_in_use(TenantId(2), "RT-LTP-01").unwrap());
}

#[cfg(feature = "sqlite")]
mod sqlite {
    use super::*;
    use crate::store::SqliteStore;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[test]
    fn sqlite_get_returns_created_config() {
        run_get_returns_created_config(store());
    }

    #[test]
    fn sqlite_get_missing_is_not_found() {
        run_get_missing_is_not_found(store());
    }

    #[test]
    fn sqlite_create_rejects_duplicate_key() {
        run_create_rejects_duplicate_key(store());
    }

    #[test]
    fn sqlite_create_rejects_zero_padding() {
        run_create_rejects_zero_padding(store());
    }

    #[test]
    fn sqlite_set_current_number() {
        run_set_current_number(store());
    }

    #[test]
    fn sqlite_fetch_increment_returns_previous() {
        run_fetch_increment_returns_previous(store());
    }

    #[test]
    fn sqlite_fetch_increment_is_atomic_across_threads() {
        run_fetch_increment_is_atomic_across_threads(store());
    }

    #[test]
    fn sqlite_list_is_tenant_scoped_and_ordered() {
        run_list_is_tenant_scoped_and_ordered(store());
    }

    #[test]
    fn sqlite_registry_enforces_unique_tags() {
        run_registry_enforces_unique_tags(store());
    }

    #[test]
    fn sqlite_rejects_numbers_beyond_i64() {
        let store = store();
        assert!(matches!(
            store.create(config(1, "laptops", u64::MAX)),
            Err(StoreError::Overflow(_))
        ));
    }

    #[test]
    fn sqlite_fetch_increment_reports_overflow() {
        let store = store();
        store
            .create(config(1, "laptops", i64::MAX as u64))
            .unwrap();
        assert!(matches!(
            store.fetch_increment(&key(1, "laptops")),
            Err(StoreError::Overflow(_))
        ));
    }

    #[test]
    fn sqlite_persists_across_reopen() {
        let path = std::env::temp_dir().join(format!(
            "tagseq-store-{}-{:?}.db",
            std::process::id(),
            std::thread::current().id()
        ));
        let _ = std::fs::remove_file(&path);

        {
            let store = SqliteStore::open(&path).unwrap();
            store.create(config(1, "laptops", 1)).unwrap();
            store.fetch_increment(&key(1, "laptops")).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get(&key(1, "laptops")).unwrap().current_number, 2);
        drop(store);
        let _ = std::fs::remove_file(&path);
    }
}
