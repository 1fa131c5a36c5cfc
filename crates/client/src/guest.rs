//! Local Guest Store: the cart and wishlist of a visitor without a token.
//!
//! State is JSON under fixed keys in an injected [`GuestStorage`]. Storage
//! is best effort: a failed or corrupt read is an empty cart, a failed write
//! is logged and dropped. Nothing here returns an error to the caller.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use cartwheel_core::{CartLines, LineItem, ProductId, Quantity, Wishlist, WishlistEntry};

use crate::error::StorageError;

pub const CART_KEY: &str = "cart";
pub const WISHLIST_KEY: &str = "wishlist";
pub const JOURNAL_KEY: &str = "reconcile_journal";

/// String key-value persistence scoped to one client installation.
pub trait GuestStorage: Send + Sync {
    /// The value under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// =============================================================================
// Backends
// =============================================================================

/// Process-local storage, gone when the value is dropped.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl GuestStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.remove(key);
        Ok(())
    }
}

/// All keys as one JSON object in a file.
///
/// Writes go to a sibling temp file that is then renamed over the original,
/// so a crash mid-write leaves the previous contents.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Load for a read-modify-write. A corrupt file is replaced rather than
    /// blocking every later write.
    fn load_for_update(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match self.load() {
            Err(StorageError::Json(e)) => {
                warn!(path = %self.path.display(), error = %e, "replacing corrupt guest storage file");
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(values)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl GuestStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(self.load()?.remove(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut values = self.load_for_update()?;
        values.insert(key.to_string(), value.to_string());
        self.save(&values)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut values = self.load_for_update()?;
        if values.remove(key).is_some() {
            self.save(&values)?;
        }
        Ok(())
    }
}

// =============================================================================
// Guest store
// =============================================================================

/// Guest cart and wishlist over a [`GuestStorage`].
///
/// Cart edits follow the same merge policy as the server: adding a present
/// product grows its line, a quantity below one removes the line.
#[derive(Clone)]
pub struct GuestStore {
    storage: Arc<dyn GuestStorage>,
}

impl GuestStore {
    #[must_use]
    pub fn new(storage: Arc<dyn GuestStorage>) -> Self {
        Self { storage }
    }

    /// The underlying storage, shared with the session for its own keys.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn GuestStorage> {
        &self.storage
    }

    #[must_use]
    pub fn cart(&self) -> Vec<LineItem> {
        self.cart_lines().into_vec()
    }

    /// Replace the cart. Duplicate products are merged.
    pub fn set_cart(&self, items: &[LineItem]) {
        self.save_cart(&CartLines::from_lines(items.iter().copied()));
    }

    #[must_use]
    pub fn wishlist(&self) -> Vec<WishlistEntry> {
        self.wishlist_entries().into_vec()
    }

    /// Replace the wishlist. Duplicate products are dropped.
    pub fn set_wishlist(&self, entries: &[WishlistEntry]) {
        self.save_wishlist(&Wishlist::from(entries.to_vec()));
    }

    /// Add `quantity` of a product, growing its line when present.
    pub fn add_to_cart(&self, product_id: ProductId, quantity: Quantity) -> Vec<LineItem> {
        let mut cart = self.cart_lines();
        cart.add(product_id, quantity);
        self.save_cart(&cart);
        cart.into_vec()
    }

    /// Set a line's quantity. Below one removes the line; an absent line is
    /// left absent.
    pub fn set_cart_quantity(&self, product_id: ProductId, requested: i64) -> Vec<LineItem> {
        let mut cart = self.cart_lines();
        if cart.set_quantity(product_id, requested).is_ok() {
            self.save_cart(&cart);
        }
        cart.into_vec()
    }

    pub fn remove_from_cart(&self, product_id: ProductId) -> Vec<LineItem> {
        let mut cart = self.cart_lines();
        if cart.remove(product_id) {
            self.save_cart(&cart);
        }
        cart.into_vec()
    }

    pub fn add_to_wishlist(&self, product_id: ProductId) -> Vec<WishlistEntry> {
        let mut wishlist = self.wishlist_entries();
        if wishlist.add(product_id) {
            self.save_wishlist(&wishlist);
        }
        wishlist.into_vec()
    }

    pub fn remove_from_wishlist(&self, product_id: ProductId) -> Vec<WishlistEntry> {
        let mut wishlist = self.wishlist_entries();
        if wishlist.remove(product_id) {
            self.save_wishlist(&wishlist);
        }
        wishlist.into_vec()
    }

    /// Whether there is anything to reconcile.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cart_lines().is_empty() && self.wishlist_entries().is_empty()
    }

    /// Forget the guest cart, wishlist and reconciliation journal.
    pub fn clear(&self) {
        for key in [CART_KEY, WISHLIST_KEY, JOURNAL_KEY] {
            self.discard(key);
        }
    }

    fn cart_lines(&self) -> CartLines {
        self.load(CART_KEY).unwrap_or_default()
    }

    fn save_cart(&self, cart: &CartLines) {
        self.save(CART_KEY, cart);
    }

    fn wishlist_entries(&self) -> Wishlist {
        self.load(WISHLIST_KEY).unwrap_or_default()
    }

    fn save_wishlist(&self, wishlist: &Wishlist) {
        self.save(WISHLIST_KEY, wishlist);
    }

    /// Decode the JSON under `key`. Missing, unreadable and corrupt values
    /// are all `None`.
    pub(crate) fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.storage.read(key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key, error = %e, "guest storage read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "ignoring corrupt guest storage value");
                None
            }
        }
    }

    pub(crate) fn save<T: Serialize>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "guest storage value not serializable");
                return;
            }
        };
        if let Err(e) = self.storage.write(key, &raw) {
            warn!(key, error = %e, "guest storage write failed");
        }
    }

    pub(crate) fn discard(&self, key: &str) {
        if let Err(e) = self.storage.remove(key) {
            warn!(key, error = %e, "guest storage remove failed");
        }
    }
}

impl std::fmt::Debug for GuestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn qty(n: u32) -> Quantity {
        Quantity::new(n).unwrap()
    }

    fn memory_store() -> GuestStore {
        GuestStore::new(Arc::new(MemoryStorage::new()))
    }

    /// Storage that fails every call.
    struct BrokenStorage;

    impl GuestStorage for BrokenStorage {
        fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Io(std::io::Error::other("disk gone")))
        }

        fn write(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Io(std::io::Error::other("disk gone")))
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Io(std::io::Error::other("disk gone")))
        }
    }

    #[test]
    fn test_adding_same_product_sums_quantity() {
        let guest = memory_store();
        let p1 = ProductId::new(1);

        guest.add_to_cart(p1, qty(1));
        let cart = guest.add_to_cart(p1, qty(2));

        assert_eq!(cart, vec![LineItem::new(p1, qty(3))]);
        assert_eq!(guest.cart(), cart);
    }

    #[test]
    fn test_quantity_below_one_removes_line() {
        let guest = memory_store();
        let p1 = ProductId::new(1);
        let p2 = ProductId::new(2);
        guest.add_to_cart(p1, qty(2));
        guest.add_to_cart(p2, qty(1));

        assert_eq!(guest.set_cart_quantity(p1, 0), vec![LineItem::new(p2, qty(1))]);
        assert!(guest.set_cart_quantity(p2, -4).is_empty());
        assert!(guest.cart().is_empty());
    }

    #[test]
    fn test_set_quantity_on_absent_line_adds_nothing() {
        let guest = memory_store();
        assert!(guest.set_cart_quantity(ProductId::new(9), 3).is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let guest = memory_store();
        let p1 = ProductId::new(1);
        guest.add_to_cart(p1, qty(1));

        assert!(guest.remove_from_cart(p1).is_empty());
        assert!(guest.remove_from_cart(p1).is_empty());
    }

    #[test]
    fn test_wishlist_add_is_idempotent() {
        let guest = memory_store();
        let p1 = ProductId::new(1);

        guest.add_to_wishlist(p1);
        let entries = guest.add_to_wishlist(p1);

        assert_eq!(entries, vec![WishlistEntry::new(p1)]);
        assert!(guest.remove_from_wishlist(p1).is_empty());
    }

    #[test]
    fn test_corrupt_value_reads_as_empty() -> TestResult {
        let storage = Arc::new(MemoryStorage::new());
        storage.write(CART_KEY, "{not json")?;
        let guest = GuestStore::new(storage);

        assert!(guest.cart().is_empty());

        // The next write replaces the corrupt value.
        guest.add_to_cart(ProductId::new(1), qty(1));
        assert_eq!(guest.cart().len(), 1);
        Ok(())
    }

    #[test]
    fn test_broken_storage_is_empty_and_silent() {
        let guest = GuestStore::new(Arc::new(BrokenStorage));

        let cart = guest.add_to_cart(ProductId::new(1), qty(2));
        assert_eq!(cart.len(), 1);
        assert!(guest.cart().is_empty());
        assert!(guest.is_empty());
        guest.clear();
    }

    #[test]
    fn test_clear_leaves_other_keys() -> TestResult {
        let storage = Arc::new(MemoryStorage::new());
        storage.write("token", "abc")?;
        let guest = GuestStore::new(storage.clone());
        guest.add_to_cart(ProductId::new(1), qty(1));
        guest.add_to_wishlist(ProductId::new(2));

        guest.clear();

        assert!(guest.is_empty());
        assert_eq!(storage.read("token")?.as_deref(), Some("abc"));
        Ok(())
    }

    #[test]
    fn test_set_cart_merges_duplicates() {
        let guest = memory_store();
        let p1 = ProductId::new(1);
        guest.set_cart(&[LineItem::new(p1, qty(1)), LineItem::new(p1, qty(4))]);
        assert_eq!(guest.cart(), vec![LineItem::new(p1, qty(5))]);
    }

    #[test]
    fn test_file_storage_survives_reopen() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("guest").join("state.json");

        let guest = GuestStore::new(Arc::new(FileStorage::new(&path)));
        guest.add_to_cart(ProductId::new(7), qty(2));
        guest.add_to_wishlist(ProductId::new(8));

        let reopened = GuestStore::new(Arc::new(FileStorage::new(&path)));
        assert_eq!(reopened.cart(), vec![LineItem::new(ProductId::new(7), qty(2))]);
        assert_eq!(reopened.wishlist(), vec![WishlistEntry::new(ProductId::new(8))]);
        Ok(())
    }

    #[test]
    fn test_file_storage_recovers_from_corrupt_file() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.json");
        fs::write(&path, "garbage")?;

        let storage = FileStorage::new(&path);
        assert!(storage.read(CART_KEY).is_err());

        storage.write(CART_KEY, "[]")?;
        assert_eq!(storage.read(CART_KEY)?.as_deref(), Some("[]"));
        Ok(())
    }

    #[test]
    fn test_file_storage_missing_file_is_empty() -> TestResult {
        let dir = tempfile::tempdir()?;
        let storage = FileStorage::new(dir.path().join("absent.json"));

        assert_eq!(storage.read(CART_KEY)?, None);
        storage.remove(CART_KEY)?;
        Ok(())
    }
}
