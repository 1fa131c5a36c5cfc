//! In-process implementation of every store.
//!
//! All state sits behind one async mutex, so each call is atomic on its own
//! but nothing spans calls. That makes this a [`Atomicity::PerRecord`]
//! backend: checkout writes the order and clears the cart as two steps, and
//! [`MemoryStore::fail_cart_clears`] can make the second step fail.
//! [`MemoryStore::fail_product_reads`] does the same for product lookups.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use cartwheel_core::{
    CartLines, Email, LineItem, OrderDraft, OrderId, OrderStatus, ProductId, Quantity,
    SetQuantityOutcome, UserId, UserRole, Wishlist, WishlistEntry,
};

use super::{
    Atomicity, CartStore, OrderStore, ProductStore, RepositoryError, UserStore, WishlistStore,
};
use crate::models::{NewProduct, Order, PendingCartClear, Product, ProfileChanges, User};

#[derive(Debug, Default)]
struct State {
    next_user_id: i32,
    users: BTreeMap<UserId, User>,
    passwords: HashMap<UserId, String>,
    next_product_id: i32,
    products: BTreeMap<ProductId, Product>,
    carts: HashMap<UserId, CartLines>,
    wishlists: HashMap<UserId, Wishlist>,
    next_order_id: i32,
    orders: BTreeMap<OrderId, Order>,
    pending_clears: BTreeMap<OrderId, PendingCartClear>,
}

impl State {
    fn email_taken(&self, email: &Email, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| &u.email == email && Some(u.id) != except)
    }
}

/// Every store in one process-local value.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    failing_cart_clears: AtomicU32,
    failing_product_reads: AtomicU32,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` cart clears (`clear` or `remove_products`) fail
    /// with [`RepositoryError::Unavailable`].
    pub fn fail_cart_clears(&self, count: u32) {
        self.failing_cart_clears.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` product lookups (`get` or `get_many`) fail with
    /// [`RepositoryError::Unavailable`].
    pub fn fail_product_reads(&self, count: u32) {
        self.failing_product_reads.store(count, Ordering::SeqCst);
    }

    fn injected_clear_failure(&self) -> Result<(), RepositoryError> {
        trip(&self.failing_cart_clears, "cart store rejected the clear")
    }

    fn injected_read_failure(&self) -> Result<(), RepositoryError> {
        trip(&self.failing_product_reads, "product store is unreachable")
    }
}

fn trip(counter: &AtomicU32, msg: &str) -> Result<(), RepositoryError> {
    let tripped = counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if tripped {
        return Err(RepositoryError::Unavailable(msg.to_owned()));
    }
    Ok(())
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_with_password(
        &self,
        name: &str,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.email_taken(email, None) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        state.next_user_id += 1;
        let now = Utc::now();
        let user = User {
            id: UserId::new(state.next_user_id),
            name: name.to_owned(),
            email: email.clone(),
            role: UserRole::Customer,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        state.passwords.insert(user.id, password_hash.to_owned());
        Ok(user)
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| &u.email == email).cloned())
    }

    async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let state = self.state.lock().await;
        let Some(user) = state.users.values().find(|u| &u.email == email) else {
            return Ok(None);
        };
        Ok(state
            .passwords
            .get(&user.id)
            .map(|hash| (user.clone(), hash.clone())))
    }

    async fn update_profile(
        &self,
        id: UserId,
        changes: &ProfileChanges,
    ) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;
        if let Some(email) = &changes.email
            && state.email_taken(email, Some(id))
        {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        let user = state.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if let Some(name) = &changes.name {
            user.name.clone_from(name);
        }
        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        user.updated_at = Utc::now();
        let user = user.clone();

        if let Some(hash) = &changes.password_hash {
            state.passwords.insert(id, hash.clone());
        }
        Ok(user)
    }

    async fn set_role(&self, email: &Email, role: UserRole) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .values_mut()
            .find(|u| &u.email == email)
            .ok_or(RepositoryError::NotFound)?;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn delete_all(&self) -> Result<u64, RepositoryError> {
        let mut state = self.state.lock().await;
        let count = state.users.len() as u64;
        state.users.clear();
        state.passwords.clear();
        state.carts.clear();
        state.wishlists.clear();
        state.orders.clear();
        state.pending_clears.clear();
        Ok(count)
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn list(&self, category: Option<&str>) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .products
            .values()
            .filter(|p| category.is_none_or(|c| p.category.eq_ignore_ascii_case(c)))
            .cloned()
            .collect())
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        self.injected_read_failure()?;
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        self.injected_read_failure()?;
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id))
            .cloned()
            .collect())
    }

    async fn create(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let mut state = self.state.lock().await;
        state.next_product_id += 1;
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(state.next_product_id),
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            category: product.category.clone(),
            images: product.images.clone(),
            created_at: now,
            updated_at: now,
        };
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update(
        &self,
        id: ProductId,
        product: &NewProduct,
    ) -> Result<Product, RepositoryError> {
        let mut state = self.state.lock().await;
        let existing = state
            .products
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        existing.name.clone_from(&product.name);
        existing.description.clone_from(&product.description);
        existing.price = product.price;
        existing.category.clone_from(&product.category);
        existing.images.clone_from(&product.images);
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.products.remove(&id).is_none() {
            return Ok(false);
        }
        for cart in state.carts.values_mut() {
            cart.remove(id);
        }
        for wishlist in state.wishlists.values_mut() {
            wishlist.remove(id);
        }
        Ok(true)
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn lines(&self, user: UserId) -> Result<Vec<LineItem>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .carts
            .get(&user)
            .map(|cart| cart.lines().to_vec())
            .unwrap_or_default())
    }

    async fn add(
        &self,
        user: UserId,
        product: ProductId,
        quantity: Quantity,
    ) -> Result<Quantity, RepositoryError> {
        let mut state = self.state.lock().await;
        Ok(state.carts.entry(user).or_default().add(product, quantity))
    }

    async fn set_quantity(
        &self,
        user: UserId,
        product: ProductId,
        requested: i64,
    ) -> Result<SetQuantityOutcome, RepositoryError> {
        let mut state = self.state.lock().await;
        let cart = state.carts.get_mut(&user).ok_or(RepositoryError::NotFound)?;
        cart.set_quantity(product, requested)
            .map_err(|_| RepositoryError::NotFound)
    }

    async fn remove(&self, user: UserId, product: ProductId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        Ok(state
            .carts
            .get_mut(&user)
            .is_some_and(|cart| cart.remove(product)))
    }

    async fn clear(&self, user: UserId) -> Result<(), RepositoryError> {
        self.injected_clear_failure()?;
        self.state.lock().await.carts.remove(&user);
        Ok(())
    }

    async fn remove_products(
        &self,
        user: UserId,
        products: &[ProductId],
    ) -> Result<(), RepositoryError> {
        self.injected_clear_failure()?;
        let mut state = self.state.lock().await;
        if let Some(cart) = state.carts.get_mut(&user) {
            cart.remove_all(products);
        }
        Ok(())
    }
}

#[async_trait]
impl WishlistStore for MemoryStore {
    async fn entries(&self, user: UserId) -> Result<Vec<WishlistEntry>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .wishlists
            .get(&user)
            .map(|w| w.entries().to_vec())
            .unwrap_or_default())
    }

    async fn add(&self, user: UserId, product: ProductId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        Ok(state.wishlists.entry(user).or_default().add(product))
    }

    async fn remove(&self, user: UserId, product: ProductId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        Ok(state
            .wishlists
            .get_mut(&user)
            .is_some_and(|w| w.remove(product)))
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    fn atomicity(&self) -> Atomicity {
        Atomicity::PerRecord
    }

    async fn create(&self, user: UserId, draft: &OrderDraft) -> Result<Order, RepositoryError> {
        let mut state = self.state.lock().await;
        state.next_order_id += 1;
        let order = Order {
            id: OrderId::new(state.next_order_id),
            user_id: user,
            items: draft.lines.clone(),
            total: draft.total,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn list_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.user_id == user)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        order.status = status;
        Ok(order.clone())
    }

    async fn record_pending_clear(
        &self,
        order: &Order,
        error: &str,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        state
            .pending_clears
            .entry(order.id)
            .and_modify(|p| p.last_error = Some(error.to_owned()))
            .or_insert_with(|| PendingCartClear {
                order_id: order.id,
                user_id: order.user_id,
                product_ids: order.items.iter().map(|l| l.product_id).collect(),
                attempts: 0,
                last_error: Some(error.to_owned()),
                created_at: Utc::now(),
            });
        Ok(())
    }

    async fn pending_clears(&self, limit: u32) -> Result<Vec<PendingCartClear>, RepositoryError> {
        let state = self.state.lock().await;
        let mut pending: Vec<PendingCartClear> = state.pending_clears.values().cloned().collect();
        pending.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.order_id.cmp(&b.order_id))
        });
        pending.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(pending)
    }

    async fn note_clear_failure(
        &self,
        order: OrderId,
        error: &str,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if let Some(pending) = state.pending_clears.get_mut(&order) {
            pending.attempts = pending.attempts.saturating_add(1);
            pending.last_error = Some(error.to_owned());
        }
        Ok(())
    }

    async fn resolve_pending_clear(&self, order: OrderId) -> Result<(), RepositoryError> {
        self.state.lock().await.pending_clears.remove(&order);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use cartwheel_core::Price;

    use super::*;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    fn qty(n: u32) -> Quantity {
        Quantity::new(n).unwrap()
    }

    fn widget(price_cents: i64) -> NewProduct {
        NewProduct {
            name: "Widget".to_owned(),
            description: String::new(),
            price: Price::from_cents(price_cents).unwrap(),
            category: "Tools".to_owned(),
            images: vec![],
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        store
            .create_with_password("Ann", &email("ann@example.com"), "h")
            .await
            .unwrap();

        let err = store
            .create_with_password("Other Ann", &email("ANN@example.com"), "h")
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_profile_email_conflict_excludes_self() {
        let store = MemoryStore::new();
        let ann = store
            .create_with_password("Ann", &email("ann@example.com"), "h")
            .await
            .unwrap();
        store
            .create_with_password("Bob", &email("bob@example.com"), "h")
            .await
            .unwrap();

        let same = ProfileChanges {
            email: Some(email("ann@example.com")),
            ..ProfileChanges::default()
        };
        assert!(store.update_profile(ann.id, &same).await.is_ok());

        let taken = ProfileChanges {
            email: Some(email("bob@example.com")),
            ..ProfileChanges::default()
        };
        let err = store.update_profile(ann.id, &taken).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_category_filter_is_case_insensitive() {
        let store = MemoryStore::new();
        ProductStore::create(&store, &widget(500)).await.unwrap();

        assert_eq!(store.list(Some("tools")).await.unwrap().len(), 1);
        assert_eq!(store.list(Some("TOOLS")).await.unwrap().len(), 1);
        assert!(store.list(Some("garden")).await.unwrap().is_empty());
        assert_eq!(store.list(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cart_add_merges_lines() {
        let store = MemoryStore::new();
        let user = UserId::new(1);
        let product = ProductId::new(5);

        CartStore::add(&store, user, product, qty(2)).await.unwrap();
        let total = CartStore::add(&store, user, product, qty(3)).await.unwrap();

        assert_eq!(total, qty(5));
        assert_eq!(store.lines(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_set_quantity_on_missing_line_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .set_quantity(UserId::new(1), ProductId::new(5), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_injected_clear_failures_run_out() {
        let store = MemoryStore::new();
        let user = UserId::new(1);
        CartStore::add(&store, user, ProductId::new(5), qty(1))
            .await
            .unwrap();

        store.fail_cart_clears(2);
        assert!(store.clear(user).await.is_err());
        assert!(store.remove_products(user, &[ProductId::new(5)]).await.is_err());
        assert!(store.clear(user).await.is_ok());
        assert!(store.lines(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_orders_listed_newest_first() {
        let store = MemoryStore::new();
        let user = UserId::new(1);
        let draft = OrderDraft::from_cart(
            vec![LineItem::new(ProductId::new(1), qty(1))],
            &HashMap::from([(ProductId::new(1), Price::from_cents(100).unwrap())]),
        )
        .unwrap();

        let first = OrderStore::create(&store, user, &draft).await.unwrap();
        let second = OrderStore::create(&store, user, &draft).await.unwrap();
        OrderStore::create(&store, UserId::new(2), &draft)
            .await
            .unwrap();

        let ids: Vec<OrderId> = store
            .list_for_user(user)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_pending_clear_lifecycle() {
        let store = MemoryStore::new();
        let order = Order {
            id: OrderId::new(9),
            user_id: UserId::new(1),
            items: vec![LineItem::new(ProductId::new(3), qty(1))],
            total: Price::from_cents(100).unwrap(),
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };

        store.record_pending_clear(&order, "boom").await.unwrap();
        store.note_clear_failure(order.id, "again").await.unwrap();

        let pending = store.pending_clears(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 1);
        assert_eq!(pending[0].product_ids, vec![ProductId::new(3)]);
        assert_eq!(pending[0].last_error.as_deref(), Some("again"));

        store.resolve_pending_clear(order.id).await.unwrap();
        assert!(store.pending_clears(10).await.unwrap().is_empty());
    }
}
