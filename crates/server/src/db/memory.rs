//! Process-local store.
//!
//! All three collections live behind one lock, so every repository call is a
//! single atomic unit of work: an order is validated line by line before any
//! stock is touched, and a conditional status change cannot interleave with
//! another.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use shopfront_core::{Email, OrderId, OrderStatus, ProductId, Role, UserId};

use super::RepositoryError;
use super::repository::{OrderRepository, ProductRepository, UserRepository};
use crate::models::{
    NewOrder, NewProduct, NewUser, Order, OrderFilter, OrderItem, Page, Pagination, Product,
    ProductUpdate, User, UserFilter,
};

#[derive(Debug)]
struct UserRecord {
    user: User,
    password_hash: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<UserId, UserRecord>,
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
}

impl MemoryState {
    fn user_by_email(&self, email: &Email) -> Option<&UserRecord> {
        self.users.values().find(|r| r.user.email.matches(email))
    }

    fn user_mut(&mut self, id: UserId) -> Result<&mut User, RepositoryError> {
        self.users
            .get_mut(&id)
            .map(|r| &mut r.user)
            .ok_or(RepositoryError::NotFound)
    }

    /// Return reserved units to the catalog. Lines whose product has since
    /// been deleted are skipped. Nothing changes if any product would overflow.
    fn restock(&mut self, items: &[OrderItem]) -> Result<(), RepositoryError> {
        let mut restored: HashMap<ProductId, u32> = HashMap::new();
        for item in items {
            let Some(product) = self.products.get(&item.product_id) else {
                continue;
            };
            let stock = restored
                .entry(product.id)
                .or_insert(product.stock_quantity);
            *stock = stock
                .checked_add(item.quantity)
                .filter(|total| *total <= Product::MAX_STOCK)
                .ok_or(RepositoryError::StockOverflow(product.id))?;
        }

        let now = Utc::now();
        for (id, stock) in restored {
            if let Some(product) = self.products.get_mut(&id) {
                product.stock_quantity = stock;
                product.updated_at = now;
            }
        }
        Ok(())
    }
}

/// In-memory implementation of every repository trait.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserRepository for MemoryStore {
    async fn create_user(&self, input: NewUser) -> Result<User, RepositoryError> {
        let mut state = self.state.write().await;
        if state.user_by_email(&input.email).is_some() {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        let now = Utc::now();
        let user = User {
            id: UserId::generate(),
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            role: input.role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(
            user.id,
            UserRecord {
                user: user.clone(),
                password_hash: input.password_hash,
            },
        );
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.state.read().await.users.get(&id).map(|r| r.user.clone()))
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .user_by_email(email)
            .map(|r| r.user.clone()))
    }

    async fn find_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .user_by_email(email)
            .map(|r| (r.user.clone(), r.password_hash.clone())))
    }

    async fn get_password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .users
            .get(&id)
            .map(|r| r.password_hash.clone()))
    }

    async fn update_password_hash(
        &self,
        id: UserId,
        password_hash: String,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let record = state.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        record.password_hash = password_hash;
        record.user.updated_at = Utc::now();
        Ok(())
    }

    async fn set_user_active(&self, id: UserId, is_active: bool) -> Result<User, RepositoryError> {
        let mut state = self.state.write().await;
        let user = state.user_mut(id)?;
        user.is_active = is_active;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_user_role(&self, id: UserId, role: Role) -> Result<User, RepositoryError> {
        let mut state = self.state.write().await;
        let user = state.user_mut(id)?;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn delete_user(&self, id: UserId) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&id) {
            return Err(RepositoryError::NotFound);
        }
        if state.orders.values().any(|o| o.user_id == id) {
            return Err(RepositoryError::Conflict(
                "principal still owns orders".to_owned(),
            ));
        }
        state.users.remove(&id);
        Ok(())
    }

    async fn list_users(
        &self,
        filter: &UserFilter,
        page: Pagination,
    ) -> Result<Page<User>, RepositoryError> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state
            .users
            .values()
            .map(|r| &r.user)
            .filter(|u| filter.matches(u))
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(page.slice(users))
    }
}

impl ProductRepository for MemoryStore {
    async fn create_product(&self, input: NewProduct) -> Result<Product, RepositoryError> {
        let now = Utc::now();
        let product = Product {
            id: ProductId::generate(),
            name: input.name,
            description: input.description,
            price: input.price,
            stock_quantity: input.stock_quantity,
            created_at: now,
            updated_at: now,
        };
        self.state
            .write()
            .await
            .products
            .insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn list_products(&self, page: Pagination) -> Result<Page<Product>, RepositoryError> {
        let state = self.state.read().await;
        let mut products: Vec<Product> = state.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(page.slice(products))
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let mut state = self.state.write().await;
        let product = state
            .products
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        update.apply_to(product);
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError> {
        self.state
            .write()
            .await
            .products
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

impl OrderRepository for MemoryStore {
    async fn create_order(&self, input: NewOrder) -> Result<Order, RepositoryError> {
        let mut state = self.state.write().await;

        // Validate every line before mutating anything.
        let mut items = Vec::with_capacity(input.lines.len());
        let mut reserved: HashMap<ProductId, u32> = HashMap::new();
        for line in &input.lines {
            let product = state
                .products
                .get(&line.product_id)
                .ok_or(RepositoryError::UnknownProduct(line.product_id))?;
            let held = reserved.entry(product.id).or_insert(0);
            let available = product.stock_quantity.saturating_sub(*held);
            if available < line.quantity {
                return Err(RepositoryError::InsufficientStock {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    requested: line.quantity,
                    available,
                });
            }
            *held += line.quantity;
            items.push(OrderItem {
                product_id: product.id,
                product_name: product.name.clone(),
                quantity: line.quantity,
                price_at_order: product.price,
            });
        }

        let total_amount = Order::total_of(&items).ok_or(RepositoryError::TotalTooLarge {
            max: Order::MAX_TOTAL,
        })?;

        let now = Utc::now();
        for item in &items {
            if let Some(product) = state.products.get_mut(&item.product_id) {
                product.stock_quantity -= item.quantity;
                product.updated_at = now;
            }
        }

        let order = Order {
            id: OrderId::generate(),
            user_id: input.user_id,
            total_amount,
            items,
            shipping_address: input.shipping_address,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(orders)
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        page: Pagination,
    ) -> Result<Page<Order>, RepositoryError> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| {
                let owner = state.users.get(&o.user_id).map(|r| &r.user);
                filter.matches(o, owner)
            })
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(page.slice(orders))
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        target: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut state = self.state.write().await;
        let order = state.orders.get(&id).ok_or(RepositoryError::NotFound)?;
        if order.status != expected {
            return Err(RepositoryError::Conflict(format!(
                "order status changed concurrently (now {})",
                order.status
            )));
        }
        if expected.releases_stock(target) {
            let items = order.items.clone();
            state.restock(&items)?;
        }
        let order = state.orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        order.status = target;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn delete_order(&self, id: OrderId) -> Result<Order, RepositoryError> {
        let mut state = self.state.write().await;
        let order = state.orders.get(&id).ok_or(RepositoryError::NotFound)?;
        if order.status != OrderStatus::Cancelled {
            let items = order.items.clone();
            state.restock(&items)?;
        }
        state.orders.remove(&id).ok_or(RepositoryError::NotFound)
    }
}
