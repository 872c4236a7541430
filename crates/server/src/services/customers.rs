//! Back-office management of principals.
//!
//! Every operation is admin-only. An admin can never deactivate, demote or
//! delete their own account, so the last admin cannot lock everyone out by
//! accident.

use thiserror::Error;

use shopfront_core::{Role, UserId};

use super::guard::{Principal, RoleRequired, authorize};
use crate::db::{RepositoryError, UserRepository};
use crate::models::{Page, Pagination, User, UserFilter};

#[derive(Debug, Error)]
pub enum CustomerError {
    #[error(transparent)]
    Forbidden(#[from] RoleRequired),

    #[error("user not found")]
    NotFound,

    #[error("admins cannot {0} their own account")]
    SelfModification(&'static str),

    /// Principals with orders are kept for referential integrity.
    #[error("user has orders and cannot be deleted; deactivate the account instead")]
    HasOrders,

    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for CustomerError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound,
            RepositoryError::Conflict(_) => Self::HasOrders,
            other => Self::Repository(other),
        }
    }
}

pub struct CustomerService<'a, U> {
    users: &'a U,
}

impl<'a, U: UserRepository> CustomerService<'a, U> {
    #[must_use]
    pub const fn new(users: &'a U) -> Self {
        Self { users }
    }

    /// # Errors
    ///
    /// `Forbidden` for non-admins.
    pub async fn list(
        &self,
        caller: &Principal,
        filter: &UserFilter,
        page: Pagination,
    ) -> Result<Page<User>, CustomerError> {
        authorize(caller, &[Role::Admin])?;
        Ok(self.users.list_users(filter, page).await?)
    }

    /// # Errors
    ///
    /// `Forbidden` for non-admins, `NotFound`.
    pub async fn get(&self, caller: &Principal, id: UserId) -> Result<User, CustomerError> {
        authorize(caller, &[Role::Admin])?;
        self.users.get_user(id).await?.ok_or(CustomerError::NotFound)
    }

    /// Toggle the active flag. Takes effect on the target's next request.
    ///
    /// # Errors
    ///
    /// `Forbidden` for non-admins, `SelfModification` when deactivating
    /// oneself, `NotFound`.
    pub async fn set_active(
        &self,
        caller: &Principal,
        id: UserId,
        is_active: bool,
    ) -> Result<User, CustomerError> {
        authorize(caller, &[Role::Admin])?;
        if id == caller.id() && !is_active {
            return Err(CustomerError::SelfModification("deactivate"));
        }

        let user = self.users.set_user_active(id, is_active).await?;
        tracing::info!(
            user_id = %id,
            admin_id = %caller.id(),
            is_active,
            "account status changed"
        );
        Ok(user)
    }

    /// Promote or demote.
    ///
    /// # Errors
    ///
    /// `Forbidden` for non-admins, `SelfModification` when demoting oneself,
    /// `NotFound`.
    pub async fn set_role(
        &self,
        caller: &Principal,
        id: UserId,
        role: Role,
    ) -> Result<User, CustomerError> {
        authorize(caller, &[Role::Admin])?;
        if id == caller.id() && role != Role::Admin {
            return Err(CustomerError::SelfModification("demote"));
        }

        let user = self.users.set_user_role(id, role).await?;
        tracing::info!(user_id = %id, admin_id = %caller.id(), role = %role, "role changed");
        Ok(user)
    }

    /// # Errors
    ///
    /// `Forbidden` for non-admins, `SelfModification`, `HasOrders`, `NotFound`.
    pub async fn delete(&self, caller: &Principal, id: UserId) -> Result<(), CustomerError> {
        authorize(caller, &[Role::Admin])?;
        if id == caller.id() {
            return Err(CustomerError::SelfModification("delete"));
        }

        self.users.delete_user(id).await?;
        tracing::info!(user_id = %id, admin_id = %caller.id(), "account deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shopfront_core::{Email, Price, ShippingAddress};

    use super::*;
    use crate::db::{MemoryStore, OrderRepository, ProductRepository};
    use crate::models::{NewOrder, NewProduct, NewUser, OrderLine};
    use crate::services::auth::SessionMode;

    async fn principal(store: &MemoryStore, email: &str, role: Role) -> Principal {
        let user = store
            .create_user(NewUser {
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                email: Email::parse(email).unwrap(),
                password_hash: "unused".to_string(),
                role,
            })
            .await
            .unwrap();
        Principal::new(user, SessionMode::Normal)
    }

    #[tokio::test]
    async fn admins_cannot_lock_themselves_out() {
        let store = MemoryStore::new();
        let customers = CustomerService::new(&store);
        let admin = principal(&store, "a@shop.test", Role::Admin).await;

        assert!(matches!(
            customers.set_active(&admin, admin.id(), false).await,
            Err(CustomerError::SelfModification("deactivate"))
        ));
        assert!(matches!(
            customers.set_role(&admin, admin.id(), Role::Customer).await,
            Err(CustomerError::SelfModification("demote"))
        ));
        assert!(matches!(
            customers.delete(&admin, admin.id()).await,
            Err(CustomerError::SelfModification("delete"))
        ));
    }

    #[tokio::test]
    async fn toggle_and_promote() {
        let store = MemoryStore::new();
        let customers = CustomerService::new(&store);
        let admin = principal(&store, "a@shop.test", Role::Admin).await;
        let customer = principal(&store, "c@shop.test", Role::Customer).await;

        let off = customers
            .set_active(&admin, customer.id(), false)
            .await
            .unwrap();
        assert!(!off.is_active);
        let promoted = customers
            .set_role(&admin, customer.id(), Role::Admin)
            .await
            .unwrap();
        assert_eq!(promoted.role, Role::Admin);

        assert!(matches!(
            customers.set_active(&customer, admin.id(), false).await,
            Err(CustomerError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn principal_with_orders_is_kept() {
        let store = MemoryStore::new();
        let customers = CustomerService::new(&store);
        let admin = principal(&store, "a@shop.test", Role::Admin).await;
        let buyer = principal(&store, "buyer@shop.test", Role::Customer).await;
        let browser = principal(&store, "browser@shop.test", Role::Customer).await;
        let product = store
            .create_product(NewProduct {
                name: "Espresso Beans".to_string(),
                description: String::new(),
                price: Price::from_cents(100),
                stock_quantity: 1,
            })
            .await
            .unwrap();
        store
            .create_order(NewOrder {
                user_id: buyer.id(),
                lines: vec![OrderLine {
                    product_id: product.id,
                    quantity: 1,
                }],
                shipping_address: ShippingAddress {
                    street: "1 Quay Street".to_string(),
                    city: "Bristol".to_string(),
                    postal_code: "BS1 4DJ".to_string(),
                    country: "GB".to_string(),
                },
            })
            .await
            .unwrap();

        assert!(matches!(
            customers.delete(&admin, buyer.id()).await,
            Err(CustomerError::HasOrders)
        ));
        customers.delete(&admin, browser.id()).await.unwrap();
        assert!(matches!(
            customers.get(&admin, browser.id()).await,
            Err(CustomerError::NotFound)
        ));
    }

    #[tokio::test]
    async fn list_filters_by_email_and_role() {
        let store = MemoryStore::new();
        let customers = CustomerService::new(&store);
        let admin = principal(&store, "a@shop.test", Role::Admin).await;
        principal(&store, "ada@example.com", Role::Customer).await;
        principal(&store, "grace@example.com", Role::Customer).await;

        let page = customers
            .list(
                &admin,
                &UserFilter {
                    email: Some("EXAMPLE".to_string()),
                    role: Some(Role::Customer),
                },
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 2);

        let admins = customers
            .list(
                &admin,
                &UserFilter {
                    email: None,
                    role: Some(Role::Admin),
                },
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(admins.total, 1);
    }
}
