//! Catalog management.
//!
//! Reads are public. Writes are admin-only and validated here. `Price` carries
//! its own bounds; stock is capped at what the store's `INTEGER` column holds.

use thiserror::Error;

use shopfront_core::{ProductId, Role};

use super::guard::{Principal, RoleRequired, authorize};
use crate::db::{ProductRepository, RepositoryError};
use crate::models::{NewProduct, Page, Pagination, Product, ProductUpdate};

const MAX_NAME_LENGTH: usize = 200;
const MAX_DESCRIPTION_LENGTH: usize = 10_000;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Forbidden(#[from] RoleRequired),

    #[error("product not found")]
    NotFound,

    #[error("{field} {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for CatalogError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound,
            other => Self::Repository(other),
        }
    }
}

pub struct CatalogService<'a, P> {
    products: &'a P,
}

impl<'a, P: ProductRepository> CatalogService<'a, P> {
    #[must_use]
    pub const fn new(products: &'a P) -> Self {
        Self { products }
    }

    /// # Errors
    ///
    /// `NotFound` if no product has this id.
    pub async fn get(&self, id: ProductId) -> Result<Product, CatalogError> {
        self.products
            .get_product(id)
            .await?
            .ok_or(CatalogError::NotFound)
    }

    /// Products ordered by name.
    ///
    /// # Errors
    ///
    /// Fails only if the store does.
    pub async fn list(&self, page: Pagination) -> Result<Page<Product>, CatalogError> {
        Ok(self.products.list_products(page).await?)
    }

    /// # Errors
    ///
    /// `Forbidden` for non-admins, `InvalidField` for a blank or oversized
    /// name or a stock count above [`Product::MAX_STOCK`].
    pub async fn create(
        &self,
        caller: &Principal,
        mut input: NewProduct,
    ) -> Result<Product, CatalogError> {
        authorize(caller, &[Role::Admin])?;
        input.name = validate_name(&input.name)?;
        validate_description(&input.description)?;
        validate_stock(input.stock_quantity)?;

        let product = self.products.create_product(input).await?;
        tracing::info!(
            product_id = %product.id,
            admin_id = %caller.id(),
            stock = product.stock_quantity,
            "product created"
        );
        Ok(product)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// `Forbidden` for non-admins, `NotFound`, or `InvalidField`.
    pub async fn update(
        &self,
        caller: &Principal,
        id: ProductId,
        mut update: ProductUpdate,
    ) -> Result<Product, CatalogError> {
        authorize(caller, &[Role::Admin])?;
        if let Some(name) = &update.name {
            update.name = Some(validate_name(name)?);
        }
        if let Some(description) = &update.description {
            validate_description(description)?;
        }
        if let Some(stock) = update.stock_quantity {
            validate_stock(stock)?;
        }

        let product = self.products.update_product(id, update).await?;
        tracing::info!(product_id = %id, admin_id = %caller.id(), "product updated");
        Ok(product)
    }

    /// Existing orders keep their frozen copy of the product's name and price.
    ///
    /// # Errors
    ///
    /// `Forbidden` for non-admins, `NotFound`.
    pub async fn delete(&self, caller: &Principal, id: ProductId) -> Result<(), CatalogError> {
        authorize(caller, &[Role::Admin])?;
        self.products.delete_product(id).await?;
        tracing::info!(product_id = %id, admin_id = %caller.id(), "product deleted");
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<String, CatalogError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::InvalidField {
            field: "name",
            reason: "must not be empty".to_owned(),
        });
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(CatalogError::InvalidField {
            field: "name",
            reason: format!("must be at most {MAX_NAME_LENGTH} characters"),
        });
    }
    Ok(trimmed.to_owned())
}

fn validate_description(description: &str) -> Result<(), CatalogError> {
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(CatalogError::InvalidField {
            field: "description",
            reason: format!("must be at most {MAX_DESCRIPTION_LENGTH} characters"),
        });
    }
    Ok(())
}

fn validate_stock(stock: u32) -> Result<(), CatalogError> {
    if stock > Product::MAX_STOCK {
        return Err(CatalogError::InvalidField {
            field: "stockQuantity",
            reason: format!("must be at most {}", Product::MAX_STOCK),
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shopfront_core::{Email, Price};

    use super::*;
    use crate::db::{MemoryStore, UserRepository};
    use crate::models::NewUser;
    use crate::services::auth::SessionMode;

    async fn principal(store: &MemoryStore, role: Role) -> Principal {
        let user = store
            .create_user(NewUser {
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                email: Email::parse(&format!("{role}@shop.test")).unwrap(),
                password_hash: "unused".to_string(),
                role,
            })
            .await
            .unwrap();
        Principal::new(user, SessionMode::Normal)
    }

    fn new_product(name: &str) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: "Sweet".to_string(),
            price: Price::from_cents(399),
            stock_quantity: 12,
        }
    }

    #[tokio::test]
    async fn admin_crud() {
        let store = MemoryStore::new();
        let catalog = CatalogService::new(&store);
        let admin = principal(&store, Role::Admin).await;

        let created = catalog
            .create(&admin, new_product("  Dried Mango "))
            .await
            .unwrap();
        assert_eq!(created.name, "Dried Mango");

        let updated = catalog
            .update(
                &admin,
                created.id,
                ProductUpdate {
                    stock_quantity: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.stock_quantity, 0);
        assert_eq!(updated.price, Price::from_cents(399));

        catalog.delete(&admin, created.id).await.unwrap();
        assert!(matches!(
            catalog.get(created.id).await,
            Err(CatalogError::NotFound)
        ));
    }

    #[tokio::test]
    async fn customers_cannot_write() {
        let store = MemoryStore::new();
        let catalog = CatalogService::new(&store);
        let customer = principal(&store, Role::Customer).await;

        assert!(matches!(
            catalog.create(&customer, new_product("Mango")).await,
            Err(CatalogError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let store = MemoryStore::new();
        let catalog = CatalogService::new(&store);
        let admin = principal(&store, Role::Admin).await;

        assert!(matches!(
            catalog.create(&admin, new_product("   ")).await,
            Err(CatalogError::InvalidField { field: "name", .. })
        ));
        assert!(matches!(
            catalog
                .update(
                    &admin,
                    ProductId::generate(),
                    ProductUpdate::default()
                )
                .await,
            Err(CatalogError::NotFound)
        ));
    }

    #[tokio::test]
    async fn stock_is_capped_at_the_column_limit() {
        let store = MemoryStore::new();
        let catalog = CatalogService::new(&store);
        let admin = principal(&store, Role::Admin).await;

        let mut too_many = new_product("Gravel");
        too_many.stock_quantity = 3_000_000_000;
        assert!(matches!(
            catalog.create(&admin, too_many).await,
            Err(CatalogError::InvalidField {
                field: "stockQuantity",
                ..
            })
        ));

        let mut at_limit = new_product("Sand");
        at_limit.stock_quantity = Product::MAX_STOCK;
        let created = catalog.create(&admin, at_limit).await.unwrap();

        let update = ProductUpdate {
            stock_quantity: Some(Product::MAX_STOCK + 1),
            ..Default::default()
        };
        assert!(matches!(
            catalog.update(&admin, created.id, update).await,
            Err(CatalogError::InvalidField {
                field: "stockQuantity",
                ..
            })
        ));
        assert_eq!(
            catalog.get(created.id).await.unwrap().stock_quantity,
            Product::MAX_STOCK
        );
    }
}
