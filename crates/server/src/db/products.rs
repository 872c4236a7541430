//! Catalog persistence in `PostgreSQL`.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use shopfront_core::{Price, ProductId};

use super::repository::ProductRepository;
use super::{PgStore, RepositoryError};
use crate::models::{NewProduct, Page, Pagination, Product, ProductUpdate};

/// Internal row type for product queries.
#[derive(Debug, sqlx::FromRow)]
pub(super) struct ProductRow {
    pub(super) id: Uuid,
    pub(super) name: String,
    description: String,
    pub(super) price: Price,
    pub(super) stock_quantity: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let stock_quantity = u32::try_from(row.stock_quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "negative stock {} for product {}",
                row.stock_quantity, row.id
            ))
        })?;

        Ok(Self {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            price: row.price,
            stock_quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Convert a stock count for binding; the column is `INTEGER`.
pub(super) fn stock_param(quantity: u32) -> Result<i32, RepositoryError> {
    i32::try_from(quantity)
        .map_err(|_| RepositoryError::Conflict(format!("stock quantity {quantity} is too large")))
}

impl ProductRepository for PgStore {
    async fn create_product(&self, input: NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            INSERT INTO shop.product (id, name, description, price, stock_quantity)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, description, price, stock_quantity, created_at, updated_at
            ",
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(stock_param(input.stock_quantity)?)
        .fetch_one(self.pool())
        .await?;

        row.try_into()
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, description, price, stock_quantity, created_at, updated_at
            FROM shop.product
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.map(Product::try_from).transpose()
    }

    async fn list_products(&self, page: Pagination) -> Result<Page<Product>, RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shop.product")
            .fetch_one(self.pool())
            .await?;

        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, description, price, stock_quantity, created_at, updated_at
            FROM shop.product
            ORDER BY name, id
            LIMIT $1 OFFSET $2
            ",
        )
        .bind(i64::from(page.per_page()))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(self.pool())
        .await?;

        let items = rows
            .into_iter()
            .map(Product::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            total: u64::try_from(total).unwrap_or_default(),
            page: page.page(),
            per_page: page.per_page(),
        })
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE shop.product SET updated_at = NOW()");
        if let Some(name) = update.name {
            qb.push(", name = ");
            qb.push_bind(name);
        }
        if let Some(description) = update.description {
            qb.push(", description = ");
            qb.push_bind(description);
        }
        if let Some(price) = update.price {
            qb.push(", price = ");
            qb.push_bind(price);
        }
        if let Some(stock) = update.stock_quantity {
            qb.push(", stock_quantity = ");
            qb.push_bind(stock_param(stock)?);
        }
        qb.push(" WHERE id = ");
        qb.push_bind(id);
        qb.push(" RETURNING id, name, description, price, stock_quantity, created_at, updated_at");

        let row: ProductRow = qb
            .build_query_as()
            .fetch_optional(self.pool())
            .await?
            .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.product WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
