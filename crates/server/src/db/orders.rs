//! Order persistence in `PostgreSQL`.
//!
//! Creating, cancelling and deleting an order all move stock, so each runs in
//! one transaction. Product rows are locked with `FOR UPDATE` in ascending id
//! order so concurrent checkouts over overlapping products cannot deadlock or
//! oversell.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use shopfront_core::{OrderId, OrderStatus, ProductId, ShippingAddress, UserId};

use super::products::{ProductRow, stock_param};
use super::repository::OrderRepository;
use super::{PgStore, RepositoryError, contains_pattern};
use crate::models::{NewOrder, Order, OrderFilter, OrderItem, Page, Pagination};

/// Internal row type for order queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    items: Json<Vec<OrderItem>>,
    shipping_address: Json<ShippingAddress>,
    total_amount: Decimal,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: OrderId::new(row.id),
            user_id: UserId::new(row.user_id),
            items: row.items.0,
            shipping_address: row.shipping_address.0,
            total_amount: row.total_amount,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const ORDER_COLUMNS: &str =
    "o.id, o.user_id, o.items, o.shipping_address, o.total_amount, o.status, o.created_at, o.updated_at";

/// Give reserved units back to the catalog. Products deleted since the order
/// was placed are skipped.
async fn restock(conn: &mut PgConnection, items: &[OrderItem]) -> Result<(), RepositoryError> {
    let mut items: Vec<&OrderItem> = items.iter().collect();
    items.sort_by_key(|item| item.product_id);

    for item in items {
        sqlx::query(
            r"
            UPDATE shop.product
            SET stock_quantity = stock_quantity + $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(item.product_id)
        .bind(stock_param(item.quantity)?)
        .execute(&mut *conn)
        .await
        .map_err(|err| overflow_or(err, item.product_id))?;
    }
    Ok(())
}

/// `numeric_value_out_of_range` on the stock column means the `INTEGER` overflowed.
fn overflow_or(err: sqlx::Error, product_id: ProductId) -> RepositoryError {
    let out_of_range = err
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "22003");
    if out_of_range {
        RepositoryError::StockOverflow(product_id)
    } else {
        RepositoryError::Database(err)
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    if let Some(status) = filter.status {
        qb.push(" AND o.status = ");
        qb.push_bind(status);
    }
    if let Some(email) = &filter.customer_email {
        qb.push(" AND u.email ILIKE ");
        qb.push_bind(contains_pattern(email));
    }
}

impl OrderRepository for PgStore {
    async fn create_order(&self, input: NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool().begin().await?;

        let mut ids: Vec<Uuid> = input
            .lines
            .iter()
            .map(|line| line.product_id.as_uuid())
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, description, price, stock_quantity, created_at, updated_at
            FROM shop.product
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            ",
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;
        let mut locked: HashMap<Uuid, ProductRow> = rows.into_iter().map(|r| (r.id, r)).collect();

        // Validate every line against the locked rows before writing anything.
        let mut items = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            let row = locked
                .get_mut(&line.product_id.as_uuid())
                .ok_or(RepositoryError::UnknownProduct(line.product_id))?;
            let available = u32::try_from(row.stock_quantity).unwrap_or_default();
            if available < line.quantity {
                return Err(RepositoryError::InsufficientStock {
                    product_id: line.product_id,
                    product_name: row.name.clone(),
                    requested: line.quantity,
                    available,
                });
            }
            row.stock_quantity -= stock_param(line.quantity)?;
            items.push(OrderItem {
                product_id: line.product_id,
                product_name: row.name.clone(),
                quantity: line.quantity,
                price_at_order: row.price,
            });
        }

        let total_amount = Order::total_of(&items).ok_or(RepositoryError::TotalTooLarge {
            max: Order::MAX_TOTAL,
        })?;

        for row in locked.values() {
            sqlx::query(
                "UPDATE shop.product SET stock_quantity = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(row.id)
            .bind(row.stock_quantity)
            .execute(&mut *tx)
            .await?;
        }

        let row = sqlx::query_as::<_, OrderRow>(
            r"
            INSERT INTO shop.purchase_order AS o
                (id, user_id, items, shipping_address, total_amount, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING o.id, o.user_id, o.items, o.shipping_address, o.total_amount, o.status,
                      o.created_at, o.updated_at
            ",
        )
        .bind(Uuid::new_v4())
        .bind(input.user_id)
        .bind(Json(&items))
        .bind(Json(&input.shipping_address))
        .bind(total_amount)
        .bind(OrderStatus::Pending)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.purchase_order o WHERE o.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Order::from))
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.purchase_order o \
             WHERE o.user_id = $1 ORDER BY o.created_at DESC, o.id"
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        page: Pagination,
    ) -> Result<Page<Order>, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM shop.purchase_order o \
             JOIN shop.user_account u ON u.id = o.user_id WHERE TRUE",
        );
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool()).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ORDER_COLUMNS} FROM shop.purchase_order o \
             JOIN shop.user_account u ON u.id = o.user_id WHERE TRUE"
        ));
        push_filters(&mut select, filter);
        select.push(" ORDER BY o.created_at DESC, o.id LIMIT ");
        select.push_bind(i64::from(page.per_page()));
        select.push(" OFFSET ");
        select.push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));

        let rows: Vec<OrderRow> = select.build_query_as().fetch_all(self.pool()).await?;

        Ok(Page {
            items: rows.into_iter().map(Order::from).collect(),
            total: u64::try_from(total).unwrap_or_default(),
            page: page.page(),
            per_page: page.per_page(),
        })
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        target: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool().begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(
            r"
            UPDATE shop.purchase_order AS o
            SET status = $3, updated_at = NOW()
            WHERE o.id = $1 AND o.status = $2
            RETURNING o.id, o.user_id, o.items, o.shipping_address, o.total_amount, o.status,
                      o.created_at, o.updated_at
            ",
        )
        .bind(id)
        .bind(expected)
        .bind(target)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            let current = sqlx::query_scalar::<_, OrderStatus>(
                "SELECT status FROM shop.purchase_order WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

            return Err(match current {
                None => RepositoryError::NotFound,
                Some(status) => RepositoryError::Conflict(format!(
                    "order status changed concurrently (now {status})"
                )),
            });
        };

        let order = Order::from(row);
        if expected.releases_stock(target) {
            restock(&mut tx, &order.items).await?;
        }

        tx.commit().await?;
        Ok(order)
    }

    async fn delete_order(&self, id: OrderId) -> Result<Order, RepositoryError> {
        let mut tx = self.pool().begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(
            r"
            DELETE FROM shop.purchase_order AS o
            WHERE o.id = $1
            RETURNING o.id, o.user_id, o.items, o.shipping_address, o.total_amount, o.status,
                      o.created_at, o.updated_at
            ",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let order = Order::from(row);
        if order.status != OrderStatus::Cancelled {
            restock(&mut tx, &order.items).await?;
        }

        tx.commit().await?;
        Ok(order)
    }
}
