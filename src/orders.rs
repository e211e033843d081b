//! Order aggregate persistence.
//!
//! An order and its items are always written in one transaction: items are
//! never inserted without their order row, and never outlive it.

use std::future::Future;
use std::time::Duration;

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::db::RepositoryError;
use crate::models::{Item, NewItem, NewOrder, Order};

pub struct OrderRepository {
    pool: SqlitePool,
    deadline: Duration,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool, deadline: Duration) -> Self {
        Self { pool, deadline }
    }

    /// Insert the order row and all of its items. Returns the new `order_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails, in which
    /// case nothing is persisted.
    pub async fn create(&self, order: &NewOrder) -> Result<i64, RepositoryError> {
        self.bounded(async {
            let mut tx = self.pool.begin().await?;

            let order_id = sqlx::query("INSERT INTO orders (customer_name, ordered_at) VALUES (?, ?)")
                .bind(&order.customer_name)
                .bind(order.ordered_at)
                .execute(&mut *tx)
                .await?
                .last_insert_rowid();

            insert_items(&mut tx, order_id, &order.items).await?;

            tx.commit().await?;
            Ok::<_, RepositoryError>(order_id)
        })
        .await
    }

    /// All orders with their items, oldest first.
    ///
    /// Items are fetched per order; both reads share one transaction so the
    /// result is a consistent snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(&self) -> Result<Vec<Order>, RepositoryError> {
        self.bounded(async {
            let mut tx = self.pool.begin().await?;

            let mut orders = sqlx::query_as::<_, Order>(
                "SELECT order_id, customer_name, ordered_at FROM orders ORDER BY order_id",
            )
            .fetch_all(&mut *tx)
            .await?;

            for order in &mut orders {
                order.items = sqlx::query_as::<_, Item>(
                    r#"
                    SELECT line_item_id, order_id, item_code, description, quantity
                    FROM items
                    WHERE order_id = ?
                    ORDER BY line_item_id
                    "#,
                )
                .bind(order.order_id)
                .fetch_all(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok::<_, RepositoryError>(orders)
        })
        .await
    }

    /// Overwrite the order row and replace its items wholesale.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no order has `order_id`;
    /// `RepositoryError::Database` on store failure. Either way nothing changes.
    pub async fn update(&self, order_id: i64, order: &NewOrder) -> Result<(), RepositoryError> {
        self.bounded(async {
            let mut tx = self.pool.begin().await?;

            let updated =
                sqlx::query("UPDATE orders SET customer_name = ?, ordered_at = ? WHERE order_id = ?")
                    .bind(&order.customer_name)
                    .bind(order.ordered_at)
                    .bind(order_id)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected();
            if updated == 0 {
                return Err(RepositoryError::NotFound);
            }

            sqlx::query("DELETE FROM items WHERE order_id = ?")
                .bind(order_id)
                .execute(&mut *tx)
                .await?;

            insert_items(&mut tx, order_id, &order.items).await?;

            tx.commit().await?;
            Ok::<_, RepositoryError>(())
        })
        .await
    }

    /// Remove an order's items, then the order itself.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no order has `order_id`.
    pub async fn delete(&self, order_id: i64) -> Result<(), RepositoryError> {
        self.bounded(async {
            let mut tx = self.pool.begin().await?;

            sqlx::query("DELETE FROM items WHERE order_id = ?")
                .bind(order_id)
                .execute(&mut *tx)
                .await?;

            let deleted = sqlx::query("DELETE FROM orders WHERE order_id = ?")
                .bind(order_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            if deleted == 0 {
                return Err(RepositoryError::NotFound);
            }

            tx.commit().await?;
            Ok::<_, RepositoryError>(())
        })
        .await
    }

    /// Run `op` under the per-request deadline. A timed-out future is
    /// dropped together with its transaction, which rolls it back.
    async fn bounded<T, F>(&self, op: F) -> Result<T, RepositoryError>
    where
        F: Future<Output = Result<T, RepositoryError>>,
    {
        tokio::time::timeout(self.deadline, op)
            .await
            .map_err(|_| RepositoryError::Timeout(self.deadline))?
    }
}

async fn insert_items(
    tx: &mut Transaction<'_, Sqlite>,
    order_id: i64,
    items: &[NewItem],
) -> Result<(), RepositoryError> {
    for item in items {
        sqlx::query(
            "INSERT INTO items (order_id, item_code, description, quantity) VALUES (?, ?, ?, ?)",
        )
        .bind(order_id)
        .bind(&item.item_code)
        .bind(&item.description)
        .bind(item.quantity)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
