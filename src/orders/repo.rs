use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// PENDING → PROCESSING → SHIPPED → DELIVERED is the happy path; PAID and
/// CANCELLED sit beside it. Edges are not guarded: the owner may set any
/// status (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    #[sqlx(rename = "PENDING")]
    Pending,
    #[sqlx(rename = "PROCESSING")]
    Processing,
    #[sqlx(rename = "SHIPPED")]
    Shipped,
    #[sqlx(rename = "DELIVERED")]
    Delivered,
    #[sqlx(rename = "CANCELLED")]
    Cancelled,
    #[sqlx(rename = "PAID")]
    Paid,
}

impl FromStr for OrderStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PROCESSING" => Ok(Self::Processing),
            "SHIPPED" => Ok(Self::Shipped),
            "DELIVERED" => Ok(Self::Delivered),
            "CANCELLED" => Ok(Self::Cancelled),
            "PAID" => Ok(Self::Paid),
            other => anyhow::bail!("unknown order status {other:?}"),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Shipped => "SHIPPED",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
            Self::Paid => "PAID",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub address: String,
    pub status: OrderStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Snapshot taken at order creation; `unit_price` freezes the product price
/// so later repricing never changes a placed order's total.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

const ORDER_COLUMNS: &str = "id, user_id, address, status, created_at";

pub async fn create(
    db: &PgPool,
    user_id: Uuid,
    address: &str,
    items: &[(Uuid, i32)],
) -> anyhow::Result<OrderWithItems> {
    let mut tx = db.begin().await?;

    let order = sqlx::query_as::<_, Order>(
        r#"
        INSERT INTO orders (user_id, address)
        VALUES ($1, $2)
        RETURNING id, user_id, address, status, created_at
        "#,
    )
    .bind(user_id)
    .bind(address)
    .fetch_one(&mut *tx)
    .await?;

    let mut rows = Vec::with_capacity(items.len());
    for (product_id, quantity) in items {
        // Price is snapshotted from the product row inside the transaction;
        // a missing product aborts the whole order.
        let item = sqlx::query_as::<_, OrderItem>(
            r#"
            INSERT INTO order_items (order_id, product_id, quantity, unit_price)
            SELECT $1, p.id, $2, p.price
            FROM products p
            WHERE p.id = $3
            RETURNING id, order_id, product_id, quantity, unit_price
            "#,
        )
        .bind(order.id)
        .bind(quantity)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?
        .with_context(|| format!("product {product_id} does not exist"))?;
        rows.push(item);
    }

    tx.commit().await?;
    Ok(OrderWithItems {
        order,
        items: rows,
    })
}

pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<OrderWithItems>> {
    let orders = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(db)
    .await?;

    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let items = sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT id, order_id, product_id, quantity, unit_price
        FROM order_items
        WHERE order_id = ANY($1)
        "#,
    )
    .bind(&ids)
    .fetch_all(db)
    .await?;

    let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for item in items {
        by_order.entry(item.order_id).or_default().push(item);
    }

    Ok(orders
        .into_iter()
        .map(|order| {
            let items = by_order.remove(&order.id).unwrap_or_default();
            OrderWithItems { order, items }
        })
        .collect())
}

/// Scoped by both order id and owner in one conditional write: a non-owner's
/// request updates zero rows and is indistinguishable from a missing order.
pub async fn set_status(
    db: &PgPool,
    user_id: Uuid,
    order_id: Uuid,
    status: OrderStatus,
) -> anyhow::Result<Option<OrderWithItems>> {
    let updated = sqlx::query_as::<_, Order>(
        r#"
        UPDATE orders
        SET status = $1
        WHERE id = $2 AND user_id = $3
        RETURNING id, user_id, address, status, created_at
        "#,
    )
    .bind(status)
    .bind(order_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;

    match updated {
        None => Ok(None),
        Some(order) => {
            let items = items_for(db, order.id).await?;
            Ok(Some(OrderWithItems { order, items }))
        }
    }
}

pub async fn find_owned(
    db: &PgPool,
    user_id: Uuid,
    order_id: Uuid,
) -> anyhow::Result<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2"
    ))
    .bind(order_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(order)
}

/// Reconciliation write used by the payment webhook.
pub async fn mark_paid(db: &PgPool, user_id: Uuid, order_id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("UPDATE orders SET status = 'PAID' WHERE id = $1 AND user_id = $2")
        .bind(order_id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

async fn items_for(db: &PgPool, order_id: Uuid) -> anyhow::Result<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT id, order_id, product_id, quantity, unit_price
        FROM order_items
        WHERE order_id = $1
        "#,
    )
    .bind(order_id)
    .fetch_all(db)
    .await?;
    Ok(items)
}
