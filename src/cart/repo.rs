use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// One cart line joined with its live product row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
}

impl Cart {
    pub async fn find_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<Cart>> {
        let cart = sqlx::query_as::<_, Cart>(
            r#"
            SELECT id, user_id, created_at
            FROM carts
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(cart)
    }

    /// At most one cart per user. Concurrent creation races settle on the
    /// `carts.user_id` unique constraint: the losing insert returns no row and
    /// falls back to the find.
    pub async fn find_or_create(db: &PgPool, user_id: Uuid) -> anyhow::Result<Cart> {
        if let Some(cart) = Self::find_by_user(db, user_id).await? {
            return Ok(cart);
        }

        let inserted = sqlx::query_as::<_, Cart>(
            r#"
            INSERT INTO carts (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO NOTHING
            RETURNING id, user_id, created_at
            "#,
        )
        .bind(user_id)
        .fetch_optional(db)
        .await?;

        match inserted {
            Some(cart) => Ok(cart),
            None => Self::find_by_user(db, user_id)
                .await?
                .context("cart missing after conflicting insert"),
        }
    }

    /// Insert the line or bump its quantity in one atomic statement; a
    /// read-then-write pair here would lose concurrent increments.
    pub async fn add_item(
        db: &PgPool,
        cart_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cart_items (cart_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, product_id)
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
            "#,
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Lines for the user's cart, priced live from the product rows. A user
    /// with no cart reads as an empty sequence, same as an empty cart.
    pub async fn lines_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<CartLine>> {
        let lines = sqlx::query_as::<_, CartLine>(
            r#"
            SELECT p.id AS product_id, p.name, p.price, ci.quantity
            FROM carts c
            JOIN cart_items ci ON ci.cart_id = c.id
            JOIN products p ON p.id = ci.product_id
            WHERE c.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(lines)
    }
}
