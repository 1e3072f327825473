use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};

use vitrina_core::domain::cart::{Cart, CartId, CartItem, Quantity};
use vitrina_core::domain::product::ProductId;

use super::{CartRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCartRepository {
    pool: DbPool,
}

impl SqlCartRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_err(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{field}: {error}")))
}

async fn load_cart(
    conn: &mut SqliteConnection,
    id: &CartId,
) -> Result<Option<Cart>, RepositoryError> {
    let Some(header) = sqlx::query("SELECT id, created_at, updated_at FROM cart WHERE id = ?")
        .bind(&id.0)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let rows = sqlx::query(
        "SELECT product_id, quantity FROM cart_item WHERE cart_id = ? ORDER BY position ASC",
    )
    .bind(&id.0)
    .fetch_all(&mut *conn)
    .await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in &rows {
        let product_id: String = row.try_get("product_id").map_err(decode_err)?;
        let quantity: i64 = row.try_get("quantity").map_err(decode_err)?;
        items.push(CartItem {
            product_id: ProductId(product_id),
            quantity: Quantity::new(quantity).map_err(decode_err)?,
        });
    }

    let cart_id: String = header.try_get("id").map_err(decode_err)?;
    let created_at: String = header.try_get("created_at").map_err(decode_err)?;
    let updated_at: String = header.try_get("updated_at").map_err(decode_err)?;

    Ok(Some(Cart {
        id: CartId(cart_id),
        items,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    }))
}

/// Bumps `updated_at` and doubles as the existence check that opens every mutation.
async fn touch_cart(
    conn: &mut SqliteConnection,
    id: &CartId,
    now: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    let result = sqlx::query("UPDATE cart SET updated_at = ? WHERE id = ?")
        .bind(now.to_rfc3339())
        .bind(&id.0)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::CartNotFound(id.clone()));
    }
    Ok(())
}

async fn reload(conn: &mut SqliteConnection, id: &CartId) -> Result<Cart, RepositoryError> {
    load_cart(conn, id).await?.ok_or_else(|| RepositoryError::CartNotFound(id.clone()))
}

#[async_trait::async_trait]
impl CartRepository for SqlCartRepository {
    async fn insert(&self, cart: Cart) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO cart (id, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(&cart.id.0)
            .bind(cart.created_at.to_rfc3339())
            .bind(cart.updated_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;

        for (position, item) in cart.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO cart_item (cart_id, product_id, quantity, position) VALUES (?, ?, ?, ?)",
            )
            .bind(&cart.id.0)
            .bind(&item.product_id.0)
            .bind(i64::from(item.quantity.get()))
            .bind(position as i64 + 1)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &CartId) -> Result<Option<Cart>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_cart(&mut conn, id).await
    }

    async fn add_one(
        &self,
        id: &CartId,
        product_id: &ProductId,
        now: DateTime<Utc>,
    ) -> Result<Cart, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        touch_cart(&mut tx, id, now).await?;

        sqlx::query(
            "INSERT INTO cart_item (cart_id, product_id, quantity, position)
             VALUES (?, ?, 1, (SELECT COALESCE(MAX(position), 0) + 1 FROM cart_item WHERE cart_id = ?))
             ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = quantity + 1",
        )
        .bind(&id.0)
        .bind(&product_id.0)
        .bind(&id.0)
        .execute(&mut *tx)
        .await?;

        let cart = reload(&mut tx, id).await?;
        tx.commit().await?;
        Ok(cart)
    }

    async fn remove_item(
        &self,
        id: &CartId,
        product_id: &ProductId,
        now: DateTime<Utc>,
    ) -> Result<Cart, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        touch_cart(&mut tx, id, now).await?;

        sqlx::query("DELETE FROM cart_item WHERE cart_id = ? AND product_id = ?")
            .bind(&id.0)
            .bind(&product_id.0)
            .execute(&mut *tx)
            .await?;

        let cart = reload(&mut tx, id).await?;
        tx.commit().await?;
        Ok(cart)
    }

    async fn set_quantity(
        &self,
        id: &CartId,
        product_id: &ProductId,
        quantity: Quantity,
        now: DateTime<Utc>,
    ) -> Result<Cart, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        touch_cart(&mut tx, id, now).await?;

        let result =
            sqlx::query("UPDATE cart_item SET quantity = ? WHERE cart_id = ? AND product_id = ?")
                .bind(i64::from(quantity.get()))
                .bind(&id.0)
                .bind(&product_id.0)
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls back the timestamp bump.
            return Err(RepositoryError::ItemNotFound {
                cart_id: id.clone(),
                product_id: product_id.clone(),
            });
        }

        let cart = reload(&mut tx, id).await?;
        tx.commit().await?;
        Ok(cart)
    }

    async fn replace_items(
        &self,
        id: &CartId,
        items: Vec<CartItem>,
        now: DateTime<Utc>,
    ) -> Result<Cart, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        touch_cart(&mut tx, id, now).await?;

        sqlx::query("DELETE FROM cart_item WHERE cart_id = ?").bind(&id.0).execute(&mut *tx).await?;

        for (position, item) in items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO cart_item (cart_id, product_id, quantity, position) VALUES (?, ?, ?, ?)",
            )
            .bind(&id.0)
            .bind(&item.product_id.0)
            .bind(i64::from(item.quantity.get()))
            .bind(position as i64 + 1)
            .execute(&mut *tx)
            .await?;
        }

        let cart = reload(&mut tx, id).await?;
        tx.commit().await?;
        Ok(cart)
    }

    async fn clear(&self, id: &CartId, now: DateTime<Utc>) -> Result<Cart, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        touch_cart(&mut tx, id, now).await?;

        sqlx::query("DELETE FROM cart_item WHERE cart_id = ?").bind(&id.0).execute(&mut *tx).await?;

        let cart = reload(&mut tx, id).await?;
        tx.commit().await?;
        Ok(cart)
    }
}
