use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::connect_with_settings;

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "product",
        "cart",
        "cart_item",
        "idx_product_category",
        "idx_product_status",
        "idx_cart_item_cart_position",
    ];

    #[tokio::test]
    async fn migrations_create_catalog_and_cart_schema() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for object in MANAGED_SCHEMA_OBJECTS {
            let count = sqlx::query(
                "SELECT COUNT(*) AS count FROM sqlite_master WHERE name = ? AND type IN ('table', 'index')",
            )
            .bind(object)
            .fetch_one(&pool)
            .await
            .expect("query sqlite_master")
            .get::<i64, _>("count");
            assert_eq!(count, 1, "schema object `{object}` should exist");
        }

        pool.close().await;
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run");
        pool.close().await;
    }

    #[tokio::test]
    async fn schema_rejects_duplicate_codes_and_non_positive_quantities() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let insert = "INSERT INTO product (id, title, description, code, price, stock, category, category_folded,
                                           created_at, updated_at)
                      VALUES (?, 'Mouse', 'Wireless mouse device', 'MOU001', '100', 5, 'Accessories', 'accessories',
                              'now', 'now')";
        sqlx::query(insert).bind("p-1").execute(&pool).await.expect("first insert");
        let duplicate = sqlx::query(insert).bind("p-2").execute(&pool).await;
        assert!(duplicate.is_err(), "second product with the same code must be rejected");

        sqlx::query("INSERT INTO cart (id, created_at, updated_at) VALUES ('c-1', 'now', 'now')")
            .execute(&pool)
            .await
            .expect("cart insert");
        let zero = sqlx::query(
            "INSERT INTO cart_item (cart_id, product_id, quantity, position) VALUES ('c-1', 'p-1', 0, 1)",
        )
        .execute(&pool)
        .await;
        assert!(zero.is_err(), "zero quantity must be rejected by the schema");

        pool.close().await;
    }
}
