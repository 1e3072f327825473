use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use vitrina_core::domain::listing::{
    fold_category, Page, PageMeta, PriceSort, ProductFilter, ProductQuery,
};
use vitrina_core::domain::product::{Product, ProductChanges, ProductId};

use super::{ProductRepository, RepositoryError};
use crate::DbPool;

const PRODUCT_COLUMNS: &str = "id, title, description, code, price, stock, category, status, \
                               thumbnails, created_at, updated_at";

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
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

pub(crate) fn row_to_product(row: &SqliteRow) -> Result<Product, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let price: String = row.try_get("price").map_err(decode_err)?;
    let stock: i64 = row.try_get("stock").map_err(decode_err)?;
    let thumbnails: String = row.try_get("thumbnails").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_err)?;

    Ok(Product {
        id: ProductId(id),
        title: row.try_get("title").map_err(decode_err)?,
        description: row.try_get("description").map_err(decode_err)?,
        code: row.try_get("code").map_err(decode_err)?,
        price: Decimal::from_str(&price)
            .map_err(|error| RepositoryError::Decode(format!("price `{price}`: {error}")))?,
        stock: u32::try_from(stock)
            .map_err(|_| RepositoryError::Decode(format!("stock out of range: {stock}")))?,
        category: row.try_get("category").map_err(decode_err)?,
        status: row.try_get("status").map_err(decode_err)?,
        thumbnails: serde_json::from_str(&thumbnails).map_err(decode_err)?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

/// Maps a unique-index violation to [`RepositoryError::Conflict`] naming the column.
fn classify_write_error(error: sqlx::Error) -> RepositoryError {
    if let Some(db_error) = error.as_database_error() {
        if db_error.is_unique_violation() {
            let field = if db_error.message().contains("product.code") { "code" } else { "id" };
            return RepositoryError::Conflict { field };
        }
    }
    RepositoryError::Database(error)
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ProductFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(category) = &filter.category {
        builder.push(" AND instr(category_folded, ");
        builder.push_bind(fold_category(category));
        builder.push(") > 0");
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }
}

fn order_clause(sort: Option<PriceSort>) -> &'static str {
    match sort {
        Some(PriceSort::Asc) => " ORDER BY CAST(price AS REAL) ASC, seq ASC",
        Some(PriceSort::Desc) => " ORDER BY CAST(price AS REAL) DESC, seq ASC",
        None => " ORDER BY seq ASC",
    }
}

fn thumbnails_json(thumbnails: &[String]) -> Result<String, RepositoryError> {
    serde_json::to_string(thumbnails).map_err(decode_err)
}

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn insert(&self, product: Product) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO product (id, title, description, code, price, stock, category,
                                  category_folded, status, thumbnails, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&product.id.0)
        .bind(&product.title)
        .bind(&product.description)
        .bind(&product.code)
        .bind(product.price.to_string())
        .bind(i64::from(product.stock))
        .bind(&product.category)
        .bind(fold_category(&product.category))
        .bind(product.status)
        .bind(thumbnails_json(&product.thumbnails)?)
        .bind(product.created_at.to_rfc3339())
        .bind(product.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(classify_write_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE code = ?"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn find_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE id IN ("
        ));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.0.clone());
        }
        separated.push_unseparated(")");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn list_page(&self, query: &ProductQuery) -> Result<Page<Product>, RepositoryError> {
        // Count and page come from the same read transaction.
        let mut tx = self.pool.begin().await?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM product");
        push_filter(&mut count, &query.filter);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *tx).await?;

        let mut select =
            QueryBuilder::<Sqlite>::new(format!("SELECT {PRODUCT_COLUMNS} FROM product"));
        push_filter(&mut select, &query.filter);
        select.push(order_clause(query.sort));
        select.push(" LIMIT ");
        select.push_bind(i64::from(query.limit));
        select.push(" OFFSET ");
        select.push_bind(i64::try_from(query.offset()).unwrap_or(i64::MAX));
        let rows = select.build().fetch_all(&mut *tx).await?;

        tx.commit().await?;

        let items = rows.iter().map(row_to_product).collect::<Result<Vec<_>, _>>()?;
        let total_docs = u64::try_from(total).unwrap_or_default();
        Ok(Page { items, meta: PageMeta::compute(total_docs, query.page, query.limit) })
    }

    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product ORDER BY seq ASC"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_product).collect()
    }

    async fn update(
        &self,
        id: &ProductId,
        changes: &ProductChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<Product>, RepositoryError> {
        let thumbnails = changes.thumbnails.as_deref().map(thumbnails_json).transpose()?;

        let row = sqlx::query(&format!(
            "UPDATE product SET
                 title = COALESCE(?, title),
                 description = COALESCE(?, description),
                 price = COALESCE(?, price),
                 stock = COALESCE(?, stock),
                 category = COALESCE(?, category),
                 category_folded = COALESCE(?, category_folded),
                 status = COALESCE(?, status),
                 thumbnails = COALESCE(?, thumbnails),
                 updated_at = ?
             WHERE id = ?
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(changes.title.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.price.map(|price| price.to_string()))
        .bind(changes.stock.map(i64::from))
        .bind(changes.category.as_deref())
        .bind(changes.category.as_deref().map(fold_category))
        .bind(changes.status)
        .bind(thumbnails)
        .bind(now.to_rfc3339())
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify_write_error)?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn delete(&self, id: &ProductId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM product WHERE id = ?").bind(&id.0).execute(&self.pool).await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use vitrina_core::domain::listing::{PriceSort, ProductFilter, ProductQuery};
    use vitrina_core::domain::product::{Product, ProductChanges, ProductId};

    use super::SqlProductRepository;
    use crate::repositories::{ProductRepository, RepositoryError};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn product(code: &str, price: i64, category: &str) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::generate(),
            title: format!("Product {code}"),
            description: "A product used in repository tests".to_string(),
            code: code.to_string(),
            price: Decimal::from(price),
            stock: 5,
            category: category.to_string(),
            status: true,
            thumbnails: vec!["https://img.example/1.png".to_string()],
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn insert_then_find_round_trips_all_fields() {
        let repo = SqlProductRepository::new(setup().await);
        let mut mouse = product("MOU001", 100, "Accessories");
        mouse.price = Decimal::new(1899, 2);

        repo.insert(mouse.clone()).await.expect("insert");
        let found = repo.find_by_id(&mouse.id).await.expect("find").expect("present");

        assert_eq!(found.code, "MOU001");
        assert_eq!(found.price, Decimal::new(1899, 2));
        assert_eq!(found.thumbnails, mouse.thumbnails);
        assert_eq!(found.created_at.timestamp(), mouse.created_at.timestamp());
        assert!(repo.find_by_code("MOU001").await.expect("by code").is_some());
    }

    #[tokio::test]
    async fn duplicate_code_is_a_conflict() {
        let repo = SqlProductRepository::new(setup().await);
        repo.insert(product("MOU001", 100, "Accessories")).await.expect("first insert");

        let error = repo
            .insert(product("MOU001", 200, "Accessories"))
            .await
            .expect_err("duplicate code should fail");

        assert!(matches!(error, RepositoryError::Conflict { field: "code" }));
    }

    #[tokio::test]
    async fn concurrent_inserts_with_same_code_admit_exactly_one() {
        let repo = Arc::new(SqlProductRepository::new(setup().await));

        let handles = (0..4)
            .map(|_| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move { repo.insert(product("DUP001", 10, "Misc")).await })
            })
            .collect::<Vec<_>>();

        let mut successes = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.expect("join") {
                Ok(()) => successes += 1,
                Err(RepositoryError::Conflict { field: "code" }) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(conflicts, 3);
    }

    #[tokio::test]
    async fn pages_do_not_overlap_and_cover_the_collection() {
        let repo = SqlProductRepository::new(setup().await);
        for index in 0..15 {
            repo.insert(product(&format!("P{index:03}"), 10, "Misc")).await.expect("insert");
        }

        let first = repo.list_page(&ProductQuery::first_page(10)).await.expect("page 1");
        let second = repo
            .list_page(&ProductQuery { page: 2, ..ProductQuery::first_page(10) })
            .await
            .expect("page 2");

        assert_eq!(first.items.len(), 10);
        assert_eq!(second.items.len(), 5);
        assert_eq!(first.meta.total_docs, 15);
        assert!(first.meta.has_next_page && !first.meta.has_prev_page);
        assert!(second.meta.has_prev_page && !second.meta.has_next_page);

        let mut codes: Vec<String> =
            first.items.iter().chain(second.items.iter()).map(|p| p.code.clone()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 15);
    }

    #[tokio::test]
    async fn price_sort_breaks_ties_by_insertion_order() {
        let repo = SqlProductRepository::new(setup().await);
        repo.insert(product("AAA", 50, "Misc")).await.expect("insert");
        repo.insert(product("BBB", 5, "Misc")).await.expect("insert");
        repo.insert(product("CCC", 50, "Misc")).await.expect("insert");
        repo.insert(product("DDD", 1000, "Misc")).await.expect("insert");

        let asc = repo
            .list_page(&ProductQuery { sort: Some(PriceSort::Asc), ..ProductQuery::first_page(10) })
            .await
            .expect("asc");
        let desc = repo
            .list_page(&ProductQuery { sort: Some(PriceSort::Desc), ..ProductQuery::first_page(10) })
            .await
            .expect("desc");

        let codes = |page: &[Product]| page.iter().map(|p| p.code.clone()).collect::<Vec<_>>();
        assert_eq!(codes(&asc.items), vec!["BBB", "AAA", "CCC", "DDD"]);
        assert_eq!(codes(&desc.items), vec!["DDD", "AAA", "CCC", "BBB"]);
    }

    #[tokio::test]
    async fn filter_matches_category_substring_case_insensitively_and_status() {
        let repo = SqlProductRepository::new(setup().await);
        repo.insert(product("ACC1", 10, "Accessories")).await.expect("insert");
        let mut hidden = product("ACC2", 10, "accessories");
        hidden.status = false;
        repo.insert(hidden).await.expect("insert");
        repo.insert(product("MON1", 10, "Monitors")).await.expect("insert");

        let by_category = repo
            .list_page(&ProductQuery {
                filter: ProductFilter { category: Some("ACCESS".to_string()), status: None },
                ..ProductQuery::first_page(10)
            })
            .await
            .expect("category");
        assert_eq!(by_category.meta.total_docs, 2);

        let available = repo
            .list_page(&ProductQuery {
                filter: ProductFilter { category: Some("acc".to_string()), status: Some(true) },
                ..ProductQuery::first_page(10)
            })
            .await
            .expect("status");
        assert_eq!(available.items.len(), 1);
        assert_eq!(available.items[0].code, "ACC1");
    }

    #[tokio::test]
    async fn category_filter_folds_non_ascii_letters() {
        let repo = SqlProductRepository::new(setup().await);
        repo.insert(product("TEC001", 10, "Electrónica")).await.expect("insert");
        let moved = product("AUD001", 10, "Audio");
        repo.insert(moved.clone()).await.expect("insert");
        let changes =
            ProductChanges { category: Some("ÓPTICA".to_string()), ..ProductChanges::default() };
        repo.update(&moved.id, &changes, Utc::now()).await.expect("update").expect("present");

        let query = |needle: &str| ProductQuery {
            filter: ProductFilter { category: Some(needle.to_string()), status: None },
            ..ProductQuery::first_page(10)
        };

        let upper = repo.list_page(&query("ELECTRÓNICA")).await.expect("upper");
        assert_eq!(upper.meta.total_docs, 1);
        assert_eq!(upper.items[0].category, "Electrónica");
        assert_eq!(repo.list_page(&query("trón")).await.expect("partial").meta.total_docs, 1);

        let updated = repo.list_page(&query("óptica")).await.expect("updated category");
        assert_eq!(updated.items.len(), 1);
        assert_eq!(updated.items[0].code, "AUD001");
        assert_eq!(repo.list_page(&query("audio")).await.expect("old").meta.total_docs, 0);
    }

    #[tokio::test]
    async fn update_applies_only_provided_fields() {
        let repo = SqlProductRepository::new(setup().await);
        let original = product("MOU001", 100, "Accessories");
        repo.insert(original.clone()).await.expect("insert");

        let changes = ProductChanges {
            price: Some(Decimal::new(12550, 2)),
            status: Some(false),
            ..ProductChanges::default()
        };
        let updated = repo
            .update(&original.id, &changes, Utc::now())
            .await
            .expect("update")
            .expect("present");

        assert_eq!(updated.price, Decimal::new(12550, 2));
        assert!(!updated.status);
        assert_eq!(updated.title, original.title);
        assert_eq!(updated.code, "MOU001");

        let missing = repo.update(&ProductId::generate(), &changes, Utc::now()).await.expect("update");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_was_removed() {
        let repo = SqlProductRepository::new(setup().await);
        let mouse = product("MOU001", 100, "Accessories");
        repo.insert(mouse.clone()).await.expect("insert");

        assert!(repo.delete(&mouse.id).await.expect("delete"));
        assert!(!repo.delete(&mouse.id).await.expect("second delete"));
        assert!(repo.find_many(&[mouse.id]).await.expect("find many").is_empty());
    }
}
