use chrono::Utc;
use serde::Serialize;

use vitrina_core::domain::listing::fold_category;
use vitrina_core::domain::product::ProductId;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Starter catalog used by `vitrina seed`. Prices are whole currency units.
const SEED_PRODUCTS: &[SeedProduct] = &[
    SeedProduct {
        code: "LAP001",
        title: "HP Pavilion Laptop",
        description: "Laptop with Intel Core i5, 8GB RAM and 256GB SSD",
        price: 45999,
        stock: 15,
        category: "Computers",
        thumbnail: "https://images.unsplash.com/photo-1496181133206-80ce9b88a853?w=500",
    },
    SeedProduct {
        code: "MOU001",
        title: "Logitech MX Master 3 Mouse",
        description: "Ergonomic wireless mouse with high precision sensor",
        price: 1899,
        stock: 50,
        category: "Accessories",
        thumbnail: "https://images.unsplash.com/photo-1527864550417-7fd91fc51a46?w=500",
    },
    SeedProduct {
        code: "TEC001",
        title: "RGB Mechanical Keyboard",
        description: "Mechanical keyboard with Cherry MX switches and RGB lighting",
        price: 2499,
        stock: 30,
        category: "Accessories",
        thumbnail: "https://images.unsplash.com/photo-1587829741301-dc798b83add3?w=500",
    },
    SeedProduct {
        code: "MON001",
        title: "Dell 27 inch Monitor",
        description: "Full HD IPS monitor with FreeSync",
        price: 6999,
        stock: 20,
        category: "Monitors",
        thumbnail: "https://images.unsplash.com/photo-1527443224154-c4a3942d3acf?w=500",
    },
    SeedProduct {
        code: "AUR001",
        title: "Sony WH-1000XM4 Headphones",
        description: "Headphones with active noise cancelling",
        price: 7499,
        stock: 25,
        category: "Audio",
        thumbnail: "https://images.unsplash.com/photo-1546435770-a3e426bf472b?w=500",
    },
    SeedProduct {
        code: "WEB001",
        title: "Logitech C920 Webcam",
        description: "Full HD 1080p webcam with stereo microphone",
        price: 1599,
        stock: 40,
        category: "Accessories",
        thumbnail: "https://images.unsplash.com/photo-1587825140708-dfaf72ae4b04?w=500",
    },
    SeedProduct {
        code: "SSD001",
        title: "Samsung 1TB SSD",
        description: "High speed NVMe M.2 solid state drive",
        price: 2999,
        stock: 35,
        category: "Storage",
        thumbnail: "https://images.unsplash.com/photo-1531492746076-161ca9bcad58?w=500",
    },
    SeedProduct {
        code: "IMP001",
        title: "HP LaserJet Printer",
        description: "Monochrome laser printer with WiFi",
        price: 4499,
        stock: 12,
        category: "Printers",
        thumbnail: "https://images.unsplash.com/photo-1612815154858-60aa4c59eaa6?w=500",
    },
    SeedProduct {
        code: "ROU001",
        title: "TP-Link AC1750 Router",
        description: "Dual band router with three antennas",
        price: 1299,
        stock: 45,
        category: "Networking",
        thumbnail: "https://images.unsplash.com/photo-1606904825846-647eb07f5be2?w=500",
    },
    SeedProduct {
        code: "TAB001",
        title: "Samsung Galaxy Tab S7",
        description: "11 inch Android tablet with S Pen included",
        price: 12999,
        stock: 18,
        category: "Tablets",
        thumbnail: "https://images.unsplash.com/photo-1561154464-82e9adf32764?w=500",
    },
];

#[derive(Debug, Clone, Copy)]
struct SeedProduct {
    code: &'static str,
    title: &'static str,
    description: &'static str,
    price: i64,
    stock: i64,
    category: &'static str,
    thumbnail: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedResult {
    pub inserted: Vec<&'static str>,
    pub skipped: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub expected: usize,
    pub missing_codes: Vec<&'static str>,
}

impl VerificationResult {
    pub fn all_present(&self) -> bool {
        self.missing_codes.is_empty()
    }
}

pub struct SeedCatalog;

impl SeedCatalog {
    pub fn codes() -> impl Iterator<Item = &'static str> {
        SEED_PRODUCTS.iter().map(|product| product.code)
    }

    /// Inserts every seed product whose code is not already taken. Existing products
    /// are left untouched, so running the seed twice is harmless.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        let now = Utc::now().to_rfc3339();
        let mut inserted = Vec::new();
        let mut skipped = Vec::new();

        for seed in SEED_PRODUCTS {
            let thumbnails = serde_json::to_string(&[seed.thumbnail])
                .map_err(|error| RepositoryError::Decode(error.to_string()))?;
            let result = sqlx::query(
                "INSERT INTO product (id, title, description, code, price, stock, category,
                                      category_folded, status, thumbnails, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?)
                 ON CONFLICT (code) DO NOTHING",
            )
            .bind(ProductId::generate().0)
            .bind(seed.title)
            .bind(seed.description)
            .bind(seed.code)
            .bind(seed.price.to_string())
            .bind(seed.stock)
            .bind(seed.category)
            .bind(fold_category(seed.category))
            .bind(thumbnails)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                skipped.push(seed.code);
            } else {
                inserted.push(seed.code);
            }
        }

        tx.commit().await?;
        Ok(SeedResult { inserted, skipped })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut missing_codes = Vec::new();
        for seed in SEED_PRODUCTS {
            let exists: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM product WHERE code = ?1)")
                    .bind(seed.code)
                    .fetch_one(pool)
                    .await?;
            if exists == 0 {
                missing_codes.push(seed.code);
            }
        }

        Ok(VerificationResult { expected: SEED_PRODUCTS.len(), missing_codes })
    }
}

#[cfg(test)]
mod tests {
    use super::SeedCatalog;
    use crate::repositories::{ProductRepository, SqlProductRepository};
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn seeding_twice_inserts_once_and_then_skips() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let first = SeedCatalog::load(&pool).await.expect("first seed");
        let second = SeedCatalog::load(&pool).await.expect("second seed");

        assert_eq!(first.inserted.len(), SeedCatalog::codes().count());
        assert!(first.skipped.is_empty());
        assert!(second.inserted.is_empty());
        assert_eq!(second.skipped, first.inserted);

        let verification = SeedCatalog::verify(&pool).await.expect("verify");
        assert!(verification.all_present());

        let repo = SqlProductRepository::new(pool);
        let mouse = repo.find_by_code("MOU001").await.expect("lookup").expect("seeded");
        assert_eq!(mouse.stock, 50);
        assert_eq!(mouse.thumbnails.len(), 1);
    }
}
