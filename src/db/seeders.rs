//! Database seeders for development data.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Seed the demo catalog when the products table is empty.
///
/// Runs at startup so a fresh install has something to sell; an existing
/// catalog is never touched.
pub async fn seed_demo_catalog(pool: &SqlitePool) -> Result<()> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
        .fetch_one(pool)
        .await?;
    if count.0 > 0 {
        return Ok(());
    }

    info!("Seeding demo catalog...");

    // Format: (name, description, price, stock, image)
    let products: Vec<(&str, &str, i64, i64, &str)> = vec![
        (
            "Smartphone XYZ",
            "Smartphone terbaru dengan spesifikasi tinggi",
            3_499_000,
            50,
            "https://cdn.pixabay.com/photo/2016/11/29/05/08/apple-1867461_960_720.jpg",
        ),
        (
            "Laptop ABC",
            "Laptop gaming dengan performa maksimal",
            12_999_000,
            25,
            "https://cdn.pixabay.com/photo/2016/03/27/07/12/apple-1282241_960_720.jpg",
        ),
        (
            "Headphone Pro",
            "Headphone wireless dengan noise cancelling",
            899_000,
            100,
            "https://cdn.pixabay.com/photo/2018/09/17/14/27/headphones-3683983_960_720.jpg",
        ),
        (
            "Smart Watch",
            "Smartwatch dengan fitur kesehatan lengkap",
            1_499_000,
            75,
            "https://cdn.pixabay.com/photo/2015/06/25/17/21/smart-watch-821557_960_720.jpg",
        ),
        (
            "Wireless Mouse",
            "Mouse gaming wireless dengan DPI tinggi",
            299_000,
            150,
            "https://cdn.pixabay.com/photo/2017/05/24/21/33/workplace-2341642_960_720.jpg",
        ),
        (
            "Keyboard Mechanical",
            "Keyboard gaming mechanical RGB",
            799_000,
            80,
            "https://cdn.pixabay.com/photo/2016/11/29/09/41/computer-1868991_960_720.jpg",
        ),
        (
            "Power Bank 10000mAh",
            "Power bank dengan fast charging",
            249_000,
            200,
            "https://cdn.pixabay.com/photo/2014/04/05/11/40/power-316582_960_720.jpg",
        ),
        (
            "TWS Earbuds",
            "True wireless earbuds dengan suara jernih",
            599_000,
            120,
            "https://cdn.pixabay.com/photo/2020/04/09/13/27/headphones-5021000_960_720.jpg",
        ),
        (
            "USB Type-C Cable",
            "Kabel USB Type-C premium 2 meter",
            99_000,
            300,
            "https://cdn.pixabay.com/photo/2017/01/22/12/07/usb-cable-2000734_960_720.jpg",
        ),
        (
            "Phone Case",
            "Casing handphone anti shock",
            149_000,
            250,
            "https://cdn.pixabay.com/photo/2018/01/08/02/34/phone-3068617_960_720.jpg",
        ),
    ];

    let now = crate::utils::now_rfc3339();
    for (name, description, price, stock, image) in products {
        sqlx::query(
            "INSERT INTO products (id, name, description, price, stock, image, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(name)
        .bind(description)
        .bind(price)
        .bind(stock)
        .bind(image)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await?;
    }

    info!("Demo catalog seeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = crate::db::init(tmp.path()).await.unwrap();

        seed_demo_catalog(&pool).await.unwrap();
        let first: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(first.0, 10);

        // A populated catalog is left alone
        seed_demo_catalog(&pool).await.unwrap();
        let second: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(second.0, first.0);
    }
}
