use anyhow::Result;
use sea_orm::{ConnectionTrait, DatabaseConnection, SqlxPostgresConnector, Statement};
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use tokio::fs;

pub type DbPool = sqlx::PgPool;
pub type OrmConn = DatabaseConnection;

/// Shape of the `order_items` table the store exposes.
///
/// Older deployments carry only `product_id` and `quantity`; the price
/// columns were added later. Resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderItemSchema {
    Full,
    Minimal,
}

impl OrderItemSchema {
    pub fn has_prices(self) -> bool {
        matches!(self, OrderItemSchema::Full)
    }
}

pub async fn create_pool(database_url: &str) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Wrap an existing sqlx pool in a SeaORM connection so both layers share
/// the same connections.
pub fn orm_from_pool(pool: &DbPool) -> OrmConn {
    SqlxPostgresConnector::from_sqlx_postgres_pool(pool.clone())
}

/// Minimal migration runner that executes SQL files in `migrations/` in filename order.
///
/// Migration files are written to be re-runnable (`IF NOT EXISTS`).
pub async fn run_migrations(conn: &DatabaseConnection) -> Result<()> {
    let mut entries = fs::read_dir("migrations").await?;
    let mut files: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "sql") {
            files.push(path);
        }
    }
    files.sort();

    let backend = conn.get_database_backend();
    for file in files {
        tracing::debug!(file = %file.display(), "applying migration");
        let sql = fs::read_to_string(&file).await?;
        // Postgres prepared statements cannot contain multiple commands,
        // so split the migration file and run each statement individually.
        for stmt in sql.split(';') {
            let stmt = stmt.trim();
            if stmt.is_empty() {
                continue;
            }
            let statement = format!("{stmt};");
            conn.execute(Statement::from_string(backend, statement))
                .await?;
        }
    }

    Ok(())
}

pub async fn detect_order_item_schema(pool: &DbPool) -> Result<OrderItemSchema> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM information_schema.columns
        WHERE table_name = 'order_items'
          AND column_name IN ('unit_price_cents', 'line_total_cents')
        "#,
    )
    .fetch_one(pool)
    .await?;

    let schema = if count == 2 {
        OrderItemSchema::Full
    } else {
        OrderItemSchema::Minimal
    };
    tracing::info!(?schema, "detected order_items schema");
    Ok(schema)
}
