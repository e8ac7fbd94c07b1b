use anyhow::Context;
use solid_choice_api::{
    db::{DbPool, create_pool, orm_from_pool, run_migrations},
    landing::{DEFAULT_KEY, LandingContent},
    services::product_service::{default_sizes, slugify},
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;

    let pool = create_pool(&database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&orm_from_pool(&pool)).await?;

    let nodes = seed_catalog_nodes(&pool).await?;
    seed_products(&pool, &nodes).await?;
    seed_landing(&pool).await?;

    // SEED_ADMIN_USER_ID is the identity-service id of the first admin.
    if let Ok(raw) = std::env::var("SEED_ADMIN_USER_ID") {
        let admin_id = Uuid::parse_str(raw.trim()).context("SEED_ADMIN_USER_ID is not a uuid")?;
        sqlx::query("INSERT INTO admin_users (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(admin_id)
            .execute(&pool)
            .await?;
        println!("Ensured admin {admin_id}");
    }

    println!("Seed completed");
    Ok(())
}

/// Returns (label, id) for every seeded category.
async fn seed_catalog_nodes(pool: &DbPool) -> anyhow::Result<Vec<(&'static str, Uuid)>> {
    let labels = [("Roupas", 0), ("Calçados", 1), ("Acessórios", 2)];
    let mut seeded = Vec::with_capacity(labels.len());

    for (label, sort_order) in labels {
        let slug = slugify(label);
        let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM catalog_nodes WHERE slug = $1")
            .bind(&slug)
            .fetch_optional(pool)
            .await?;
        let id = match existing {
            Some((id,)) => id,
            None => {
                let id = Uuid::new_v4();
                sqlx::query(
                    r#"
                    INSERT INTO catalog_nodes (id, kind, label, slug, sort_order)
                    VALUES ($1, 'category', $2, $3, $4)
                    "#,
                )
                .bind(id)
                .bind(label)
                .bind(&slug)
                .bind(sort_order)
                .execute(pool)
                .await?;
                id
            }
        };
        seeded.push((label, id));
    }

    println!("Seeded catalog nodes");
    Ok(seeded)
}

async fn seed_products(pool: &DbPool, nodes: &[(&'static str, Uuid)]) -> anyhow::Result<()> {
    let products: [(&str, &str, &str, Option<i64>); 5] = [
        ("Camiseta Básica Algodão", "Roupas", "Solid", Some(7990)),
        ("Moletom Canguru", "Roupas", "Solid", Some(18990)),
        ("Tênis Corrida Leve", "Calçados", "Stride", Some(34990)),
        ("Boné Aba Curva", "Acessórios", "Solid", Some(5990)),
        ("Jaqueta Couro Sob Medida", "Roupas", "Atelier", None),
    ];

    for (name, category, brand, price_cents) in products {
        let slug = slugify(name);
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE slug = $1")
            .bind(&slug)
            .fetch_optional(pool)
            .await?;
        if exists.is_some() {
            continue;
        }

        let node_id = nodes
            .iter()
            .find(|(label, _)| *label == category)
            .map(|(_, id)| *id);

        sqlx::query(
            r#"
            INSERT INTO products (id, name, slug, category, brand, price_cents, sizes, catalog_node_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(&slug)
        .bind(category)
        .bind(brand)
        .bind(price_cents)
        .bind(default_sizes(Some(category)))
        .bind(node_id)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}

async fn seed_landing(pool: &DbPool) -> anyhow::Result<()> {
    let content = serde_json::to_value(LandingContent::default())?;
    sqlx::query(
        "INSERT INTO landing_content (key, content) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING",
    )
    .bind(DEFAULT_KEY)
    .bind(content)
    .execute(pool)
    .await?;

    println!("Seeded landing content");
    Ok(())
}
