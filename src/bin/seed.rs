use rental_commerce_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    models::{Category, Role, StockStatus},
    services::auth_service::issue_token,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;
    let pool = create_pool(&config.database_url).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "Admin", Role::Admin).await?;
    let user_id = ensure_user(&pool, "user@example.com", "Demo User", Role::User).await?;
    seed_products(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");

    match std::env::var("JWT_SECRET") {
        Ok(secret) => {
            let ttl = chrono::Duration::days(7);
            let admin_token = issue_token(admin_id, Role::Admin, &secret, ttl)?;
            let user_token = issue_token(user_id, Role::User, &secret, ttl)?;
            println!("Admin token: {admin_token}");
            println!("User token: {user_token}");
        }
        Err(_) => println!("JWT_SECRET not set, skipping dev tokens"),
    }
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    user_name: &str,
    role: Role,
) -> anyhow::Result<Uuid> {
    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, user_name, phone_no, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(user_name)
    .bind("0000000000")
    .bind(role.as_str())
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products = [
        ("Camping Tent", "Four person dome tent", 4500, Category::One, 25),
        ("Sleeping Bag", "Rated down to -5C", 1800, Category::One, 8),
        ("Projector", "1080p portable projector", 12000, Category::Two, 4),
        ("Party Speaker", "Bluetooth speaker with lights", 3200, Category::Three, 40),
    ];

    for (name, desc, price, category, stock) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price, category, stock, stock_status)
            SELECT $1, $2, $3, $4, $5, $6, $7
            WHERE NOT EXISTS (SELECT 1 FROM products WHERE name = $2)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(desc)
        .bind(price as i64)
        .bind(category.as_str())
        .bind(stock)
        .bind(StockStatus::from_stock(stock).as_str())
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
