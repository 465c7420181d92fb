use anyhow::Context;
use tracing::info;

use social_db::seed::{self, SeedOptions};
use social_db::{CallContext, Database, DbConfig, Storage, config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "social_db=debug,social_seed=debug".into()),
        )
        .init();

    // Config
    let db_config = DbConfig::from_env()?;
    let opts = SeedOptions {
        users: config::env_var("SOCIAL_SEED_USERS")?.unwrap_or(100),
        posts: config::env_var("SOCIAL_SEED_POSTS")?.unwrap_or(200),
        comments: config::env_var("SOCIAL_SEED_COMMENTS")?.unwrap_or(500),
        follows: config::env_var("SOCIAL_SEED_FOLLOWS")?.unwrap_or(300),
        invite_ttl: config::invite_ttl_from_env()?,
        ..SeedOptions::default()
    };

    // Init database
    let db = Database::open(&db_config).context("failed to open database")?;
    info!("Database connection pool established");

    let ctx = CallContext::background();
    db.health_check(&ctx).await.context("database health check failed")?;

    let storage = Storage::new(&db);
    let report = seed::run(&storage, &ctx, &opts).await?;

    info!(
        "Seeded {} users, {} posts, {} comments, {} follows",
        report.users, report.posts, report.comments, report.follows
    );
    Ok(())
}
