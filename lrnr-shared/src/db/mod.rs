/// Postgres plumbing for the credential store
///
/// # Modules
///
/// - `pool`: connection pool creation and health check
/// - `migrations`: schema migrations embedded from `lrnr-shared/migrations/`
///
/// # Example
///
/// ```no_run
/// use lrnr_shared::db::{migrations::run_migrations, pool::{create_pool, DatabaseConfig}};
/// use lrnr_shared::store::PgCredentialStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::new(std::env::var("DATABASE_URL")?)).await?;
/// run_migrations(&pool).await?;
///
/// let store = PgCredentialStore::new(pool);
/// # Ok(())
/// # }
/// ```

pub mod migrations;
pub mod pool;
