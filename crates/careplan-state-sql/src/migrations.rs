use sqlx::{PgPool, SqlitePool};
use tracing::debug;

use careplan_core::PlanError;

/// Generate SQL migrations for the PostgreSQL plan store
///
/// Every statement is idempotent, so the whole list runs on each startup.
pub fn generate_migrations() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "20240601000000_treatment_plans",
            r#"
            CREATE TABLE IF NOT EXISTS treatment_plans (
                id BIGSERIAL PRIMARY KEY,
                patient_id BIGINT NOT NULL UNIQUE,
                nodes JSONB NOT NULL DEFAULT '[]'::jsonb,
                edges JSONB NOT NULL DEFAULT '[]'::jsonb,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
        ),
        (
            "20240601000001_treatment_plans_updated_at",
            r#"
            CREATE INDEX IF NOT EXISTS idx_treatment_plans_updated_at ON treatment_plans(updated_at);
            "#,
        ),
    ]
}

/// Generate SQL migrations for the SQLite plan store
pub fn generate_sqlite_migrations() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "20240601000000_treatment_plans",
            r#"
            CREATE TABLE IF NOT EXISTS treatment_plans (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                patient_id INTEGER NOT NULL UNIQUE,
                nodes TEXT NOT NULL DEFAULT '[]',
                edges TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        ),
        (
            "20240601000001_treatment_plans_updated_at",
            r#"
            CREATE INDEX IF NOT EXISTS idx_treatment_plans_updated_at ON treatment_plans(updated_at);
            "#,
        ),
    ]
}

fn migration_error(name: &str, e: sqlx::Error) -> PlanError {
    PlanError::StorageUnavailable(format!("Failed to run migration {}: {}", name, e))
}

/// Apply the PostgreSQL migrations
pub async fn run_postgres_migrations(pool: &PgPool) -> Result<(), PlanError> {
    for (name, sql) in generate_migrations() {
        debug!(migration = name, "Applying migration");
        sqlx::raw_sql(sql)
            .execute(pool)
            .await
            .map_err(|e| migration_error(name, e))?;
    }
    Ok(())
}

/// Apply the SQLite migrations
pub async fn run_sqlite_migrations(pool: &SqlitePool) -> Result<(), PlanError> {
    for (name, sql) in generate_sqlite_migrations() {
        debug!(migration = name, "Applying migration");
        sqlx::raw_sql(sql)
            .execute(pool)
            .await
            .map_err(|e| migration_error(name, e))?;
    }
    Ok(())
}
