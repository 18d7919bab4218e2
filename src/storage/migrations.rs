//! Schema migrations for the PostgreSQL store.
//!
//! Each statement in [`schema::all_schema_statements`] is applied once, inside
//! its own transaction, and recorded by name in `_migrations`.

use sqlx::PgPool;
use thiserror::Error;

use super::schema;
use super::store::Table;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

const CREATE_MIGRATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS _migrations (
    id SERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL UNIQUE,
    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// Name under which the statement at `index` is recorded.
pub fn migration_name(index: usize) -> String {
    format!("compliance_v1_part_{}", index)
}

/// Applies the compliance schema to a PostgreSQL database.
pub struct MigrationRunner {
    pool: PgPool,
}

impl MigrationRunner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies every statement not yet recorded. Returns how many ran.
    pub async fn run_migrations(&self) -> Result<usize, MigrationError> {
        sqlx::query(CREATE_MIGRATIONS_TABLE)
            .execute(&self.pool)
            .await?;

        let mut applied = 0;
        for (index, statement) in schema::all_schema_statements().into_iter().enumerate() {
            let name = migration_name(index);
            if self.is_applied(&name).await? {
                continue;
            }
            self.apply(&name, statement).await?;
            tracing::info!(migration = %name, "Applied migration");
            applied += 1;
        }

        Ok(applied)
    }

    async fn is_applied(&self, name: &str) -> Result<bool, MigrationError> {
        let row: Option<(i32,)> = sqlx::query_as("SELECT id FROM _migrations WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn apply(&self, name: &str, sql: &str) -> Result<(), MigrationError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| MigrationError::MigrationFailed(format!("{}: {}", name, e)))?;

        sqlx::query("INSERT INTO _migrations (name) VALUES ($1)")
            .bind(name)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Names of applied migrations, oldest first.
    pub async fn applied_migrations(&self) -> Result<Vec<AppliedMigration>, MigrationError> {
        sqlx::query(CREATE_MIGRATIONS_TABLE)
            .execute(&self.pool)
            .await?;

        let migrations =
            sqlx::query_as("SELECT name, applied_at FROM _migrations ORDER BY applied_at, id")
                .fetch_all(&self.pool)
                .await?;
        Ok(migrations)
    }

    /// Drops every compliance table and the migration log.
    ///
    /// **WARNING**: destroys all data.
    pub async fn reset_database(&self) -> Result<(), MigrationError> {
        let statements = Table::ALL
            .iter()
            .rev()
            .map(|t| t.name())
            .chain(std::iter::once("_migrations"))
            .map(|name| format!("DROP TABLE IF EXISTS {} CASCADE", name));

        for statement in statements {
            sqlx::query(&statement)
                .execute(&self.pool)
                .await
                .map_err(|e| MigrationError::MigrationFailed(format!("Drop failed: {}", e)))?;
        }

        Ok(())
    }
}

/// Row of the `_migrations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AppliedMigration {
    pub name: String,
    pub applied_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_names_are_unique() {
        let names: std::collections::HashSet<String> = (0..schema::all_schema_statements().len())
            .map(migration_name)
            .collect();
        assert_eq!(names.len(), schema::all_schema_statements().len());
        assert!(names.contains("compliance_v1_part_0"));
    }

    #[test]
    fn test_migration_error_display() {
        let err = MigrationError::MigrationFailed("compliance_v1_part_0: syntax".to_string());
        assert_eq!(
            err.to_string(),
            "Migration failed: compliance_v1_part_0: syntax"
        );
    }
}
