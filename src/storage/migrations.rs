//! Database migration helpers.
//!
//! Applies the schema statements from [`schema`](super::schema) exactly once
//! each, tracked in a `_migrations` table.

use sqlx::{Executor, PgPool};

use crate::error::StorageError;

use super::schema;

/// Migration runner for applying schema changes.
pub struct MigrationRunner {
    pool: PgPool,
}

impl MigrationRunner {
    /// Creates a new migration runner.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs all pending migrations.
    ///
    /// Idempotent: already-applied parts are skipped, and the statements
    /// themselves use IF NOT EXISTS / OR REPLACE.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        self.ensure_migrations_table().await?;

        for (idx, statement) in schema::all_schema_statements().iter().enumerate() {
            let migration_name = format!("schema_v1_part_{}", idx);

            if !self.is_migration_applied(&migration_name).await? {
                self.apply_migration(&migration_name, statement).await?;
            }
        }

        Ok(())
    }

    /// Ensures the migrations tracking table exists.
    async fn ensure_migrations_table(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                id SERIAL PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Checks if a migration has already been applied.
    async fn is_migration_applied(&self, name: &str) -> Result<bool, StorageError> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT id FROM _migrations WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(result.is_some())
    }

    /// Applies a single migration inside a transaction.
    ///
    /// Statements run unprepared so a part may contain several semicolon
    /// separated statements (the index block does).
    async fn apply_migration(&self, name: &str, sql: &str) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        (&mut *tx)
            .execute(sql)
            .await
            .map_err(|e| StorageError::MigrationFailed {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        sqlx::query("INSERT INTO _migrations (name) VALUES ($1)")
            .bind(name)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Returns a list of applied migrations.
    pub async fn list_applied_migrations(&self) -> Result<Vec<AppliedMigration>, StorageError> {
        self.ensure_migrations_table().await?;

        let migrations: Vec<AppliedMigration> =
            sqlx::query_as("SELECT name, applied_at FROM _migrations ORDER BY applied_at")
                .fetch_all(&self.pool)
                .await?;

        Ok(migrations)
    }

    /// Resets the database by dropping all tables and views.
    ///
    /// **WARNING**: This will destroy all data! Use only in development/testing.
    pub async fn reset_database(&self) -> Result<(), StorageError> {
        // Reverse order of creation (foreign key constraints)
        let drop_statements = [
            "DROP VIEW IF EXISTS v_experiment_results",
            "DROP VIEW IF EXISTS v_cell_metrics",
            "DROP TABLE IF EXISTS evaluations CASCADE",
            "DROP TABLE IF EXISTS tool_calls CASCADE",
            "DROP TABLE IF EXISTS executions CASCADE",
            "DROP TABLE IF EXISTS experiments CASCADE",
            "DROP TABLE IF EXISTS prompt_templates CASCADE",
            "DROP TABLE IF EXISTS tools CASCADE",
            "DROP TABLE IF EXISTS models CASCADE",
            "DROP TABLE IF EXISTS _migrations CASCADE",
        ];

        for statement in drop_statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::MigrationFailed {
                    name: "reset".to_string(),
                    reason: e.to_string(),
                })?;
        }

        Ok(())
    }
}

/// Record of an applied migration.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AppliedMigration {
    /// Name of the migration.
    pub name: String,
    /// When the migration was applied.
    pub applied_at: chrono::DateTime<chrono::Utc>,
}
