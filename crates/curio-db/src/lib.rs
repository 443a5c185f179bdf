//! # curio-db
//!
//! PostgreSQL database layer for the curio content archive.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for classifiers, content items and sequences
//! - Alias-based classifier deduplication with protected slug aliases
//! - Link internalization (external URLs resolved to stored items)
//!
//! ## Example
//!
//! ```rust,ignore
//! use curio_db::{ClassifierKind, ClassifierRepository, Database};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/curio").await?;
//!
//!     let topic = db
//!         .classifiers
//!         .create_with_aliases(
//!             ClassifierKind::Topic,
//!             "Law&Øther",
//!             None,
//!             &["law-etc".to_string()],
//!         )
//!         .await?;
//!
//!     println!("Created topic: {}", topic.slug);
//!     Ok(())
//! }
//! ```

pub mod classifiers;
pub mod content;
mod links;
pub mod pool;
pub mod sequences;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use curio_core::*;

// Re-export repository implementations
pub use classifiers::{validate_classifier_name, PgClassifierRepository};
pub use content::PgContentRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use sequences::PgSequenceRepository;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Classifier repository (authors, ideas, topics, tags) and aliases.
    pub classifiers: PgClassifierRepository,
    /// Content item repository and link management.
    pub content: PgContentRepository,
    /// Sequence repository for ordered reading lists.
    pub sequences: PgSequenceRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            classifiers: PgClassifierRepository::new(pool.clone()),
            content: PgContentRepository::new(pool.clone()),
            sequences: PgSequenceRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Connect to test database (for integration tests).
    #[cfg(test)]
    pub async fn connect_test() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| crate::test_fixtures::DEFAULT_TEST_DATABASE_URL.to_string());
        Self::connect(&database_url).await
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}
