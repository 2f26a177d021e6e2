//! # optika-db: Database Layer for Optika
//!
//! This crate provides persistence for the Optika back office: SQLite via
//! sqlx for the relational data, plus file-backed compressed archives for
//! materialized lens grades.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Optika Data Flow                                 │
//! │                                                                         │
//! │  Caller (HTTP layer, CLI, tests)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     optika-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌────────────────┐   ┌───────────────┐  │   │
//! │  │   │   Database    │   │  Repositories  │   │  GradeStore   │  │   │
//! │  │   │   (pool.rs)   │   │                │   │               │  │   │
//! │  │   │               │   │ TillRepo       │   │ .json.gz per  │  │   │
//! │  │   │ SqlitePool    │◄──│ OrderRepo      │   │ lens template │  │   │
//! │  │   │ + migrations  │   │ ProductRepo    │   │ (atomic       │  │   │
//! │  │   │   (embedded)  │   │ ReturnRepo     │   │  replace)     │  │   │
//! │  │   └───────────────┘   └────────────────┘   └───────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                             │                   │
//! │       ▼                                             ▼                   │
//! │  SQLite database file (WAL)                 <grades_dir>/*.json.gz     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (till, order, product, returns)
//! - [`grade_store`] - Compressed lens-grade archives
//!
//! ## Usage
//!
//! ```rust,ignore
//! use optika_db::{Database, DbConfig, GradeStore};
//!
//! let db = Database::new(DbConfig::new("path/to/optika.db")).await?;
//!
//! db.tills().open("01", "cashier-1", Money::from_cents(10000), None).await?;
//! let (order, items) = db.orders().create_sale(new_sale).await?;
//! db.orders().release_to_procurement(&order.os_number).await?;
//!
//! let grades = GradeStore::new("path/to/grades")?;
//! grades.generate_and_store(&lens_template)?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod grade_store;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use grade_store::GradeStore;
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::order::{NewSale, NewSaleItem, OrderRepository};
pub use repository::product::{
    CatalogEntry, NewFrame, NewGenericLens, NewService, ProductRepository,
};
pub use repository::returns::{ReturnRepository, WarrantyItem};
pub use repository::till::TillRepository;
