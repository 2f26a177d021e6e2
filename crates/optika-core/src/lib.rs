//! # optika-core: Pure Business Logic for Optika
//!
//! This crate is the **heart** of Optika, a retail optics-shop management
//! system. It contains all business logic as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Optika Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Caller (UI / HTTP surface, out of scope)           │   │
//! │  │    open till ──► sell ──► advance order ──► settle ──► finalize│   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ optika-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  status   │  │   till    │  │   grade   │  │   │
//! │  │   │  money    │  │transition │  │settlement │  │cross-prod │  │   │
//! │  │   │  diopter  │  │  table    │  │   math    │  │ generator │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                   optika-db (Database Layer)                    │   │
//! │  │        SQLite repositories, migrations, grade archive           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, TillSession, ServiceOrder, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`diopter`] - Fixed-point optical powers
//! - [`status`] - Closed status enums and the transition table
//! - [`till`] - Till settlement and day-finalization math
//! - [`idgen`] - Sequential business-code computation
//! - [`grade`] - Lens grade cross-product generation
//! - [`roles`] - Role/capability checks
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: every function is deterministic
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: all monetary values are centavos (i64), no floats
//! 4. **Explicit Errors**: all errors are typed, never strings or panics
//! 5. **Closed Status Vocabulary**: illegal transitions are unrepresentable

// =============================================================================
// Module Declarations
// =============================================================================

pub mod diopter;
pub mod error;
pub mod grade;
pub mod idgen;
pub mod money;
pub mod roles;
pub mod status;
pub mod till;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use optika_core::Money` instead of
// `use optika_core::money::Money`

pub use diopter::Diopter;
pub use error::{CoreError, CoreResult, ValidationError};
pub use grade::LensCombination;
pub use money::Money;
pub use roles::{Capability, Role};
pub use status::{OrderStatus, TillStatus};
pub use till::CloseCounts;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default store code for single-store deployments.
///
/// The schema is multi-store (every till session and service order carries a
/// store code); deployments with one shop use this constant throughout.
pub const DEFAULT_STORE: &str = "01";
