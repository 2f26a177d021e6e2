//! # Repository Module
//!
//! Database repository implementations for Optika.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  Caller (HTTP layer, CLI, tests)                                       │
//! │       │                                                                 │
//! │       │  db.orders().receive_lens("0100001")                           │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  OrderRepository                                                       │
//! │  ├── create_sale(&self, new_sale)                                      │
//! │  ├── receive_lens(&self, os_number)                                    │
//! │  ├── confirm_assembly(&self, os_number)                                │
//! │  └── ...                                                                │
//! │       │                                                                 │
//! │       │  SQL (compare-and-swap WHERE clauses carry preconditions)      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • Business preconditions live next to the statements enforcing them   │
//! │  • SQL is isolated in one place per aggregate                          │
//! │  • Easy to test against an in-memory database                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Catalog CRUD, barcode minting and dispatch
//! - [`till::TillRepository`] - Till session lifecycle and day finalization
//! - [`order::OrderRepository`] - Sales and the service-order state machine
//! - [`returns::ReturnRepository`] - Returns and warranty claims

pub mod order;
pub mod product;
pub mod returns;
pub mod till;
