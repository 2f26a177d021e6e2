//! # Identifier Generation
//!
//! Pure computation of the next human-facing sequential code given the
//! current maximum. The db layer supplies the max and persists the result
//! inside one transaction, so concurrent requests cannot mint duplicates;
//! UNIQUE constraints on every generated code back that up.
//!
//! ## Code Families
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  product barcode   7 digits, category prefix     1000001, 2000042     │
//! │  CV (sale) number  global integer sequence       1, 2, 3...           │
//! │  OS number         store(2) + sequence(5)        0100001              │
//! │  warranty code     integer + "GR" suffix          12GR                 │
//! │  purchase order    "OC-" + year + "-" + seq(4)    OC-2026-0001         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An unparsable stored maximum falls back to the sequence start rather than
//! failing the request; the UNIQUE constraint catches any real collision.

use crate::error::ValidationError;
use crate::types::ProductCategory;
use crate::validation::normalize_store_code;

/// Width of product barcodes and OS numbers.
pub const CODE_WIDTH: usize = 7;

/// Next 7-digit product barcode for a category.
///
/// `current_max` is the largest existing code with the category's prefix, if
/// any. An empty category (or an unparsable max) starts at base + 1:
/// lenses `0000001`, frames `1000001`, services `2000001`.
pub fn next_product_code(category: ProductCategory, current_max: Option<&str>) -> String {
    let next = match current_max.and_then(|s| s.trim().parse::<i64>().ok()) {
        Some(last) => last + 1,
        None => category.code_base() + 1,
    };
    format!("{next:07}")
}

/// Next global sale (CV) number.
pub fn next_cv(current_max: Option<i64>) -> i64 {
    current_max.unwrap_or(0) + 1
}

/// Next store-scoped service-order number (`SSNNNNN`).
///
/// `current_max` is the largest OS number already minted for the store.
pub fn next_os_number(
    store: &str,
    current_max: Option<&str>,
) -> Result<String, ValidationError> {
    let store = normalize_store_code(store)?;

    let sequence = match current_max
        .map(|s| s.trim())
        .filter(|s| s.len() > 2)
        .and_then(|s| s[2..].parse::<i64>().ok())
    {
        Some(last) => last + 1,
        None => 1,
    };

    Ok(format!("{store}{sequence:05}"))
}

/// Next warranty order code (`12GR`). Warranty codes are a sequence of their
/// own, separate from ordinary OS numbers.
pub fn next_warranty_code(current_max: Option<&str>) -> String {
    let sequence = match current_max
        .and_then(|s| s.trim().strip_suffix("GR"))
        .and_then(|s| s.parse::<i64>().ok())
    {
        Some(last) => last + 1,
        None => 1,
    };
    format!("{sequence}GR")
}

/// Next year-scoped purchase-order code (`OC-2026-0001`).
pub fn next_purchase_order_number(year: i32, current_max: Option<&str>) -> String {
    let sequence = match current_max
        .and_then(|s| s.trim().rsplit('-').next())
        .and_then(|s| s.parse::<i64>().ok())
    {
        Some(last) => last + 1,
        None => 1,
    };
    format!("OC-{year}-{sequence:04}")
}

// =============================================================================
// Unit Tests
// =============================================================================
