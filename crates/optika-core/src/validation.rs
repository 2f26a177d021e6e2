//! # Validation Module
//!
//! Input validation utilities for Optika.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (UI / API surface, out of scope here)                 │
//! │  ├── Basic format checks, immediate operator feedback                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - business-format validation                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / UNIQUE / CHECK constraints                             │
//! │  └── Foreign key constraints                                           │
//! │                                                                         │
//! │  Defense in depth: multiple layers catch different errors              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Store Codes
// =============================================================================

/// Normalizes and validates a store code: digits 1 through 99, returned
/// zero-filled to two characters (`"1"` → `"01"`).
pub fn normalize_store_code(store: &str) -> ValidationResult<String> {
    let store = store.trim();
    let invalid = || ValidationError::InvalidStoreCode {
        value: store.to_string(),
    };

    if store.is_empty() || store.len() > 2 || !store.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let n: u8 = store.parse().map_err(|_| invalid())?;
    if !(1..=99).contains(&n) {
        return Err(invalid());
    }

    Ok(format!("{n:02}"))
}

// =============================================================================
// Barcodes
// =============================================================================

/// Validates a scanned product code: exactly 7 digits with a known category
/// prefix (0=lens, 1=frame, 2=service).
pub fn validate_barcode(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    let valid = code.len() == 7
        && code.bytes().all(|b| b.is_ascii_digit())
        && matches!(code.as_bytes()[0], b'0' | b'1' | b'2');

    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidBarcode {
            value: code.to_string(),
        })
    }
}

// =============================================================================
// Text Fields
// =============================================================================

/// Requires a non-empty trimmed text (return observations, breakage reasons).
pub fn require_text<'a>(field: &'static str, value: &'a str) -> ValidationResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required { field });
    }
    Ok(value)
}

/// Caps free-text length (observation columns are bounded).
pub fn validate_text_len(field: &'static str, value: &str, max: usize) -> ValidationResult<()> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_code_normalization() {
        assert_eq!(normalize_store_code("1").unwrap(), "01");
        assert_eq!(normalize_store_code("01").unwrap(), "01");
        assert_eq!(normalize_store_code("99").unwrap(), "99");
    }

    #[test]
    fn test_store_code_rejections() {
        assert!(normalize_store_code("0").is_err());
        assert!(normalize_store_code("00").is_err());
        assert!(normalize_store_code("100").is_err());
        assert!(normalize_store_code("ab").is_err());
        assert!(normalize_store_code("").is_err());
    }

    #[test]
    fn test_barcode_validation() {
        assert!(validate_barcode("1000001").is_ok());
        assert!(validate_barcode("0000321").is_ok());
        assert!(validate_barcode("2000001").is_ok());

        assert!(validate_barcode("3000001").is_err()); // unknown prefix
        assert!(validate_barcode("100001").is_err()); // six digits
        assert!(validate_barcode("10000011").is_err()); // eight digits
        assert!(validate_barcode("10000a1").is_err());
    }

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("observation", "  broke  ").unwrap(), "broke");
        assert!(require_text("observation", "   ").is_err());
    }

    #[test]
    fn test_text_len() {
        assert!(validate_text_len("note", "short", 10).is_ok());
        assert!(validate_text_len("note", "toolongnote", 10).is_err());
    }
}
