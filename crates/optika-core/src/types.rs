//! # Domain Types
//!
//! Core domain types used throughout Optika.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  TillSession    │   │  ServiceOrder   │   │    Product      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  store + date   │   │  os_number (PK) │   │  barcode (7)    │       │
//! │  │  method totals  │   │  cv_number      │   │  prefix=category│       │
//! │  │  TillStatus     │   │  OrderStatus    │   │  stock/reserved │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  GenericLens    │   │  ReturnRecord   │   │    SaleItem     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  diopter ranges │   │  credit value   │   │  snapshot data  │       │
//! │  │  base_code      │   │  + ReturnItems  │   │  per CV line    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Rows carry a UUID surrogate `id` for relations plus a business code
//! (barcode, OS number, CV number) minted sequentially for humans.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::diopter::Diopter;
use crate::money::Money;
use crate::status::{OrderStatus, TillStatus};

// =============================================================================
// Product Category
// =============================================================================

/// Product category, encoded as the leading digit of the 7-digit barcode.
///
/// The prefix convention is load-bearing: lookups branch on the first
/// character of the scanned code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    /// Generic-lens template codes. Prefix `0`.
    Lens,
    /// Frames, the only stocked category. Prefix `1`.
    Frame,
    /// Services (assembly, adjustment...). Prefix `2`.
    Service,
}

impl ProductCategory {
    /// Leading barcode digit for the category.
    pub const fn prefix(&self) -> char {
        match self {
            ProductCategory::Lens => '0',
            ProductCategory::Frame => '1',
            ProductCategory::Service => '2',
        }
    }

    /// Numeric base offset of the category's code space.
    pub const fn code_base(&self) -> i64 {
        match self {
            ProductCategory::Lens => 0,
            ProductCategory::Frame => 1_000_000,
            ProductCategory::Service => 2_000_000,
        }
    }

    /// Resolves a category from a scanned code's first character.
    pub fn from_prefix(c: char) -> Option<ProductCategory> {
        match c {
            '0' => Some(ProductCategory::Lens),
            '1' => Some(ProductCategory::Frame),
            '2' => Some(ProductCategory::Service),
            _ => None,
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product: a frame or a service.
///
/// Concrete lens items are not products; they come from a [`GenericLens`]
/// grade expansion and live in the compressed grade archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// 7-digit barcode; first digit encodes the category.
    pub barcode: String,

    /// Display name.
    pub name: String,

    /// Frame or service (lens templates live in `generic_lenses`).
    pub category: ProductCategory,

    /// Cost price.
    pub cost: Money,

    /// On-hand count. Meaningful for frames only.
    pub stock: i64,

    /// Units reserved for in-flight orders.
    pub reserved: i64,

    /// Frame style: "AR" (rimmed) or "OC" (sunglasses).
    pub frame_style: Option<String>,

    /// Frame description initials (e.g. "PCAR").
    pub frame_initials: Option<String>,

    /// Frame piece code (e.g. "PC6225").
    pub frame_piece: Option<String>,

    /// Frame color code.
    pub frame_color: Option<String>,

    /// Frame lens size.
    pub frame_size: Option<String>,

    /// Frame bridge size.
    pub frame_bridge: Option<String>,

    /// Free-text description, services only.
    pub service_description: Option<String>,

    /// Whether the product is active (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Frames are the only restockable category.
    #[inline]
    pub fn is_frame(&self) -> bool {
        self.category == ProductCategory::Frame
    }

    /// Units available to sell (on hand minus reserved, never negative).
    pub fn available(&self) -> i64 {
        (self.stock - self.reserved).max(0)
    }
}

// =============================================================================
// Generic Lens Template
// =============================================================================

/// A parametrized lens template, expanded into a grade of concrete
/// power combinations.
///
/// ## Cylinder Bound Naming
/// Cylinder values are conventionally negative. `cyl_max` is the bound
/// numerically closest to zero (e.g. 0.00) and `cyl_min` the most negative
/// (e.g. -4.00); grade generation iterates `cyl_max` down to `cyl_min`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct GenericLens {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// 7-digit template code, prefix `0`. Grade barcodes derive from it.
    pub base_code: String,

    /// Commercial description (e.g. "POLY BLUE").
    pub description: String,

    /// Lens type code (e.g. "VS", "MF").
    pub lens_type: String,

    /// Refraction index identifier (e.g. "1.56").
    pub refraction_id: String,

    /// Base sale price applied to every combination.
    pub base_price: Money,

    /// Anti-reflective coating name, if any.
    pub anti_reflective: Option<String>,

    /// Photochromic treatment name, if any.
    pub photochromic: Option<String>,

    /// Fixed assembly height; defaults to "18" when absent.
    pub fixed_height: Option<String>,

    /// Manufacturing supplier reference.
    pub supplier_id: Option<String>,

    pub sph_min: Diopter,
    pub sph_max: Diopter,
    pub sph_step: Diopter,

    pub cyl_min: Diopter,
    pub cyl_max: Diopter,
    pub cyl_step: Diopter,

    pub add_min: Diopter,
    pub add_max: Diopter,
    pub add_step: Diopter,

    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Till Session
// =============================================================================

/// One cash-drawer accounting period for a store/day.
///
/// Multiple rows per store/day are kept as history (settle → reopen →
/// settle...); at most one may be `open` at a time per store, enforced by
/// the till repository and a partial unique index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TillSession {
    pub id: String,
    pub business_date: NaiveDate,
    pub store: String,

    pub opened_by: String,
    pub closed_by: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,

    /// Float the drawer starts the session with.
    pub opening: Money,

    // Per-payment-method counted totals, filled at settlement.
    pub cash: Money,
    pub check: Money,
    pub pix: Money,
    pub card: Money,
    pub voucher: Money,
    pub agreement: Money,
    pub bank: Money,
    pub installment: Money,

    /// Cash physically withdrawn during the session.
    pub cash_out: Money,
    /// Checks withdrawn during the session.
    pub check_out: Money,

    /// Physically counted total at settlement (opening + received − withdrawn).
    pub reconciled: Money,
    /// What the system expected (sum of the day's sale values for the store).
    pub expected: Money,
    /// reconciled − expected; negative means the drawer is short.
    pub shortage: Money,
    /// Amount pouched to the company safe.
    pub pouch: Money,
    /// Day-finalization balance (opening + bankable methods − withdrawals).
    pub final_balance: Money,

    pub note: Option<String>,
    pub status: TillStatus,
}

// =============================================================================
// Service Order
// =============================================================================

/// Whether an order tracks an ordinary sale or a warranty claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    #[default]
    Sale,
    /// Warranty orders carry a `GR`-suffixed code and copy the original
    /// sale's references.
    Garantia,
}

/// The work-order record tracking a sale through production and delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ServiceOrder {
    /// Store-scoped sequential code (`0100001`) or warranty code (`12GR`).
    pub os_number: String,

    /// Number of the originating sale transaction.
    pub cv_number: i64,

    pub store: String,
    pub kind: OrderKind,
    pub status: OrderStatus,

    pub customer_id: Option<String>,
    pub supplier_id: Option<String>,
    pub vendor_id: Option<String>,
    pub lab_id: Option<String>,
    pub physician_id: Option<String>,

    /// Order number quoted by the supplier for the lens purchase.
    pub supplier_order_number: Option<String>,
    /// Internal purchase-order code (`OC-2026-0001`) minted at purchase start.
    pub purchase_order: Option<String>,

    pub issued_at: DateTime<Utc>,

    /// Observation recorded when the lens is returned to procurement or the
    /// frame breaks in assembly.
    pub return_note: Option<String>,

    /// Stamped when the order starts waiting for a frame.
    pub frame_alert_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Sale Items
// =============================================================================

/// The kind of a sale line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Frame,
    LensLeft,
    LensRight,
    Service,
}

impl ItemKind {
    /// Only frames go back on the shelf when returned; lenses are
    /// made-to-order and services have no stock.
    pub const fn restocks(&self) -> bool {
        matches!(self, ItemKind::Frame)
    }
}

/// Line-item status within a sale.
///
/// The legacy wire strings are kept: `cancelado` (full return) and
/// `devolvido` (partial return).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SaleItemStatus {
    #[default]
    Active,
    Cancelado,
    Devolvido,
}

/// A line item of a sale, snapshotting product data at sale time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub cv_number: i64,
    pub product_id: Option<String>,
    pub kind: ItemKind,
    /// Description at time of sale (frozen).
    pub description: String,
    /// Unit value at time of sale (frozen).
    pub value: Money,
    pub status: SaleItemStatus,
    /// Defect description, warranty items only.
    pub defect: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Returns
// =============================================================================

/// Whether a return reverses the whole sale or selected items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ReturnKind {
    Partial,
    Total,
}

/// A return event referencing the original sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ReturnRecord {
    pub id: String,
    pub cv_number: i64,
    pub customer_id: Option<String>,
    pub kind: ReturnKind,
    /// Value credited back to the customer.
    pub credit: Money,
    pub note: Option<String>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// A returned line, copied from the sale item at time of return.
///
/// A snapshot, not a live reference: later catalog edits never alter
/// historical return records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ReturnItem {
    pub id: String,
    pub return_id: String,
    pub sale_item_id: String,
    pub kind: ItemKind,
    pub description: String,
    pub value: Money,
}

// =============================================================================
// Purchase Order
// =============================================================================

/// Minimal purchase-order record created when a service order starts its
/// supplier purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseOrder {
    pub id: String,
    /// Year-scoped code, `OC-2026-0001`.
    pub number: String,
    pub supplier_id: String,
    pub supplier_order_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_prefixes() {
        assert_eq!(ProductCategory::Lens.prefix(), '0');
        assert_eq!(ProductCategory::Frame.prefix(), '1');
        assert_eq!(ProductCategory::Service.prefix(), '2');

        assert_eq!(
            ProductCategory::from_prefix('1'),
            Some(ProductCategory::Frame)
        );
        assert_eq!(ProductCategory::from_prefix('9'), None);
    }

    #[test]
    fn test_category_code_bases() {
        assert_eq!(ProductCategory::Lens.code_base(), 0);
        assert_eq!(ProductCategory::Frame.code_base(), 1_000_000);
        assert_eq!(ProductCategory::Service.code_base(), 2_000_000);
    }

    #[test]
    fn test_item_kind_restock_policy() {
        assert!(ItemKind::Frame.restocks());
        assert!(!ItemKind::LensLeft.restocks());
        assert!(!ItemKind::LensRight.restocks());
        assert!(!ItemKind::Service.restocks());
    }
}
