//! # Roles & Capabilities
//!
//! Closed role set with an explicit capability check. The caller passes the
//! operator's role and the check is a total function over a fixed matrix.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};

/// Operator role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System owner; can do everything, including voiding fiscal coupons.
    Master,
    Admin,
    Cashier,
    Vendor,
    Stockroom,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Master => "master",
            Role::Admin => "admin",
            Role::Cashier => "cashier",
            Role::Vendor => "vendor",
            Role::Stockroom => "stockroom",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an operation requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Open, settle, reopen a till session; register sales and returns.
    OperateTill,
    /// Finalize the whole day's sessions.
    FinalizeDay,
    /// Advance procurement/assembly states of a service order.
    AdvanceProduction,
    /// Create and edit catalog products and lens templates.
    ManageCatalog,
    /// Void an issued fiscal coupon. Master only.
    VoidFiscalCoupon,
}

/// Whether `role` carries `capability`.
pub fn allows(role: Role, capability: Capability) -> bool {
    use Capability::*;
    use Role::*;
    match capability {
        OperateTill => matches!(role, Master | Admin | Cashier),
        FinalizeDay => matches!(role, Master | Admin),
        AdvanceProduction => matches!(role, Master | Admin | Stockroom),
        ManageCatalog => matches!(role, Master | Admin),
        VoidFiscalCoupon => matches!(role, Master),
    }
}

/// Checks a capability, producing a typed error naming the denied action.
pub fn require(role: Role, capability: Capability, action: &'static str) -> CoreResult<()> {
    if allows(role, capability) {
        Ok(())
    } else {
        Err(CoreError::Forbidden {
            role: role.to_string(),
            action,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_till_operation_roles() {
        assert!(allows(Role::Cashier, Capability::OperateTill));
        assert!(allows(Role::Admin, Capability::OperateTill));
        assert!(!allows(Role::Vendor, Capability::OperateTill));
        assert!(!allows(Role::Stockroom, Capability::OperateTill));
    }

    #[test]
    fn test_only_master_voids_coupons() {
        assert!(allows(Role::Master, Capability::VoidFiscalCoupon));
        for role in [Role::Admin, Role::Cashier, Role::Vendor, Role::Stockroom] {
            assert!(!allows(role, Capability::VoidFiscalCoupon));
        }
    }

    #[test]
    fn test_stockroom_advances_production() {
        assert!(allows(Role::Stockroom, Capability::AdvanceProduction));
        assert!(!allows(Role::Cashier, Capability::AdvanceProduction));
    }

    #[test]
    fn test_require_produces_typed_error() {
        let err = require(Role::Vendor, Capability::FinalizeDay, "finalize the day")
            .unwrap_err();
        assert_eq!(err.to_string(), "role 'vendor' may not finalize the day");
    }
}
