//! # Till Settlement Math
//!
//! Pure arithmetic for closing and finalizing till sessions. The till
//! repository feeds operator-counted amounts in and writes the results back;
//! nothing here touches a database.
//!
//! ## Settlement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Settle (close) a Session                          │
//! │                                                                         │
//! │  received   = cash + check + pix + card + voucher                      │
//! │             + agreement + bank + installment                           │
//! │  withdrawn  = cash_out + check_out                                     │
//! │  reconciled = opening + received − withdrawn                           │
//! │  shortage   = reconciled − expected     (negative ⇒ drawer short)      │
//! │                                                                         │
//! │  Day finalization counts a narrower, bankable subset:                  │
//! │  final_balance = opening + (cash + pix + card) − withdrawn             │
//! │  Checks, vouchers, agreements, bank credits and installment books      │
//! │  settle through other ledgers and never reach the treasury pouch.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All amounts are integer-centavo [`Money`]; the arithmetic is exact.

use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Close Counts
// =============================================================================

/// Operator-counted amounts entered when settling a till session.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CloseCounts {
    pub cash: Money,
    pub check: Money,
    pub pix: Money,
    pub card: Money,
    pub voucher: Money,
    pub agreement: Money,
    pub bank: Money,
    pub installment: Money,

    /// Cash withdrawn from the drawer during the session.
    pub cash_out: Money,
    /// Checks withdrawn during the session.
    pub check_out: Money,
}

impl CloseCounts {
    /// Total received across all eight payment methods.
    pub fn received(&self) -> Money {
        Money::sum([
            self.cash,
            self.check,
            self.pix,
            self.card,
            self.voucher,
            self.agreement,
            self.bank,
            self.installment,
        ])
    }

    /// Total withdrawn (cash and checks taken out of the drawer).
    pub fn withdrawn(&self) -> Money {
        self.cash_out + self.check_out
    }

    /// The bankable subset counted toward the day total: cash, pix, card.
    pub fn bankable(&self) -> Money {
        self.cash + self.pix + self.card
    }
}

// =============================================================================
// Settlement
// =============================================================================

/// Computed result of settling a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub received: Money,
    pub withdrawn: Money,
    /// Physically counted total: opening + received − withdrawn.
    pub reconciled: Money,
    /// reconciled − expected. Negative means the drawer is short.
    pub shortage: Money,
}

/// Settles a session against the system-expected total.
pub fn settle(opening: Money, counts: &CloseCounts, expected: Money) -> Settlement {
    let received = counts.received();
    let withdrawn = counts.withdrawn();
    let reconciled = opening + received - withdrawn;
    Settlement {
        received,
        withdrawn,
        reconciled,
        shortage: reconciled - expected,
    }
}

/// Day-finalization balance for one session: opening plus the bankable
/// methods, minus withdrawals.
pub fn day_final_balance(opening: Money, counts: &CloseCounts) -> Money {
    opening + counts.bankable() - counts.withdrawn()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cents(c: i64) -> Money {
        Money::from_cents(c)
    }

    #[test]
    fn test_settle_basic() {
        // cash 100.00, pix 50.00, card 30.00, opening 20.00, no withdrawals
        let counts = CloseCounts {
            cash: cents(10000),
            pix: cents(5000),
            card: cents(3000),
            ..CloseCounts::default()
        };

        let s = settle(cents(2000), &counts, cents(18000));
        assert_eq!(s.received, cents(18000));
        assert_eq!(s.reconciled, cents(20000)); // 200.00
        assert_eq!(s.shortage, cents(2000));
    }

    #[test]
    fn test_settle_all_methods_and_withdrawals() {
        let counts = CloseCounts {
            cash: cents(10000),
            check: cents(2000),
            pix: cents(5000),
            card: cents(3000),
            voucher: cents(500),
            agreement: cents(700),
            bank: cents(1500),
            installment: cents(300),
            cash_out: cents(4000),
            check_out: cents(1000),
        };

        let s = settle(cents(2000), &counts, cents(20000));
        assert_eq!(s.received, cents(23000));
        assert_eq!(s.withdrawn, cents(5000));
        assert_eq!(s.reconciled, cents(20000));
        assert_eq!(s.shortage, Money::zero());
    }

    #[test]
    fn test_shortage_can_be_negative() {
        let counts = CloseCounts {
            cash: cents(5000),
            ..CloseCounts::default()
        };
        let s = settle(Money::zero(), &counts, cents(6000));
        assert_eq!(s.shortage, cents(-1000));
        assert!(s.shortage.is_negative());
    }

    #[test]
    fn test_day_final_counts_only_bankable_methods() {
        let counts = CloseCounts {
            cash: cents(10000),
            check: cents(9999), // excluded
            pix: cents(5000),
            card: cents(3000),
            voucher: cents(9999),     // excluded
            agreement: cents(9999),   // excluded
            bank: cents(9999),        // excluded
            installment: cents(9999), // excluded
            cash_out: cents(2000),
            check_out: Money::zero(),
        };

        let balance = day_final_balance(cents(1000), &counts);
        // 10.00 + (100.00 + 50.00 + 30.00) − 20.00
        assert_eq!(balance, cents(17000));
    }
}
