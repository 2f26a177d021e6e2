//! # Till Session Repository
//!
//! Database operations for cash-drawer (till) sessions.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Till Session Lifecycle                            │
//! │                                                                         │
//! │  1. OPEN                                                               │
//! │     └── open() → TillSession { status: Open }                          │
//! │         rejected if the store already has an open session, or the      │
//! │         day was finalized                                              │
//! │                                                                         │
//! │  2. SETTLE                                                             │
//! │     └── settle() → counts the drawer against the day's sales           │
//! │         reconciled = opening + received − withdrawn                    │
//! │         shortage   = reconciled − expected                             │
//! │                                                                         │
//! │  3. (OPTIONAL) REOPEN                                                  │
//! │     └── reopen() → back to Open, settlement figures cleared            │
//! │                                                                         │
//! │  4. FINALIZE DAY                                                       │
//! │     └── finalize_day() → every open/settled session of the day goes    │
//! │         day_finalized in ONE transaction; blocks further opens today   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! At-most-one-open per store is checked inside the opening transaction and
//! backed by a partial unique index, so a racing second open fails either way.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DbResult;
use optika_core::till::{day_final_balance, settle};
use optika_core::validation::normalize_store_code;
use optika_core::{CloseCounts, CoreError, Money, TillSession, TillStatus};

/// Explicit column list shared by every session SELECT. `check` must stay
/// quoted: it is an SQL keyword.
const SESSION_COLS: &str = r#"
    id, business_date, store, opened_by, closed_by, opened_at, closed_at,
    opening, cash, "check", pix, card, voucher, agreement, bank, installment,
    cash_out, check_out, reconciled, expected, shortage, pouch, final_balance,
    note, status
"#;

/// Repository for till session operations.
#[derive(Debug, Clone)]
pub struct TillRepository {
    pool: SqlitePool,
}

impl TillRepository {
    /// Creates a new TillRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TillRepository { pool }
    }

    /// Today's business date. Every operation keys on it.
    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    // =========================================================================
    // Open
    // =========================================================================

    /// Opens a till session for a store.
    ///
    /// ## Preconditions (no row created on failure)
    /// - No `day_finalized` session for the store today (`DayAlreadyFinalized`)
    /// - No `open` session for the store (`TillAlreadyOpen`)
    pub async fn open(
        &self,
        store: &str,
        opened_by: &str,
        opening: Money,
        note: Option<&str>,
    ) -> DbResult<TillSession> {
        let store = normalize_store_code(store)?;
        let today = Self::today();

        let mut tx = self.pool.begin().await?;

        let finalized: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM till_sessions \
             WHERE store = ?1 AND business_date = ?2 AND status = 'day_finalized'",
        )
        .bind(&store)
        .bind(today)
        .fetch_one(&mut *tx)
        .await?;

        if finalized > 0 {
            return Err(CoreError::DayAlreadyFinalized { store }.into());
        }

        let already_open: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM till_sessions WHERE store = ?1 AND status = 'open'",
        )
        .bind(&store)
        .fetch_one(&mut *tx)
        .await?;

        if already_open > 0 {
            return Err(CoreError::TillAlreadyOpen { store }.into());
        }

        let session = TillSession {
            id: Uuid::new_v4().to_string(),
            business_date: today,
            store: store.clone(),
            opened_by: opened_by.to_string(),
            closed_by: None,
            opened_at: Utc::now(),
            closed_at: None,
            opening,
            cash: Money::zero(),
            check: Money::zero(),
            pix: Money::zero(),
            card: Money::zero(),
            voucher: Money::zero(),
            agreement: Money::zero(),
            bank: Money::zero(),
            installment: Money::zero(),
            cash_out: Money::zero(),
            check_out: Money::zero(),
            reconciled: Money::zero(),
            expected: Money::zero(),
            shortage: Money::zero(),
            pouch: Money::zero(),
            final_balance: Money::zero(),
            note: note.map(str::to_string),
            status: TillStatus::Open,
        };

        debug!(store = %store, id = %session.id, "Opening till session");

        sqlx::query(
            "INSERT INTO till_sessions \
             (id, business_date, store, opened_by, opened_at, opening, note, status) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'open')",
        )
        .bind(&session.id)
        .bind(session.business_date)
        .bind(&session.store)
        .bind(&session.opened_by)
        .bind(session.opened_at)
        .bind(session.opening)
        .bind(&session.note)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(store = %store, opening = %session.opening, "Till session opened");
        Ok(session)
    }

    // =========================================================================
    // Settle
    // =========================================================================

    /// Settles (counts and closes) the store's open session.
    ///
    /// The expected total is the sum of the day's active sale-item values
    /// for the store; the shortage is the counted drawer against it.
    pub async fn settle(
        &self,
        store: &str,
        closed_by: &str,
        counts: &CloseCounts,
        pouch: Money,
        note: Option<&str>,
    ) -> DbResult<TillSession> {
        let store = normalize_store_code(store)?;
        let today = Self::today();

        let mut tx = self.pool.begin().await?;

        let session: Option<TillSession> = sqlx::query_as::<_, TillSession>(&format!(
            "SELECT {SESSION_COLS} FROM till_sessions \
             WHERE store = ?1 AND business_date = ?2 AND status = 'open' \
             ORDER BY opened_at DESC LIMIT 1"
        ))
        .bind(&store)
        .bind(today)
        .fetch_optional(&mut *tx)
        .await?;

        let session = session.ok_or(CoreError::NoOpenSession {
            store: store.clone(),
        })?;

        let expected = self.expected_for_day(&mut tx, &store, today).await?;
        let result = settle(session.opening, counts, expected);

        debug!(
            store = %store,
            reconciled = %result.reconciled,
            expected = %expected,
            shortage = %result.shortage,
            "Settling till session"
        );

        let now = Utc::now();
        let updated = sqlx::query(
            "UPDATE till_sessions SET \
             cash = ?1, \"check\" = ?2, pix = ?3, card = ?4, voucher = ?5, \
             agreement = ?6, bank = ?7, installment = ?8, \
             cash_out = ?9, check_out = ?10, \
             reconciled = ?11, expected = ?12, shortage = ?13, pouch = ?14, \
             closed_by = ?15, closed_at = ?16, note = COALESCE(?17, note), \
             status = 'settled' \
             WHERE id = ?18 AND status = 'open'",
        )
        .bind(counts.cash)
        .bind(counts.check)
        .bind(counts.pix)
        .bind(counts.card)
        .bind(counts.voucher)
        .bind(counts.agreement)
        .bind(counts.bank)
        .bind(counts.installment)
        .bind(counts.cash_out)
        .bind(counts.check_out)
        .bind(result.reconciled)
        .bind(expected)
        .bind(result.shortage)
        .bind(pouch)
        .bind(closed_by)
        .bind(now)
        .bind(note)
        .bind(&session.id)
        .execute(&mut *tx)
        .await?;

        // Compare-and-swap: a concurrent settle already closed it.
        if updated.rows_affected() == 0 {
            return Err(CoreError::NoOpenSession { store }.into());
        }

        tx.commit().await?;

        info!(store = %store, shortage = %result.shortage, "Till session settled");

        Ok(TillSession {
            cash: counts.cash,
            check: counts.check,
            pix: counts.pix,
            card: counts.card,
            voucher: counts.voucher,
            agreement: counts.agreement,
            bank: counts.bank,
            installment: counts.installment,
            cash_out: counts.cash_out,
            check_out: counts.check_out,
            reconciled: result.reconciled,
            expected,
            shortage: result.shortage,
            pouch,
            closed_by: Some(closed_by.to_string()),
            closed_at: Some(now),
            note: note.map(str::to_string).or(session.note.clone()),
            status: TillStatus::Settled,
            ..session
        })
    }

    /// Sum of today's active sale-item values for the store.
    async fn expected_for_day(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        store: &str,
        date: NaiveDate,
    ) -> DbResult<Money> {
        let cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(si.value), 0) \
             FROM sale_items si \
             JOIN service_orders so \
               ON so.cv_number = si.cv_number AND so.kind = 'sale' \
             WHERE so.store = ?1 \
               AND substr(so.issued_at, 1, 10) = ?2 \
               AND si.status = 'active' \
               AND so.status != 'cancelada'",
        )
        .bind(store)
        .bind(date.format("%Y-%m-%d").to_string())
        .fetch_one(&mut **tx)
        .await?;

        Ok(Money::from_cents(cents))
    }

    // =========================================================================
    // Reopen
    // =========================================================================

    /// Reopens today's settled session with a fresh opening balance.
    ///
    /// The previous settlement's method totals, reconciled/expected/shortage
    /// figures and closing stamp are cleared; stale numbers never survive a
    /// reopen.
    pub async fn reopen(&self, store: &str, opening: Money) -> DbResult<TillSession> {
        let store = normalize_store_code(store)?;
        let today = Self::today();

        let mut tx = self.pool.begin().await?;

        let finalized: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM till_sessions \
             WHERE store = ?1 AND business_date = ?2 AND status = 'day_finalized'",
        )
        .bind(&store)
        .bind(today)
        .fetch_one(&mut *tx)
        .await?;

        if finalized > 0 {
            return Err(CoreError::DayAlreadyFinalized { store }.into());
        }

        let id: Option<String> = sqlx::query_scalar(
            "SELECT id FROM till_sessions \
             WHERE store = ?1 AND business_date = ?2 AND status = 'settled' \
             ORDER BY opened_at DESC LIMIT 1",
        )
        .bind(&store)
        .bind(today)
        .fetch_optional(&mut *tx)
        .await?;

        let id = id.ok_or(CoreError::NoSettledSession {
            store: store.clone(),
        })?;

        let updated = sqlx::query(
            "UPDATE till_sessions SET \
             opening = ?1, \
             cash = 0, \"check\" = 0, pix = 0, card = 0, voucher = 0, \
             agreement = 0, bank = 0, installment = 0, \
             cash_out = 0, check_out = 0, \
             reconciled = 0, expected = 0, shortage = 0, pouch = 0, \
             closed_by = NULL, closed_at = NULL, \
             status = 'open' \
             WHERE id = ?2 AND status = 'settled'",
        )
        .bind(opening)
        .bind(&id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(CoreError::NoSettledSession { store }.into());
        }

        let session: TillSession = sqlx::query_as::<_, TillSession>(&format!(
            "SELECT {SESSION_COLS} FROM till_sessions WHERE id = ?1"
        ))
        .bind(&id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(store = %store, "Till session reopened");
        Ok(session)
    }

    // =========================================================================
    // Finalize Day
    // =========================================================================

    /// Finalizes the store's day: every open or settled session today is
    /// stamped `day_finalized` with its bankable balance
    /// (opening + cash + pix + card − withdrawals).
    ///
    /// Runs in one transaction; a mid-batch failure leaves no partial day.
    /// A second call the same day finds nothing pending and is rejected,
    /// so totals are never re-summed.
    pub async fn finalize_day(&self, store: &str, user: &str) -> DbResult<Vec<TillSession>> {
        let store = normalize_store_code(store)?;
        let today = Self::today();

        let mut tx = self.pool.begin().await?;

        let pending: Vec<TillSession> = sqlx::query_as::<_, TillSession>(&format!(
            "SELECT {SESSION_COLS} FROM till_sessions \
             WHERE store = ?1 AND business_date = ?2 AND status IN ('open', 'settled') \
             ORDER BY opened_at"
        ))
        .bind(&store)
        .bind(today)
        .fetch_all(&mut *tx)
        .await?;

        if pending.is_empty() {
            return Err(CoreError::NothingToFinalize { store }.into());
        }

        let now = Utc::now();
        let mut finalized = Vec::with_capacity(pending.len());

        for session in pending {
            let counts = counts_of(&session);
            let balance = day_final_balance(session.opening, &counts);

            sqlx::query(
                "UPDATE till_sessions SET \
                 final_balance = ?1, \
                 closed_by = COALESCE(closed_by, ?2), \
                 closed_at = COALESCE(closed_at, ?3), \
                 status = 'day_finalized' \
                 WHERE id = ?4",
            )
            .bind(balance)
            .bind(user)
            .bind(now)
            .bind(&session.id)
            .execute(&mut *tx)
            .await?;

            finalized.push(TillSession {
                final_balance: balance,
                closed_by: session.closed_by.clone().or_else(|| Some(user.to_string())),
                closed_at: session.closed_at.or(Some(now)),
                status: TillStatus::DayFinalized,
                ..session
            });
        }

        tx.commit().await?;

        info!(
            store = %store,
            sessions = finalized.len(),
            "Day finalized"
        );
        Ok(finalized)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// The store's open session, if any.
    pub async fn open_session(&self, store: &str) -> DbResult<Option<TillSession>> {
        let store = normalize_store_code(store)?;

        let session = sqlx::query_as::<_, TillSession>(&format!(
            "SELECT {SESSION_COLS} FROM till_sessions \
             WHERE store = ?1 AND status = 'open' LIMIT 1"
        ))
        .bind(&store)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// The store's latest session today (any status), if any.
    pub async fn current(&self, store: &str) -> DbResult<Option<TillSession>> {
        let store = normalize_store_code(store)?;

        let session = sqlx::query_as::<_, TillSession>(&format!(
            "SELECT {SESSION_COLS} FROM till_sessions \
             WHERE store = ?1 AND business_date = ?2 \
             ORDER BY opened_at DESC LIMIT 1"
        ))
        .bind(&store)
        .bind(Self::today())
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Sessions for a store over a date range, oldest first.
    pub async fn list_between(
        &self,
        store: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<TillSession>> {
        let store = normalize_store_code(store)?;

        let sessions = sqlx::query_as::<_, TillSession>(&format!(
            "SELECT {SESSION_COLS} FROM till_sessions \
             WHERE store = ?1 AND business_date BETWEEN ?2 AND ?3 \
             ORDER BY business_date, opened_at"
        ))
        .bind(&store)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    /// Total finalized balance for a store and date.
    pub async fn day_total(&self, store: &str, date: NaiveDate) -> DbResult<Money> {
        let store = normalize_store_code(store)?;

        let cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(final_balance), 0) FROM till_sessions \
             WHERE store = ?1 AND business_date = ?2 AND status = 'day_finalized'",
        )
        .bind(&store)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_cents(cents))
    }
}

/// The counted amounts stored on a session row, as a [`CloseCounts`].
fn counts_of(session: &TillSession) -> CloseCounts {
    CloseCounts {
        cash: session.cash,
        check: session.check,
        pix: session.pix,
        card: session.card,
        voucher: session.voucher,
        agreement: session.agreement,
        bank: session.bank,
        installment: session.installment,
        cash_out: session.cash_out,
        check_out: session.check_out,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn cents(c: i64) -> Money {
        Money::from_cents(c)
    }

    #[tokio::test]
    async fn test_open_and_query() {
        let db = db().await;
        let tills = db.tills();

        let session = tills.open("01", "user-1", cents(2000), None).await.unwrap();
        assert_eq!(session.status, TillStatus::Open);
        assert_eq!(session.opening, cents(2000));

        let found = tills.open_session("01").await.unwrap().unwrap();
        assert_eq!(found.id, session.id);
        assert_eq!(found.opening, cents(2000));
    }

    #[tokio::test]
    async fn test_second_open_rejected() {
        let db = db().await;
        let tills = db.tills();

        tills.open("01", "user-1", cents(1000), None).await.unwrap();
        let err = tills.open("01", "user-2", cents(500), None).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::TillAlreadyOpen { .. })
        ));

        // Another store is unaffected.
        tills.open("02", "user-2", cents(500), None).await.unwrap();
    }

    #[tokio::test]
    async fn test_settle_reconciles_drawer() {
        let db = db().await;
        let tills = db.tills();

        // cash 100.00, pix 50.00, card 30.00 over a 20.00 float
        tills.open("01", "user-1", cents(2000), None).await.unwrap();
        let counts = CloseCounts {
            cash: cents(10000),
            pix: cents(5000),
            card: cents(3000),
            ..CloseCounts::default()
        };

        let settled = tills
            .settle("01", "user-1", &counts, Money::zero(), None)
            .await
            .unwrap();

        assert_eq!(settled.status, TillStatus::Settled);
        assert_eq!(settled.reconciled, cents(20000)); // 200.00
        // No sales recorded, so the whole count is surplus.
        assert_eq!(settled.expected, Money::zero());
        assert_eq!(settled.shortage, cents(20000));

        // Same figures persisted, not only returned.
        let row = tills.current("01").await.unwrap().unwrap();
        assert_eq!(row.reconciled, cents(20000));
        assert_eq!(row.cash, cents(10000));
    }

    #[tokio::test]
    async fn test_expected_total_comes_from_the_days_sales() {
        use crate::repository::order::{NewSale, NewSaleItem};
        use optika_core::ItemKind;

        let db = db().await;
        let tills = db.tills();

        tills.open("01", "user-1", cents(2000), None).await.unwrap();

        // One sale worth 180.00 today.
        db.orders()
            .create_sale(NewSale {
                store: "01".to_string(),
                items: vec![
                    NewSaleItem {
                        product_id: None,
                        kind: ItemKind::LensLeft,
                        description: "LG POLY VS".to_string(),
                        value: cents(9000),
                    },
                    NewSaleItem {
                        product_id: None,
                        kind: ItemKind::LensRight,
                        description: "LG POLY VS".to_string(),
                        value: cents(9000),
                    },
                ],
                ..NewSale::default()
            })
            .await
            .unwrap();

        let counts = CloseCounts {
            cash: cents(10000),
            pix: cents(5000),
            card: cents(3000),
            ..CloseCounts::default()
        };
        let settled = tills
            .settle("01", "user-1", &counts, Money::zero(), None)
            .await
            .unwrap();

        assert_eq!(settled.expected, cents(18000));
        assert_eq!(settled.reconciled, cents(20000));
        // 200.00 counted, 180.00 expected: the 20.00 float accounts for it.
        assert_eq!(settled.shortage, cents(2000));
    }

    #[tokio::test]
    async fn test_settle_requires_open_session() {
        let db = db().await;
        let err = db
            .tills()
            .settle("01", "u", &CloseCounts::default(), Money::zero(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::NoOpenSession { .. })));
    }

    #[tokio::test]
    async fn test_reopen_clears_settlement() {
        let db = db().await;
        let tills = db.tills();

        tills.open("01", "user-1", cents(1000), None).await.unwrap();
        let counts = CloseCounts {
            cash: cents(5000),
            ..CloseCounts::default()
        };
        tills
            .settle("01", "user-1", &counts, Money::zero(), None)
            .await
            .unwrap();

        let reopened = tills.reopen("01", cents(3000)).await.unwrap();
        assert_eq!(reopened.status, TillStatus::Open);
        assert_eq!(reopened.opening, cents(3000));
        assert_eq!(reopened.cash, Money::zero());
        assert_eq!(reopened.reconciled, Money::zero());
        assert!(reopened.closed_by.is_none());
        assert!(reopened.closed_at.is_none());
    }

    #[tokio::test]
    async fn test_reopen_requires_settled_session() {
        let db = db().await;
        let tills = db.tills();

        let err = tills.reopen("01", cents(100)).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::NoSettledSession { .. })
        ));

        // An open (not settled) session is not reopenable either.
        tills.open("01", "u", cents(100), None).await.unwrap();
        let err = tills.reopen("01", cents(100)).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::NoSettledSession { .. })
        ));
    }

    #[tokio::test]
    async fn test_finalize_day_and_blocks_reopen() {
        let db = db().await;
        let tills = db.tills();

        tills.open("01", "user-1", cents(1000), None).await.unwrap();
        let counts = CloseCounts {
            cash: cents(10000),
            pix: cents(5000),
            card: cents(3000),
            check: cents(9999), // not bankable, excluded from the day total
            cash_out: cents(2000),
            ..CloseCounts::default()
        };
        tills
            .settle("01", "user-1", &counts, Money::zero(), None)
            .await
            .unwrap();

        let finalized = tills.finalize_day("01", "manager").await.unwrap();
        assert_eq!(finalized.len(), 1);
        // 10.00 + (100.00 + 50.00 + 30.00) − 20.00
        assert_eq!(finalized[0].final_balance, cents(17000));
        assert_eq!(finalized[0].status, TillStatus::DayFinalized);

        assert_eq!(
            tills.day_total("01", Utc::now().date_naive()).await.unwrap(),
            cents(17000)
        );

        // A finalized day admits no new session and no reopen.
        let err = tills.open("01", "u", cents(100), None).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::DayAlreadyFinalized { .. })
        ));
        let err = tills.reopen("01", cents(100)).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::DayAlreadyFinalized { .. })
        ));
    }

    #[tokio::test]
    async fn test_second_finalize_rejected() {
        let db = db().await;
        let tills = db.tills();

        tills.open("01", "u", cents(1000), None).await.unwrap();
        tills.finalize_day("01", "manager").await.unwrap();

        let err = tills.finalize_day("01", "manager").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::NothingToFinalize { .. })
        ));

        // Totals untouched by the rejected second run.
        let row = tills.current("01").await.unwrap().unwrap();
        assert_eq!(row.final_balance, cents(1000));
    }

    #[tokio::test]
    async fn test_history_rows_accumulate() {
        let db = db().await;
        let tills = db.tills();
        let today = Utc::now().date_naive();

        // settle, then a fresh open makes a second history row
        tills.open("01", "u", cents(1000), None).await.unwrap();
        tills
            .settle("01", "u", &CloseCounts::default(), Money::zero(), None)
            .await
            .unwrap();
        tills.open("01", "u", cents(500), None).await.unwrap();

        let rows = tills.list_between("01", today, today).await.unwrap();
        assert_eq!(rows.len(), 2);
    }
}
