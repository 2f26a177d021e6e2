//! # Service-Order Repository
//!
//! Database operations for service orders and their snapshot line items.
//!
//! ## Compare-and-Swap Transitions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              Race-Free Status Transitions                               │
//! │                                                                         │
//! │  Two stockroom screens click "receive lens" on OS 0100001:             │
//! │                                                                         │
//! │  UPDATE service_orders SET status = 'lente_recebida'                   │
//! │   WHERE os_number = '0100001' AND status = 'aguardando_lentes'         │
//! │                                                                         │
//! │  Request A: rows_affected = 1 ──► transition applied                   │
//! │  Request B: rows_affected = 0 ──► re-read status, typed               │
//! │             InvalidTransition { found: lente_recebida }                │
//! │                                                                         │
//! │  The WHERE clause carries the precondition, so check and update are    │
//! │  one atomic statement; OrderStatus::successors() is the rule source.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Creation mints the CV and OS numbers inside the same transaction as the
//! insert; UNIQUE indexes back the sequences up.

use chrono::{Datelike, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DbResult;
use optika_core::idgen::{next_cv, next_os_number, next_purchase_order_number};
use optika_core::validation::{normalize_store_code, require_text};
use optika_core::{
    CoreError, ItemKind, Money, OrderKind, OrderStatus, PurchaseOrder, SaleItem, SaleItemStatus,
    ServiceOrder,
};

const ORDER_COLS: &str = "\
    os_number, cv_number, store, kind, status, \
    customer_id, supplier_id, vendor_id, lab_id, physician_id, \
    supplier_order_number, purchase_order, issued_at, return_note, frame_alert_at";

const ITEM_COLS: &str =
    "id, cv_number, product_id, kind, description, value, status, defect, created_at";

// =============================================================================
// Input Types
// =============================================================================

/// A line of a new sale. Description and value are frozen at insert.
#[derive(Debug, Clone)]
pub struct NewSaleItem {
    pub product_id: Option<String>,
    pub kind: ItemKind,
    pub description: String,
    pub value: Money,
}

/// Input for creating a sale with its service order.
#[derive(Debug, Clone, Default)]
pub struct NewSale {
    pub store: String,
    pub customer_id: Option<String>,
    pub vendor_id: Option<String>,
    pub lab_id: Option<String>,
    pub physician_id: Option<String>,
    pub items: Vec<NewSaleItem>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for service-order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // =========================================================================
    // Sale Creation
    // =========================================================================

    /// Concludes a sale: mints the CV and OS numbers, inserts the order at
    /// `venda_concluida` with its snapshot items, and takes sold frames off
    /// the shelf. One transaction end to end.
    ///
    /// Requires an open till session for the store.
    pub async fn create_sale(&self, new: NewSale) -> DbResult<(ServiceOrder, Vec<SaleItem>)> {
        let store = normalize_store_code(&new.store)?;
        if new.items.is_empty() {
            return Err(optika_core::ValidationError::Required { field: "items" }.into());
        }

        let mut tx = self.pool.begin().await?;

        let till_open: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM till_sessions WHERE store = ?1 AND status = 'open'",
        )
        .bind(&store)
        .fetch_one(&mut *tx)
        .await?;

        if till_open == 0 {
            return Err(CoreError::NoOpenSession { store }.into());
        }

        let max_cv: Option<i64> =
            sqlx::query_scalar("SELECT MAX(cv_number) FROM service_orders WHERE kind = 'sale'")
                .fetch_one(&mut *tx)
                .await?;
        let cv_number = next_cv(max_cv);

        let max_os: Option<String> = sqlx::query_scalar(
            "SELECT MAX(os_number) FROM service_orders WHERE store = ?1 AND kind = 'sale'",
        )
        .bind(&store)
        .fetch_one(&mut *tx)
        .await?;
        let os_number = next_os_number(&store, max_os.as_deref())?;

        let order = ServiceOrder {
            os_number,
            cv_number,
            store,
            kind: OrderKind::Sale,
            status: OrderStatus::VendaConcluida,
            customer_id: new.customer_id,
            supplier_id: None,
            vendor_id: new.vendor_id,
            lab_id: new.lab_id,
            physician_id: new.physician_id,
            supplier_order_number: None,
            purchase_order: None,
            issued_at: Utc::now(),
            return_note: None,
            frame_alert_at: None,
        };

        debug!(os = %order.os_number, cv = order.cv_number, "Creating sale");
        self.insert_order(&mut tx, &order).await?;

        let mut items = Vec::with_capacity(new.items.len());
        for line in new.items {
            let item = SaleItem {
                id: Uuid::new_v4().to_string(),
                cv_number,
                product_id: line.product_id,
                kind: line.kind,
                description: line.description,
                value: line.value,
                status: SaleItemStatus::Active,
                defect: None,
                created_at: Utc::now(),
            };

            sqlx::query(
                "INSERT INTO sale_items \
                 (id, cv_number, product_id, kind, description, value, status, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(&item.id)
            .bind(item.cv_number)
            .bind(&item.product_id)
            .bind(item.kind)
            .bind(&item.description)
            .bind(item.value)
            .bind(item.status)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;

            // Sold frames leave the shelf now; lenses are made to order.
            if item.kind.restocks() {
                if let Some(product_id) = &item.product_id {
                    sqlx::query("UPDATE products SET stock = stock - 1 WHERE id = ?1")
                        .bind(product_id)
                        .execute(&mut *tx)
                        .await?;
                }
            }

            items.push(item);
        }

        tx.commit().await?;

        info!(os = %order.os_number, cv = order.cv_number, items = items.len(), "Sale concluded");
        Ok((order, items))
    }

    async fn insert_order(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        order: &ServiceOrder,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO service_orders \
             (os_number, cv_number, store, kind, status, \
              customer_id, supplier_id, vendor_id, lab_id, physician_id, \
              supplier_order_number, purchase_order, issued_at, return_note, frame_alert_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        )
        .bind(&order.os_number)
        .bind(order.cv_number)
        .bind(&order.store)
        .bind(order.kind)
        .bind(order.status)
        .bind(&order.customer_id)
        .bind(&order.supplier_id)
        .bind(&order.vendor_id)
        .bind(&order.lab_id)
        .bind(&order.physician_id)
        .bind(&order.supplier_order_number)
        .bind(&order.purchase_order)
        .bind(order.issued_at)
        .bind(&order.return_note)
        .bind(order.frame_alert_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Releases a concluded sale to procurement.
    pub async fn release_to_procurement(&self, os_number: &str) -> DbResult<ServiceOrder> {
        self.advance(
            os_number,
            &[OrderStatus::VendaConcluida],
            OrderStatus::LiberadoCompra,
            "release to procurement",
        )
        .await
    }

    /// Starts the supplier purchase: mints the next `OC-YYYY-NNNN` purchase
    /// order, records it, and moves the order to `aguardando_lentes`.
    pub async fn start_purchase(
        &self,
        os_number: &str,
        supplier_id: &str,
        supplier_order_number: Option<&str>,
    ) -> DbResult<(ServiceOrder, PurchaseOrder)> {
        require_text("supplier", supplier_id)?;

        let mut tx = self.pool.begin().await?;

        let year = Utc::now().year();
        let max_number: Option<String> =
            sqlx::query_scalar("SELECT MAX(number) FROM purchase_orders WHERE number LIKE ?1")
                .bind(format!("OC-{year}-%"))
                .fetch_one(&mut *tx)
                .await?;

        let purchase = PurchaseOrder {
            id: Uuid::new_v4().to_string(),
            number: next_purchase_order_number(year, max_number.as_deref()),
            supplier_id: supplier_id.to_string(),
            supplier_order_number: supplier_order_number.map(str::to_string),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO purchase_orders \
             (id, number, supplier_id, supplier_order_number, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&purchase.id)
        .bind(&purchase.number)
        .bind(&purchase.supplier_id)
        .bind(&purchase.supplier_order_number)
        .bind(purchase.created_at)
        .execute(&mut *tx)
        .await?;

        let updated = sqlx::query(
            "UPDATE service_orders SET \
             status = ?1, supplier_id = ?2, purchase_order = ?3, supplier_order_number = ?4 \
             WHERE os_number = ?5 AND status = ?6",
        )
        .bind(OrderStatus::AguardandoLentes)
        .bind(supplier_id)
        .bind(&purchase.number)
        .bind(supplier_order_number)
        .bind(os_number)
        .bind(OrderStatus::LiberadoCompra)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            // Roll back so the minted PO never lands, then classify.
            tx.rollback().await?;
            return Err(self.transition_failure(os_number, "start purchase").await?);
        }

        tx.commit().await?;

        info!(os = %os_number, po = %purchase.number, "Purchase started");
        let order = self.must_get(os_number).await?;
        Ok((order, purchase))
    }

    /// Records the lens arriving from the supplier.
    pub async fn receive_lens(&self, os_number: &str) -> DbResult<ServiceOrder> {
        self.advance(
            os_number,
            &[OrderStatus::AguardandoLentes],
            OrderStatus::LenteRecebida,
            "receive lens",
        )
        .await
    }

    /// Sends lens and frame together to assembly.
    pub async fn send_to_assembly(&self, os_number: &str) -> DbResult<ServiceOrder> {
        self.advance(
            os_number,
            &[OrderStatus::LenteRecebida],
            OrderStatus::ServicoEnviadoMontagem,
            "send to assembly",
        )
        .await
    }

    /// Parks the order waiting for its frame, stamping the alert time.
    pub async fn await_frame(&self, os_number: &str) -> DbResult<ServiceOrder> {
        let updated = sqlx::query(
            "UPDATE service_orders SET status = ?1, frame_alert_at = ?2 \
             WHERE os_number = ?3 AND status = ?4",
        )
        .bind(OrderStatus::ServicoAguardandoArmacao)
        .bind(Utc::now())
        .bind(os_number)
        .bind(OrderStatus::LenteRecebida)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(self.transition_failure(os_number, "await frame").await?);
        }

        self.must_get(os_number).await
    }

    /// Sends the lens back to procurement with a mandatory observation.
    pub async fn return_to_procurement(
        &self,
        os_number: &str,
        note: &str,
    ) -> DbResult<ServiceOrder> {
        require_text("observation", note)?;

        let updated = sqlx::query(
            "UPDATE service_orders SET status = ?1, return_note = ?2 \
             WHERE os_number = ?3 AND status = ?4",
        )
        .bind(OrderStatus::ServicoDevolvidoCompra)
        .bind(note)
        .bind(os_number)
        .bind(OrderStatus::LenteRecebida)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(self
                .transition_failure(os_number, "return to procurement")
                .await?);
        }

        self.must_get(os_number).await
    }

    /// Puts a procurement-returned order back in the purchase queue.
    pub async fn reactivate_procurement(&self, os_number: &str) -> DbResult<ServiceOrder> {
        self.advance(
            os_number,
            &[OrderStatus::ServicoDevolvidoCompra],
            OrderStatus::AguardandoLentes,
            "reactivate procurement",
        )
        .await
    }

    /// Sends the now-available frame to assembly.
    pub async fn send_frame_to_assembly(&self, os_number: &str) -> DbResult<ServiceOrder> {
        self.advance(
            os_number,
            &[OrderStatus::ServicoAguardandoArmacao],
            OrderStatus::ArmacaoEnviadaMontagem,
            "send frame to assembly",
        )
        .await
    }

    /// Confirms assembly, from either assembly path.
    pub async fn confirm_assembly(&self, os_number: &str) -> DbResult<ServiceOrder> {
        self.advance(
            os_number,
            &[
                OrderStatus::ServicoEnviadoMontagem,
                OrderStatus::ArmacaoEnviadaMontagem,
            ],
            OrderStatus::ServicoMontadoConferido,
            "confirm assembly",
        )
        .await
    }

    /// Marks the checked order ready for customer pickup.
    pub async fn ready_for_pickup(&self, os_number: &str) -> DbResult<ServiceOrder> {
        self.advance(
            os_number,
            &[OrderStatus::ServicoMontadoConferido],
            OrderStatus::ServicoProntoEntrega,
            "mark ready for pickup",
        )
        .await
    }

    /// Records a frame broken during assembly, with observation.
    pub async fn report_frame_breakage(
        &self,
        os_number: &str,
        note: &str,
    ) -> DbResult<ServiceOrder> {
        require_text("observation", note)?;

        let updated = sqlx::query(
            "UPDATE service_orders SET status = ?1, return_note = ?2 \
             WHERE os_number = ?3 AND status = ?4",
        )
        .bind(OrderStatus::DevolucaoQuebraArmacao)
        .bind(note)
        .bind(os_number)
        .bind(OrderStatus::ArmacaoEnviadaMontagem)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(self
                .transition_failure(os_number, "report frame breakage")
                .await?);
        }

        self.must_get(os_number).await
    }

    /// Puts a breakage-returned order back in the frame queue.
    pub async fn reactivate_after_breakage(&self, os_number: &str) -> DbResult<ServiceOrder> {
        self.advance(
            os_number,
            &[OrderStatus::DevolucaoQuebraArmacao],
            OrderStatus::ServicoAguardandoArmacao,
            "reactivate after breakage",
        )
        .await
    }

    /// Cancels a concluded sale that never entered production.
    pub async fn cancel(&self, os_number: &str) -> DbResult<ServiceOrder> {
        self.advance(
            os_number,
            &[OrderStatus::VendaConcluida],
            OrderStatus::Cancelada,
            "cancel",
        )
        .await
    }

    /// Single compare-and-swap transition. The WHERE clause carries the
    /// precondition; zero rows affected means the order is missing or in
    /// another state.
    async fn advance(
        &self,
        os_number: &str,
        from: &[OrderStatus],
        to: OrderStatus,
        action: &'static str,
    ) -> DbResult<ServiceOrder> {
        debug_assert!(from.iter().all(|f| f.can_transition_to(to)));

        let updated = match from {
            [only] => {
                sqlx::query(
                    "UPDATE service_orders SET status = ?1 \
                     WHERE os_number = ?2 AND status = ?3",
                )
                .bind(to)
                .bind(os_number)
                .bind(*only)
                .execute(&self.pool)
                .await?
            }
            [a, b] => {
                sqlx::query(
                    "UPDATE service_orders SET status = ?1 \
                     WHERE os_number = ?2 AND status IN (?3, ?4)",
                )
                .bind(to)
                .bind(os_number)
                .bind(*a)
                .bind(*b)
                .execute(&self.pool)
                .await?
            }
            _ => unreachable!("transitions have one or two source states"),
        };

        if updated.rows_affected() == 0 {
            return Err(self.transition_failure(os_number, action).await?);
        }

        debug!(os = %os_number, to = %to, "Order transitioned");
        self.must_get(os_number).await
    }

    /// Classifies a compare-and-swap miss: missing order or wrong state.
    async fn transition_failure(
        &self,
        os_number: &str,
        action: &'static str,
    ) -> DbResult<crate::error::DbError> {
        let found: Option<OrderStatus> =
            sqlx::query_scalar("SELECT status FROM service_orders WHERE os_number = ?1")
                .bind(os_number)
                .fetch_optional(&self.pool)
                .await?;

        Ok(match found {
            None => CoreError::OrderNotFound(os_number.to_string()).into(),
            Some(found) => CoreError::InvalidTransition {
                os_number: os_number.to_string(),
                found,
                action,
            }
            .into(),
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Gets an order by OS number.
    pub async fn get(&self, os_number: &str) -> DbResult<Option<ServiceOrder>> {
        let order = sqlx::query_as::<_, ServiceOrder>(&format!(
            "SELECT {ORDER_COLS} FROM service_orders WHERE os_number = ?1"
        ))
        .bind(os_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    async fn must_get(&self, os_number: &str) -> DbResult<ServiceOrder> {
        self.get(os_number)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(os_number.to_string()).into())
    }

    /// Gets the sale-kind order for a CV number.
    pub async fn get_by_cv(&self, cv_number: i64) -> DbResult<Option<ServiceOrder>> {
        let order = sqlx::query_as::<_, ServiceOrder>(&format!(
            "SELECT {ORDER_COLS} FROM service_orders \
             WHERE cv_number = ?1 AND kind = 'sale'"
        ))
        .bind(cv_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// All line items of a sale, oldest first.
    pub async fn items_of(&self, cv_number: i64) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(&format!(
            "SELECT {ITEM_COLS} FROM sale_items WHERE cv_number = ?1 ORDER BY created_at, id"
        ))
        .bind(cv_number)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Orders awaiting production dispatch (concluded or released).
    pub async fn production_monitor(&self) -> DbResult<Vec<ServiceOrder>> {
        let orders = sqlx::query_as::<_, ServiceOrder>(&format!(
            "SELECT {ORDER_COLS} FROM service_orders \
             WHERE status IN ('venda_concluida', 'liberado_compra') \
             ORDER BY issued_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Orders currently in a given status, oldest first.
    pub async fn list_by_status(&self, status: OrderStatus) -> DbResult<Vec<ServiceOrder>> {
        let orders = sqlx::query_as::<_, ServiceOrder>(&format!(
            "SELECT {ORDER_COLS} FROM service_orders WHERE status = ?1 ORDER BY issued_at"
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Orders for a store over an issue-date range, optionally filtered by
    /// customer.
    pub async fn list_between(
        &self,
        store: &str,
        from: NaiveDate,
        to: NaiveDate,
        customer_id: Option<&str>,
    ) -> DbResult<Vec<ServiceOrder>> {
        let store = normalize_store_code(store)?;

        let orders = sqlx::query_as::<_, ServiceOrder>(&format!(
            "SELECT {ORDER_COLS} FROM service_orders \
             WHERE store = ?1 \
               AND substr(issued_at, 1, 10) BETWEEN ?2 AND ?3 \
               AND (?4 IS NULL OR customer_id = ?4) \
             ORDER BY issued_at"
        ))
        .bind(&store)
        .bind(from.format("%Y-%m-%d").to_string())
        .bind(to.format("%Y-%m-%d").to_string())
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
