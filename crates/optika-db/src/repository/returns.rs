//! # Return & Warranty Repository
//!
//! Database operations for sale returns and warranty claims.
//!
//! ## Return Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Return Processing                                │
//! │                                                                         │
//! │  FULL RETURN (CV 42)                                                   │
//! │    every active item  ──► status 'cancelado'                           │
//! │    frame items        ──► stock + 1 each                               │
//! │    the order          ──► status 'cancelada'                           │
//! │    credit             ──► Σ all item values                            │
//! │                                                                         │
//! │  PARTIAL RETURN (CV 42, selected items)                                │
//! │    selected items     ──► status 'devolvido'                           │
//! │    selected frames    ──► stock + 1 each                               │
//! │    the order          ──► untouched                                    │
//! │    credit             ──► Σ selected values                            │
//! │                                                                         │
//! │  Either way the ReturnRecord and its per-line snapshots land in the    │
//! │  same transaction as the stock and status mutations.                   │
//! │                                                                         │
//! │  WARRANTY (CV 42)                                                     │
//! │    mints next 'NGR' code, copies the sale's references into a new      │
//! │    garantia-kind order, tags the claimed items with their defect;      │
//! │    a frame that stayed in store goes back on the shelf immediately     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lenses are made to order and services have no stock, so only frames
//! restock. Cancelling supplier production is out of scope here.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use optika_core::idgen::next_warranty_code;
use optika_core::validation::require_text;
use optika_core::{
    CoreError, Money, OrderKind, OrderStatus, ReturnItem, ReturnKind, ReturnRecord, SaleItem,
    SaleItemStatus, ServiceOrder,
};

const ORDER_COLS: &str = "\
    os_number, cv_number, store, kind, status, \
    customer_id, supplier_id, vendor_id, lab_id, physician_id, \
    supplier_order_number, purchase_order, issued_at, return_note, frame_alert_at";

const ITEM_COLS: &str =
    "id, cv_number, product_id, kind, description, value, status, defect, created_at";

/// One claimed line of a warranty request.
#[derive(Debug, Clone)]
pub struct WarrantyItem {
    pub sale_item_id: String,
    pub defect: String,
}

/// Repository for return and warranty operations.
#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
}

impl ReturnRepository {
    /// Creates a new ReturnRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReturnRepository { pool }
    }

    // =========================================================================
    // Full Return
    // =========================================================================

    /// Reverses a whole sale: every active item is cancelled, frames go back
    /// on the shelf, the order is cancelled, and the full value is credited.
    pub async fn full_return(
        &self,
        cv_number: i64,
        user_id: &str,
        note: Option<&str>,
    ) -> DbResult<ReturnRecord> {
        let mut tx = self.pool.begin().await?;

        let order = self.sale_order(&mut tx, cv_number).await?;

        let items: Vec<SaleItem> = sqlx::query_as::<_, SaleItem>(&format!(
            "SELECT {ITEM_COLS} FROM sale_items \
             WHERE cv_number = ?1 AND status = 'active' ORDER BY created_at, id"
        ))
        .bind(cv_number)
        .fetch_all(&mut *tx)
        .await?;

        if items.is_empty() {
            return Err(CoreError::NoItemsSelected.into());
        }

        for item in &items {
            self.take_back(&mut tx, item, SaleItemStatus::Cancelado)
                .await?;
        }

        // The whole sale is undone; the order leaves the pipeline.
        sqlx::query("UPDATE service_orders SET status = ?1 WHERE os_number = ?2")
            .bind(OrderStatus::Cancelada)
            .bind(&order.os_number)
            .execute(&mut *tx)
            .await?;

        let credit = Money::sum(items.iter().map(|i| i.value));
        let record = self
            .record_return(
                &mut tx,
                &order,
                ReturnKind::Total,
                credit,
                &items,
                user_id,
                note,
            )
            .await?;

        tx.commit().await?;

        info!(cv = cv_number, credit = %credit, "Full return processed");
        Ok(record)
    }

    // =========================================================================
    // Partial Return
    // =========================================================================

    /// Reverses selected items of a sale. The order keeps its status; only
    /// the selected lines are marked `devolvido` and credited.
    pub async fn partial_return(
        &self,
        cv_number: i64,
        item_ids: &[String],
        user_id: &str,
        note: Option<&str>,
    ) -> DbResult<ReturnRecord> {
        if item_ids.is_empty() {
            return Err(CoreError::NoItemsSelected.into());
        }

        let mut tx = self.pool.begin().await?;

        let order = self.sale_order(&mut tx, cv_number).await?;

        let mut items = Vec::with_capacity(item_ids.len());
        for id in item_ids {
            let item: Option<SaleItem> = sqlx::query_as::<_, SaleItem>(&format!(
                "SELECT {ITEM_COLS} FROM sale_items \
                 WHERE id = ?1 AND cv_number = ?2 AND status = 'active'"
            ))
            .bind(id)
            .bind(cv_number)
            .fetch_optional(&mut *tx)
            .await?;

            let item = item.ok_or_else(|| DbError::not_found("sale item", id))?;
            self.take_back(&mut tx, &item, SaleItemStatus::Devolvido)
                .await?;
            items.push(item);
        }

        let credit = Money::sum(items.iter().map(|i| i.value));
        let record = self
            .record_return(
                &mut tx,
                &order,
                ReturnKind::Partial,
                credit,
                &items,
                user_id,
                note,
            )
            .await?;

        tx.commit().await?;

        info!(cv = cv_number, items = items.len(), credit = %credit, "Partial return processed");
        Ok(record)
    }

    /// Marks one item returned and restocks it when it is a frame.
    async fn take_back(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        item: &SaleItem,
        status: SaleItemStatus,
    ) -> DbResult<()> {
        sqlx::query("UPDATE sale_items SET status = ?1 WHERE id = ?2")
            .bind(status)
            .bind(&item.id)
            .execute(&mut **tx)
            .await?;

        if item.kind.restocks() {
            if let Some(product_id) = &item.product_id {
                debug!(product_id = %product_id, "Restocking returned frame");
                sqlx::query("UPDATE products SET stock = stock + 1 WHERE id = ?1")
                    .bind(product_id)
                    .execute(&mut **tx)
                    .await?;
            }
        }

        Ok(())
    }

    /// Writes the return record and its per-line snapshots.
    #[allow(clippy::too_many_arguments)]
    async fn record_return(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        order: &ServiceOrder,
        kind: ReturnKind,
        credit: Money,
        items: &[SaleItem],
        user_id: &str,
        note: Option<&str>,
    ) -> DbResult<ReturnRecord> {
        let record = ReturnRecord {
            id: Uuid::new_v4().to_string(),
            cv_number: order.cv_number,
            customer_id: order.customer_id.clone(),
            kind,
            credit,
            note: note.map(str::to_string),
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO returns \
             (id, cv_number, customer_id, kind, credit, note, user_id, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&record.id)
        .bind(record.cv_number)
        .bind(&record.customer_id)
        .bind(record.kind)
        .bind(record.credit)
        .bind(&record.note)
        .bind(&record.user_id)
        .bind(record.created_at)
        .execute(&mut **tx)
        .await?;

        for item in items {
            sqlx::query(
                "INSERT INTO return_items \
                 (id, return_id, sale_item_id, kind, description, value) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&record.id)
            .bind(&item.id)
            .bind(item.kind)
            .bind(&item.description)
            .bind(item.value)
            .execute(&mut **tx)
            .await?;
        }

        Ok(record)
    }

    // =========================================================================
    // Warranty
    // =========================================================================

    /// Opens a warranty claim on a sale: mints the next `NGR` code, copies
    /// the sale's references into a new garantia-kind order and tags the
    /// claimed items with their defect. A frame that stayed in store goes
    /// back on the shelf.
    pub async fn warranty(
        &self,
        cv_number: i64,
        items: &[WarrantyItem],
        frame_stayed_in_store: bool,
        user_id: &str,
    ) -> DbResult<ServiceOrder> {
        if items.is_empty() {
            return Err(CoreError::NoItemsSelected.into());
        }
        for item in items {
            require_text("defect", &item.defect)?;
        }

        let mut tx = self.pool.begin().await?;

        let original = self.sale_order(&mut tx, cv_number).await?;

        // Warranty codes sort numerically, not lexically ('9GR' > '12GR'),
        // so take the max of the numeric prefix.
        let max_code: Option<String> = sqlx::query_scalar(
            "SELECT os_number FROM service_orders WHERE kind = 'garantia' \
             ORDER BY CAST(os_number AS INTEGER) DESC LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?;

        let claim = ServiceOrder {
            os_number: next_warranty_code(max_code.as_deref()),
            cv_number: original.cv_number,
            store: original.store.clone(),
            kind: OrderKind::Garantia,
            status: OrderStatus::Garantia,
            customer_id: original.customer_id.clone(),
            supplier_id: None,
            vendor_id: original.vendor_id.clone(),
            lab_id: original.lab_id.clone(),
            physician_id: original.physician_id.clone(),
            supplier_order_number: None,
            purchase_order: None,
            issued_at: Utc::now(),
            return_note: None,
            frame_alert_at: None,
        };

        sqlx::query(
            "INSERT INTO service_orders \
             (os_number, cv_number, store, kind, status, \
              customer_id, vendor_id, lab_id, physician_id, issued_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&claim.os_number)
        .bind(claim.cv_number)
        .bind(&claim.store)
        .bind(claim.kind)
        .bind(claim.status)
        .bind(&claim.customer_id)
        .bind(&claim.vendor_id)
        .bind(&claim.lab_id)
        .bind(&claim.physician_id)
        .bind(claim.issued_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            let updated = sqlx::query(
                "UPDATE sale_items SET defect = ?1 WHERE id = ?2 AND cv_number = ?3",
            )
            .bind(&item.defect)
            .bind(&item.sale_item_id)
            .bind(cv_number)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(DbError::not_found("sale item", &item.sale_item_id));
            }

            if frame_stayed_in_store {
                // Only the frame line can go back on the shelf.
                sqlx::query(
                    "UPDATE products SET stock = stock + 1 \
                     WHERE id = (SELECT product_id FROM sale_items \
                                 WHERE id = ?1 AND kind = 'frame' AND product_id IS NOT NULL)",
                )
                .bind(&item.sale_item_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        info!(cv = cv_number, code = %claim.os_number, user = %user_id, "Warranty claim opened");
        Ok(claim)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Return events for a sale, oldest first.
    pub async fn list_for_sale(&self, cv_number: i64) -> DbResult<Vec<ReturnRecord>> {
        let records = sqlx::query_as::<_, ReturnRecord>(
            "SELECT id, cv_number, customer_id, kind, credit, note, user_id, created_at \
             FROM returns WHERE cv_number = ?1 ORDER BY created_at, id",
        )
        .bind(cv_number)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Snapshot lines of one return event.
    pub async fn items_of(&self, return_id: &str) -> DbResult<Vec<ReturnItem>> {
        let items = sqlx::query_as::<_, ReturnItem>(
            "SELECT id, return_id, sale_item_id, kind, description, value \
             FROM return_items WHERE return_id = ?1 ORDER BY id",
        )
        .bind(return_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// The sale-kind order for a CV, inside the caller's transaction.
    async fn sale_order(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        cv_number: i64,
    ) -> DbResult<ServiceOrder> {
        let order: Option<ServiceOrder> = sqlx::query_as::<_, ServiceOrder>(&format!(
            "SELECT {ORDER_COLS} FROM service_orders \
             WHERE cv_number = ?1 AND kind = 'sale'"
        ))
        .bind(cv_number)
        .fetch_optional(&mut **tx)
        .await?;

        order.ok_or_else(|| CoreError::SaleNotFound(cv_number).into())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::order::{NewSale, NewSaleItem};
    use crate::repository::product::NewFrame;
    use optika_core::ItemKind;

    /// A sale of one frame (100.00, from stock) and two lenses (50.00 each).
    async fn sale_with_frame(db: &Database) -> (ServiceOrder, Vec<SaleItem>, String) {
        db.tills()
            .open("01", "cashier", Money::zero(), None)
            .await
            .unwrap();

        let frame = db
            .products()
            .create_frame(NewFrame {
                name: "PCAR 6225".to_string(),
                stock: 5,
                ..NewFrame::default()
            })
            .await
            .unwrap();

        let (order, items) = db
            .orders()
            .create_sale(NewSale {
                store: "01".to_string(),
                customer_id: Some("cust-1".to_string()),
                items: vec![
                    NewSaleItem {
                        product_id: Some(frame.id.clone()),
                        kind: ItemKind::Frame,
                        description: frame.name.clone(),
                        value: Money::from_cents(10000),
                    },
                    NewSaleItem {
                        product_id: None,
                        kind: ItemKind::LensLeft,
                        description: "LG POLY VS".to_string(),
                        value: Money::from_cents(5000),
                    },
                    NewSaleItem {
                        product_id: None,
                        kind: ItemKind::LensRight,
                        description: "LG POLY VS".to_string(),
                        value: Money::from_cents(5000),
                    },
                ],
                ..NewSale::default()
            })
            .await
            .unwrap();

        (order, items, frame.id)
    }

    async fn frame_stock(db: &Database, id: &str) -> i64 {
        db.products().get_by_id(id).await.unwrap().unwrap().stock
    }

    #[tokio::test]
    async fn test_full_return() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (order, _, frame_id) = sale_with_frame(&db).await;
        assert_eq!(frame_stock(&db, &frame_id).await, 4); // sold one

        let record = db
            .returns()
            .full_return(order.cv_number, "user-1", Some("customer gave up"))
            .await
            .unwrap();

        assert_eq!(record.kind, ReturnKind::Total);
        assert_eq!(record.credit, Money::from_cents(20000));

        // Exactly one frame back on the shelf.
        assert_eq!(frame_stock(&db, &frame_id).await, 5);

        // Every item cancelled, order cancelled.
        let items = db.orders().items_of(order.cv_number).await.unwrap();
        assert!(items.iter().all(|i| i.status == SaleItemStatus::Cancelado));
        let order = db.orders().get(&order.os_number).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelada);

        // Snapshots recorded.
        let snapshots = db.returns().items_of(&record.id).await.unwrap();
        assert_eq!(snapshots.len(), 3);
    }

    #[tokio::test]
    async fn test_partial_return_frame_only() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (order, items, frame_id) = sale_with_frame(&db).await;

        let frame_item = items
            .iter()
            .find(|i| i.kind == ItemKind::Frame)
            .unwrap()
            .id
            .clone();

        let record = db
            .returns()
            .partial_return(order.cv_number, &[frame_item.clone()], "user-1", None)
            .await
            .unwrap();

        assert_eq!(record.kind, ReturnKind::Partial);
        assert_eq!(record.credit, Money::from_cents(10000));
        assert_eq!(frame_stock(&db, &frame_id).await, 5);

        // Only that item is devolvido; the order keeps its status.
        let items = db.orders().items_of(order.cv_number).await.unwrap();
        for item in &items {
            if item.id == frame_item {
                assert_eq!(item.status, SaleItemStatus::Devolvido);
            } else {
                assert_eq!(item.status, SaleItemStatus::Active);
            }
        }
        let order = db.orders().get(&order.os_number).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::VendaConcluida);
    }

    #[tokio::test]
    async fn test_partial_return_rejects_empty_selection() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (order, _, _) = sale_with_frame(&db).await;

        let err = db
            .returns()
            .partial_return(order.cv_number, &[], "user-1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::NoItemsSelected)));
    }

    #[tokio::test]
    async fn test_return_unknown_sale() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db.returns().full_return(999, "user-1", None).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::SaleNotFound(999))));
    }

    #[tokio::test]
    async fn test_returned_item_cannot_return_twice() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (order, items, _) = sale_with_frame(&db).await;
        let frame_item = items
            .iter()
            .find(|i| i.kind == ItemKind::Frame)
            .unwrap()
            .id
            .clone();

        db.returns()
            .partial_return(order.cv_number, &[frame_item.clone()], "user-1", None)
            .await
            .unwrap();

        // No longer active, so the second attempt does not find it.
        let err = db
            .returns()
            .partial_return(order.cv_number, &[frame_item], "user-1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_warranty_claim() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (order, items, frame_id) = sale_with_frame(&db).await;
        let frame_item = items.iter().find(|i| i.kind == ItemKind::Frame).unwrap();

        let claim = db
            .returns()
            .warranty(
                order.cv_number,
                &[WarrantyItem {
                    sale_item_id: frame_item.id.clone(),
                    defect: "hinge loose".to_string(),
                }],
                true,
                "user-1",
            )
            .await
            .unwrap();

        assert_eq!(claim.os_number, "1GR");
        assert_eq!(claim.kind, OrderKind::Garantia);
        assert_eq!(claim.status, OrderStatus::Garantia);
        assert_eq!(claim.cv_number, order.cv_number);
        assert_eq!(claim.customer_id, order.customer_id);

        // The frame stayed in store and went back on the shelf.
        assert_eq!(frame_stock(&db, &frame_id).await, 5);

        // The claimed item carries its defect.
        let items = db.orders().items_of(order.cv_number).await.unwrap();
        let tagged = items.iter().find(|i| i.id == frame_item.id).unwrap();
        assert_eq!(tagged.defect.as_deref(), Some("hinge loose"));

        // A second claim on the same sale mints the next code.
        let second = db
            .returns()
            .warranty(
                order.cv_number,
                &[WarrantyItem {
                    sale_item_id: frame_item.id.clone(),
                    defect: "lens coating peeling".to_string(),
                }],
                false,
                "user-1",
            )
            .await
            .unwrap();
        assert_eq!(second.os_number, "2GR");
    }
}
