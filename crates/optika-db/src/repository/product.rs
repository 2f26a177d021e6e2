//! # Product Catalog Repository
//!
//! Database operations for frames, services and generic-lens templates.
//!
//! ## Barcode-Prefix Dispatch
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Scanned-Code Lookup                                  │
//! │                                                                         │
//! │  get_by_barcode("1000042")                                             │
//! │       │                                                                 │
//! │       ├── '0' ──► generic_lenses (template; concrete items live in     │
//! │       │           the grade archive, not here)                         │
//! │       ├── '1' ──► products (frame: stock, reserve, frame attributes)   │
//! │       └── '2' ──► products (service: description)                      │
//! │                                                                         │
//! │  Minting: SELECT MAX(code with prefix) and insert happen inside one    │
//! │  transaction; the UNIQUE constraint catches any surviving race.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DbResult;
use optika_core::idgen::next_product_code;
use optika_core::validation::{require_text, validate_barcode};
use optika_core::{Diopter, GenericLens, Money, Product, ProductCategory};

const PRODUCT_COLS: &str = "\
    id, barcode, name, category, cost, stock, reserved, \
    frame_style, frame_initials, frame_piece, frame_color, frame_size, frame_bridge, \
    service_description, is_active, created_at, updated_at";

const LENS_COLS: &str = "\
    id, base_code, description, lens_type, refraction_id, base_price, \
    anti_reflective, photochromic, fixed_height, supplier_id, \
    sph_min, sph_max, sph_step, cyl_min, cyl_max, cyl_step, \
    add_min, add_max, add_step, created_at";

// =============================================================================
// Input Types
// =============================================================================

/// Input for creating a frame product. The barcode is minted, never supplied.
#[derive(Debug, Clone, Default)]
pub struct NewFrame {
    pub name: String,
    pub cost: Money,
    pub stock: i64,
    pub style: Option<String>,
    pub initials: Option<String>,
    pub piece: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub bridge: Option<String>,
}

/// Input for creating a service product.
#[derive(Debug, Clone, Default)]
pub struct NewService {
    pub name: String,
    pub cost: Money,
    pub description: Option<String>,
}

/// Input for creating a generic-lens template.
#[derive(Debug, Clone)]
pub struct NewGenericLens {
    pub description: String,
    pub lens_type: String,
    pub refraction_id: String,
    pub base_price: Money,
    pub anti_reflective: Option<String>,
    pub photochromic: Option<String>,
    pub fixed_height: Option<String>,
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
}

/// What a scanned barcode resolves to.
#[derive(Debug, Clone)]
pub enum CatalogEntry {
    Frame(Product),
    Service(Product),
    LensTemplate(GenericLens),
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    // =========================================================================
    // Creation (code minting)
    // =========================================================================

    /// Creates a frame, minting the next `1xxxxxx` barcode.
    pub async fn create_frame(&self, new: NewFrame) -> DbResult<Product> {
        require_text("name", &new.name)?;

        let mut tx = self.pool.begin().await?;

        let barcode = self
            .mint_barcode(&mut tx, ProductCategory::Frame)
            .await?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            barcode,
            name: new.name,
            category: ProductCategory::Frame,
            cost: new.cost,
            stock: new.stock,
            reserved: 0,
            frame_style: new.style,
            frame_initials: new.initials,
            frame_piece: new.piece,
            frame_color: new.color,
            frame_size: new.size,
            frame_bridge: new.bridge,
            service_description: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.insert_product(&mut tx, &product).await?;
        tx.commit().await?;

        info!(barcode = %product.barcode, name = %product.name, "Frame created");
        Ok(product)
    }

    /// Creates a service, minting the next `2xxxxxx` barcode.
    pub async fn create_service(&self, new: NewService) -> DbResult<Product> {
        require_text("name", &new.name)?;

        let mut tx = self.pool.begin().await?;

        let barcode = self
            .mint_barcode(&mut tx, ProductCategory::Service)
            .await?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            barcode,
            name: new.name,
            category: ProductCategory::Service,
            cost: new.cost,
            stock: 0,
            reserved: 0,
            frame_style: None,
            frame_initials: None,
            frame_piece: None,
            frame_color: None,
            frame_size: None,
            frame_bridge: None,
            service_description: new.description,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.insert_product(&mut tx, &product).await?;
        tx.commit().await?;

        info!(barcode = %product.barcode, name = %product.name, "Service created");
        Ok(product)
    }

    /// Creates a generic-lens template, minting the next `0xxxxxx` base code.
    pub async fn create_generic_lens(&self, new: NewGenericLens) -> DbResult<GenericLens> {
        require_text("description", &new.description)?;
        require_text("lens type", &new.lens_type)?;

        let mut tx = self.pool.begin().await?;

        let current_max: Option<String> =
            sqlx::query_scalar("SELECT MAX(base_code) FROM generic_lenses")
                .fetch_one(&mut *tx)
                .await?;

        let base_code = next_product_code(ProductCategory::Lens, current_max.as_deref());

        let lens = GenericLens {
            id: Uuid::new_v4().to_string(),
            base_code,
            description: new.description,
            lens_type: new.lens_type,
            refraction_id: new.refraction_id,
            base_price: new.base_price,
            anti_reflective: new.anti_reflective,
            photochromic: new.photochromic,
            fixed_height: new.fixed_height,
            supplier_id: new.supplier_id,
            sph_min: new.sph_min,
            sph_max: new.sph_max,
            sph_step: new.sph_step,
            cyl_min: new.cyl_min,
            cyl_max: new.cyl_max,
            cyl_step: new.cyl_step,
            add_min: new.add_min,
            add_max: new.add_max,
            add_step: new.add_step,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO generic_lenses \
             (id, base_code, description, lens_type, refraction_id, base_price, \
              anti_reflective, photochromic, fixed_height, supplier_id, \
              sph_min, sph_max, sph_step, cyl_min, cyl_max, cyl_step, \
              add_min, add_max, add_step, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, \
                     ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
        )
        .bind(&lens.id)
        .bind(&lens.base_code)
        .bind(&lens.description)
        .bind(&lens.lens_type)
        .bind(&lens.refraction_id)
        .bind(lens.base_price)
        .bind(&lens.anti_reflective)
        .bind(&lens.photochromic)
        .bind(&lens.fixed_height)
        .bind(&lens.supplier_id)
        .bind(lens.sph_min)
        .bind(lens.sph_max)
        .bind(lens.sph_step)
        .bind(lens.cyl_min)
        .bind(lens.cyl_max)
        .bind(lens.cyl_step)
        .bind(lens.add_min)
        .bind(lens.add_max)
        .bind(lens.add_step)
        .bind(lens.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(base_code = %lens.base_code, "Generic lens template created");
        Ok(lens)
    }

    /// Largest existing code with the category's prefix, incremented inside
    /// the caller's transaction.
    async fn mint_barcode(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        category: ProductCategory,
    ) -> DbResult<String> {
        let prefix = category.prefix().to_string();
        let current_max: Option<String> = sqlx::query_scalar(
            "SELECT MAX(barcode) FROM products WHERE substr(barcode, 1, 1) = ?1",
        )
        .bind(&prefix)
        .fetch_one(&mut **tx)
        .await?;

        let code = next_product_code(category, current_max.as_deref());
        debug!(category = ?category, barcode = %code, "Minted product barcode");
        Ok(code)
    }

    async fn insert_product(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        product: &Product,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO products \
             (id, barcode, name, category, cost, stock, reserved, \
              frame_style, frame_initials, frame_piece, frame_color, frame_size, frame_bridge, \
              service_description, is_active, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        )
        .bind(&product.id)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(product.category)
        .bind(product.cost)
        .bind(product.stock)
        .bind(product.reserved)
        .bind(&product.frame_style)
        .bind(&product.frame_initials)
        .bind(&product.frame_piece)
        .bind(&product.frame_color)
        .bind(&product.frame_size)
        .bind(&product.frame_bridge)
        .bind(&product.service_description)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Resolves a scanned 7-digit code, branching on its category prefix.
    pub async fn get_by_barcode(&self, code: &str) -> DbResult<Option<CatalogEntry>> {
        validate_barcode(code)?;

        // Prefix validated above; '0' means lens template.
        if code.starts_with('0') {
            let lens = self.get_generic_lens(code).await?;
            return Ok(lens.map(CatalogEntry::LensTemplate));
        }

        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLS} FROM products WHERE barcode = ?1 AND is_active = 1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product.map(|p| match p.category {
            ProductCategory::Frame => CatalogEntry::Frame(p),
            _ => CatalogEntry::Service(p),
        }))
    }

    /// Gets a product by its surrogate id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a generic-lens template by base code.
    pub async fn get_generic_lens(&self, base_code: &str) -> DbResult<Option<GenericLens>> {
        let lens = sqlx::query_as::<_, GenericLens>(&format!(
            "SELECT {LENS_COLS} FROM generic_lenses WHERE base_code = ?1"
        ))
        .bind(base_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(lens)
    }

    /// Lists all generic-lens templates, oldest first.
    pub async fn list_generic_lenses(&self) -> DbResult<Vec<GenericLens>> {
        let lenses = sqlx::query_as::<_, GenericLens>(&format!(
            "SELECT {LENS_COLS} FROM generic_lenses ORDER BY base_code"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(lenses)
    }

    /// Searches active products by name substring or exact barcode.
    pub async fn search(&self, query: &str, limit: i64) -> DbResult<Vec<Product>> {
        let pattern = format!("%{}%", query.trim());

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLS} FROM products \
             WHERE is_active = 1 AND (name LIKE ?1 OR barcode = ?2) \
             ORDER BY name LIMIT ?3"
        ))
        .bind(&pattern)
        .bind(query.trim())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    // =========================================================================
    // Stock & Lifecycle
    // =========================================================================

    /// Adds units to a frame's on-hand stock.
    pub async fn restock(&self, product_id: &str, quantity: i64) -> DbResult<()> {
        debug!(product_id = %product_id, quantity, "Restocking");

        sqlx::query(
            "UPDATE products SET stock = stock + ?1, updated_at = ?2 WHERE id = ?3",
        )
        .bind(quantity)
        .bind(Utc::now())
        .bind(product_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Soft-deletes a product by barcode.
    pub async fn deactivate(&self, barcode: &str) -> DbResult<()> {
        validate_barcode(barcode)?;

        sqlx::query("UPDATE products SET is_active = 0, updated_at = ?1 WHERE barcode = ?2")
            .bind(Utc::now())
            .bind(barcode)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn d(h: i32) -> Diopter {
        Diopter::from_hundredths(h)
    }

    fn sample_lens() -> NewGenericLens {
        NewGenericLens {
            description: "POLY BLUE".to_string(),
            lens_type: "VS".to_string(),
            refraction_id: "1.56".to_string(),
            base_price: Money::from_cents(12000),
            anti_reflective: Some("HMC".to_string()),
            photochromic: None,
            fixed_height: None,
            supplier_id: None,
            sph_min: d(-200),
            sph_max: d(200),
            sph_step: d(100),
            cyl_min: d(-100),
            cyl_max: d(0),
            cyl_step: d(50),
            add_min: d(100),
            add_max: d(200),
            add_step: d(100),
        }
    }

    #[tokio::test]
    async fn test_first_frame_barcode() {
        let db = db().await;
        let products = db.products();

        let frame = products
            .create_frame(NewFrame {
                name: "PCAR 6225".to_string(),
                cost: Money::from_cents(8000),
                stock: 3,
                style: Some("AR".to_string()),
                ..NewFrame::default()
            })
            .await
            .unwrap();

        // An empty frame category starts at base + 1.
        assert_eq!(frame.barcode, "1000001");
        assert_eq!(frame.category, ProductCategory::Frame);
        assert_eq!(frame.stock, 3);
    }

    #[tokio::test]
    async fn test_barcodes_are_sequential_per_category() {
        let db = db().await;
        let products = db.products();

        let f1 = products
            .create_frame(NewFrame {
                name: "Frame A".to_string(),
                ..NewFrame::default()
            })
            .await
            .unwrap();
        let f2 = products
            .create_frame(NewFrame {
                name: "Frame B".to_string(),
                ..NewFrame::default()
            })
            .await
            .unwrap();
        let s1 = products
            .create_service(NewService {
                name: "Assembly".to_string(),
                ..NewService::default()
            })
            .await
            .unwrap();

        assert_eq!(f1.barcode, "1000001");
        assert_eq!(f2.barcode, "1000002");
        // Services have their own code space.
        assert_eq!(s1.barcode, "2000001");
    }

    #[tokio::test]
    async fn test_barcode_prefix_dispatch() {
        let db = db().await;
        let products = db.products();

        let frame = products
            .create_frame(NewFrame {
                name: "Frame".to_string(),
                ..NewFrame::default()
            })
            .await
            .unwrap();
        let lens = products.create_generic_lens(sample_lens()).await.unwrap();

        assert_eq!(lens.base_code, "0000001");

        match products.get_by_barcode(&frame.barcode).await.unwrap() {
            Some(CatalogEntry::Frame(p)) => assert_eq!(p.id, frame.id),
            other => panic!("expected frame, got {other:?}"),
        }
        match products.get_by_barcode(&lens.base_code).await.unwrap() {
            Some(CatalogEntry::LensTemplate(l)) => assert_eq!(l.id, lens.id),
            other => panic!("expected lens template, got {other:?}"),
        }

        assert!(products.get_by_barcode("1999999").await.unwrap().is_none());
        assert!(products.get_by_barcode("9999999").await.is_err());
    }

    #[tokio::test]
    async fn test_lens_round_trips_diopter_ranges() {
        let db = db().await;
        let products = db.products();

        products.create_generic_lens(sample_lens()).await.unwrap();
        let lens = products.get_generic_lens("0000001").await.unwrap().unwrap();

        assert_eq!(lens.sph_min, d(-200));
        assert_eq!(lens.cyl_max, d(0));
        assert_eq!(lens.add_step, d(100));
        assert_eq!(lens.base_price, Money::from_cents(12000));
    }

    #[tokio::test]
    async fn test_restock_and_deactivate() {
        let db = db().await;
        let products = db.products();

        let frame = products
            .create_frame(NewFrame {
                name: "Frame".to_string(),
                stock: 1,
                ..NewFrame::default()
            })
            .await
            .unwrap();

        products.restock(&frame.id, 2).await.unwrap();
        let found = products.get_by_id(&frame.id).await.unwrap().unwrap();
        assert_eq!(found.stock, 3);

        products.deactivate(&frame.barcode).await.unwrap();
        assert!(products
            .get_by_barcode(&frame.barcode)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_search_by_name() {
        let db = db().await;
        let products = db.products();

        products
            .create_frame(NewFrame {
                name: "PCAR 6225 BLACK".to_string(),
                ..NewFrame::default()
            })
            .await
            .unwrap();

        let hits = products.search("PCAR", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(products.search("missing", 10).await.unwrap().is_empty());
    }
}
