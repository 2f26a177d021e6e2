//! # Lens Grade Generation
//!
//! Expands a [`GenericLens`] template into the full cross-product of optical
//! power combinations ("the grade"). Pure generation only; the compressed
//! archive persistence lives in optika-db's `grade_store`.
//!
//! ## Iteration Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │            Grade Cross-Product (order defines the barcode)              │
//! │                                                                         │
//! │  for sphere in sph_min ..= sph_max (ascending)                         │
//! │    for cylinder in cyl_max ..= cyl_min (DESCENDING)                    │
//! │      for addition in add_min ..= add_max (ascending)                   │
//! │        combination #N → barcode = base_code + N (4 digits, 1-based)    │
//! │                                                                         │
//! │  Cylinder runs high-to-low because cylinder powers are conventionally  │
//! │  negative: the maximum (closest to zero) comes first.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Malformed ranges abort generation with a typed error before any
//! combination is produced; callers persist all-or-nothing.

use serde::{Deserialize, Serialize};

use crate::diopter::Diopter;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::GenericLens;

/// Default assembly height when the template fixes none.
pub const DEFAULT_HEIGHT: &str = "18";

// =============================================================================
// Lens Combination
// =============================================================================

/// One concrete power point of a grade, as persisted in the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LensCombination {
    /// Derived barcode: template base code + 4-digit 1-based sequence.
    pub code: String,
    /// Composed descriptive name, uppercase.
    pub name: String,
    pub sphere: Diopter,
    pub cylinder: Diopter,
    pub addition: Diopter,
    /// Assembly height ("18" unless the template fixes one).
    pub height: String,
    /// Sale price, copied from the template's base price.
    pub price: Money,
}

// =============================================================================
// Generation
// =============================================================================

/// Generates the full ordered grade for a template.
///
/// ## Errors
/// [`CoreError::InvalidGradeRange`] when a step is not positive or a bound
/// pair is in the wrong order for its axis. Nothing is generated on error.
pub fn generate(lens: &GenericLens) -> CoreResult<Vec<LensCombination>> {
    let spheres = axis_asc("sphere", lens.sph_min, lens.sph_max, lens.sph_step)?;
    let cylinders = axis_desc("cylinder", lens.cyl_max, lens.cyl_min, lens.cyl_step)?;
    let additions = axis_asc("addition", lens.add_min, lens.add_max, lens.add_step)?;

    let height = lens
        .fixed_height
        .clone()
        .unwrap_or_else(|| DEFAULT_HEIGHT.to_string());

    let mut combinations = Vec::with_capacity(spheres.len() * cylinders.len() * additions.len());
    let mut sequence = 1u32;

    for &sphere in &spheres {
        for &cylinder in &cylinders {
            for &addition in &additions {
                combinations.push(LensCombination {
                    code: format!("{}{:04}", lens.base_code, sequence),
                    name: compose_name(lens, sphere, cylinder, addition),
                    sphere,
                    cylinder,
                    addition,
                    height: height.clone(),
                    price: lens.base_price,
                });
                sequence += 1;
            }
        }
    }

    Ok(combinations)
}

/// Composed uppercase item name:
/// `LG <descr> <type> <refraction> <sph> <cyl> <add> [<AR>] [<PHOTO>]`.
fn compose_name(
    lens: &GenericLens,
    sphere: Diopter,
    cylinder: Diopter,
    addition: Diopter,
) -> String {
    let mut name = format!(
        "LG {} {} {} {} {} {}",
        lens.description, lens.lens_type, lens.refraction_id, sphere, cylinder, addition
    );
    if let Some(ar) = &lens.anti_reflective {
        name.push(' ');
        name.push_str(ar);
    }
    if let Some(photo) = &lens.photochromic {
        name.push(' ');
        name.push_str(photo);
    }
    name.to_uppercase()
}

fn axis_asc(
    axis: &'static str,
    min: Diopter,
    max: Diopter,
    step: Diopter,
) -> CoreResult<Vec<Diopter>> {
    check_step(axis, step)?;
    if min > max {
        return Err(CoreError::InvalidGradeRange {
            axis,
            reason: format!("minimum {min} exceeds maximum {max}"),
        });
    }
    Ok(Diopter::steps_asc(min, max, step))
}

fn axis_desc(
    axis: &'static str,
    hi: Diopter,
    lo: Diopter,
    step: Diopter,
) -> CoreResult<Vec<Diopter>> {
    check_step(axis, step)?;
    if hi < lo {
        return Err(CoreError::InvalidGradeRange {
            axis,
            reason: format!("upper bound {hi} below lower bound {lo}"),
        });
    }
    Ok(Diopter::steps_desc(hi, lo, step))
}

fn check_step(axis: &'static str, step: Diopter) -> CoreResult<()> {
    if step.hundredths() <= 0 {
        return Err(CoreError::InvalidGradeRange {
            axis,
            reason: format!("step {step} must be positive"),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn d(h: i32) -> Diopter {
        Diopter::from_hundredths(h)
    }

    fn template() -> GenericLens {
        GenericLens {
            id: "t-1".to_string(),
            base_code: "0000321".to_string(),
            description: "Poly Blue".to_string(),
            lens_type: "VS".to_string(),
            refraction_id: "1.56".to_string(),
            base_price: Money::from_cents(18900),
            anti_reflective: Some("hmc".to_string()),
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
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_cross_product_size_and_barcodes() {
        // 5 spheres × 3 cylinders × 2 additions = 30 combinations
        let grade = generate(&template()).unwrap();
        assert_eq!(grade.len(), 30);
        assert_eq!(grade.first().unwrap().code, "00003210001");
        assert_eq!(grade.last().unwrap().code, "00003210030");
    }

    #[test]
    fn test_iteration_order() {
        let grade = generate(&template()).unwrap();

        // First point: lowest sphere, cylinder at its maximum (closest to
        // zero), lowest addition.
        assert_eq!(grade[0].sphere, d(-200));
        assert_eq!(grade[0].cylinder, d(0));
        assert_eq!(grade[0].addition, d(100));

        // Addition varies fastest, then cylinder descends.
        assert_eq!(grade[1].addition, d(200));
        assert_eq!(grade[2].cylinder, d(-50));
        assert_eq!(grade[2].addition, d(100));

        // Last point: highest sphere, most negative cylinder, highest add.
        let last = grade.last().unwrap();
        assert_eq!(last.sphere, d(200));
        assert_eq!(last.cylinder, d(-100));
        assert_eq!(last.addition, d(200));
    }

    #[test]
    fn test_name_composition() {
        let grade = generate(&template()).unwrap();
        assert_eq!(grade[0].name, "LG POLY BLUE VS 1.56 -2.00 0.00 1.00 HMC");
        assert_eq!(grade[0].height, DEFAULT_HEIGHT);
        assert_eq!(grade[0].price, Money::from_cents(18900));
    }

    #[test]
    fn test_fixed_height_propagates() {
        let mut lens = template();
        lens.fixed_height = Some("22".to_string());
        let grade = generate(&lens).unwrap();
        assert!(grade.iter().all(|c| c.height == "22"));
    }

    #[test]
    fn test_rejects_non_positive_step() {
        let mut lens = template();
        lens.sph_step = d(0);
        assert!(matches!(
            generate(&lens),
            Err(CoreError::InvalidGradeRange { axis: "sphere", .. })
        ));
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let mut lens = template();
        lens.add_min = d(300);
        assert!(matches!(
            generate(&lens),
            Err(CoreError::InvalidGradeRange {
                axis: "addition",
                ..
            })
        ));

        let mut lens = template();
        lens.cyl_max = d(-200); // below cyl_min of -1.00
        assert!(matches!(
            generate(&lens),
            Err(CoreError::InvalidGradeRange {
                axis: "cylinder",
                ..
            })
        ));
    }
}
