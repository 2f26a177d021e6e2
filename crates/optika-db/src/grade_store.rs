//! # Lens Grade Archive Store
//!
//! File-backed storage for materialized lens grades. A grade is the full
//! cross product of a template's power combinations; it is write-once bulk
//! data, so it lives outside SQLite as one gzip-compressed JSON archive per
//! template.
//!
//! ## Layout & Atomicity
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  <grades_dir>/                                                          │
//! │  ├── 0000001.json.gz      ← one archive per template base code         │
//! │  ├── 0000002.json.gz                                                   │
//! │  └── 0000002.json.gz.tmp  ← in-flight write (same dir, then rename)    │
//! │                                                                         │
//! │  Writes go to the temp file first and rename over the target, so a     │
//! │  crash mid-write leaves the previous archive intact; rename within     │
//! │  one directory is atomic on POSIX filesystems.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lookups decompress the archive and scan for the exact power triple; the
//! two-decimal fixed-point [`Diopter`] makes the match exact, never a float
//! comparison.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, info};

use crate::error::DbResult;
use optika_core::grade::generate;
use optika_core::{Diopter, GenericLens, LensCombination};

/// File-backed store of compressed lens-grade archives.
#[derive(Debug, Clone)]
pub struct GradeStore {
    dir: PathBuf,
}

impl GradeStore {
    /// Opens (and creates, if missing) a grade store at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> DbResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(GradeStore { dir })
    }

    /// The archive path for a template base code.
    fn archive_path(&self, base_code: &str) -> PathBuf {
        self.dir.join(format!("{base_code}.json.gz"))
    }

    /// Generates a template's grade and persists it, replacing any previous
    /// archive. On a generation error nothing is written.
    pub fn generate_and_store(&self, lens: &GenericLens) -> DbResult<Vec<LensCombination>> {
        let combinations = generate(lens)?;
        self.write(&lens.base_code, &combinations)?;

        info!(
            base_code = %lens.base_code,
            combinations = combinations.len(),
            "Grade archive written"
        );
        Ok(combinations)
    }

    /// Writes an archive: temp file in the same directory, then rename.
    pub fn write(&self, base_code: &str, combinations: &[LensCombination]) -> DbResult<()> {
        let target = self.archive_path(base_code);
        let tmp = target.with_extension("gz.tmp");

        {
            let file = File::create(&tmp)?;
            let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
            serde_json::to_writer(&mut encoder, combinations)?;
            encoder.finish()?.flush()?;
        }

        fs::rename(&tmp, &target)?;
        debug!(path = %target.display(), "Archive replaced");
        Ok(())
    }

    /// Reads a template's full grade. Missing archive means the grade was
    /// never generated, not an error.
    pub fn read(&self, base_code: &str) -> DbResult<Option<Vec<LensCombination>>> {
        let path = self.archive_path(base_code);
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)?;
        let decoder = GzDecoder::new(BufReader::new(file));
        let combinations: Vec<LensCombination> = serde_json::from_reader(decoder)?;
        Ok(Some(combinations))
    }

    /// Finds the combination matching an exact power triple.
    pub fn lookup(
        &self,
        base_code: &str,
        sphere: Diopter,
        cylinder: Diopter,
        addition: Diopter,
    ) -> DbResult<Option<LensCombination>> {
        let Some(combinations) = self.read(base_code)? else {
            return Ok(None);
        };

        Ok(combinations.into_iter().find(|c| {
            c.sphere == sphere && c.cylinder == cylinder && c.addition == addition
        }))
    }

    /// Deletes a template's archive, if present.
    pub fn remove(&self, base_code: &str) -> DbResult<()> {
        let path = self.archive_path(base_code);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// The directory archives live in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use optika_core::Money;
    use tempfile::TempDir;

    fn d(h: i32) -> Diopter {
        Diopter::from_hundredths(h)
    }

    /// sphere [-2.00, 2.00]/1.00 × cylinder [0.00 ↓ -1.00]/0.50 ×
    /// addition [1.00, 2.00]/1.00 = 5 × 3 × 2 = 30 combinations
    fn sample_lens() -> GenericLens {
        GenericLens {
            id: "lens-1".to_string(),
            base_code: "0000032".to_string(),
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
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = GradeStore::new(tmp.path()).unwrap();

        let generated = store.generate_and_store(&sample_lens()).unwrap();
        assert_eq!(generated.len(), 30);

        let read = store.read("0000032").unwrap().unwrap();
        assert_eq!(read.len(), 30);
        assert_eq!(read[0].code, "00000320001");
        assert_eq!(read[29].code, "00000320030");
    }

    #[test]
    fn test_lookup_exact_triple() {
        let tmp = TempDir::new().unwrap();
        let store = GradeStore::new(tmp.path()).unwrap();
        let generated = store.generate_and_store(&sample_lens()).unwrap();

        // Any generated triple resolves to exactly its combination.
        for combo in &generated {
            let hit = store
                .lookup("0000032", combo.sphere, combo.cylinder, combo.addition)
                .unwrap()
                .unwrap();
            assert_eq!(hit.code, combo.code);
        }

        // A power outside the grade finds nothing.
        assert!(store
            .lookup("0000032", d(-500), d(0), d(100))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_missing_archive_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = GradeStore::new(tmp.path()).unwrap();

        assert!(store.read("0999999").unwrap().is_none());
        assert!(store.lookup("0999999", d(0), d(0), d(0)).unwrap().is_none());
    }

    #[test]
    fn test_rewrite_replaces_archive() {
        let tmp = TempDir::new().unwrap();
        let store = GradeStore::new(tmp.path()).unwrap();
        store.generate_and_store(&sample_lens()).unwrap();

        let mut narrow = sample_lens();
        narrow.add_min = d(100);
        narrow.add_max = d(100); // 5 × 3 × 1 = 15
        let regenerated = store.generate_and_store(&narrow).unwrap();
        assert_eq!(regenerated.len(), 15);

        assert_eq!(store.read("0000032").unwrap().unwrap().len(), 15);
        // No temp file left behind.
        assert!(!store.dir().join("0000032.json.gz.tmp").exists());
    }

    #[test]
    fn test_generation_error_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = GradeStore::new(tmp.path()).unwrap();

        let mut bad = sample_lens();
        bad.sph_step = d(0);
        assert!(store.generate_and_store(&bad).is_err());
        assert!(store.read("0000032").unwrap().is_none());
    }

    #[test]
    fn test_remove() {
        let tmp = TempDir::new().unwrap();
        let store = GradeStore::new(tmp.path()).unwrap();
        store.generate_and_store(&sample_lens()).unwrap();

        store.remove("0000032").unwrap();
        assert!(store.read("0000032").unwrap().is_none());
        // Removing again is a no-op.
        store.remove("0000032").unwrap();
    }
}
