//! Band loading pipeline: logical band identifiers in, masked arrays on a
//! common grid out.
//!
//! Each requested band resolves through the product's mapping table to a
//! source file, a sub-band of the main raster, or a derivation; derived
//! bands pull their inputs through the same path so everything lands on
//! the grid the caller asked for.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::bands::PhysicalBand;
use crate::core::params::LoadOptions;
use crate::core::processing::derive;
use crate::core::product::Product;
use crate::error::{Error, Result};
use crate::io::dem;
use crate::io::raster::{self, BandArray, RasterWindow, ReadOptions};
use crate::types::{BandId, CleanMethod, SensorType};

/// Despeckle filter window edge, in pixels.
const DESPECKLE_WINDOW: usize = 5;

/// Loaded bands in request order.
///
/// Insertion order is preserved so a stack built from this set keeps the
/// caller's band order; re-inserting an identifier replaces its array in
/// place.
#[derive(Debug, Clone, Default)]
pub struct BandSet {
    entries: Vec<(BandId, BandArray)>,
}

impl BandSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, band: BandId, array: BandArray) {
        if let Some(entry) = self.entries.iter_mut().find(|(id, _)| *id == band) {
            entry.1 = array;
        } else {
            self.entries.push((band, array));
        }
    }

    pub fn get(&self, band: BandId) -> Option<&BandArray> {
        self.entries
            .iter()
            .find(|(id, _)| *id == band)
            .map(|(_, a)| a)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BandId, &BandArray)> {
        self.entries.iter().map(|(id, a)| (id, a))
    }

    pub fn bands(&self) -> Vec<BandId> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Load the requested bands on a common grid.
///
/// An explicit `pixel_size` wins over `size`; with neither, the product's
/// default pixel size applies. Duplicate requests are loaded once. A band
/// absent from the product's table fails the whole call with
/// `BandNotFound` before any pixel is read for it.
pub fn load(product: &Product, bands: &[BandId], opts: &LoadOptions) -> Result<BandSet> {
    for &band in bands {
        if !product.mapping().contains(band) {
            return Err(Error::BandNotFound {
                band,
                product_type: product.product_type,
            });
        }
    }

    let mut cache: HashMap<BandId, BandArray> = HashMap::new();
    for &band in bands {
        ensure_band(product, band, opts, &mut cache)?;
    }

    let mut set = BandSet::new();
    for &band in bands {
        if set.get(band).is_some() {
            continue;
        }
        if let Some(array) = cache.get(&band) {
            set.insert(band, array.clone());
        }
    }
    Ok(set)
}

/// Load `band` into `cache` unless already there, recursing into inputs
/// of derived bands.
fn ensure_band(
    product: &Product,
    band: BandId,
    opts: &LoadOptions,
    cache: &mut HashMap<BandId, BandArray>,
) -> Result<()> {
    if cache.contains_key(&band) {
        return Ok(());
    }
    let physical = product
        .mapping()
        .get(band)
        .cloned()
        .ok_or(Error::BandNotFound {
            band,
            product_type: product.product_type,
        })?;

    let array = match physical {
        PhysicalBand::File(token) => {
            let path = find_band_file(&product.path, &token)?;
            let mut array = raster::read(&path, &read_options(product, opts, 1))?;
            post_process(product, band, opts, &mut array);
            array
        }
        PhysicalBand::Index(index) => {
            let path = product.main_raster()?;
            let mut array = raster::read(&path, &read_options(product, opts, index))?;
            post_process(product, band, opts, &mut array);
            array
        }
        PhysicalBand::Derived => derive_band(product, band, opts, cache)?,
    };
    debug!("Loaded band {band} for {}", product.condensed_name());
    cache.insert(band, array);
    Ok(())
}

/// Cloud-mask binarization and optical cleaning, applied after the read.
fn post_process(product: &Product, band: BandId, opts: &LoadOptions, array: &mut BandArray) {
    if band == BandId::Clouds {
        array.data = derive::binarize_mask(&array.data);
        return;
    }
    if band.is_spectral()
        && product.sensor_type == SensorType::Optical
        && opts.clean_optical == CleanMethod::Clean
    {
        // Reflectance cannot be negative; anything below zero is a
        // defective or saturated pixel
        array.data.mapv_inplace(|v| if v < 0.0 { f32::NAN } else { v });
    }
}

/// Compute a derived band, loading its inputs through the cache.
fn derive_band(
    product: &Product,
    band: BandId,
    opts: &LoadOptions,
    cache: &mut HashMap<BandId, BandArray>,
) -> Result<BandArray> {
    if band.is_terrain() {
        let source = dem::resolve_dem(&product.config).map_err(|err| {
            Error::MissingAuxiliaryData {
                band,
                reason: err.to_string(),
            }
        })?;
        let extent = product.extent()?;
        let (rows, cols) = target_shape(product, opts, extent.width(), extent.height());
        let elevation = dem::read_dem_window(&source, &extent, rows, cols, &product.config)?;
        let (px, py) = elevation.pixel_size();
        let data = match band {
            BandId::Dem => return Ok(elevation),
            BandId::Slope => derive::slope(&elevation.data, px, py),
            _ => derive::hillshade(&elevation.data, px, py),
        };
        return Ok(BandArray { data, ..elevation });
    }

    if let Some(source) = band.despeckle_source() {
        ensure_band(product, source, opts, cache)?;
        let raw = cache.get(&source).ok_or(Error::BandNotFound {
            band: source,
            product_type: product.product_type,
        })?;
        return Ok(BandArray {
            data: derive::despeckle(&raw.data, DESPECKLE_WINDOW),
            nodata: raw.nodata,
            transform: raw.transform,
            projection: raw.projection.clone(),
            encoded: false,
        });
    }

    let (a, b) = match band {
        BandId::Ndvi => (BandId::Nir, BandId::Red),
        BandId::Ndwi => (BandId::Green, BandId::Nir),
        other => {
            return Err(Error::Processing(format!(
                "Band {other} has no derivation rule"
            )));
        }
    };
    ensure_band(product, a, opts, cache)?;
    ensure_band(product, b, opts, cache)?;
    let (first, second) = match (cache.get(&a), cache.get(&b)) {
        (Some(first), Some(second)) => (first, second),
        _ => {
            return Err(Error::Processing(format!(
                "Inputs {a} and {b} unavailable for {band}"
            )));
        }
    };
    if first.shape() != second.shape() {
        return Err(Error::Processing(format!(
            "Inputs for {band} disagree on shape: {:?} vs {:?}",
            first.shape(),
            second.shape()
        )));
    }
    Ok(BandArray {
        data: derive::normalized_difference(&first.data, &second.data),
        nodata: first.nodata,
        transform: first.transform,
        projection: first.projection.clone(),
        encoded: false,
    })
}

/// Read options for one physical source, honoring the resolution policy.
fn read_options(product: &Product, opts: &LoadOptions, index: usize) -> ReadOptions {
    let pixel_size = opts
        .pixel_size
        .or_else(|| opts.size.is_none().then(|| product.default_pixel_size()));
    ReadOptions {
        pixel_size,
        size: opts.size,
        resampling: opts.resampling.to_gdal(),
        window: opts.window.map(|(col_off, row_off, cols, rows)| RasterWindow {
            col_off,
            row_off,
            cols,
            rows,
        }),
        index,
        tile_size: product.config.tile_size,
        tiled: product.config.tiled_reads,
    }
}

/// Output shape for bands derived off-grid (terrain), matching the shape
/// physical reads produce for the same options.
fn target_shape(
    product: &Product,
    opts: &LoadOptions,
    width: f64,
    height: f64,
) -> (usize, usize) {
    if let Some(pixel_size) = opts.pixel_size {
        (
            ((height / pixel_size).round() as usize).max(1),
            ((width / pixel_size).round() as usize).max(1),
        )
    } else if let Some((cols, rows)) = opts.size {
        (rows.max(1), cols.max(1))
    } else {
        let pixel_size = product.default_pixel_size();
        (
            ((height / pixel_size).round() as usize).max(1),
            ((width / pixel_size).round() as usize).max(1),
        )
    }
}

/// Locate the source file carrying `token` in its name, anywhere under
/// the product directory.
pub fn find_band_file(root: &Path, token: &str) -> Result<PathBuf> {
    fn walk(dir: &Path, token: &str, hit: &mut Option<PathBuf>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                walk(&path, token, hit)?;
            } else if hit.is_none() {
                let name = entry.file_name();
                let matches_token = name
                    .to_str()
                    .map(|n| n.contains(token) && is_raster_name(n))
                    .unwrap_or(false);
                if matches_token {
                    *hit = Some(path);
                }
            }
            if hit.is_some() {
                return Ok(());
            }
        }
        Ok(())
    }

    let mut hit = None;
    walk(root, token, &mut hit)?;
    hit.ok_or_else(|| {
        Error::InvalidProduct(format!(
            "No source file matching '{token}' under {}",
            root.display()
        ))
    })
}

fn is_raster_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".tif") || lower.ends_with(".tiff") || lower.ends_with(".jp2")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn array(rows: usize, cols: usize) -> BandArray {
        BandArray {
            data: Array2::zeros((rows, cols)),
            nodata: 65535.0,
            transform: [0.0, 10.0, 0.0, 0.0, 0.0, -10.0],
            projection: String::new(),
            encoded: false,
        }
    }

    #[test]
    fn band_set_preserves_insertion_order() {
        let mut set = BandSet::new();
        set.insert(BandId::Swir2, array(1, 1));
        set.insert(BandId::Red, array(1, 1));
        set.insert(BandId::Nir, array(1, 1));
        assert_eq!(set.bands(), vec![BandId::Swir2, BandId::Red, BandId::Nir]);
    }

    #[test]
    fn band_set_reinsert_replaces_in_place() {
        let mut set = BandSet::new();
        set.insert(BandId::Red, array(1, 1));
        set.insert(BandId::Nir, array(1, 1));
        set.insert(BandId::Red, array(2, 2));
        assert_eq!(set.bands(), vec![BandId::Red, BandId::Nir]);
        assert_eq!(set.get(BandId::Red).map(|a| a.shape()), Some((2, 2)));
    }

    #[test]
    fn find_band_file_walks_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("GRANULE").join("IMG_DATA");
        std::fs::create_dir_all(&nested).unwrap();
        let target = nested.join("T30TWE_20200101T105441_B04.jp2");
        std::fs::write(&target, b"x").unwrap();
        std::fs::write(nested.join("metadata.xml"), b"x").unwrap();

        assert_eq!(find_band_file(dir.path(), "B04").unwrap(), target);
        assert!(matches!(
            find_band_file(dir.path(), "B99"),
            Err(Error::InvalidProduct(_))
        ));
    }

    #[test]
    fn non_raster_files_do_not_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("B04_meta.xml"), b"x").unwrap();
        assert!(find_band_file(dir.path(), "B04").is_err());
    }
}
