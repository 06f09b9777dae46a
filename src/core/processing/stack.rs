//! Band stacking and integer-encoding policy.
//!
//! `assemble` turns an ordered band set into one (band, y, x) cube and
//! decides the storage type. Integer output is only taken when the data
//! survives the near-minimum check; otherwise the stack silently stays
//! float32 with a warning, never an error.
use std::path::Path;

use ndarray::Array3;
use tracing::{debug, warn};

use crate::core::params::StackOptions;
use crate::core::processing::pipeline::BandSet;
use crate::error::{Error, Result};
use crate::io::raster;
use crate::types::{BandId, DType};

/// Nodata sentinel for uint16 stacks.
pub const UINT16_NODATA: f32 = 65535.0;
/// Nodata sentinel for float32 stacks.
pub const FLOAT_NODATA: f32 = -9999.0;
/// Storage scaling applied to reflectance-like bands in uint16 stacks.
pub const REFLECTANCE_SCALE: f32 = 10000.0;
/// A reflectance band whose maximum exceeds this is already in digital
/// numbers and must not be scaled again.
const DN_LIKE_MAX: f32 = 65535.0 / REFLECTANCE_SCALE;

const HISTOGRAM_BINS: usize = 65536;
const LOW_QUANTILE: f64 = 0.001;

/// An assembled multi-band cube ready for serialization.
#[derive(Debug, Clone)]
pub struct Stack {
    /// (band, row, col), already encoded for the chosen storage type.
    pub data: Array3<f32>,
    /// Band identity per axis-0 position, in caller order.
    pub bands: Vec<BandId>,
    pub nodata: f32,
    pub transform: [f64; 6],
    pub projection: String,
}

/// Near-minimum of all finite values across the set, estimated as the
/// `LOW_QUANTILE` quantile with a two-pass fixed-bin histogram.
///
/// When the rank target lands on the first sample the exact minimum is
/// returned, so small inputs are not blurred by bin edges.
fn low_quantile(band_set: &BandSet) -> f32 {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    let mut count = 0usize;
    for (_, array) in band_set.iter() {
        for &v in array.data.iter() {
            if v.is_finite() {
                min = min.min(v);
                max = max.max(v);
                count += 1;
            }
        }
    }
    if count == 0 {
        return 0.0;
    }
    let target = (count as f64 * LOW_QUANTILE).floor() as usize;
    if target == 0 || min == max {
        return min;
    }

    let span = f64::from(max - min);
    let mut hist = vec![0u64; HISTOGRAM_BINS];
    for (_, array) in band_set.iter() {
        for &v in array.data.iter() {
            if v.is_finite() {
                let idx = ((f64::from(v - min) / span) * (HISTOGRAM_BINS - 1) as f64) as usize;
                hist[idx.min(HISTOGRAM_BINS - 1)] += 1;
            }
        }
    }
    let mut seen = 0usize;
    for (i, &n) in hist.iter().enumerate() {
        seen += n as usize;
        if seen > target {
            // Lower bin edge: a conservative estimate of the quantile
            return min + (span * i as f64 / (HISTOGRAM_BINS - 1) as f64) as f32;
        }
    }
    max
}

fn nanmax(array: &ndarray::Array2<f32>) -> f32 {
    array
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f32::NEG_INFINITY, f32::max)
}

/// Assemble the set into a (band, y, x) stack in exactly its insertion
/// order and pick the storage type.
///
/// With `save_as_int`, the stack converts to uint16 only when the rounded
/// near-minimum is not below -0.1; every negative that survives the check
/// (including -0.1 itself and any outliers under the quantile) collapses
/// to zero, reflectance bands gain the x10000 storage scale unless their
/// values are already digital numbers, and missing pixels take the uint16
/// sentinel. Any other case keeps float32 with the float sentinel; the
/// stack nodata always reflects what was actually used, not what the
/// source bands declared.
pub fn assemble(band_set: &BandSet, save_as_int: bool) -> Result<(Stack, DType)> {
    if band_set.is_empty() {
        return Err(Error::Processing("Cannot stack an empty band set".into()));
    }

    let (rows, cols) = band_set
        .iter()
        .next()
        .map(|(_, a)| a.shape())
        .unwrap_or((0, 0));
    for (band_id, array) in band_set.iter() {
        if array.shape() != (rows, cols) {
            return Err(Error::Processing(format!(
                "Band {band_id} has shape {:?}, expected {:?}",
                array.shape(),
                (rows, cols)
            )));
        }
    }

    let mut dtype = DType::Float32;
    if save_as_int {
        let low = low_quantile(band_set);
        let rounded = (f64::from(low) * 1000.0).round() / 1000.0;
        if rounded < -0.1 {
            warn!(
                "Cannot convert the stack to uint16 as it contains values below -0.1 ({low}), \
                 keeping float32"
            );
        } else {
            dtype = DType::Uint16;
        }
    }
    let nodata = match dtype {
        DType::Uint16 => UINT16_NODATA,
        DType::Float32 => FLOAT_NODATA,
    };

    let band_count = band_set.len();
    let mut data = Array3::<f32>::zeros((band_count, rows, cols));
    let mut bands = Vec::with_capacity(band_count);
    for (i, (band_id, array)) in band_set.iter().enumerate() {
        let scale = if dtype == DType::Uint16 && band_id.is_reflectance() {
            if nanmax(&array.data) > DN_LIKE_MAX {
                debug!("Band {band_id} already in digital numbers, not scaling");
                1.0
            } else {
                REFLECTANCE_SCALE
            }
        } else {
            1.0
        };
        let mut plane = data.index_axis_mut(ndarray::Axis(0), i);
        for (out, &v) in plane.iter_mut().zip(array.data.iter()) {
            *out = if !v.is_finite() {
                nodata
            } else if dtype == DType::Uint16 {
                let v = if v < 0.0 { 0.0 } else { v };
                v * scale
            } else {
                v
            };
        }
        bands.push(*band_id);
    }

    let (_, first) = band_set
        .iter()
        .next()
        .ok_or_else(|| Error::Processing("Cannot stack an empty band set".into()))?;
    Ok((
        Stack {
            data,
            bands,
            nodata,
            transform: first.transform,
            projection: first.projection.clone(),
        },
        dtype,
    ))
}

/// Assemble a loaded band set and write it to `path` as one multi-band
/// GeoTIFF, returning the in-memory stack alongside the storage type.
pub fn stack(band_set: &BandSet, opts: &StackOptions, path: &Path) -> Result<(Stack, DType)> {
    let (stack, dtype) = assemble(band_set, opts.save_as_int)?;
    raster::write_stack(&stack, dtype, path)?;
    Ok((stack, dtype))
}
