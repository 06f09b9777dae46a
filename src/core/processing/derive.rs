//! Derived-band computation: terrain geometry from a DEM grid, SAR
//! despeckling, spectral indices and cloud-mask binarization.
//!
//! All functions operate on masked arrays (NaN = missing) aligned on the
//! requested pixel grid, so their outputs stack directly with loaded
//! physical bands.
use ndarray::Array2;

/// Slope in degrees from an elevation grid, Horn's method on the eight
/// neighbours. Border pixels and pixels with any missing neighbour are NaN.
pub fn slope(dem: &Array2<f32>, pixel_size_x: f64, pixel_size_y: f64) -> Array2<f32> {
    let (rows, cols) = dem.dim();
    let mut out = Array2::<f32>::from_elem((rows, cols), f32::NAN);
    if rows < 3 || cols < 3 {
        return out;
    }
    let cell_x = (8.0 * pixel_size_x) as f32;
    let cell_y = (8.0 * pixel_size_y) as f32;
    for r in 1..rows - 1 {
        for c in 1..cols - 1 {
            let z = |dr: isize, dc: isize| {
                dem[((r as isize + dr) as usize, (c as isize + dc) as usize)]
            };
            let window = [
                z(-1, -1),
                z(-1, 0),
                z(-1, 1),
                z(0, -1),
                z(0, 1),
                z(1, -1),
                z(1, 0),
                z(1, 1),
            ];
            if window.iter().any(|v| !v.is_finite()) {
                continue;
            }
            let dz_dx =
                (window[2] + 2.0 * window[4] + window[7] - window[0] - 2.0 * window[3] - window[5])
                    / cell_x;
            let dz_dy =
                (window[5] + 2.0 * window[6] + window[7] - window[0] - 2.0 * window[1] - window[2])
                    / cell_y;
            out[(r, c)] = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt().atan().to_degrees();
        }
    }
    out
}

/// Hillshade (0..255) from an elevation grid for a fixed sun position
/// (azimuth 315, altitude 45 degrees, the conventional cartographic sun).
pub fn hillshade(dem: &Array2<f32>, pixel_size_x: f64, pixel_size_y: f64) -> Array2<f32> {
    const AZIMUTH_RAD: f32 = 315.0 * std::f32::consts::PI / 180.0;
    const ALTITUDE_RAD: f32 = 45.0 * std::f32::consts::PI / 180.0;
    let zenith = std::f32::consts::FRAC_PI_2 - ALTITUDE_RAD;

    let (rows, cols) = dem.dim();
    let mut out = Array2::<f32>::from_elem((rows, cols), f32::NAN);
    if rows < 3 || cols < 3 {
        return out;
    }
    let cell_x = (8.0 * pixel_size_x) as f32;
    let cell_y = (8.0 * pixel_size_y) as f32;
    for r in 1..rows - 1 {
        for c in 1..cols - 1 {
            let z = |dr: isize, dc: isize| {
                dem[((r as isize + dr) as usize, (c as isize + dc) as usize)]
            };
            let window = [
                z(-1, -1),
                z(-1, 0),
                z(-1, 1),
                z(0, -1),
                z(0, 1),
                z(1, -1),
                z(1, 0),
                z(1, 1),
            ];
            if window.iter().any(|v| !v.is_finite()) {
                continue;
            }
            let dz_dx =
                (window[2] + 2.0 * window[4] + window[7] - window[0] - 2.0 * window[3] - window[5])
                    / cell_x;
            let dz_dy =
                (window[5] + 2.0 * window[6] + window[7] - window[0] - 2.0 * window[1] - window[2])
                    / cell_y;
            let slope_rad = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt().atan();
            let aspect = if dz_dx != 0.0 || dz_dy != 0.0 {
                dz_dy.atan2(-dz_dx)
            } else {
                0.0
            };
            let shade = zenith.cos() * slope_rad.cos()
                + zenith.sin() * slope_rad.sin() * (AZIMUTH_RAD - aspect).cos();
            out[(r, c)] = (shade.max(0.0) * 255.0).round();
        }
    }
    out
}

/// Boxcar despeckle: windowed mean over valid neighbours.
///
/// `window` must be odd; missing pixels stay missing and do not pull the
/// mean of their neighbours.
pub fn despeckle(band: &Array2<f32>, window: usize) -> Array2<f32> {
    debug_assert!(window % 2 == 1, "despeckle window must be odd");
    let (rows, cols) = band.dim();
    let half = window / 2;
    let mut out = Array2::<f32>::from_elem((rows, cols), f32::NAN);
    for r in 0..rows {
        for c in 0..cols {
            if !band[(r, c)].is_finite() {
                continue;
            }
            let r0 = r.saturating_sub(half);
            let c0 = c.saturating_sub(half);
            let r1 = (r + half).min(rows - 1);
            let c1 = (c + half).min(cols - 1);
            let mut sum = 0.0f64;
            let mut count = 0usize;
            for rr in r0..=r1 {
                for cc in c0..=c1 {
                    let v = band[(rr, cc)];
                    if v.is_finite() {
                        sum += v as f64;
                        count += 1;
                    }
                }
            }
            if count > 0 {
                out[(r, c)] = (sum / count as f64) as f32;
            }
        }
    }
    out
}

/// Normalized difference (a - b) / (a + b); NaN where either input is
/// missing or the denominator vanishes.
pub fn normalized_difference(a: &Array2<f32>, b: &Array2<f32>) -> Array2<f32> {
    let mut out = Array2::<f32>::from_elem(a.dim(), f32::NAN);
    for ((idx, &va), &vb) in a.indexed_iter().zip(b.iter()) {
        if va.is_finite() && vb.is_finite() {
            let denom = va + vb;
            if denom != 0.0 {
                out[idx] = (va - vb) / denom;
            }
        }
    }
    out
}

/// Binarize a cloud-mask raster: any positive classification value
/// becomes 1.0, zero stays 0.0, missing stays NaN.
pub fn binarize_mask(mask: &Array2<f32>) -> Array2<f32> {
    mask.mapv(|v| {
        if !v.is_finite() {
            f32::NAN
        } else if v > 0.0 {
            1.0
        } else {
            0.0
        }
    })
}
