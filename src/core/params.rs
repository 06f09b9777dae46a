use serde::{Deserialize, Serialize};

use crate::types::{CleanMethod, Resampling};

/// Load options suitable for config files and presets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Target pixel size in dataset units. Takes priority over `size`
    /// when both are set.
    pub pixel_size: Option<f64>,
    /// Target array size (width, height). Ignored if `pixel_size` is set.
    pub size: Option<(usize, usize)>,
    pub resampling: Resampling,
    /// Window in source pixel coordinates (col_off, row_off, cols, rows).
    pub window: Option<(usize, usize, usize, usize)>,
    /// Cleaning mode for optical bands.
    pub clean_optical: CleanMethod,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            pixel_size: None,
            size: None,
            resampling: Resampling::Nearest,
            window: None,
            clean_optical: CleanMethod::Nodata,
        }
    }
}

impl LoadOptions {
    pub fn with_pixel_size(pixel_size: f64) -> Self {
        Self {
            pixel_size: Some(pixel_size),
            ..Default::default()
        }
    }

    pub fn with_size(width: usize, height: usize) -> Self {
        Self {
            size: Some((width, height)),
            ..Default::default()
        }
    }
}

/// Stack options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackOptions {
    /// Convert the stack to uint16 to save disk space (values multiplied
    /// by 10000 for reflectance bands).
    pub save_as_int: bool,
    pub resampling: Resampling,
    pub clean_optical: CleanMethod,
}

impl Default for StackOptions {
    fn default() -> Self {
        Self {
            save_as_int: false,
            resampling: Resampling::Nearest,
            clean_optical: CleanMethod::Nodata,
        }
    }
}
