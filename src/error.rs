//! Crate-level error type and `Result` alias.
//! Transient I/O and GDAL errors are converted via `#[from]` and re-raised
//! unchanged so callers can apply their own retry policy; semantic variants
//! cover product, band, auxiliary-data and configuration failures.
use thiserror::Error;

use crate::types::{BandId, ProductType};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    /// Product name matches no known type pattern, or a source file is
    /// unreadable or corrupted. Fatal for the operation on that product.
    #[error("Invalid product: {0}")]
    InvalidProduct(String),

    /// Requested logical band is absent from the product's mapping table.
    #[error("Band {band} is not available for {product_type} products")]
    BandNotFound {
        band: BandId,
        product_type: ProductType,
    },

    /// A derived band requires a DEM or other auxiliary input that is not
    /// resolvable. Fatal for the affected band.
    #[error("Missing auxiliary data for band {band}: {reason}")]
    MissingAuxiliaryData { band: BandId, reason: String },

    /// Required environment or root not set when a feature needs it.
    /// Surfaces before any I/O is attempted.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Processing error: {0}")]
    Processing(String),
}
