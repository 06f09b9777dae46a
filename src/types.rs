//! Shared types and enums used across EOSTACK.
//! Includes the logical band enumeration (`BandId`), sensor and product
//! classification (`SensorType`, `ProductType`), resampling and output
//! dtype choices, and the optical cleaning modes.
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Logical band identifier, stable across all product types.
///
/// A given identifier means the same physical quantity everywhere it is
/// supported: `Red` is always the red reflective band, `Vv` always the VV
/// backscatter, `Slope` always terrain slope in degrees.
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, ValueEnum, Serialize, Deserialize,
)]
pub enum BandId {
    // Optical reflective bands
    Ca,
    Blue,
    Green,
    Red,
    Vre1,
    Vre2,
    Vre3,
    Nir,
    NarrowNir,
    Swir1,
    Swir2,
    Pan,
    Tir1,
    Tir2,
    // SAR polarizations, raw and despeckled
    Vv,
    Vh,
    Hh,
    Hv,
    VvDspk,
    VhDspk,
    HhDspk,
    HvDspk,
    // Terrain-derived bands
    Dem,
    Slope,
    Hillshade,
    // Classification
    Clouds,
    // Index products
    Ndvi,
    Ndwi,
}

impl BandId {
    /// True for optical reflective (satellite) bands.
    pub fn is_spectral(self) -> bool {
        use BandId::*;
        matches!(
            self,
            Ca | Blue
                | Green
                | Red
                | Vre1
                | Vre2
                | Vre3
                | Nir
                | NarrowNir
                | Swir1
                | Swir2
                | Pan
                | Tir1
                | Tir2
        )
    }

    /// True for SAR polarization bands, raw or despeckled.
    pub fn is_sar(self) -> bool {
        use BandId::*;
        matches!(self, Vv | Vh | Hh | Hv | VvDspk | VhDspk | HhDspk | HvDspk)
    }

    /// True for despeckled SAR variants.
    pub fn is_despeckled(self) -> bool {
        use BandId::*;
        matches!(self, VvDspk | VhDspk | HhDspk | HvDspk)
    }

    /// True for bands derived from a digital elevation model.
    pub fn is_terrain(self) -> bool {
        use BandId::*;
        matches!(self, Dem | Slope | Hillshade)
    }

    /// True for index products computed from spectral bands.
    pub fn is_index(self) -> bool {
        use BandId::*;
        matches!(self, Ndvi | Ndwi)
    }

    /// Bands carrying reflectance-like values, the set that gets the
    /// x10000 scaling when a stack is saved as uint16. Terrain bands,
    /// clouds and SAR backscatter stay in native units.
    pub fn is_reflectance(self) -> bool {
        self.is_spectral() || self.is_index()
    }

    /// Raw polarization underlying a despeckled variant.
    pub fn despeckle_source(self) -> Option<BandId> {
        match self {
            BandId::VvDspk => Some(BandId::Vv),
            BandId::VhDspk => Some(BandId::Vh),
            BandId::HhDspk => Some(BandId::Hh),
            BandId::HvDspk => Some(BandId::Hv),
            _ => None,
        }
    }
}

impl std::fmt::Display for BandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BandId::Ca => "CA",
            BandId::Blue => "BLUE",
            BandId::Green => "GREEN",
            BandId::Red => "RED",
            BandId::Vre1 => "VRE_1",
            BandId::Vre2 => "VRE_2",
            BandId::Vre3 => "VRE_3",
            BandId::Nir => "NIR",
            BandId::NarrowNir => "NARROW_NIR",
            BandId::Swir1 => "SWIR_1",
            BandId::Swir2 => "SWIR_2",
            BandId::Pan => "PAN",
            BandId::Tir1 => "TIR_1",
            BandId::Tir2 => "TIR_2",
            BandId::Vv => "VV",
            BandId::Vh => "VH",
            BandId::Hh => "HH",
            BandId::Hv => "HV",
            BandId::VvDspk => "VV_DSPK",
            BandId::VhDspk => "VH_DSPK",
            BandId::HhDspk => "HH_DSPK",
            BandId::HvDspk => "HV_DSPK",
            BandId::Dem => "DEM",
            BandId::Slope => "SLOPE",
            BandId::Hillshade => "HILLSHADE",
            BandId::Clouds => "CLOUDS",
            BandId::Ndvi => "NDVI",
            BandId::Ndwi => "NDWI",
        };
        write!(f, "{}", s)
    }
}

/// Sensor family of a product.
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, ValueEnum, Serialize, Deserialize,
)]
pub enum SensorType {
    Optical,
    Sar,
}

impl std::fmt::Display for SensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorType::Optical => write!(f, "OPTICAL"),
            SensorType::Sar => write!(f, "SAR"),
        }
    }
}

/// Enumerated per-sensor product variants.
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, ValueEnum, Serialize, Deserialize,
)]
pub enum ProductType {
    S2Msi,
    S3Olci,
    LandsatMss,
    LandsatTm,
    LandsatOli,
    PlanetScope,
    S1IwGrd,
    CosmoSkymed,
    TerraSarX,
    Radarsat2,
    Iceye,
}

impl ProductType {
    /// Classify a product instance from its raw name.
    ///
    /// Pattern rules are sensor-specific substrings of the vendor naming
    /// conventions. No match is fatal for the instance: the product
    /// cannot be used further.
    pub fn from_name(name: &str) -> Result<Self> {
        let upper = name.to_uppercase();
        let ty = if upper.contains("MSIL1C") || upper.contains("MSIL2A") {
            ProductType::S2Msi
        } else if upper.starts_with("S3") && upper.contains("_OL_1_") {
            ProductType::S3Olci
        } else if upper.starts_with("LC08") || upper.starts_with("LC09") {
            ProductType::LandsatOli
        } else if upper.starts_with("LT04") || upper.starts_with("LT05") {
            ProductType::LandsatTm
        } else if upper.starts_with("LM0") {
            ProductType::LandsatMss
        } else if upper.contains("PSSCENE") {
            ProductType::PlanetScope
        } else if upper.starts_with("S1") && upper.contains("_IW_GRD") {
            ProductType::S1IwGrd
        } else if upper.starts_with("CSK") || upper.starts_with("CSG") {
            ProductType::CosmoSkymed
        } else if upper.starts_with("TSX") || upper.starts_with("TDX") || upper.starts_with("PAZ")
        {
            ProductType::TerraSarX
        } else if upper.starts_with("RS2_") {
            ProductType::Radarsat2
        } else if upper.contains("ICEYE") || upper.contains("_SLH_") {
            ProductType::Iceye
        } else {
            return Err(Error::InvalidProduct(format!(
                "Product name matches no known type pattern: {}",
                name
            )));
        };
        Ok(ty)
    }

    /// Sensor family for this product type.
    pub fn sensor_type(self) -> SensorType {
        match self {
            ProductType::S2Msi
            | ProductType::S3Olci
            | ProductType::LandsatMss
            | ProductType::LandsatTm
            | ProductType::LandsatOli
            | ProductType::PlanetScope => SensorType::Optical,
            ProductType::S1IwGrd
            | ProductType::CosmoSkymed
            | ProductType::TerraSarX
            | ProductType::Radarsat2
            | ProductType::Iceye => SensorType::Sar,
        }
    }

    /// Native ground sample distance in dataset units.
    pub fn native_resolution(self) -> f64 {
        match self {
            ProductType::S2Msi => 10.0,
            ProductType::S3Olci => 300.0,
            ProductType::LandsatMss => 60.0,
            ProductType::LandsatTm => 30.0,
            ProductType::LandsatOli => 30.0,
            ProductType::PlanetScope => 3.0,
            ProductType::S1IwGrd => 10.0,
            ProductType::CosmoSkymed => 5.0,
            ProductType::TerraSarX => 3.0,
            ProductType::Radarsat2 => 8.0,
            ProductType::Iceye => 2.5,
        }
    }

    /// Short tag used in condensed names.
    pub fn tag(self) -> &'static str {
        match self {
            ProductType::S2Msi => "S2_MSI",
            ProductType::S3Olci => "S3_OLCI",
            ProductType::LandsatMss => "L_MSS",
            ProductType::LandsatTm => "L_TM",
            ProductType::LandsatOli => "L_OLI",
            ProductType::PlanetScope => "PLA",
            ProductType::S1IwGrd => "S1_IW_GRD",
            ProductType::CosmoSkymed => "CSK",
            ProductType::TerraSarX => "TSX",
            ProductType::Radarsat2 => "RS2",
            ProductType::Iceye => "ICEYE",
        }
    }
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Resampling method for raster reads.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum, Serialize, Deserialize)]
pub enum Resampling {
    Nearest,
    Bilinear,
    Cubic,
    Lanczos,
    Average,
}

impl Resampling {
    pub fn to_gdal(self) -> gdal::raster::ResampleAlg {
        use gdal::raster::ResampleAlg;
        match self {
            Resampling::Nearest => ResampleAlg::NearestNeighbour,
            Resampling::Bilinear => ResampleAlg::Bilinear,
            Resampling::Cubic => ResampleAlg::Cubic,
            Resampling::Lanczos => ResampleAlg::Lanczos,
            Resampling::Average => ResampleAlg::Average,
        }
    }
}

impl Default for Resampling {
    fn default() -> Self {
        Resampling::Nearest
    }
}

impl std::fmt::Display for Resampling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Resampling::Nearest => "nearest",
            Resampling::Bilinear => "bilinear",
            Resampling::Cubic => "cubic",
            Resampling::Lanczos => "lanczos",
            Resampling::Average => "average",
        };
        write!(f, "{}", s)
    }
}

/// On-disk encoding of a written stack.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum, Serialize, Deserialize)]
pub enum DType {
    Float32,
    Uint16,
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DType::Float32 => write!(f, "float32"),
            DType::Uint16 => write!(f, "uint16"),
        }
    }
}

/// Cleaning mode applied to optical bands on load.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum, Serialize, Deserialize)]
pub enum CleanMethod {
    /// Keep pixel values as read.
    Raw,
    /// Mask the declared nodata sentinel (default).
    Nodata,
    /// Mask nodata plus negative reflectance (defective optical pixels).
    Clean,
}

impl Default for CleanMethod {
    fn default() -> Self {
        CleanMethod::Nodata
    }
}

impl std::fmt::Display for CleanMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CleanMethod::Raw => write!(f, "raw"),
            CleanMethod::Nodata => write!(f, "nodata"),
            CleanMethod::Clean => write!(f, "clean"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_categories_partition() {
        for band in [BandId::Red, BandId::Swir2, BandId::Pan] {
            assert!(band.is_spectral());
            assert!(band.is_reflectance());
            assert!(!band.is_sar());
        }
        for band in [BandId::Vv, BandId::HhDspk] {
            assert!(band.is_sar());
            assert!(!band.is_reflectance());
        }
        assert!(BandId::Ndvi.is_index());
        assert!(BandId::Ndvi.is_reflectance());
        assert!(BandId::Slope.is_terrain());
        assert!(!BandId::Slope.is_reflectance());
        assert!(!BandId::Clouds.is_reflectance());
    }

    #[test]
    fn despeckle_sources() {
        assert_eq!(BandId::VvDspk.despeckle_source(), Some(BandId::Vv));
        assert_eq!(BandId::HhDspk.despeckle_source(), Some(BandId::Hh));
        assert_eq!(BandId::Vv.despeckle_source(), None);
    }

    #[test]
    fn product_type_from_name() {
        assert_eq!(
            ProductType::from_name("S2B_MSIL2A_20200114T065229_N0213_R020_T40REQ_20200114T094749")
                .unwrap(),
            ProductType::S2Msi
        );
        assert_eq!(
            ProductType::from_name("LC08_L1TP_200030_20201220_20210310_02_T1").unwrap(),
            ProductType::LandsatOli
        );
        assert_eq!(
            ProductType::from_name(
                "S1A_IW_GRDH_1SDV_20191215T060906_20191215T060931_030355_0378F7_3696"
            )
            .unwrap(),
            ProductType::S1IwGrd
        );
        assert_eq!(
            ProductType::from_name("TSX1_SAR__MGD_SE___SM_S_SRA_20200605").unwrap(),
            ProductType::TerraSarX
        );
    }

    #[test]
    fn product_type_unknown_name_fails() {
        let err = ProductType::from_name("dzfdzef").unwrap_err();
        match err {
            Error::InvalidProduct(msg) => assert!(msg.contains("dzfdzef")),
            other => panic!("expected InvalidProduct, got {other}"),
        }
    }

    #[test]
    fn sensor_types() {
        assert_eq!(ProductType::S2Msi.sensor_type(), SensorType::Optical);
        assert_eq!(ProductType::S1IwGrd.sensor_type(), SensorType::Sar);
    }
}
