//! Band mapping tables: per product type, the subset of logical bands it
//! supports and the physical token each one resolves to.
//!
//! Tables are plain data selected by `ProductType` through a single
//! dispatch function; a product declares support for exactly the
//! identifiers present as keys, so `has_band` is answerable in O(1)
//! without I/O.
use std::collections::BTreeMap;

use crate::types::{BandId, ProductType};

/// Physical source of a logical band within one product layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhysicalBand {
    /// Token matched against source file names (stem or suffix).
    File(String),
    /// 1-based sub-band index within the product's main raster.
    Index(usize),
    /// Computed from other bands and/or auxiliary data (DEM).
    Derived,
}

/// Mapping from logical band identifiers to physical tokens.
#[derive(Debug, Clone, Default)]
pub struct BandMapping {
    inner: BTreeMap<BandId, PhysicalBand>,
}

impl BandMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or overwrite mappings. Later calls win, letting product
    /// variants override defaults.
    pub fn map_bands<I>(&mut self, bands: I)
    where
        I: IntoIterator<Item = (BandId, PhysicalBand)>,
    {
        for (band, physical) in bands {
            self.inner.insert(band, physical);
        }
    }

    pub fn contains(&self, band: BandId) -> bool {
        self.inner.contains_key(&band)
    }

    pub fn get(&self, band: BandId) -> Option<&PhysicalBand> {
        self.inner.get(&band)
    }

    pub fn supported(&self) -> impl Iterator<Item = BandId> + '_ {
        self.inner.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

fn file(token: &str) -> PhysicalBand {
    PhysicalBand::File(token.to_string())
}

/// Terrain and index bands common to every optical table.
fn optical_derived() -> Vec<(BandId, PhysicalBand)> {
    vec![
        (BandId::Dem, PhysicalBand::Derived),
        (BandId::Slope, PhysicalBand::Derived),
        (BandId::Hillshade, PhysicalBand::Derived),
        (BandId::Ndvi, PhysicalBand::Derived),
        (BandId::Ndwi, PhysicalBand::Derived),
    ]
}

/// Terrain bands common to every SAR table.
fn sar_derived() -> Vec<(BandId, PhysicalBand)> {
    vec![
        (BandId::Dem, PhysicalBand::Derived),
        (BandId::Slope, PhysicalBand::Derived),
        (BandId::Hillshade, PhysicalBand::Derived),
    ]
}

/// Resolve the band mapping table for a product type.
///
/// This is the sole dispatch point from product type to capabilities;
/// tables are data, not virtual methods.
pub fn mapping_for(product_type: ProductType) -> BandMapping {
    let mut mapping = BandMapping::new();
    match product_type {
        ProductType::S2Msi => {
            mapping.map_bands([
                (BandId::Ca, file("B01")),
                (BandId::Blue, file("B02")),
                (BandId::Green, file("B03")),
                (BandId::Red, file("B04")),
                (BandId::Vre1, file("B05")),
                (BandId::Vre2, file("B06")),
                (BandId::Vre3, file("B07")),
                (BandId::Nir, file("B08")),
                (BandId::NarrowNir, file("B8A")),
                (BandId::Swir1, file("B11")),
                (BandId::Swir2, file("B12")),
                (BandId::Clouds, file("MSK_CLASSI")),
            ]);
            mapping.map_bands(optical_derived());
        }
        ProductType::S3Olci => {
            mapping.map_bands([
                (BandId::Ca, file("Oa02_radiance")),
                (BandId::Blue, file("Oa04_radiance")),
                (BandId::Green, file("Oa06_radiance")),
                (BandId::Red, file("Oa08_radiance")),
                (BandId::Vre1, file("Oa11_radiance")),
                (BandId::Nir, file("Oa17_radiance")),
                (BandId::NarrowNir, file("Oa17_radiance")),
                (BandId::Swir2, file("Oa21_radiance")),
            ]);
            mapping.map_bands(optical_derived());
        }
        ProductType::LandsatMss => {
            mapping.map_bands([
                (BandId::Green, file("B4")),
                (BandId::Red, file("B5")),
                (BandId::Vre1, file("B6")),
                (BandId::Nir, file("B7")),
                (BandId::Clouds, file("QA_PIXEL")),
            ]);
            mapping.map_bands(optical_derived());
        }
        ProductType::LandsatTm => {
            mapping.map_bands([
                (BandId::Blue, file("B1")),
                (BandId::Green, file("B2")),
                (BandId::Red, file("B3")),
                (BandId::Nir, file("B4")),
                (BandId::Swir1, file("B5")),
                (BandId::Tir1, file("B6")),
                (BandId::Swir2, file("B7")),
                (BandId::Clouds, file("QA_PIXEL")),
            ]);
            mapping.map_bands(optical_derived());
        }
        ProductType::LandsatOli => {
            mapping.map_bands([
                (BandId::Ca, file("B1")),
                (BandId::Blue, file("B2")),
                (BandId::Green, file("B3")),
                (BandId::Red, file("B4")),
                (BandId::Nir, file("B5")),
                (BandId::Swir1, file("B6")),
                (BandId::Swir2, file("B7")),
                (BandId::Pan, file("B8")),
                (BandId::Tir1, file("B10")),
                (BandId::Tir2, file("B11")),
                (BandId::Clouds, file("QA_PIXEL")),
            ]);
            mapping.map_bands(optical_derived());
        }
        ProductType::PlanetScope => {
            // Sub-bands of a single multi-band raster
            mapping.map_bands([
                (BandId::Blue, PhysicalBand::Index(1)),
                (BandId::Green, PhysicalBand::Index(2)),
                (BandId::Red, PhysicalBand::Index(3)),
                (BandId::Nir, PhysicalBand::Index(4)),
                (BandId::Clouds, file("udm2")),
            ]);
            mapping.map_bands(optical_derived());
        }
        ProductType::S1IwGrd => {
            mapping.map_bands([
                (BandId::Vv, file("vv")),
                (BandId::Vh, file("vh")),
                (BandId::VvDspk, PhysicalBand::Derived),
                (BandId::VhDspk, PhysicalBand::Derived),
            ]);
            mapping.map_bands(sar_derived());
        }
        ProductType::CosmoSkymed => {
            mapping.map_bands([
                (BandId::Hh, file("HH")),
                (BandId::Hv, file("HV")),
                (BandId::HhDspk, PhysicalBand::Derived),
                (BandId::HvDspk, PhysicalBand::Derived),
            ]);
            mapping.map_bands(sar_derived());
        }
        ProductType::TerraSarX => {
            mapping.map_bands([
                (BandId::Hh, file("HH")),
                (BandId::Vv, file("VV")),
                (BandId::HhDspk, PhysicalBand::Derived),
                (BandId::VvDspk, PhysicalBand::Derived),
            ]);
            mapping.map_bands(sar_derived());
        }
        ProductType::Radarsat2 => {
            mapping.map_bands([
                (BandId::Hh, file("HH")),
                (BandId::Hv, file("HV")),
                (BandId::Vv, file("VV")),
                (BandId::Vh, file("VH")),
                (BandId::HhDspk, PhysicalBand::Derived),
                (BandId::HvDspk, PhysicalBand::Derived),
                (BandId::VvDspk, PhysicalBand::Derived),
                (BandId::VhDspk, PhysicalBand::Derived),
            ]);
            mapping.map_bands(sar_derived());
        }
        ProductType::Iceye => {
            mapping.map_bands([
                (BandId::Vv, file("VV")),
                (BandId::VvDspk, PhysicalBand::Derived),
            ]);
            mapping.map_bands(sar_derived());
        }
    }
    mapping
}
