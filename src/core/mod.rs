//! Core domain logic: configuration, band tables, product identity and
//! the processing pipeline.
pub mod bands;
pub mod config;
pub mod geometry;
pub mod params;
pub mod processing;
pub mod product;
