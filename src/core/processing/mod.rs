//! Processing stages: band loading, derivation, tiled evaluation and
//! stack assembly.
pub mod derive;
pub mod pipeline;
pub mod stack;
pub mod tiling;
