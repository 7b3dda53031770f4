//! colorbook — raster painting engine for colouring-book artwork.
//!
//! A [`engine::PaintEngine`] owns the pixel buffer of the active artwork and
//! paints into it with stroke brushes (clipped to an outline) or whole-region
//! fills, uploading to the display at most once per tick and saving progress
//! losslessly per artwork.

#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod logger;

pub mod artwork;
pub mod brush;
pub mod canvas;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod mask;
pub mod ops;
pub mod persist;
pub mod region;
pub mod rng;

pub use artwork::{ArtworkDescriptor, ArtworkHandle, ArtworkKind};
pub use brush::{BrushConfig, BrushKind};
pub use config::{EngineConfig, PlatformProfile};
pub use engine::{PaintEngine, PaintEvents};
pub use error::{EngineError, PersistError};
