// ============================================================================
// ARTWORK — what the engine paints on, handed in by the caller
// ============================================================================

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use serde::Deserialize;

use crate::error::{EngineError, Result};
use crate::geometry::{Shape, ShapeFrame};
use crate::region::{Region, RegionSet};

/// Size of the blank canvas a freehand artwork gets when it has no image.
pub const FREEHAND_FALLBACK_SIZE: u32 = 512;

/// Interaction style of an artwork.  Also decides its save-key prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtworkKind {
    /// Strokes clipped to one outline.
    Outline,
    /// Tap-to-fill regions.
    Regions,
    /// Strokes anywhere on the canvas.
    Freehand,
}

impl ArtworkKind {
    pub fn key_prefix(&self) -> &'static str {
        match self {
            ArtworkKind::Outline => "FruitDrawing",
            ArtworkKind::Regions => "FillDrawing",
            ArtworkKind::Freehand => "Mode3Drawing",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ArtworkKind::Outline => "outline",
            ArtworkKind::Regions => "regions",
            ArtworkKind::Freehand => "freehand",
        }
    }
}

/// Shape data that comes with an artwork.
#[derive(Clone, Debug)]
pub enum ArtworkShapes {
    Boundary(Shape),
    Regions(RegionSet),
    Unbounded,
}

/// Everything the engine needs to activate one artwork.
#[derive(Clone, Debug)]
pub struct ArtworkHandle {
    pub id: u32,
    pub kind: ArtworkKind,
    pub base_image: Option<RgbaImage>,
    /// Placement of the drawable rect in shape space.
    pub frame: ShapeFrame,
    pub shapes: ArtworkShapes,
}

impl ArtworkHandle {
    /// Stroke artwork clipped to `boundary`.  The frame defaults to the
    /// image's pixel grid.
    pub fn outline(id: u32, base_image: RgbaImage, boundary: Shape) -> Self {
        let frame = ShapeFrame::pixel_space(base_image.width(), base_image.height());
        Self {
            id,
            kind: ArtworkKind::Outline,
            base_image: Some(base_image),
            frame,
            shapes: ArtworkShapes::Boundary(boundary),
        }
    }

    pub fn regions(id: u32, base_image: RgbaImage, regions: Vec<Region>) -> Self {
        let frame = ShapeFrame::pixel_space(base_image.width(), base_image.height());
        Self {
            id,
            kind: ArtworkKind::Regions,
            base_image: Some(base_image),
            frame,
            shapes: ArtworkShapes::Regions(RegionSet::new(regions)),
        }
    }

    pub fn freehand(id: u32, base_image: Option<RgbaImage>) -> Self {
        let (w, h) = base_image
            .as_ref()
            .map(|img| img.dimensions())
            .unwrap_or((FREEHAND_FALLBACK_SIZE, FREEHAND_FALLBACK_SIZE));
        Self {
            id,
            kind: ArtworkKind::Freehand,
            base_image,
            frame: ShapeFrame::pixel_space(w, h),
            shapes: ArtworkShapes::Unbounded,
        }
    }

    pub fn with_frame(mut self, frame: ShapeFrame) -> Self {
        self.frame = frame;
        self
    }

    /// Persistence key, `"<prefix>_<id>"`.
    pub fn save_key(&self) -> String {
        format!("{}_{}", self.kind.key_prefix(), self.id)
    }

    /// Reject handles the engine cannot paint on.
    pub fn validate(&self) -> Result<()> {
        if self.id == 0 {
            return Err(EngineError::Configuration("artwork id 0 is not a valid selection".into()));
        }
        if !(self.frame.size.x.is_finite() && self.frame.size.y.is_finite())
            || self.frame.size.x == 0.0
            || self.frame.size.y == 0.0
        {
            return Err(EngineError::Asset(format!("artwork {} has a degenerate shape frame", self.id)));
        }

        match &self.base_image {
            Some(img) if img.width() == 0 || img.height() == 0 => {
                return Err(EngineError::Asset(format!("artwork {} has an empty base image", self.id)));
            }
            None if self.kind != ArtworkKind::Freehand => {
                return Err(EngineError::Asset(format!("artwork {} has no base image", self.id)));
            }
            _ => {}
        }

        match (self.kind, &self.shapes) {
            (ArtworkKind::Outline, ArtworkShapes::Boundary(shape)) => shape
                .validate()
                .map_err(|e| EngineError::Asset(format!("artwork {} boundary: {}", self.id, e))),
            (ArtworkKind::Regions, ArtworkShapes::Regions(set)) => {
                if set.is_empty() {
                    return Err(EngineError::Asset(format!("artwork {} has no regions", self.id)));
                }
                for region in set.iter() {
                    region.shape.validate().map_err(|e| {
                        EngineError::Asset(format!("artwork {} region '{}': {}", self.id, region.name, e))
                    })?;
                }
                Ok(())
            }
            (ArtworkKind::Freehand, _) => Ok(()),
            (kind, _) => Err(EngineError::Asset(format!(
                "artwork {} is a {} artwork without matching shape data",
                self.id,
                kind.name()
            ))),
        }
    }

    /// The buffer painting starts from: the base image reduced by
    /// `texture_scale` (nearest neighbour), or a blank background canvas.
    pub fn working_image(&self, texture_scale: u32, background: Rgba<u8>) -> RgbaImage {
        let scale = texture_scale.max(1);
        match &self.base_image {
            Some(img) if scale == 1 => img.clone(),
            Some(img) => {
                let w = (img.width() / scale).max(1);
                let h = (img.height() / scale).max(1);
                imageops::resize(img, w, h, FilterType::Nearest)
            }
            None => {
                let side = (FREEHAND_FALLBACK_SIZE / scale).max(1);
                RgbaImage::from_pixel(side, side, background)
            }
        }
    }
}

// ============================================================================
// TOML DESCRIPTORS
// ============================================================================

/// On-disk description of one artwork.
///
/// ```toml
/// id = 3
/// kind = "regions"
/// base_image = "pear.png"          # relative to this file
///
/// [frame]                          # optional, defaults to image pixels
/// origin = { x = 0.0, y = 0.0 }
/// size = { x = 1.0, y = 1.0 }
///
/// [[regions]]
/// name = "leaf"
/// shape = { type = "circle", center = { x = 0.5, y = 0.2 }, radius = 0.1 }
/// ```
#[derive(Clone, Debug, Deserialize)]
pub struct ArtworkDescriptor {
    pub id: u32,
    pub kind: ArtworkKind,
    #[serde(default)]
    pub base_image: Option<PathBuf>,
    #[serde(default)]
    pub frame: Option<ShapeFrame>,
    #[serde(default)]
    pub boundary: Option<Shape>,
    #[serde(default)]
    pub regions: Vec<RegionDescriptor>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RegionDescriptor {
    pub name: String,
    pub shape: Shape,
}

impl ArtworkDescriptor {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| EngineError::Asset(format!("malformed artwork descriptor: {e}")))
    }

    /// Read a descriptor file and resolve it (including the base image)
    /// into a validated handle.
    pub fn load(path: &Path) -> Result<ArtworkHandle> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Configuration(format!("cannot read artwork descriptor {}: {e}", path.display()))
        })?;
        let descriptor = Self::parse(&text)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        descriptor.resolve(base_dir)
    }

    /// Turn the descriptor into a handle; image paths are relative to `base_dir`.
    pub fn resolve(self, base_dir: &Path) -> Result<ArtworkHandle> {
        let base_image = match &self.base_image {
            Some(rel) => {
                let path = base_dir.join(rel);
                let img = image::open(&path).map_err(|e| {
                    EngineError::Asset(format!("cannot load base image {}: {e}", path.display()))
                })?;
                Some(img.into_rgba8())
            }
            None => None,
        };

        let shapes = match self.kind {
            ArtworkKind::Outline => match self.boundary {
                Some(shape) => ArtworkShapes::Boundary(shape),
                None => {
                    return Err(EngineError::Asset(format!("outline artwork {} has no boundary", self.id)));
                }
            },
            ArtworkKind::Regions => ArtworkShapes::Regions(RegionSet::new(
                self.regions
                    .into_iter()
                    .map(|r| Region::new(r.name, r.shape))
                    .collect(),
            )),
            ArtworkKind::Freehand => ArtworkShapes::Unbounded,
        };

        let (w, h) = base_image
            .as_ref()
            .map(|img| img.dimensions())
            .unwrap_or((FREEHAND_FALLBACK_SIZE, FREEHAND_FALLBACK_SIZE));
        let handle = ArtworkHandle {
            id: self.id,
            kind: self.kind,
            base_image,
            frame: self.frame.unwrap_or_else(|| ShapeFrame::pixel_space(w, h)),
            shapes,
        };
        handle.validate()?;
        Ok(handle)
    }
}
