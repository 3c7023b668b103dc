use std::sync::Arc;

use anyhow::Context;

use crate::foundation::error::{PulseError, PulseResult};
use crate::foundation::math::premultiply_rgba8_in_place;

/// Largest edge, in pixels, an icon may be rasterized to.
const MAX_ICON_DIM: u32 = 4096;

/// Raster image in premultiplied RGBA8 form.
#[derive(Clone, Debug)]
pub(crate) struct PreparedImage {
    pub(crate) width: u32,
    pub(crate) height: u32,
    /// Row-major premultiplied RGBA8.
    pub(crate) rgba8_premul: Arc<Vec<u8>>,
}

/// An icon as supplied by the caller, before it is sized for a canvas.
#[derive(Clone, Debug)]
pub(crate) enum IconSource {
    Raster(PreparedImage),
    Svg(Arc<usvg::Tree>),
}

impl IconSource {
    /// Decode PNG/JPEG bytes, or SVG when the payload looks like markup.
    pub(crate) fn decode(bytes: &[u8]) -> PulseResult<Self> {
        if looks_like_svg(bytes) {
            return Ok(Self::Svg(parse_svg(bytes)?));
        }
        Ok(Self::Raster(decode_image(bytes)?))
    }

    /// Width over height of the source artwork.
    pub(crate) fn aspect(&self) -> f64 {
        match self {
            Self::Raster(img) => f64::from(img.width) / f64::from(img.height.max(1)),
            Self::Svg(tree) => {
                let size = tree.size();
                f64::from(size.width()) / f64::from(size.height()).max(1e-6)
            }
        }
    }

    /// Produce pixels for drawing at `height_px`. SVGs are rasterized at that size so they stay
    /// sharp; raster images keep their pixels and are scaled at draw time.
    pub(crate) fn prepare(&self, height_px: u32) -> PulseResult<PreparedImage> {
        match self {
            Self::Raster(img) => Ok(img.clone()),
            Self::Svg(tree) => {
                let h = height_px.max(1);
                let w = ((f64::from(h) * self.aspect()).ceil() as u32).max(1);
                if w > MAX_ICON_DIM || h > MAX_ICON_DIM {
                    return Err(PulseError::render(format!(
                        "svg raster size too large: {w}x{h} (max {MAX_ICON_DIM}x{MAX_ICON_DIM})"
                    )));
                }
                rasterize_svg(tree, w, h)
            }
        }
    }
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'<')
}

pub(crate) fn decode_image(bytes: &[u8]) -> PulseResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(PulseError::validation("image has zero width or height"));
    }

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

pub(crate) fn parse_svg(bytes: &[u8]) -> PulseResult<Arc<usvg::Tree>> {
    let opts = usvg::Options::default();
    let tree = usvg::Tree::from_data(bytes, &opts).context("parse svg tree")?;
    Ok(Arc::new(tree))
}

/// Render `tree` stretched to `width`x`height`. tiny-skia output is already premultiplied.
pub(crate) fn rasterize_svg(
    tree: &usvg::Tree,
    width: u32,
    height: u32,
) -> PulseResult<PreparedImage> {
    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| PulseError::render("failed to allocate svg pixmap"))?;

    let sx = (width as f32) / tree.size().width();
    let sy = (height as f32) / tree.size().height();
    let xform = resvg::tiny_skia::Transform::from_scale(sx, sy);

    resvg::render(tree, xform, &mut pixmap.as_mut());
    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(pixmap.take()),
    })
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
