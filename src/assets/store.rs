use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::assets::decode::IconSource;
use crate::foundation::error::{PulseError, PulseResult};

/// Families tried, in order, when resolving a system sans-serif face.
const SYSTEM_SANS_FAMILIES: &[&str] = &[
    "DejaVu Sans",
    "Liberation Sans",
    "Noto Sans",
    "Helvetica",
    "Arial",
];

/// Pre-loaded artwork handed to the compositor.
///
/// Every slot is optional. Without icons the overlay draws built-in vector shapes. Without a font
/// it uses built-in block glyphs; [`OverlayAssets::system`] and [`OverlayAssets::load`] fill the
/// font from the system font set first.
#[derive(Clone, Debug, Default)]
pub struct OverlayAssets {
    pub(crate) font: Option<Arc<Vec<u8>>>,
    pub(crate) heart_icon: Option<IconSource>,
    pub(crate) lightning_icon: Option<IconSource>,
}

impl OverlayAssets {
    /// Assets that use only the built-in glyphs and shapes.
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Built-in shapes with a system sans-serif font, or block glyphs if none is installed.
    pub fn system() -> Self {
        Self::builtin().with_system_font()
    }

    /// Fill an empty font slot from the system font set.
    pub fn with_system_font(mut self) -> Self {
        if self.font.is_none() {
            self.font = system_sans_font().map(Arc::new);
        }
        self
    }

    /// Decode caller-supplied bytes. Fonts are checked by registering them once.
    pub fn from_bytes(
        font: Option<Vec<u8>>,
        heart_icon: Option<&[u8]>,
        lightning_icon: Option<&[u8]>,
    ) -> PulseResult<Self> {
        if let Some(bytes) = font.as_deref() {
            TextLayoutEngine::new(bytes)?;
        }
        Ok(Self {
            font: font.map(Arc::new),
            heart_icon: heart_icon.map(IconSource::decode).transpose()?,
            lightning_icon: lightning_icon.map(IconSource::decode).transpose()?,
        })
    }

    /// Read and decode assets from disk. Without a font path the system sans-serif face is used.
    pub fn load(
        font: Option<&Path>,
        heart_icon: Option<&Path>,
        lightning_icon: Option<&Path>,
    ) -> PulseResult<Self> {
        fn read(p: Option<&Path>, what: &str) -> PulseResult<Option<Vec<u8>>> {
            p.map(|p| {
                std::fs::read(p)
                    .with_context(|| format!("read {what} '{}'", p.display()))
                    .map_err(PulseError::from)
            })
            .transpose()
        }

        let font = read(font, "font")?;
        let heart = read(heart_icon, "heart icon")?;
        let lightning = read(lightning_icon, "lightning icon")?;
        let out = Self::from_bytes(font, heart.as_deref(), lightning.as_deref())?
            .with_system_font();
        tracing::debug!(
            font = out.has_font(),
            heart = out.heart_icon.is_some(),
            lightning = out.lightning_icon.is_some(),
            "loaded overlay assets"
        );
        Ok(out)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }
}

/// Bytes of a sans-serif system face that Parley can register, if one is installed.
pub(crate) fn system_sans_font() -> Option<Vec<u8>> {
    use usvg::fontdb::{Database, Family, Query, Weight};

    let mut db = Database::new();
    db.load_system_fonts();

    let families = std::iter::once(Family::SansSerif)
        .chain(SYSTEM_SANS_FAMILIES.iter().map(|name| Family::Name(*name)));
    let ids = families.flat_map(|family| {
        let families = [family];
        [Weight::BOLD, Weight::NORMAL]
            .into_iter()
            .filter_map(|weight| {
                db.query(&Query {
                    families: &families,
                    weight,
                    ..Query::default()
                })
            })
            .collect::<Vec<_>>()
    });

    for id in ids.chain(db.faces().map(|f| f.id)) {
        let Some(bytes) = db.with_face_data(id, |data, _index| data.to_vec()) else {
            continue;
        };
        match TextLayoutEngine::new(&bytes) {
            Ok(engine) => {
                tracing::debug!(family = engine.family_name(), "using system font");
                return Some(bytes);
            }
            Err(e) => tracing::debug!(error = %e, "skipping unusable system font"),
        }
    }
    tracing::warn!("no usable system font found; falling back to block glyphs");
    None
}

/// RGBA8 brush color carried through Parley layouts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct TextBrushRgba8 {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
    pub(crate) a: u8,
}

impl TextBrushRgba8 {
    pub(crate) fn from_array([r, g, b, a]: [u8; 4]) -> Self {
        Self { r, g, b, a }
    }
}

/// Parley contexts bound to one registered font family.
pub(crate) struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    family_name: String,
}

impl TextLayoutEngine {
    /// Register `font_bytes` and remember the family it provides.
    pub(crate) fn new(font_bytes: &[u8]) -> PulseResult<Self> {
        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.to_vec()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            PulseError::validation("no font families registered from font bytes")
        })?;
        let family_name = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| PulseError::validation("registered font family has no name"))?
            .to_string();

        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family_name,
        })
    }

    pub(crate) fn family_name(&self) -> &str {
        &self.family_name
    }

    /// Shape a single unwrapped line.
    pub(crate) fn layout_line(
        &mut self,
        text: &str,
        size_px: f32,
        brush: TextBrushRgba8,
    ) -> PulseResult<parley::Layout<TextBrushRgba8>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(PulseError::validation(
                "text size_px must be finite and > 0",
            ));
        }

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(self.family_name.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/store.rs"]
mod tests;
