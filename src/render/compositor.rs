use std::collections::HashMap;
use std::sync::Arc;

use kurbo::Shape;

use crate::animation::heartbeat::{PulseStyle, pulse_scale};
use crate::assets::decode::{IconSource, PreparedImage};
use crate::assets::glyphs;
use crate::assets::store::{OverlayAssets, TextBrushRgba8, TextLayoutEngine};
use crate::foundation::core::{Affine, BezPath, Canvas, Point, Rect};
use crate::foundation::error::{PulseError, PulseResult};
use crate::render::backend::FrameRGBA;
use crate::render::shapes::{HEART_ASPECT, LIGHTNING_ASPECT, heart_path, lightning_path};
use crate::resample::resampler::FrameValues;

/// Output height the reference layout was tuned at.
const REFERENCE_HEIGHT: f64 = 720.0;

// Reference layout, in pixels at 720p.
const LAYOUT_X: f64 = 100.0;
const LAYOUT_Y: f64 = 100.0;
const LINE_HEIGHT_XL: f64 = 130.0;
const LINE_HEIGHT_L: f64 = 100.0;
const LINE_SPACING: f64 = 30.0;
const ICON_SPACING: f64 = 20.0;
const ICON_HEIGHT: f64 = 90.0;
const FONT_SIZE_XL: f64 = 120.0;
const FONT_SIZE_L: f64 = 90.0;
const PANEL_PAD_X: f64 = 40.0;
const PANEL_PAD_Y: f64 = 30.0;
const PANEL_WIDTH: f64 = 660.0;
const PANEL_RADIUS: f64 = 28.0;

/// Upper bound on cached text layouts before the cache is flushed.
const TEXT_CACHE_LIMIT: usize = 512;

/// Colors and sizes of the overlay. Colors are straight-alpha RGBA8.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    /// Fill behind everything; blue by default so the overlay can be keyed out.
    pub background: [u8; 4],
    pub panel: [u8; 4],
    pub text: [u8; 4],
    pub outline: [u8; 4],
    /// Placeholder color for channels without readings.
    pub muted: [u8; 4],
    /// Fill of the built-in heart shape.
    pub heart: [u8; 4],
    /// Fill of the built-in lightning shape.
    pub lightning: [u8; 4],
    /// Text outline width at 720p.
    pub outline_px: f64,
    pub pulse: PulseStyle,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            background: [0, 0, 255, 255],
            panel: [0, 0, 0, 96],
            text: [255, 255, 255, 255],
            outline: [0, 0, 0, 255],
            muted: [150, 150, 150, 255],
            heart: [230, 40, 60, 255],
            lightning: [255, 204, 0, 255],
            outline_px: 4.0,
            pulse: PulseStyle::default(),
        }
    }
}

impl OverlayStyle {
    pub fn validate(&self) -> PulseResult<()> {
        if !self.outline_px.is_finite() || self.outline_px < 0.0 {
            return Err(PulseError::validation("outline_px must be finite and >= 0"));
        }
        self.pulse.validate()
    }
}

/// Icon artwork sized for one canvas, in color and muted variants.
#[derive(Clone, Debug)]
enum IconArt {
    Image {
        live: PreparedImage,
        muted: PreparedImage,
        aspect: f64,
    },
    Shape {
        path: BezPath,
        aspect: f64,
    },
}

impl IconArt {
    fn prepare(
        src: Option<&IconSource>,
        height_px: f64,
        builtin: fn() -> BezPath,
        aspect: f64,
    ) -> PulseResult<Self> {
        let Some(src) = src else {
            return Ok(Self::Shape {
                path: builtin(),
                aspect,
            });
        };
        let live = src.prepare(height_px.ceil().max(1.0) as u32)?;
        Ok(Self::Image {
            muted: greyscale(&live),
            aspect: src.aspect(),
            live,
        })
    }

    fn aspect(&self) -> f64 {
        match self {
            Self::Image { aspect, .. } | Self::Shape { aspect, .. } => *aspect,
        }
    }
}

/// Luma of premultiplied pixels; stays premultiplied because it never exceeds alpha.
fn greyscale(img: &PreparedImage) -> PreparedImage {
    let mut out = img.rgba8_premul.as_ref().clone();
    for px in out.chunks_exact_mut(4) {
        let y = ((77 * u32::from(px[0]) + 150 * u32::from(px[1]) + 29 * u32::from(px[2])) >> 8)
            .min(u32::from(px[3])) as u8;
        px[0] = y;
        px[1] = y;
        px[2] = y;
    }
    PreparedImage {
        width: img.width,
        height: img.height,
        rgba8_premul: Arc::new(out),
    }
}

/// Pixel-space layout for one canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
struct OverlayLayout {
    scale: f64,
    x: f64,
    power_top: f64,
    wkg_top: f64,
    hr_top: f64,
    panel: Rect,
}

impl OverlayLayout {
    fn for_canvas(canvas: Canvas) -> Self {
        let s = f64::from(canvas.height) / REFERENCE_HEIGHT;
        let x = LAYOUT_X * s;
        let power_top = LAYOUT_Y * s;
        let wkg_top = power_top + (LINE_HEIGHT_XL + LINE_SPACING) * s;
        let hr_top = wkg_top + (LINE_HEIGHT_L + LINE_SPACING) * s;
        let panel = Rect::new(
            x - PANEL_PAD_X * s,
            power_top - PANEL_PAD_Y * s,
            x - PANEL_PAD_X * s + PANEL_WIDTH * s,
            hr_top + (LINE_HEIGHT_L + PANEL_PAD_Y) * s,
        );
        Self {
            scale: s,
            x,
            power_top,
            wkg_top,
            hr_top,
            panel,
        }
    }
}

/// Canvas-sized overlay resources shared by every compositor of a render.
pub struct PreparedOverlay {
    canvas: Canvas,
    style: OverlayStyle,
    layout: OverlayLayout,
    font: Option<Arc<Vec<u8>>>,
    heart: IconArt,
    lightning: IconArt,
}

impl std::fmt::Debug for PreparedOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedOverlay")
            .field("canvas", &self.canvas)
            .field("font", &self.font.is_some())
            .finish_non_exhaustive()
    }
}

impl PreparedOverlay {
    pub fn new(canvas: Canvas, style: OverlayStyle, assets: &OverlayAssets) -> PulseResult<Self> {
        canvas.validate()?;
        style.validate()?;
        let layout = OverlayLayout::for_canvas(canvas);
        let icon_h = ICON_HEIGHT * layout.scale;
        Ok(Self {
            canvas,
            heart: IconArt::prepare(assets.heart_icon.as_ref(), icon_h, heart_path, HEART_ASPECT)?,
            lightning: IconArt::prepare(
                assets.lightning_icon.as_ref(),
                icon_h,
                lightning_path,
                LIGHTNING_ASPECT,
            )?,
            font: assets.font.clone(),
            layout,
            style,
        })
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    /// Displayed strings and heart scale for `v`.
    pub(crate) fn frame_key(&self, v: &FrameValues) -> FrameKey {
        let heart_rate = v.heart_rate_bpm.map(|hr| format!("{hr:.0} bpm"));
        let pulse = if heart_rate.is_some() {
            pulse_scale(v.heartbeat_phase, &self.style.pulse)
        } else {
            1.0
        };
        FrameKey {
            power: v.power_watts.map(|p| format!("{p:.0} W")),
            watts_per_kg: v.watts_per_kg.map(|w| format!("{w:.1} W/kg")),
            heart_rate,
            pulse_bits: pulse.to_bits(),
        }
    }
}

/// Everything that influences the pixels of a frame. Equal keys render identical frames.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct FrameKey {
    power: Option<String>,
    watts_per_kg: Option<String>,
    heart_rate: Option<String>,
    pulse_bits: u64,
}

enum TextFace {
    Font {
        engine: Box<TextLayoutEngine>,
        font: vello_cpu::peniko::FontData,
        layouts: HashMap<(String, u32, bool), parley::Layout<TextBrushRgba8>>,
    },
    Block,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LineSize {
    Xl,
    L,
}

/// Draws [`FrameValues`] into pixels. Holds a raster context and text caches, so keep one per
/// thread and reuse it across frames.
pub struct FrameCompositor {
    shared: Arc<PreparedOverlay>,
    face: TextFace,
    ctx: vello_cpu::RenderContext,
    pixmap: vello_cpu::Pixmap,
    heart_paint: Option<(vello_cpu::Image, vello_cpu::Image)>,
    lightning_paint: Option<(vello_cpu::Image, vello_cpu::Image)>,
}

impl FrameCompositor {
    pub fn new(shared: Arc<PreparedOverlay>) -> PulseResult<Self> {
        let w: u16 = shared
            .canvas
            .width
            .try_into()
            .map_err(|_| PulseError::validation("canvas width exceeds u16"))?;
        let h: u16 = shared
            .canvas
            .height
            .try_into()
            .map_err(|_| PulseError::validation("canvas height exceeds u16"))?;

        let face = match &shared.font {
            Some(bytes) => TextFace::Font {
                engine: Box::new(TextLayoutEngine::new(bytes)?),
                font: vello_cpu::peniko::FontData::new(
                    vello_cpu::peniko::Blob::from(bytes.as_ref().clone()),
                    0,
                ),
                layouts: HashMap::new(),
            },
            None => TextFace::Block,
        };

        Ok(Self {
            heart_paint: icon_paints(&shared.heart)?,
            lightning_paint: icon_paints(&shared.lightning)?,
            face,
            ctx: vello_cpu::RenderContext::new(w, h),
            pixmap: vello_cpu::Pixmap::new(w, h),
            shared,
        })
    }

    /// Prepare resources and build a single compositor.
    pub fn from_assets(
        canvas: Canvas,
        style: OverlayStyle,
        assets: &OverlayAssets,
    ) -> PulseResult<Self> {
        Self::new(Arc::new(PreparedOverlay::new(canvas, style, assets)?))
    }

    pub fn canvas(&self) -> Canvas {
        self.shared.canvas
    }

    /// Render one frame. Output depends only on `v` and the prepared resources.
    pub fn render(&mut self, v: &FrameValues) -> PulseResult<FrameRGBA> {
        let shared = Arc::clone(&self.shared);
        let style = &shared.style;
        let lay = shared.layout;
        let s = lay.scale;

        self.ctx.reset();
        self.ctx
            .set_blend_mode(vello_cpu::peniko::BlendMode::default());
        self.ctx
            .set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);

        // Background, then the dashboard panel.
        self.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_paint(color(style.background));
        self.ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(shared.canvas.width),
            f64::from(shared.canvas.height),
        ));
        let panel = kurbo::RoundedRect::from_rect(lay.panel, PANEL_RADIUS * s).to_path(0.1);
        self.ctx.set_paint(color(style.panel));
        self.ctx.fill_path(&bezpath_to_cpu(&panel));

        let key = shared.frame_key(v);

        // Power with lightning.
        let (power_text, power_live) = match &key.power {
            Some(t) => (t.as_str(), true),
            None => ("--- W", false),
        };
        let line_h = LINE_HEIGHT_XL * s;
        let text_w = self.draw_text(power_text, LineSize::Xl, lay.power_top, line_h, power_live)?;
        let icon_h = ICON_HEIGHT * s;
        let icon_x = lay.x + text_w + ICON_SPACING * s;
        let icon_y = lay.power_top + (line_h - icon_h) / 2.0;
        self.draw_icon(Icon::Lightning, icon_x, icon_y, icon_h, power_live, 1.0);

        // Watts per kilogram.
        let (wkg_text, wkg_live) = match &key.watts_per_kg {
            Some(t) => (t.as_str(), true),
            None => ("-.- W/kg", false),
        };
        self.draw_text(wkg_text, LineSize::L, lay.wkg_top, LINE_HEIGHT_L * s, wkg_live)?;

        // Heart rate with the pulsing heart.
        let (hr_text, hr_live) = match &key.heart_rate {
            Some(t) => (t.as_str(), true),
            None => ("--- bpm", false),
        };
        let line_h = LINE_HEIGHT_L * s;
        let text_w = self.draw_text(hr_text, LineSize::L, lay.hr_top, line_h, hr_live)?;
        let icon_x = lay.x + text_w + ICON_SPACING * s;
        let icon_y = lay.hr_top + (line_h - icon_h) / 2.0;
        self.draw_icon(
            Icon::Heart,
            icon_x,
            icon_y,
            icon_h,
            hr_live,
            f64::from_bits(key.pulse_bits),
        );

        self.ctx.flush();
        self.ctx.render_to_pixmap(&mut self.pixmap);
        Ok(FrameRGBA {
            width: shared.canvas.width,
            height: shared.canvas.height,
            data: self.pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }

    /// Draw outlined text left-aligned at the layout column, centered in the line box.
    /// Returns the text width.
    fn draw_text(
        &mut self,
        text: &str,
        size: LineSize,
        line_top: f64,
        line_h: f64,
        live: bool,
    ) -> PulseResult<f64> {
        let shared = Arc::clone(&self.shared);
        let style = &shared.style;
        let s = shared.layout.scale;
        let size_px = match size {
            LineSize::Xl => FONT_SIZE_XL,
            LineSize::L => FONT_SIZE_L,
        } * s;
        let fill = if live { style.text } else { style.muted };
        let o = style.outline_px * s;
        let d = o * std::f64::consts::FRAC_1_SQRT_2;
        let offsets = [
            (-o, 0.0),
            (o, 0.0),
            (0.0, -o),
            (0.0, o),
            (-d, -d),
            (d, -d),
            (-d, d),
            (d, d),
        ];
        let x = shared.layout.x;

        match &mut self.face {
            TextFace::Font {
                engine,
                font,
                layouts,
            } => {
                if layouts.len() >= TEXT_CACHE_LIMIT {
                    layouts.clear();
                }
                let key = (text.to_string(), (size_px as f32).to_bits(), live);
                let layout = match layouts.entry(key) {
                    std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
                    std::collections::hash_map::Entry::Vacant(e) => e.insert(engine.layout_line(
                        text,
                        size_px as f32,
                        TextBrushRgba8::from_array(fill),
                    )?),
                };
                let y = line_top + (line_h - f64::from(layout.height())) / 2.0;
                if o > 0.0 {
                    for (dx, dy) in offsets {
                        fill_layout(&mut self.ctx, layout, font, x + dx, y + dy, Some(style.outline));
                    }
                }
                fill_layout(&mut self.ctx, layout, font, x, y, None);
                Ok(f64::from(layout.width()))
            }
            TextFace::Block => {
                let dot = size_px / 10.0;
                let y = line_top + (line_h - glyphs::text_height(dot)) / 2.0;
                let rects = glyphs::text_rects(text, Point::new(x, y), dot);
                if o > 0.0 {
                    self.ctx.set_paint(color(style.outline));
                    for (dx, dy) in offsets {
                        self.ctx
                            .set_transform(vello_cpu::kurbo::Affine::translate((dx, dy)));
                        for r in &rects {
                            self.ctx.fill_rect(&rect_to_cpu(*r));
                        }
                    }
                }
                self.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
                self.ctx.set_paint(color(fill));
                for r in &rects {
                    self.ctx.fill_rect(&rect_to_cpu(*r));
                }
                Ok(glyphs::text_width(text, dot))
            }
        }
    }

    /// Draw an icon whose unscaled box starts at `(x, y)`, scaled by `scale` about its center.
    fn draw_icon(&mut self, icon: Icon, x: f64, y: f64, h: f64, live: bool, scale: f64) {
        let shared = Arc::clone(&self.shared);
        let style = &shared.style;
        let (art, paints, shape_color) = match icon {
            Icon::Heart => (&shared.heart, &self.heart_paint, style.heart),
            Icon::Lightning => (&shared.lightning, &self.lightning_paint, style.lightning),
        };
        let w = h * art.aspect();
        let center = Affine::translate((x + w / 2.0, y + h / 2.0))
            * Affine::scale(scale)
            * Affine::translate((-w / 2.0, -h / 2.0));

        if let (IconArt::Image { live: img, .. }, Some((live_paint, muted_paint))) = (art, paints) {
            let tr = center
                * Affine::scale_non_uniform(w / f64::from(img.width), h / f64::from(img.height));
            self.ctx.set_transform(affine_to_cpu(tr));
            self.ctx.set_paint(if live {
                live_paint.clone()
            } else {
                muted_paint.clone()
            });
            self.ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                0.0,
                0.0,
                f64::from(img.width),
                f64::from(img.height),
            ));
        } else {
            let path = match (art, icon) {
                (IconArt::Shape { path, .. }, _) => path.clone(),
                (IconArt::Image { .. }, Icon::Heart) => heart_path(),
                (IconArt::Image { .. }, Icon::Lightning) => lightning_path(),
            };
            self.ctx
                .set_transform(affine_to_cpu(center * Affine::scale_non_uniform(w, h)));
            self.ctx
                .set_paint(color(if live { shape_color } else { style.muted }));
            self.ctx.fill_path(&bezpath_to_cpu(&path));
        }
        self.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    }
}

#[derive(Clone, Copy, Debug)]
enum Icon {
    Heart,
    Lightning,
}

fn icon_paints(art: &IconArt) -> PulseResult<Option<(vello_cpu::Image, vello_cpu::Image)>> {
    match art {
        IconArt::Image { live, muted, .. } => Ok(Some((image_paint(live)?, image_paint(muted)?))),
        IconArt::Shape { .. } => Ok(None),
    }
}

fn fill_layout(
    ctx: &mut vello_cpu::RenderContext,
    layout: &parley::Layout<TextBrushRgba8>,
    font: &vello_cpu::peniko::FontData,
    x: f64,
    y: f64,
    paint_override: Option<[u8; 4]>,
) {
    ctx.set_transform(vello_cpu::kurbo::Affine::translate((x, y)));
    for line in layout.lines() {
        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };
            let brush = run.style().brush;
            ctx.set_paint(color(
                paint_override.unwrap_or([brush.r, brush.g, brush.b, brush.a]),
            ));
            let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                id: g.id,
                x: g.x,
                y: g.y,
            });
            ctx.glyph_run(font)
                .font_size(run.run().font_size())
                .fill_glyphs(glyphs);
        }
    }
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
}

fn color([r, g, b, a]: [u8; 4]) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(r, g, b, a)
}

fn image_paint(img: &PreparedImage) -> PulseResult<vello_cpu::Image> {
    let pixmap = pixmap_from_premul_bytes(&img.rgba8_premul, img.width, img.height)?;
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> PulseResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| PulseError::render("pixmap width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| PulseError::render("pixmap height exceeds u16"))?;
    if bytes.len()
        != (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    {
        return Err(PulseError::render("pixmap byte len mismatch"));
    }
    let pixels = bytes
        .chunks_exact(4)
        .map(|px| vello_cpu::peniko::color::PremulRgba8::from_u8_array([px[0], px[1], px[2], px[3]]))
        .collect::<Vec<_>>();
    let opaque = bytes.chunks_exact(4).all(|px| px[3] == 255);
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels, w, h, !opaque,
    ))
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::LineTo(p) => out.line_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::QuadTo(p1, p2) => out.quad_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
            ),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
                vello_cpu::kurbo::Point::new(p3.x, p3.y),
            ),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
