//! Built-in vector icons, drawn in a unit box and scaled by the caller.

use crate::foundation::core::{BezPath, Point};

/// Width over height of [`heart_path`].
pub(crate) const HEART_ASPECT: f64 = 1.1;
/// Width over height of [`lightning_path`].
pub(crate) const LIGHTNING_ASPECT: f64 = 0.62;

/// Heart outline filling `[0, 1] x [0, 1]`.
pub(crate) fn heart_path() -> BezPath {
    let p = Point::new;
    let mut bp = BezPath::new();
    bp.move_to(p(0.5, 0.96));
    bp.curve_to(p(0.2, 0.74), p(0.0, 0.54), p(0.0, 0.3));
    bp.curve_to(p(0.0, 0.12), p(0.13, 0.02), p(0.28, 0.02));
    bp.curve_to(p(0.38, 0.02), p(0.46, 0.08), p(0.5, 0.18));
    bp.curve_to(p(0.54, 0.08), p(0.62, 0.02), p(0.72, 0.02));
    bp.curve_to(p(0.87, 0.02), p(1.0, 0.12), p(1.0, 0.3));
    bp.curve_to(p(1.0, 0.54), p(0.8, 0.74), p(0.5, 0.96));
    bp.close_path();
    bp
}

/// Lightning bolt filling `[0, 1] x [0, 1]`.
pub(crate) fn lightning_path() -> BezPath {
    let mut bp = BezPath::new();
    bp.move_to((0.64, 0.0));
    bp.line_to((0.06, 0.58));
    bp.line_to((0.44, 0.58));
    bp.line_to((0.3, 1.0));
    bp.line_to((0.94, 0.38));
    bp.line_to((0.56, 0.38));
    bp.line_to((0.76, 0.0));
    bp.close_path();
    bp
}

#[cfg(test)]
#[path = "../../tests/unit/render/shapes.rs"]
mod tests;
