//! Built-in 5x7 block glyphs used when no font is supplied.

use crate::foundation::core::{Point, Rect};

/// Glyph cell width in dots.
pub(crate) const GLYPH_COLS: u32 = 5;
/// Glyph cell height in dots.
pub(crate) const GLYPH_ROWS: u32 = 7;
/// Horizontal advance per character in dots (one dot of tracking).
pub(crate) const ADVANCE_COLS: u32 = GLYPH_COLS + 1;

/// Rows of a glyph, top first; bit 4 is the leftmost dot. Unknown characters are blank.
pub(crate) fn glyph_rows(c: char) -> [u8; 7] {
    match c {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '.' => [0, 0, 0, 0, 0, 0b01100, 0b01100],
        '-' => [0, 0, 0, 0b11111, 0, 0, 0],
        '/' => [0, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'k' => [0b10000, 0b10000, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010],
        'g' => [0, 0b01111, 0b10001, 0b10001, 0b01111, 0b00001, 0b01110],
        'b' => [0b10000, 0b10000, 0b10110, 0b11001, 0b10001, 0b10001, 0b11110],
        'p' => [0, 0, 0b11110, 0b10001, 0b11110, 0b10000, 0b10000],
        'm' => [0, 0, 0b11010, 0b10101, 0b10101, 0b10001, 0b10001],
        _ => [0; 7],
    }
}

/// Width of `text` in pixels at `dot` pixels per dot, without trailing tracking.
pub(crate) fn text_width(text: &str, dot: f64) -> f64 {
    let n = text.chars().count() as f64;
    if n == 0.0 {
        return 0.0;
    }
    (n * f64::from(ADVANCE_COLS) - 1.0) * dot
}

/// Height of a line in pixels at `dot` pixels per dot.
pub(crate) fn text_height(dot: f64) -> f64 {
    f64::from(GLYPH_ROWS) * dot
}

/// Dot rectangles for `text` with its top-left corner at `origin`.
///
/// Horizontal runs of dots in a row are merged into one rectangle.
pub(crate) fn text_rects(text: &str, origin: Point, dot: f64) -> Vec<Rect> {
    let mut out = Vec::new();
    for (ci, c) in text.chars().enumerate() {
        let gx = origin.x + (ci as f64) * f64::from(ADVANCE_COLS) * dot;
        for (ri, row) in glyph_rows(c).iter().enumerate() {
            let y0 = origin.y + (ri as f64) * dot;
            let mut col = 0;
            while col < GLYPH_COLS {
                if row & (1 << (GLYPH_COLS - 1 - col)) == 0 {
                    col += 1;
                    continue;
                }
                let start = col;
                while col < GLYPH_COLS && row & (1 << (GLYPH_COLS - 1 - col)) != 0 {
                    col += 1;
                }
                out.push(Rect::new(
                    gx + f64::from(start) * dot,
                    y0,
                    gx + f64::from(col) * dot,
                    y0 + dot,
                ));
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/assets/glyphs.rs"]
mod tests;
