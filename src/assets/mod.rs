//! Fonts, icons and built-in glyphs for the overlay.

pub(crate) mod decode;
pub(crate) mod glyphs;
pub(crate) mod store;
