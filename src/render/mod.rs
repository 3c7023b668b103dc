//! CPU compositing of overlay frames.

pub(crate) mod backend;
pub(crate) mod compositor;
pub(crate) mod shapes;
