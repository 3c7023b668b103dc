//! Render jobs: request validation, the render/encode runner and the job registry.

pub(crate) mod manager;
pub(crate) mod request;
pub(crate) mod runner;
pub(crate) mod state;
