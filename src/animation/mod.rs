//! Heartbeat animation model.

pub(crate) mod ease;
pub(crate) mod heartbeat;
