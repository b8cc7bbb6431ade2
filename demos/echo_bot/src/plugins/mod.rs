//! Handlers linked into the bot. Which ones run is decided by the
//! manifests under `plugins/`.

pub mod audit;
pub mod echo;
pub mod greet;
