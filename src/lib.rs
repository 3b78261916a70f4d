// Thumbsmith Library
// Lazy, content-addressed thumbnail derivation served over Pingora

pub mod cache_path;
pub mod color;
pub mod compositor;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod materializer;
pub mod metrics;
pub mod options;
pub mod placeholder;
pub mod raster;
pub mod remote;
pub mod security;
pub mod server;
pub mod thumb;
