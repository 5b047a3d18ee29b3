//! `cuebus-protocol` — WebSocket frame shapes and method names.

pub mod frames;
pub mod methods;
