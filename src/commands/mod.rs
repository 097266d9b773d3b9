pub mod ca_config;
pub mod gal_sync;

pub use ca_config::*;
pub use gal_sync::*;
