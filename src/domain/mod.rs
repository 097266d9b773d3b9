pub mod ca_settings;
pub mod contacts;

pub use ca_settings::*;
pub use contacts::*;
