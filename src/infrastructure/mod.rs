pub mod certutil;
pub mod memory;
pub mod outlook;
pub mod process;
pub mod prompt;
pub mod windows_services;

pub use certutil::*;
pub use outlook::*;
pub use process::*;
pub use prompt::*;
pub use windows_services::*;
