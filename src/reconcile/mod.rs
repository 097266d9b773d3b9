pub mod backup;
pub mod cancel;
pub mod collaborators;
pub mod configuration;
pub mod directory;

pub use backup::*;
pub use cancel::*;
pub use collaborators::*;
pub use configuration::*;
pub use directory::*;
