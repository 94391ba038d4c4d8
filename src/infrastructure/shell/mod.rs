pub mod backend;
pub mod integration;
pub mod platform;
pub mod templates;

pub use backend::*;
pub use integration::*;
pub use platform::*;
pub use templates::*;
