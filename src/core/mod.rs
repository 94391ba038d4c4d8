pub mod constants;
pub mod switcher;
pub mod upgrade;

pub use switcher::*;
pub use upgrade::*;
