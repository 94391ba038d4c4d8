pub mod env_vars;

pub use env_vars::*;
