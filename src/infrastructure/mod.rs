pub mod config;
pub mod remote;
pub mod shell;

pub use config::Config;
