pub mod aws;
pub mod cli;
pub mod commands;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod export;
pub mod onepassword;
pub mod select;
pub mod session;

pub use error::Error;
