pub mod account;
pub mod catalog;
pub mod config;
pub mod dedup;
pub mod deletion;
pub mod error;
pub mod feed;
mod http;
pub mod io;
pub mod paths;
pub mod types;

pub use error::{Result, VoyagerError};
