pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod query;

pub use error::{Error, Result};
