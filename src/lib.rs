pub mod bucket;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod haar;
pub mod imgdb;
pub mod metrics;
pub mod resizer;
pub mod server;
pub mod signature;
pub mod types;

pub use error::{Error, Result};
pub use imgdb::IQDB;
pub use signature::HaarSignature;
