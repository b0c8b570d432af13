pub mod analysis;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod reports;

pub use error::{AnalysisError, PollError, SourceError, StoreError};
