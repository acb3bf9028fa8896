pub mod db;
pub mod error;
pub mod metrics;
pub mod models;
pub mod plan;
pub mod progress;
pub mod service;
pub mod targets;
pub mod tasks;
pub mod templates;

pub use error::{PlanError, Result};
