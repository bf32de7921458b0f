//! Review analytics for short-let properties: ingestion of channel reviews,
//! website approval, and the KPI, trend, issue and comparison views built
//! on top of them.

pub mod approval;
pub mod comparison;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod issues;
pub mod kpi;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod rating;
pub mod report;
pub mod response;
pub mod series;
pub mod spikes;
pub mod store;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use models::{PropertyReviews, ReviewFilter, ReviewRecord};
pub use store::{MemoryStore, ReviewStore};
