//! Diagnostic inference engine for activity-tracking pipelines.
//!
//! A run queries every signal checker concurrently, normalizes the results
//! into evidence, scores a fixed catalog of issues with sequential Bayesian
//! updates, links co-occurring issues through a static cause/effect table and
//! returns one [`DiagnosticReport`]. Runs never fail; unreachable signals are
//! recorded in the report's reasoning trace instead.

pub mod activity;
pub mod catalog;
pub mod chains;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod report;
pub mod scoring;
pub mod signals;

pub use catalog::{CATALOG, CAUSAL_LINKS, IssueDefinition, IssueType};
pub use config::EngineConfig;
pub use engine::DiagnosticEngine;
pub use error::{CatalogError, CheckerError};
pub use report::{DiagnosticReport, TrackingStatus};
pub use signals::{SignalCheckers, SignalId};
