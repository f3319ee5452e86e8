//! Student admission automation: pull the exam dataset, pick the best
//! applicants, give them synthetic names, and write welcome letters plus an
//! admission list that links to them.

pub mod analyzer;
pub mod anonymizer;
pub mod error;
pub mod fetcher;
pub mod letters;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod telemetry;

pub use error::{AdmissionError, AdmissionResult};
pub use models::Config;
pub use pipeline::{AdmissionPipeline, RunOutcome};
