//! SQES: Seismic Quality Evaluation System
//!
//! Evaluates the operational quality of seismic stations in a network for a
//! given day: acquires three-component broadband waveform data and instrument
//! response metadata, computes per-channel time-domain and spectral quality
//! metrics, compares spectra against the Peterson (1993) noise models, and
//! aggregates per-channel scores into a station-level classification.
//!
//! ## Pipeline
//!
//! `Orchestrator` enumerates stations for a date range under a bounded worker
//! pool. Each `StationWorker` drives one station through waveform/inventory
//! acquisition, `metrics::basic` and `metrics::ppsd`, persists per-channel
//! detail rows via the `db::Repository`, then hands off to `grading` to
//! produce the station's analysis row.

pub mod cli;
pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod grading;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod noise_model;
pub mod orchestrator;
pub mod types;
pub mod worker;

pub use error::SqesError;
pub use types::{AnalysisRow, Classification, DetailRow, QcThresholds, ScoringInput, Station};
