//! Aircraft risk scoring for AeroFresh
//!
//! Domain records for aircraft, accidents and airworthiness directives,
//! plus the bounded 0-100 risk score derived from them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod types;
pub mod scoring;

pub use error::{Error, Result};
pub use types::*;
pub use scoring::{RiskFormula, RiskScorer, ScoreInputs};
