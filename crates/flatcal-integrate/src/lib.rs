//! Calibrates, normalizes, and combines one exposure group's flats into a
//! single master-flat XISF file, per directory job. Pairs with
//! `flatcal-match` for dark selection; owns the pixel math and the output
//! naming/writing that selection feeds into.

mod engine;
mod error;
mod naming;
mod rejection;

pub use engine::{integrate_group, integrate_job, GroupOutcome, JobOutcome};
pub use error::{Error, Result};
