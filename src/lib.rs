//! polar_ec - EC / temperature / growth analysis core
//!
//! Loads the per-school environment logs and the growth workbook of the
//! polar plant EC study, averages them per school, joins the two and
//! correlates the result. Rendering is left to the caller; the frames and
//! export modules hand over DataFrames and spreadsheet bytes.

pub mod config;
pub mod data;
pub mod export;
pub mod stats;
