//! cf-core: shared foundation for cellflow.
//!
//! Contains:
//! - units (uom SI types + constructors for electrical quantities)
//! - numeric (Real + tolerances + the never-trigger sentinel)
//! - params (named parameter values, e.g. "Cell capacity [A.h]")
//! - error (shared error types)

pub mod error;
pub mod numeric;
pub mod params;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use numeric::*;
pub use params::ParameterValues;
pub use units::*;
