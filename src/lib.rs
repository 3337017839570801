//! Fill-ratio estimation for blocked sparse matrix formats.
//!
//! Blocked formats such as BCSR store every `r × c` tile that contains a
//! nonzero densely; how much that inflates storage (the *fill ratio*)
//! decides whether blocking pays off. This crate estimates the fill
//! ratio of every candidate block shape up to a maximum dimension
//! straight from a CSR pattern, without converting anything: exactly,
//! deterministically per block row, or by randomized neighborhood
//! sampling with explicit accuracy/confidence control.
//!
//! ```rust
//! use blockfill::{CsrPattern, Exact, FillEstimator, NeighborhoodSampling};
//! use blockfill::rand::SeedableRng;
//! use blockfill::rand::rngs::StdRng;
//!
//! // 4×4 identity pattern
//! let ptr = [0, 1, 2, 3, 4];
//! let ind = [0, 1, 2, 3];
//! let a = CsrPattern::new(4, 4, &ptr, &ind)?;
//!
//! let exact: blockfill::FillProfile<f64> = Exact.profile(&a, 2)?;
//! assert_eq!(exact.get(2, 2), 2.0);
//!
//! let mut sampled = NeighborhoodSampling::new(StdRng::seed_from_u64(42), 0.1, 0.01);
//! let estimate: blockfill::FillProfile<f64> = sampled.profile(&a, 2)?;
//! assert!((estimate.get(2, 2) - exact.get(2, 2)).abs() <= 0.1 * exact.get(2, 2) + 1e-9);
//! # Ok::<(), blockfill::FillError>(())
//! ```

mod csr;
mod search;

mod sample;
mod estimate;
mod display;

pub use crate::csr::CsrPattern;
pub use crate::estimate::*;
pub use crate::sample::{SampledNonzero, SamplingMode, choose_nonzeros};
pub use crate::search::{lower_bound, upper_bound};
pub use rand;
