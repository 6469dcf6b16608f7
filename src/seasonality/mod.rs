//! Seasonal-trend decomposition.

mod mstl;
mod stl;

pub use mstl::{Mstl, MultiDecomposition};
pub use stl::{Decomposition, Stl};
