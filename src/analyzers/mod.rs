//! Location analysis over a generated establishment map.
//!
//! Given a point of interest, this module measures distances to every
//! establishment, ranks the largest emitters nearby, pivots their histories
//! into chart rows, and summarizes regional, category and residue figures.

pub mod analyzer;
pub mod types;
pub mod utility;
