//! # AccessGraph Recommender — Least-Privilege Narrowing
//!
//! Mines the graph for evidence of actual use to tighten wildcard grants:
//! principals attached to a wildcard policy are walked to their reachable
//! resources, and the actions observed along those paths become the
//! suggested replacement for the wildcard.

pub mod recommender;

pub use recommender::{Recommendation, Recommender};
