//! Mixture model traits.

pub mod gmm;
