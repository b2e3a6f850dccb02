//! Normalization of insertion counts across replicates

mod factors;

pub use factors::{normalize_data, NormMethod};
