//! Loader-facing exports

pub mod exports;
