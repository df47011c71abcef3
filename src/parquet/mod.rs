//! Handles serialising and saving data to disk in the _parquet_ file format.

pub mod availability;

pub use availability::save_availability;
