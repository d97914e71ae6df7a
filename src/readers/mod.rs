//! Adapters from the usual text formats to the typed inputs of the pipeline.
//!
//! * [`horizons`]: JPL Horizons vector tables (km, km/s) into a [`crate::trajectory::Trajectory`],
//! * [`tables`]: CSV tables of observations, factors and fixed predictions.
//!
//! The geomagnetic coefficient reader lives with the field model in
//! [`crate::geomagnetic`].
//!
//! Anomalies are written in mm/s in every table and converted to m/s here.

pub mod horizons;
pub mod tables;

pub use horizons::{read_horizons_file, read_horizons_vectors};
pub use tables::{
    read_factor_table, read_factor_table_file, read_fixed_predictions,
    read_fixed_predictions_file, read_observations, read_observations_file,
};
