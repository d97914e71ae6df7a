//! # flyby
//!
//! Earth flyby velocity anomaly analysis.
//!
//! Spacecraft trajectories are reduced to a handful of *physical factors*, time integrals
//! of force-like quantities along the Earth-fixed path, and a prediction model with two
//! free couplings is fitted globally against the measured anomalies:
//!
//! ```text
//! Trajectory ─► FrameConverter ─► FieldEvaluator ─► IntegrandEvaluator ─► TemporalIntegrator
//!                                                                              │
//!                              HypothesisComparator ◄─ ModelFitter ◄─ FactorTable
//! ```
//!
//! * [`frame_converter`]: inertial to Earth-fixed states (latitude, altitude, speed),
//! * [`geomagnetic`]: spherical-harmonic main field,
//! * [`integrands`] and [`integration`]: per-sample integrands and their trapezoidal
//!   integrals,
//! * [`pipeline`]: the four stages above for a whole trajectory set,
//! * [`models`], [`fit`] and [`statistics`]: prediction models, global Levenberg–Marquardt
//!   fit, χ² comparison,
//! * [`analysis`]: fit, alternative model and held-out spacecraft in one report,
//! * [`readers`]: Horizons vector tables and CSV inputs.
//!
//! Enable the `parallel` feature to derive the factors of several spacecraft on the rayon
//! thread pool.

pub mod analysis;
pub mod config;
pub mod constants;
pub mod earth_orientation;
pub mod factors;
pub mod fit;
pub mod flyby_errors;
pub mod frame_converter;
pub mod geomagnetic;
pub mod integrands;
pub mod integration;
pub mod models;
pub mod observations;
pub mod pipeline;
pub mod readers;
pub mod ref_system;
pub mod statistics;
pub mod time;
pub mod trajectory;

pub use analysis::{AnalysisPlan, AnalysisReport, FixedPredictions, FlybyAnalysis};
pub use config::AnalysisConfig;
pub use constants::SpacecraftId;
pub use factors::{FactorTable, PhysicalFactors};
pub use fit::{FitProblem, FitResult, ModelFitter};
pub use flyby_errors::{FitFailure, FlybyError};
pub use integrands::Term;
pub use models::{ModelVariant, PredictionModel};
pub use observations::{ObservationRecord, ObservationSet};
pub use pipeline::FactorPipeline;
pub use statistics::{HypothesisComparator, ModelComparisonResult};
pub use trajectory::{Trajectory, TrajectorySample};
