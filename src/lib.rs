//! scenic-planner core
//!
//! Builds a gridded scenic heatmap from scored street-level samples and ranks
//! alternative driving routes by coverage-weighted scenic score against travel
//! time. Road routing and image scoring are collaborators behind traits.

pub mod error;
pub mod config;
pub mod traits;
pub mod haversine;
pub mod polyline;
pub mod cache;
pub mod retry;
pub mod osrm;
pub mod sampling;
pub mod heatmap;
pub mod index;
pub mod generator;
pub mod scorer;
pub mod ranker;
pub mod planner;

pub use config::PlannerConfig;
pub use error::{Result, ScenicError};
pub use planner::{PlanOutcome, ScenicPlanner};
