// reviewtrend: topic trends from app store reviews
//
// This is the library root. Each module corresponds to a stage or a
// subsystem of the review -> topic -> trend pipeline.

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod playstore;
pub mod status;
pub mod topics;
pub mod trend;
