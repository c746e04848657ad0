// Harvest pipeline: normalize -> plan -> merge -> views/rollup

pub mod harvest;
pub mod merge;
pub mod normalize;
pub mod planner;
pub mod rollup;
pub mod views;

// Re-export the entry points callers need
pub use harvest::{rebuild_views, HarvestReport, Harvester};
