pub mod apis;
pub mod constants;
pub mod config;
pub mod domain;
pub mod error;
pub mod integrity;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod storage;

// Ports the pipeline depends on
pub mod app;
