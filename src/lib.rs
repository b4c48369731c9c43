pub mod charts;
pub mod cleaner;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod loader;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod storage;
pub mod types;
