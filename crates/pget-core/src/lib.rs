pub mod chunk;
pub mod config;
pub mod fetcher;
pub mod logging;
pub mod planner;
pub mod probe;
pub mod progress;
pub mod session;
pub mod url_model;
pub mod writer;
