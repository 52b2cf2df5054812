pub mod circleci;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod report;
