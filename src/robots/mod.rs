//! Robots.txt handling module
//!
//! This module provides fetching, parsing and per-run caching of robots.txt files.

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::ParsedRobots;
