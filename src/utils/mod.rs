//! Utilities: paths and logging

pub mod logging;
pub mod paths;
