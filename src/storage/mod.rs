//! Storage modules: config, cache, targets, sinks

pub mod cache;
pub mod config;
pub mod firestore;
pub mod sink;
pub mod targets;
