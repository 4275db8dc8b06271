//! yt-trends library
//!
//! Credential resolution and scraping pipeline behind the yt-trends CLI.

pub mod core;
pub mod error;
pub mod storage;
pub mod types;
pub mod ui;
pub mod utils;
