//! Core modules: credential resolution, scraping, trending

pub mod browser;
pub mod cookies;
pub mod credentials;
pub mod refresher;
pub mod scraper;
pub mod webdriver;
pub mod youtube;
