//! UI modules: terminal display

pub mod display;
