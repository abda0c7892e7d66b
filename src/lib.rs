#[macro_use]
extern crate log;
#[macro_use]
extern crate derive_builder;
#[macro_use]
extern crate lazy_static;

pub mod browser_controller;
pub mod capturer;
pub mod checkpoint;
pub mod classifier;
pub mod document;
pub mod exporter;
pub mod extractor;
pub mod logging;
pub mod scraper;
pub mod types;
pub mod utils;
