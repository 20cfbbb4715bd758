//! Core pipeline modules.

pub mod classifier;
pub mod locator;
pub mod orchestrator;
pub mod parser;
pub mod placer;
pub mod remux;
pub mod store;
