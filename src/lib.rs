//! Disc Organizer Library
//!
//! Turns ripped disc images (ISO, BDMV, VIDEO_TS) into a movie and TV
//! library: remux with MakeMKV, classify tracks by duration, then file them.

pub mod cli;
pub mod core;
pub mod error;
pub mod generators;
pub mod models;
pub mod preflight;
pub mod services;
pub mod utils;

pub use error::{Error, Result};
