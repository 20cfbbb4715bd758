//! Data models.

pub mod config;
pub mod disc;
pub mod record;
pub mod track;
