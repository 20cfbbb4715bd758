//! External collaborators: metadata probe, title lookup and hooks.

pub mod ffprobe;
pub mod hooks;
pub mod tmdb;
