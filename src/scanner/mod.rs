//! Application artifact discovery and removal: bundle lookup, library walk,
//! deletion-safety classification, deletion.

pub mod deletion;
pub mod locator;
pub mod manifest;
pub mod patterns;
pub mod protection;
pub mod walker;
