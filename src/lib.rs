//! Radio airplay matching library - shared modules for the CLI.

pub mod aggregate;
pub mod catalog;
pub mod error;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod query;
pub mod safety;
pub mod scoring;
pub mod window;
