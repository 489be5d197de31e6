//! Phrase catalog library - linking and indexing engine shared by all binaries.

pub mod aggregate;
pub mod export;
pub mod identifier;
pub mod loader;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod resolver;
pub mod safety;
