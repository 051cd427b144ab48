// Infrastructure layer module
// Contains database and cache adapters
// Follows Hexagonal Architecture

pub mod cache;
pub mod repositories;
