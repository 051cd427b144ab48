//! Accounts API Library
//!
//! User account management over PostgreSQL with a Redis (or in-process)
//! cache in front of it. The core is [`services::UserService`]: cache-aside
//! reads, write invalidation and the chunked bulk pipeline.

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod services;
