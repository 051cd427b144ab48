// Repository ports
// Implemented by adapters in infrastructure::repositories

pub mod user_repository;

pub use user_repository::{RepositoryError, RepositoryResult, UserRepository, UserTransaction};
