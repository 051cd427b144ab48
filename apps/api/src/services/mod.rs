// Application services
// The consistency engine: cache-aside reads, write invalidation and the bulk
// mutation pipeline, all driven through the domain ports.

pub mod bulk;
pub mod errors;
pub mod user_service;

pub use bulk::{BulkItemError, BulkOperationResult, BulkUserUpdate};
pub use errors::{ServiceResult, UserServiceError};
pub use user_service::{ServiceConfig, UserService};
