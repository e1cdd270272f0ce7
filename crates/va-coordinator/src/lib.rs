pub mod coordinator;
pub mod error;
pub mod noop;
pub mod redis_backend;

pub use coordinator::{AdmitPolicy, AdmitResult, Coordinator};
pub use error::{CoordinatorError, Result};
pub use noop::NoopCoordinator;
pub use redis_backend::RedisCoordinator;
