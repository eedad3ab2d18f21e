pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod retry;

pub use config::ExecutorConfig;
pub use context::ExecutionContext;
pub use error::ExecutionError;
pub use executor::{ExecutionReport, StepExecutor};
pub use retry::RetryStrategy;
