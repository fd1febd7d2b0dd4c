//! 核心编排层：错误分类、状态机、主控循环、Campaign 控制器、单步执行器、构建与关闭

pub mod builder;
pub mod controller;
pub mod error;
pub mod executor;
pub mod runtime;
pub mod shutdown;
pub mod state;

pub use builder::{create_runner, RuntimeComponents};
pub use controller::CampaignController;
pub use error::{FetchError, OracleError, RuntimeError, StepError, StorageError};
pub use executor::{StepExecutor, StepOutcome};
pub use runtime::{CampaignRunner, RuntimeOptions};
pub use shutdown::{run_with_graceful_shutdown, ShutdownManager, ShutdownReason};
pub use state::RuntimeState;
