pub mod block_executor;
pub mod blocks;
pub mod context;
pub mod dag;

pub use block_executor::{BlockContext, BlockExecutor, BlockOutcome, ProgressSink};
pub use blocks::BlockSpec;
pub use context::WorkflowRunner;
pub use dag::{plan, PlanError, WorkflowDag};
