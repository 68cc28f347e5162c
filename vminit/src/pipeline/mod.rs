//! Table-driven sequential pipeline execution.
//!
//! ```text
//! Pipeline → Stages → Tasks
//!
//! - Pipeline: runs every stage in order
//! - Stage: named group of tasks, run one after another
//! - Task: atomic unit of work against a mutable context
//! ```
//!
//! Execution stops at the first failing task. Its error is wrapped with the
//! task name so the boot log says which step broke.
//!
//! ## Example
//!
//! ```ignore
//! let plan = ExecutionPlan::new(vec![
//!     Stage::new("filesystem", vec![Box::new(RootSwitchTask), Box::new(MountsTask)]),
//!     Stage::new("workload", vec![Box::new(ProcessBuildTask)]),
//! ]);
//! let metrics = PipelineExecutor::execute(PipelineBuilder::from_plan(plan), &mut ctx)?;
//! metrics.log_summary();
//! ```

mod metrics;
#[allow(clippy::module_inception)]
mod pipeline;
mod stage;
mod task;

pub use metrics::{PipelineMetrics, StageMetrics, TaskMetrics};
pub use pipeline::{ExecutionPlan, Pipeline, PipelineBuilder, PipelineExecutor};
pub use stage::Stage;
pub use task::{BoxedTask, PipelineTask};
