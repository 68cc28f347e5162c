//! Task trait for pipeline execution.

use vminit_shared::InitResult;

/// A single step of a pipeline.
///
/// Tasks share one mutable context; a task reads what earlier tasks left
/// there and records its own output for later ones.
pub trait PipelineTask<Ctx> {
    fn run(&self, ctx: &mut Ctx) -> InitResult<()>;

    /// Stable name used in logs, errors and metrics.
    fn name(&self) -> &str;
}

pub type BoxedTask<Ctx> = Box<dyn PipelineTask<Ctx>>;
