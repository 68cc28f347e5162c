//! Task: mount the control-group hierarchies.

use super::{InitCtx, log_task_error, task_start};
use crate::cgroup::cgroup_hierarchy;
use crate::pipeline::PipelineTask;
use vminit_shared::InitResult;

pub struct CgroupHierarchyTask;

impl<'a> PipelineTask<InitCtx<'a>> for CgroupHierarchyTask {
    fn run(&self, ctx: &mut InitCtx<'a>) -> InitResult<()> {
        let task_name = self.name();
        task_start(task_name);

        cgroup_hierarchy()
            .execute(ctx.world)
            .inspect_err(|e| log_task_error(task_name, e))
    }

    fn name(&self) -> &str {
        "cgroup_hierarchy"
    }
}
