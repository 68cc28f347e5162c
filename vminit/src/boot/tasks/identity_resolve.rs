//! Task: resolve the workload user against the guest's databases.

use super::{InitCtx, log_task_error, task_start};
use crate::identity::{UserDatabase, resolve_identity};
use crate::pipeline::PipelineTask;
use vminit_shared::InitResult;

pub struct IdentityResolveTask;

impl<'a> PipelineTask<InitCtx<'a>> for IdentityResolveTask {
    fn run(&self, ctx: &mut InitCtx<'a>) -> InitResult<()> {
        let task_name = self.name();
        task_start(task_name);

        let spec = &ctx.config.image_config.user;
        let identity = UserDatabase::load(&*ctx.world)
            .and_then(|db| resolve_identity(spec, &db))
            .inspect_err(|e| log_task_error(task_name, e))?;

        tracing::info!(
            user = %spec,
            uid = identity.uid.as_raw(),
            gid = identity.gid.as_raw(),
            home = %identity.home.display(),
            "Resolved workload identity"
        );
        ctx.identity = Some(identity);
        Ok(())
    }

    fn name(&self) -> &str {
        "identity_resolve"
    }
}
