use txsync::sync::PullArgs;

use super::shared::Session;
use crate::{GlobalOptions, PullCommand, branch_selection};

pub(crate) async fn handle_pull(
    cmd: PullCommand,
    global: &GlobalOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(global)?;

    let args = PullArgs {
        resource_ids: cmd.resources,
        languages: cmd.languages,
        all: cmd.all,
        source: cmd.source,
        translations: !cmd.no_translations,
        force: cmd.force,
        skip: cmd.skip,
        mode: cmd.mode.into(),
        file_type: cmd.file_type.into(),
        minimum_percentage: cmd.minimum_perc,
        disable_overwrite: cmd.disable_overwrite,
        use_git_timestamps: cmd.use_git_timestamps,
        branch: branch_selection(cmd.branch),
        workers: session.workers(cmd.workers),
    };
    tracing::debug!(?args, "Pulling");

    let result = session.ctx.pull(args).await;
    session.reporter.finish();
    let report = result?;

    session.finish("Pull finished", &report);
    Ok(())
}
