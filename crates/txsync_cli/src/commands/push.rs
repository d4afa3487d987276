use txsync::sync::PushArgs;

use super::shared::Session;
use crate::{GlobalOptions, PushCommand, branch_selection};

pub(crate) async fn handle_push(
    cmd: PushCommand,
    global: &GlobalOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(global)?;

    // Sources go up unless only translations were asked for.
    let source = cmd.source || !cmd.translation;
    let args = PushArgs {
        resource_ids: cmd.resources,
        languages: cmd.languages,
        all: cmd.all,
        source,
        translations: cmd.translation,
        force: cmd.force,
        skip: cmd.skip,
        xliff: cmd.xliff,
        use_git_timestamps: cmd.use_git_timestamps,
        branch: branch_selection(cmd.branch),
        base: cmd.base,
        replace_edited_strings: cmd.replace_edited_strings,
        keep_translations: cmd.keep_translations || !cmd.no_keep_translations,
        minimum_percentage: cmd.minimum_perc,
        workers: session.workers(cmd.workers),
    };
    tracing::debug!(?args, "Pushing");

    let result = session.ctx.push(args).await;
    session.reporter.finish();
    let report = result?;

    session.finish("Push finished", &report);
    Ok(())
}
