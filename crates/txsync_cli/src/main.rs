//! txsync CLI - keep local translation files in step with a remote localization service.

mod commands;
mod config;
mod progress;
mod shutdown;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use console::Term;
use tracing_subscriber::EnvFilter;
use txsync::sync::{BranchSelection, ContentMode, FileType};

#[derive(Parser)]
#[command(name = "txsync")]
#[command(version)]
#[command(about = "Sync translation files with a localization service")]
#[command(
    long_about = "txsync pulls translations and pushes source files between a local project \
and a {json:api} localization service. Resources are declared in txsync.toml; transfers run \
concurrently and skip files that are already up to date."
)]
#[command(after_long_help = r#"EXAMPLES
    Pull every configured translation:
        $ txsync pull

    Pull Greek and Brazilian Portuguese for one resource, ignoring timestamps:
        $ txsync pull -l el,pt_BR -f web.messages

    Push sources and translations, adding missing project languages:
        $ txsync push -s -t --all

    Push into a resource for the current git branch, based on the main resource:
        $ txsync push --branch --base ""

    Generate shell completions:
        $ txsync completions bash > ~/.local/share/bash-completion/completions/txsync

CONFIGURATION
    txsync reads configuration from:
      1. ~/.config/txsync/config.toml (or $XDG_CONFIG_HOME/txsync/config.toml)
      2. ./txsync.toml, which also lists the [[resources]]
      3. Environment variables (TXSYNC_* prefix, tables separated by __)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    TXSYNC_API__TOKEN         API token
    TXSYNC_API__HOST          API host (default: https://rest.api.transifex.com)
    TXSYNC_API__RPS           Requests per second (default: 10)
    TXSYNC_SYNC__WORKERS      Concurrent transfers per phase (default: 5)
    RUST_LOG                  Log filter for non-interactive output
"#)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by pull and push.
#[derive(Debug, Clone, Args)]
struct GlobalOptions {
    /// Project directory holding txsync.toml
    #[arg(short = 'C', long, global = true, default_value = ".")]
    root: PathBuf,

    /// API token (overrides config)
    #[arg(long, global = true, env = "TXSYNC_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// API host (overrides config)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Disable proactive rate limiting (may cause API throttling)
    #[arg(short = 'R', long, global = true)]
    no_rate_limit: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Download source and translation files
    Pull(PullCommand),
    /// Upload source and translation files
    Push(PushCommand),
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Generate man page(s)
    Man {
        /// Output directory for man pages (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct PullCommand {
    /// Resources to pull, as `project.resource` (`*` wildcards allowed)
    resources: Vec<String>,

    /// Also pull source files
    #[arg(long)]
    source: bool,

    /// Don't pull translation files
    #[arg(long)]
    no_translations: bool,

    /// Local language codes to pull (comma separated)
    #[arg(short, long, value_delimiter = ',', conflicts_with = "all")]
    languages: Vec<String>,

    /// Pull every language the remote has, even without a local file
    #[arg(short, long)]
    all: bool,

    /// Download even when the local file is newer
    #[arg(short, long)]
    force: bool,

    /// Report failures and carry on instead of stopping
    #[arg(long)]
    skip: bool,

    /// Which translations to download
    #[arg(long, value_enum, default_value_t = ModeArg::Default)]
    mode: ModeArg,

    /// Download format
    #[arg(long, value_enum, default_value_t = FileTypeArg::Default)]
    file_type: FileTypeArg,

    /// Skip languages below this completion percentage
    #[arg(long)]
    minimum_perc: Option<i32>,

    /// Never overwrite existing local files
    #[arg(long)]
    disable_overwrite: bool,

    /// Compare remote times against the last commit instead of the file mtime
    #[arg(long)]
    use_git_timestamps: bool,

    /// Use branch resources (current git branch when no name is given)
    #[arg(long, value_name = "NAME")]
    branch: Option<Option<String>>,

    /// Concurrent transfers per phase (default from config or 5)
    #[arg(short, long)]
    workers: Option<usize>,
}

#[derive(Debug, Args)]
struct PushCommand {
    /// Resources to push, as `project.resource` (`*` wildcards allowed)
    resources: Vec<String>,

    /// Push source files (the default unless --translation is given)
    #[arg(short, long)]
    source: bool,

    /// Push translation files
    #[arg(short, long)]
    translation: bool,

    /// Local language codes to push (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    languages: Vec<String>,

    /// Add languages the remote project is missing
    #[arg(short, long)]
    all: bool,

    /// Upload even when the remote file is newer
    #[arg(short, long)]
    force: bool,

    /// Report failures and carry on instead of stopping
    #[arg(long)]
    skip: bool,

    /// Translation files are XLIFF (`.xlf` next to each file)
    #[arg(long)]
    xliff: bool,

    /// Compare remote times against the last commit instead of the file mtime
    #[arg(long)]
    use_git_timestamps: bool,

    /// Use branch resources (current git branch when no name is given)
    #[arg(long, value_name = "NAME")]
    branch: Option<Option<String>>,

    /// Branch a new branch resource starts from ("" for the main resource)
    #[arg(long, requires = "branch")]
    base: Option<String>,

    /// Overwrite translations edited on the remote
    #[arg(long)]
    replace_edited_strings: bool,

    /// Keep translations of changed source strings (default)
    #[arg(long, overrides_with = "no_keep_translations")]
    keep_translations: bool,

    /// Drop translations of changed source strings
    #[arg(long, overrides_with = "keep_translations")]
    no_keep_translations: bool,

    /// Skip translations below this completion percentage
    #[arg(long)]
    minimum_perc: Option<i32>,

    /// Concurrent transfers per phase (default from config or 5)
    #[arg(short, long)]
    workers: Option<usize>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Default,
    Reviewed,
    Proofread,
}

impl From<ModeArg> for ContentMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Default => ContentMode::Default,
            ModeArg::Reviewed => ContentMode::Reviewed,
            ModeArg::Proofread => ContentMode::Proofread,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FileTypeArg {
    Default,
    Xliff,
    Json,
}

impl From<FileTypeArg> for FileType {
    fn from(file_type: FileTypeArg) -> Self {
        match file_type {
            FileTypeArg::Default => FileType::Default,
            FileTypeArg::Xliff => FileType::Xliff,
            FileTypeArg::Json => FileType::Json,
        }
    }
}

/// `--branch` without a value means the checked-out branch; `--branch ""` means no branch.
fn branch_selection(flag: Option<Option<String>>) -> BranchSelection {
    match flag {
        None => BranchSelection::None,
        Some(None) => BranchSelection::Current,
        Some(Some(name)) => BranchSelection::Named(name),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Set up graceful shutdown handler (Ctrl+C)
    shutdown::setup_shutdown_handler();

    // Progress bars own the terminal; structured logs are for everything else
    if !Term::stdout().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("txsync=info,txsync_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Pull(cmd) => commands::pull::handle_pull(cmd, &cli.global).await?,
        Commands::Push(cmd) => commands::push::handle_push(cmd, &cli.global).await?,
        Commands::Completions { shell } => commands::meta::handle_completions(shell)?,
        Commands::Man { output } => commands::meta::handle_man(output)?,
    }

    if shutdown::is_shutdown_requested() {
        std::process::exit(130);
    }

    Ok(())
}
