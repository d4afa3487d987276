//! Shell completions and man pages.
//!
//! Man pages carry the sections clap cannot derive from the argument
//! definitions: where configuration lives, which variables are read, and
//! what the exit codes mean.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::CommandFactory;

use crate::Cli;
use crate::config::{Config, PROJECT_FILE};

const BIN: &str = "txsync";

const ENVIRONMENT: &[(&str, &str)] = &[
    ("TXSYNC_TOKEN", "API token, same as --token."),
    ("TXSYNC_API__TOKEN", "API token from the configuration layer."),
    ("TXSYNC_API__HOST", "API host."),
    ("TXSYNC_API__RPS", "Requests per second; 0 disables the limiter."),
    ("TXSYNC_SYNC__WORKERS", "Concurrent transfers per phase."),
    ("RUST_LOG", "Log filter used when stderr is not a terminal."),
];

const EXIT_STATUS: &[(&str, &str)] = &[
    ("0", "Every selected file was transferred or skipped."),
    ("1", "A transfer failed, or the configuration could not be read."),
    ("130", "Interrupted with Ctrl+C."),
];

fn completion_script(shell: clap_complete::Shell) -> Vec<u8> {
    let mut cmd = Cli::command();
    let mut out = Vec::new();
    clap_complete::generate(shell, &mut cmd, BIN, &mut out);
    out
}

/// Escape text for a roff paragraph.
fn roff(text: &str) -> String {
    text.replace('\\', "\\e").replace('-', "\\-")
}

fn tagged_section(title: &str, entries: &[(String, String)]) -> String {
    let mut section = format!(".SH \"{title}\"\n");
    for (tag, body) in entries {
        section.push_str(&format!(".TP\n\\fB{}\\fR\n{}\n", roff(tag), roff(body)));
    }
    section
}

fn files_section(user_config: Option<&Path>) -> String {
    let mut entries = vec![(
        PROJECT_FILE.to_string(),
        "Project file in the directory given by --root. Lists the resources to sync and may \
         override any user setting."
            .to_string(),
    )];
    if let Some(path) = user_config {
        entries.push((
            path.display().to_string(),
            "User configuration: API host, token, rate limit and worker count.".to_string(),
        ));
    }
    entries.push((
        ".env".to_string(),
        "Loaded into the environment before anything else is read.".to_string(),
    ));
    tagged_section("FILES", &entries)
}

fn static_section(title: &str, entries: &[(&str, &str)]) -> String {
    let entries: Vec<(String, String)> = entries
        .iter()
        .map(|(tag, body)| (tag.to_string(), body.to_string()))
        .collect();
    tagged_section(title, &entries)
}

/// Render one page: clap's sections followed by the txsync ones.
fn render_page(cmd: clap::Command) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut out = Vec::new();
    clap_mangen::Man::new(cmd).render(&mut out)?;

    let user_config = Config::default_config_path();
    out.extend_from_slice(files_section(user_config.as_deref()).as_bytes());
    out.extend_from_slice(static_section("ENVIRONMENT", ENVIRONMENT).as_bytes());
    out.extend_from_slice(static_section("EXIT STATUS", EXIT_STATUS).as_bytes());
    Ok(out)
}

/// `(file name, page)` for the main command and each user-facing subcommand.
fn man_pages() -> Result<Vec<(String, Vec<u8>)>, Box<dyn std::error::Error>> {
    let mut cmd = Cli::command();
    cmd.build();

    let mut pages = vec![(format!("{BIN}.1"), render_page(cmd.clone())?)];
    for sub in cmd.get_subcommands().filter(|sub| sub.get_name() != "help" && !sub.is_hide_set()) {
        let name = sub
            .get_display_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{BIN}-{}", sub.get_name()));
        pages.push((format!("{name}.1"), render_page(sub.clone())?));
    }
    Ok(pages)
}

pub(crate) fn handle_completions(
    shell: clap_complete::Shell,
) -> Result<(), Box<dyn std::error::Error>> {
    std::io::stdout().write_all(&completion_script(shell))?;
    Ok(())
}

pub(crate) fn handle_man(output: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let mut pages = man_pages()?;
    match output {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            for (name, page) in &pages {
                std::fs::write(dir.join(name), page)?;
            }
            tracing::info!(count = pages.len(), dir = %dir.display(), "Generated man pages");
            println!("Generated {} man pages in: {}", pages.len(), dir.display());
        }
        None => {
            let (_, page) = pages.swap_remove(0);
            std::io::stdout().write_all(&page)?;
        }
    }
    Ok(())
}
