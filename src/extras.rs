//! Man page and shell completion generation

use std::{fs, io, path::Path};

use anyhow::Context as _;
use clap::{CommandFactory as _, ValueEnum as _};
use clap_complete::Shell;

use crate::cl;

/// Executable name used in generated files
const BIN_NAME: &str = env!("CARGO_BIN_NAME");

/// Generate man pages for the command and each subcommand into `dir`
pub(crate) fn generate_man_pages(dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {dir:?}"))?;
    let cmd = cl::Args::command().name(BIN_NAME);
    clap_mangen::generate_to(cmd, dir)?;
    log::info!("Man pages written to {dir:?}");
    Ok(())
}

/// Generate shell completions
///
/// `shell` completions are printed on standard output, otherwise completions for all supported
/// shells are written into `dir`.
pub(crate) fn generate_shell_completions(
    shell: Option<Shell>,
    dir: Option<&Path>,
) -> anyhow::Result<()> {
    let mut cmd = cl::Args::command().name(BIN_NAME);
    match (shell, dir) {
        (Some(shell), _) => {
            clap_complete::generate(shell, &mut cmd, BIN_NAME, &mut io::stdout());
        }
        (None, Some(dir)) => {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create {dir:?}"))?;
            for shell in Shell::value_variants() {
                let path = clap_complete::generate_to(*shell, &mut cmd, BIN_NAME, dir)?;
                log::info!("{shell} completions written to {path:?}");
            }
        }
        (None, None) => anyhow::bail!("Either a shell or an output directory is needed"),
    }
    Ok(())
}
