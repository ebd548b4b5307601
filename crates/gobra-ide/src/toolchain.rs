//! Checks that java, z3 and boogie are usable before anything is verified.

use std::path::Path;
use std::process::Stdio;

use gobra_ide_config::GobraDependencies;
use gobra_ide_core::{ResolvedTools, Toolchain, ToolchainCompletion, ToolchainError};
use tokio::process::Command;
use tracing::debug;

/// Runs the tools once to see that they start.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessToolchain;

impl Toolchain for ProcessToolchain {
    fn check(&self, dependencies: GobraDependencies, done: ToolchainCompletion) {
        tokio::spawn(async move {
            done.complete(check_tools(&dependencies).await);
        });
    }
}

/// Resolve the configured tool paths, then run `java -version` and
/// `z3 --version`. Boogie is only required to exist.
pub async fn check_tools(
    dependencies: &GobraDependencies,
) -> Result<ResolvedTools, ToolchainError> {
    let z3 = dependencies.z3_executable()?;
    let boogie = dependencies.boogie_executable()?;
    let java = dependencies.java_binary();

    probe(&java, "-version").await?;
    probe(&z3, "--version").await?;

    Ok(ResolvedTools { java, z3, boogie })
}

async fn probe(program: &Path, flag: &'static str) -> Result<(), ToolchainError> {
    debug!("Running {} {}", program.display(), flag);
    let status = Command::new(program)
        .arg(flag)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .map_err(|e| ToolchainError::NotStartable {
            program: program.to_path_buf(),
            reason: e.to_string(),
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(ToolchainError::Failed {
            program: program.to_path_buf(),
            flag,
            status: status.to_string(),
        })
    }
}
