//! Commands module
//!
//! One subcommand per module operation. Handlers return an `Output` and
//! `handle_command` prints it, so handlers run the same against any engine.

mod echo;
mod grep;
mod toolchain;

use anyhow::{Context, Result};
use biomego::Biomego;
use biomego_core::{Changeset, Directory};
use biomego_engine::{Engine, PodmanEngine};
use clap::Subcommand;
use colored::*;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Print a container that echoes the argument (resolve it with --stdout)
    EchoContainer {
        /// Text to echo
        string_arg: String,

        /// Run the container and print its output instead of its description
        #[arg(long)]
        stdout: bool,
    },
    /// Print lines matching a pattern in the files of a directory
    GrepDirectory {
        /// Directory to search
        directory_arg: String,

        /// Pattern passed verbatim to grep
        pattern: String,
    },
    /// Lint the source code
    Lint {
        /// Files to lint (default: everything)
        files: Vec<String>,
    },
    /// Fix lint issues and print the resulting changeset
    Fix {
        /// Files to apply fixes on (default: everything)
        files: Vec<String>,

        /// Globs selecting files to include in the changeset
        #[arg(long = "fix-filter")]
        fix_filter: Vec<String>,

        /// Write the changeset back into the source directory
        #[arg(long)]
        apply: bool,
    },
}

/// What a command produced
#[derive(Debug)]
pub enum Output {
    /// Printed verbatim
    Text(String),
    /// A changeset, optionally already applied
    Changes { changeset: Changeset, applied: bool },
    /// Nothing to print beyond a status line
    Done(String),
}

/// Handle a CLI command
///
/// Builds the engine and module from `config`, runs the command and prints
/// its output.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let engine = PodmanEngine::with_binary(config.engine.as_str());
    if needs_engine(&command) {
        engine
            .check_available()
            .await
            .context("Container engine check failed")?;
    }

    let engine: Arc<dyn Engine> = Arc::new(engine);
    let module = Biomego::new(config.module_config()?, engine.clone());

    let output = execute(command, &module, engine.as_ref()).await?;
    print_output(&output);

    Ok(())
}

/// Runs a command against an already built module
pub async fn execute(command: Commands, module: &Biomego, engine: &dyn Engine) -> Result<Output> {
    match command {
        Commands::EchoContainer { string_arg, stdout } => {
            echo::echo_container(module, engine, &string_arg, stdout).await
        }
        Commands::GrepDirectory {
            directory_arg,
            pattern,
        } => grep::grep_directory(module, &directory_arg, &pattern).await,
        Commands::Lint { files } => toolchain::lint(module, &files).await,
        Commands::Fix {
            files,
            fix_filter,
            apply,
        } => {
            let apply_to = if apply {
                Some(apply_target(module)?)
            } else {
                None
            };
            toolchain::fix(module, &files, &fix_filter, apply_to).await
        }
    }
}

/// `--apply` writes into the module's own source tree, so it must be on disk
fn apply_target(module: &Biomego) -> Result<&Path> {
    match &module.config().source {
        Directory::Host { path } => Ok(path.as_path()),
        Directory::Snapshot(_) => {
            anyhow::bail!("--apply needs a source directory on the host")
        }
    }
}

fn needs_engine(command: &Commands) -> bool {
    !matches!(command, Commands::EchoContainer { stdout: false, .. })
}

fn print_output(output: &Output) {
    match output {
        Output::Text(text) => print!("{}", text),
        Output::Done(message) => println!("{}", message.green()),
        Output::Changes { changeset, applied } => {
            if changeset.is_empty() {
                println!("{}", "No changes.".yellow());
                return;
            }

            for path in changeset.added_paths() {
                println!("{} {}", "+".green().bold(), path);
            }
            for path in changeset.modified_paths() {
                println!("{} {}", "~".yellow().bold(), path);
            }
            for path in changeset.removed_paths() {
                println!("{} {}", "-".red().bold(), path);
            }

            if *applied {
                println!("{}", "Changes applied.".green());
            } else {
                debug!("Changeset not applied, pass --apply to write it");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biomego::ModuleConfig;
    use biomego_core::Snapshot;
    use biomego_engine::FakeEngine;

    fn setup(source: &Path) -> (Arc<FakeEngine>, Biomego) {
        let engine = Arc::new(FakeEngine::new());
        let module = Biomego::new(
            ModuleConfig::new(Directory::host(source), "node:25-alpine"),
            engine.clone(),
        );
        (engine, module)
    }

    #[test]
    fn test_describing_echo_needs_no_engine() {
        assert!(!needs_engine(&Commands::EchoContainer {
            string_arg: "hi".to_string(),
            stdout: false,
        }));
        assert!(needs_engine(&Commands::EchoContainer {
            string_arg: "hi".to_string(),
            stdout: true,
        }));
        assert!(needs_engine(&Commands::Lint { files: vec![] }));
    }

    #[tokio::test]
    async fn test_echo_container_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, module) = setup(dir.path());

        let output = execute(
            Commands::EchoContainer {
                string_arg: "hello".to_string(),
                stdout: true,
            },
            &module,
            engine.as_ref(),
        )
        .await
        .unwrap();

        assert!(matches!(output, Output::Text(text) if text == "hello\n"));
    }

    #[tokio::test]
    async fn test_grep_directory_no_match_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello world").unwrap();
        let (engine, module) = setup(dir.path());

        let result = execute(
            Commands::GrepDirectory {
                directory_arg: dir.path().display().to_string(),
                pattern: "absent".to_string(),
            },
            &module,
            engine.as_ref(),
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fix_apply_writes_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.ts"), "var a = 1").unwrap();
        let (engine, module) = setup(dir.path());
        engine.on_command("npm", |_| 0);
        engine.on_command("npx", |process| {
            process.write("index.ts", "let a = 1");
            0
        });

        let output = execute(
            Commands::Fix {
                files: vec![],
                fix_filter: vec![],
                apply: true,
            },
            &module,
            engine.as_ref(),
        )
        .await
        .unwrap();

        assert!(matches!(output, Output::Changes { applied: true, .. }));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("index.ts")).unwrap(),
            "let a = 1"
        );
    }

    #[tokio::test]
    async fn test_fix_apply_needs_host_source() {
        let engine = Arc::new(FakeEngine::new());
        let source = Snapshot::new().with_new_file("index.ts", "var a = 1");
        let module = Biomego::new(
            ModuleConfig::new(source.into(), "node:25-alpine"),
            engine.clone(),
        );

        let err = execute(
            Commands::Fix {
                files: vec![],
                fix_filter: vec![],
                apply: true,
            },
            &module,
            engine.as_ref(),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("--apply"));
        assert!(engine.resolved().is_empty());
    }
}
