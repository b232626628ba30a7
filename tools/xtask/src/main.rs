//! Workspace automation tasks.
//!
//! Run with: `cargo xtask <command>`

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask", about = "thaw workspace automation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all CI checks locally
    Ci,
    /// Validate workspace conventions
    Lint,
    /// Generate coverage report
    Coverage,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci => run_ci(),
        Commands::Lint => run_lint(),
        Commands::Coverage => run_coverage(),
    }
}

fn run_ci() -> Result<()> {
    println!("Running CI checks...\n");

    run_lint()?;
    run_cmd("cargo", &["fmt", "--check"])?;
    run_cmd("cargo", &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"])?;
    run_cmd("cargo", &["test", "--workspace"])?;
    run_cmd("cargo", &["doc", "--workspace", "--no-deps"])?;

    println!("\nAll CI checks passed!");
    Ok(())
}

/// Every crate is named `thaw-*` and inherits the workspace lint table.
fn run_lint() -> Result<()> {
    println!("Validating workspace conventions...\n");

    for entry in std::fs::read_dir("crates").context("reading crates/")? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with("thaw-") {
            anyhow::bail!("Crate '{name}' does not follow thaw-* naming");
        }
        check_manifest(&entry.path().join("Cargo.toml"), &name)?;
    }

    println!("All conventions validated!");
    Ok(())
}

fn check_manifest(path: &Path, name: &str) -> Result<()> {
    let manifest = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    if !manifest.contains(&format!("name = \"{name}\"")) {
        anyhow::bail!("{} declares a package name other than '{name}'", path.display());
    }
    if !manifest.contains("[lints]") || !manifest.contains("workspace = true") {
        anyhow::bail!("{} does not inherit workspace lints", path.display());
    }
    Ok(())
}

fn run_coverage() -> Result<()> {
    run_cmd("cargo", &["llvm-cov", "--workspace", "--html"])?;
    println!("\nCoverage report: target/llvm-cov/html/index.html");
    Ok(())
}

fn run_cmd(cmd: &str, args: &[&str]) -> Result<()> {
    println!("$ {cmd} {}", args.join(" "));
    let status = Command::new(cmd)
        .args(args)
        .status()
        .with_context(|| format!("Failed to run: {cmd} {}", args.join(" ")))?;

    if !status.success() {
        anyhow::bail!("Command failed: {cmd} {}", args.join(" "));
    }
    Ok(())
}
