//! Command line interface and wiring.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use instmgr_core::{InstallJob, Phase, Platform, PluginManager};

/// Device software install orchestration.
#[derive(Debug, Parser)]
#[command(name = "instmgrd", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the registered operation units.
    ListUnits,
    /// Validate a job and show the units a phase dispatch would run.
    Plan(JobArgs),
}

/// Description of one install job.
#[derive(Debug, Args)]
pub struct JobArgs {
    /// Phase to dispatch (e.g. Add, Activate, Commit).
    #[arg(long)]
    pub phase: Phase,

    /// Target platform family (e.g. ASR9K, NCS6K).
    #[arg(long)]
    pub family: Platform,

    /// Package file name; repeat for multiple packages.
    #[arg(long = "package")]
    pub packages: Vec<String>,

    /// Repository the packages are fetched from.
    #[arg(long)]
    pub repository_url: Option<String>,

    /// Restrict dispatch to the named units (e.g. software-upgrade).
    #[arg(long = "unit")]
    pub units: Vec<String>,

    /// Read the job description from a JSON file instead of flags.
    #[arg(long)]
    pub job_file: Option<PathBuf>,

    /// Run the sequence from the administrative plane.
    #[arg(long)]
    pub admin: bool,
}

/// Builds the unit registry.
///
/// The sequenced upgrade units (SU/ISSU) share the Add phase with the
/// ordinary add unit; they are registered only when a name filter selects
/// units explicitly.
pub fn build_registry(units: &[String]) -> PluginManager {
    let mut manager = PluginManager::new();
    for plugin in instmgr_xr::default_plugins() {
        manager.register(plugin);
    }
    if !units.is_empty() {
        for plugin in instmgr_xr::upgrade_plugins() {
            manager.register(plugin);
        }
        manager.set_name_filter(Some(units.iter().cloned()));
    }
    manager
}

/// Builds the job description from flags or the JSON job file.
pub fn load_job(args: &JobArgs) -> anyhow::Result<InstallJob> {
    let mut job = match &args.job_file {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading job file {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing job file {}", path.display()))?
        }
        None => InstallJob::new(args.family),
    };
    if !args.packages.is_empty() {
        job.software_packages = args.packages.clone();
    }
    if args.repository_url.is_some() {
        job.repository_url = args.repository_url.clone();
    }
    if args.admin {
        job.admin_mode = true;
    }
    Ok(job)
}

/// Entry point shared by the binary and the tests.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::ListUnits => {
            let manager = build_registry(&["software-upgrade".to_string()]);
            for (name, platforms, phases) in manager.registered() {
                println!(
                    "{name:24} platforms: {:32} phases: {}",
                    platforms.join(","),
                    phases.join(",")
                );
            }
            Ok(())
        }
        Command::Plan(args) => {
            let job = load_job(&args)?;
            if job.software_packages.is_empty() && args.phase != Phase::Commit {
                bail!("no packages selected for phase {}", args.phase);
            }
            let manager = build_registry(&args.units);
            info!(phase = %args.phase, family = %job.family, "planned dispatch");

            if let Some(pre) = args.phase.auto_pre() {
                println!("phase {pre} runs first (fail-fast)");
            }
            println!(
                "phase {} on {} with {} package(s)",
                args.phase,
                job.family,
                job.software_packages.len()
            );
            for (name, platforms, phases) in manager.registered() {
                if platforms.contains(&job.family.to_string())
                    && phases.contains(&args.phase.to_string())
                {
                    println!("  would run: {name}");
                }
            }
            println!(
                "connect a console transport and dispatch the phase through \
                 PluginManager::dispatch to execute"
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_plan_args_parse() {
        let cli = Cli::parse_from([
            "instmgrd",
            "plan",
            "--phase",
            "Activate",
            "--family",
            "ASR9K",
            "--package",
            "disk0:asr9k-mpls-px-5.3.3",
        ]);
        match cli.command {
            Command::Plan(args) => {
                assert_eq!(args.phase, Phase::Activate);
                assert_eq!(args.family, Platform::Asr9k);
                assert_eq!(args.packages, vec!["disk0:asr9k-mpls-px-5.3.3"]);
                assert!(args.repository_url.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_registry_includes_upgrade_units_only_with_a_filter() {
        let plain = build_registry(&[]);
        assert!(plain
            .registered()
            .iter()
            .all(|(name, _, _)| *name != "software-upgrade"));

        let filtered = build_registry(&["software-upgrade".to_string()]);
        assert!(filtered
            .registered()
            .iter()
            .any(|(name, _, _)| *name == "software-upgrade"));
    }

    #[test]
    fn test_flags_override_the_job_file() {
        let args = JobArgs {
            phase: Phase::Add,
            family: Platform::Ncs6k,
            packages: vec!["ncs6k-mpls.pkg-6.1.0".to_string()],
            repository_url: Some("tftp://223.255.254.254/images".to_string()),
            units: Vec::new(),
            job_file: None,
            admin: false,
        };
        let job = load_job(&args).unwrap();
        assert_eq!(job.family, Platform::Ncs6k);
        assert_eq!(job.software_packages, vec!["ncs6k-mpls.pkg-6.1.0"]);
        assert_eq!(
            job.repository_url.as_deref(),
            Some("tftp://223.255.254.254/images")
        );
    }
}
