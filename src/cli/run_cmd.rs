// Copyright 2024-2026 dpi-verify Contributors
// SPDX-License-Identifier: Apache-2.0

//! `run standard|dpi` subcommand.

use std::sync::Arc;

use crate::orchestrator::{ProfileSelection, ProgressEvent, SuiteKind};
use crate::report::render_summary;
use crate::shutdown::{ShutdownCoordinator, ShutdownResult};
use crate::{Verifier, VerifierConfig};

use super::{flag_value, EXIT_FAILURE, EXIT_SUCCESS, EXIT_USAGE};

pub const RUN_USAGE: &str = "Usage:
    dpi-verify-cli run standard --domain <DOMAIN> [--domain <DOMAIN>]... [--profile <NAME>]... [--save]
    dpi-verify-cli run dpi [--url <URL>] [--profile <NAME>]... [--save]";

/// Parsed `run` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    pub kind: SuiteKind,
    /// Domains for the standard suite, or at most one custom DPI URL.
    pub targets: Vec<String>,
    pub profiles: Vec<String>,
    pub save: bool,
}

impl RunArgs {
    pub fn selection(&self) -> ProfileSelection {
        if self.profiles.is_empty() {
            ProfileSelection::All
        } else {
            ProfileSelection::Named(self.profiles.clone())
        }
    }
}

/// Parse everything after `run`.
pub fn parse_run_args(args: &[String]) -> Result<RunArgs, String> {
    let kind = match args.first().map(|s| s.as_str()) {
        Some("standard") => SuiteKind::Standard,
        Some("dpi") => SuiteKind::Dpi,
        Some(other) => return Err(format!("Unknown suite: {other}")),
        None => return Err("Missing suite (standard or dpi)".to_string()),
    };

    let mut parsed = RunArgs {
        kind,
        targets: Vec::new(),
        profiles: Vec::new(),
        save: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--domain" | "-d" if kind == SuiteKind::Standard => {
                parsed.targets.push(flag_value(args, i, "--domain")?.to_string());
                i += 2;
            }
            "--url" if kind == SuiteKind::Dpi => {
                if !parsed.targets.is_empty() {
                    return Err("--url may be given only once".to_string());
                }
                parsed.targets.push(flag_value(args, i, "--url")?.to_string());
                i += 2;
            }
            "--profile" | "-p" => {
                parsed.profiles.push(flag_value(args, i, "--profile")?.to_string());
                i += 2;
            }
            "--save" => {
                parsed.save = true;
                i += 1;
            }
            other => return Err(format!("Unknown argument: {other}")),
        }
    }

    if kind == SuiteKind::Standard && parsed.targets.iter().all(|d| d.trim().is_empty()) {
        return Err("At least one --domain is required for the standard suite".to_string());
    }
    Ok(parsed)
}

fn print_progress(event: &ProgressEvent<'_>) {
    match event {
        ProgressEvent::ProfileStarted { profile, index, total } => {
            println!("[{}/{}] Testing profile: {profile}", index + 1, total);
        }
        ProgressEvent::EngineFailed { result } => {
            println!("  Engine failed to start: {}", result.message);
        }
        ProgressEvent::ProbeCompleted { result } => {
            println!(
                "  {} [{}]: {} - {}",
                result.target,
                result.kind,
                result.outcome().status_word(),
                result.message
            );
        }
        ProgressEvent::ProfileCompleted { profile, successes, total } => {
            println!("  {profile}: {successes}/{total} succeeded");
        }
    }
}

/// Execute a run. Returns the process exit code.
pub async fn run_tests(args: &[String], config: VerifierConfig) -> i32 {
    let parsed = match parse_run_args(args) {
        Ok(parsed) => parsed,
        Err(msg) => {
            eprintln!("{msg}");
            eprintln!("{RUN_USAGE}");
            return EXIT_USAGE;
        }
    };

    let drain_timeout = config.supervisor.stop_timeout + config.supervisor.stop_grace;
    let verifier = match Verifier::new(config) {
        Ok(v) => v.with_progress(Arc::new(print_progress)),
        Err(e) => {
            eprintln!("Error: {e}");
            return EXIT_FAILURE;
        }
    };

    if parsed.kind == SuiteKind::Standard {
        for domain in &parsed.targets {
            if verifier.is_domain_blocked(domain).await == Some(false) {
                eprintln!("WARNING: {domain} is reachable without bypass; results may not reflect the engine");
            }
        }
    }

    let coordinator = Arc::new(ShutdownCoordinator::new(verifier.tracker().clone()));
    let cancel = coordinator.token();
    let signal_task = tokio::spawn({
        let coordinator = coordinator.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return None;
            }
            eprintln!("Interrupt received, stopping engine...");
            Some(coordinator.initiate(drain_timeout).await)
        }
    });

    let result = verifier
        .run_tests(parsed.kind, parsed.selection(), &parsed.targets, &cancel)
        .await;

    if cancel.is_cancelled() {
        if let Ok(Some(ShutdownResult::Timeout { live })) = signal_task.await {
            eprintln!("Shutdown timeout, {live} engine(s) still running");
        }
    } else {
        signal_task.abort();
    }

    let run = match result {
        Ok(run) => run,
        Err(e) => {
            eprintln!("Error: {e}");
            return EXIT_FAILURE;
        }
    };

    println!();
    print!("{}", render_summary(&run));

    if parsed.save {
        match verifier.export_report(&run).await {
            Ok(path) => println!("\nReport saved to {}", path.display()),
            Err(e) => {
                eprintln!("Error: {e}");
                return EXIT_FAILURE;
            }
        }
    }

    if run.cancelled {
        EXIT_FAILURE
    } else {
        EXIT_SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_standard_run() {
        let parsed = parse_run_args(&args(&[
            "standard", "--domain", "discord.com", "-d", "youtube.com", "--profile", "ALT", "--save",
        ]))
        .unwrap();
        assert_eq!(parsed.kind, SuiteKind::Standard);
        assert_eq!(parsed.targets, vec!["discord.com", "youtube.com"]);
        assert!(parsed.save);
        assert_eq!(parsed.selection(), ProfileSelection::Named(vec!["ALT".into()]));
    }

    #[test]
    fn parses_dpi_run_with_defaults() {
        let parsed = parse_run_args(&args(&["dpi"])).unwrap();
        assert_eq!(parsed.kind, SuiteKind::Dpi);
        assert!(parsed.targets.is_empty());
        assert_eq!(parsed.selection(), ProfileSelection::All);
    }

    #[test]
    fn rejects_bad_invocations() {
        assert!(parse_run_args(&args(&[])).is_err());
        assert!(parse_run_args(&args(&["fast"])).is_err());
        assert!(parse_run_args(&args(&["standard"])).is_err());
        assert!(parse_run_args(&args(&["standard", "--url", "x"])).is_err());
        assert!(parse_run_args(&args(&["dpi", "--url", "a", "--url", "b"])).is_err());
        assert!(parse_run_args(&args(&["dpi", "--profile"])).is_err());
    }
}
