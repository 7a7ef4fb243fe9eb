//! dpi-verify entry point.
//!
//! ## CLI Subcommands
//!
//! - `dpi-verify-cli run standard|dpi ...` - Verify profiles against targets
//! - `dpi-verify-cli profiles` - List the profile catalog
//! - `dpi-verify-cli targets` - List the built-in DPI suite
//! - `dpi-verify-cli lists ...` - Manage host-list files
//! - `dpi-verify-cli config ...` - Show or validate configuration

use std::process::ExitCode;

use dpi_verify::cli::{self, config_cmd, EXIT_USAGE};
use dpi_verify::config as dpiv_config;
use dpi_verify::engine::{DirectoryCatalog, SupervisorConfig};
use dpi_verify::orchestrator::OrchestratorConfig;
use dpi_verify::telemetry::{init_logging, LogConfig};
use dpi_verify::VerifierConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    let env = dpiv_config::load();
    let log_config = LogConfig {
        format: env.log_format,
        ..LogConfig::default()
    };
    if let Err(e) = init_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let code = match command {
        "run" => cli::run_tests(&args[2..], load_config(env)).await,
        "profiles" => {
            let catalog = DirectoryCatalog::new(env.profiles_dir);
            cli::run_profiles(&catalog).await
        }
        "targets" => cli::run_targets(),
        "lists" => cli::run_lists(&args[2..], &env.layout.lists_dir).await,
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => config_cmd::run_show(args.get(3).map(|s| s.as_str()) == Some("--json")),
                "defaults" => {
                    config_cmd::run_defaults();
                    0
                }
                "validate" => config_cmd::run_validate(),
                _ => {
                    eprintln!("Unknown config subcommand: {subcommand}");
                    print_command_help("config");
                    EXIT_USAGE
                }
            }
        }
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = args.get(2) {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            0
        }
        "version" | "--version" | "-V" => {
            println!("dpi-verify {}", env!("CARGO_PKG_VERSION"));
            0
        }
        _ => {
            eprintln!("Unknown command: {command}");
            print_usage();
            EXIT_USAGE
        }
    };

    ExitCode::from(code as u8)
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "dpi-verify - DPI-bypass profile verification v{version}

USAGE:
    dpi-verify-cli [COMMAND] [OPTIONS]

COMMANDS:
    run          Test profiles (standard or dpi suite)
    profiles     List the profile catalog
    targets      List the built-in DPI targets
    lists        Show or edit host-list files
    config       Manage configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message

EXAMPLES:
    dpi-verify-cli run standard --domain discord.com
    dpi-verify-cli run standard -d youtube.com -d discord.com --profile ALT --save
    dpi-verify-cli run dpi --save
    dpi-verify-cli run dpi --url https://example.org/1MB.bin
    dpi-verify-cli lists add list-general.txt example.org
    dpi-verify-cli config show --json

ENVIRONMENT:
    DPIV_BASE_DIR     Application root (default: .)
    DPIV_LOG_FORMAT   pretty or json (default: pretty)
    RUST_LOG          Log filter (overrides the default 'info')
    See 'dpi-verify-cli config defaults' for every variable.

EXIT CODES:
    0  Success
    1  Run failed or was cancelled
    2  Usage or configuration error
"
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "run" => {
            eprintln!(
                "dpi-verify-cli run - Verify profiles

{}

OPTIONS:
    -d, --domain DOMAIN  Domain to probe (standard suite, repeatable)
    --url URL            Single custom target instead of the DPI registry
    -p, --profile NAME   Test only this profile (repeatable, in order)
    --save               Write a plain-text report to DPIV_REPORT_DIR

DESCRIPTION:
    Starts the engine once per profile, waits for it to report readiness,
    probes every target in parallel, and stops the engine before moving on.
    Ctrl+C stops the live engine and prints the partial results.
",
                cli::run_cmd::RUN_USAGE
            );
        }
        "lists" => {
            eprintln!(
                "dpi-verify-cli lists - Manage host lists

{}

DESCRIPTION:
    Files live under DPIV_LISTS_DIR. Domains are validated and stored
    lowercase, one per line.
",
                cli::lists_cmd::LISTS_USAGE
            );
        }
        "config" => {
            eprintln!(
                "dpi-verify-cli config - Manage configuration

USAGE:
    dpi-verify-cli config <SUBCOMMAND>

SUBCOMMANDS:
    show [--json]  Show effective configuration
    validate       Check that the engine, lists and profiles exist
    defaults       Show default configuration
"
            );
        }
        _ => {
            eprintln!("No detailed help available for '{command}'. Use 'dpi-verify-cli help' for general usage.");
        }
    }
}

fn load_config(env: dpiv_config::EnvConfig) -> VerifierConfig {
    VerifierConfig {
        supervisor: SupervisorConfig {
            binary: env.engine_binary,
            working_dir: env.layout.bin_dir.clone(),
            layout: env.layout,
            options: env.launch,
            ready_timeout: env.ready_timeout,
            stop_timeout: env.stop_timeout,
            stop_grace: env.stop_grace,
        },
        profiles_dir: env.profiles_dir,
        report_dir: env.report_dir,
        probes: env.probes,
        orchestrator: OrchestratorConfig {
            settle_after_start: env.settle_after_start,
            settle_after_stop: env.settle_after_stop,
            max_parallel: env.max_parallel_probes,
        },
        base_dir: env.base_dir,
    }
}
