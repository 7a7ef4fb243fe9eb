// Copyright 2024-2026 dpi-verify Contributors
// SPDX-License-Identifier: Apache-2.0

//! `profiles` and `targets` subcommands.

use std::fmt::Write as _;

use crate::engine::{Profile, ProfileCatalog};
use crate::probe::{builtin_dpi_targets, DpiTarget};

use super::{EXIT_FAILURE, EXIT_SUCCESS};

/// List every profile in the catalog.
pub async fn run_profiles(catalog: &dyn ProfileCatalog) -> i32 {
    match catalog.list_available_profiles().await {
        Ok(profiles) => {
            print!("{}", format_profiles(&profiles));
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            EXIT_FAILURE
        }
    }
}

/// List the expanded built-in DPI suite.
pub fn run_targets() -> i32 {
    print!("{}", format_targets(&builtin_dpi_targets()));
    EXIT_SUCCESS
}

fn format_profiles(profiles: &[Profile]) -> String {
    let mut out = String::new();
    if profiles.is_empty() {
        let _ = writeln!(out, "No profiles found.");
        return out;
    }
    let _ = writeln!(out, "{} profile(s):", profiles.len());
    for p in profiles {
        let args = if p.arguments.is_empty() {
            "default arguments".to_string()
        } else {
            format!("{} argument(s)", p.arguments.len())
        };
        if p.description.is_empty() {
            let _ = writeln!(out, "  {} ({args})", p.name);
        } else {
            let _ = writeln!(out, "  {} ({args}) - {}", p.name, p.description);
        }
    }
    out
}

fn format_targets(targets: &[DpiTarget]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} DPI target(s):", targets.len());
    for t in targets {
        let _ = writeln!(out, "  {:<28} {}", t.display_name(), t.url);
    }
    out
}
