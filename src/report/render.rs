//! Text rendering of a finished run.

use std::fmt::Write as _;

use chrono::{DateTime, Local};

use super::aggregate::{group_by_profile, rank, summarize};
use crate::orchestrator::{SuiteKind, TestRun};
use crate::probe::{ProbeKind, ProbeResult, StandardTarget};

const HEADER_RULE: usize = 60;
const SECTION_RULE: usize = 40;

/// Prefix of every profile section in the file report.
pub const SECTION_PREFIX: &str = "Profile: ";

const STANDARD_KIND_ORDER: [ProbeKind; 4] = [ProbeKind::Http, ProbeKind::Tls12, ProbeKind::Tls13, ProbeKind::Ping];

/// Console summary: ranked working profiles followed by per-target detail.
pub fn render_summary(run: &TestRun) -> String {
    let mut out = String::new();
    let ranked = rank(run);
    let summaries = summarize(run);

    let _ = writeln!(
        out,
        "{} test summary: {} profile(s), {} result(s){}",
        run.suite.title(),
        summaries.len(),
        run.results.len(),
        if run.cancelled { " [cancelled, partial]" } else { "" }
    );

    if ranked.is_empty() {
        let _ = writeln!(out, "No working profiles found.");
    } else {
        let _ = writeln!(out, "Working profiles ({}):", ranked.len());
        for (i, s) in ranked.iter().enumerate() {
            match run.suite {
                SuiteKind::Standard => {
                    let _ = writeln!(out, "  {}. {} ({}/{})", i + 1, s.profile, s.successes, s.total);
                }
                SuiteKind::Dpi => {
                    let blocked = if s.likely_blocked > 0 {
                        format!(", likely blocked {}", s.likely_blocked)
                    } else {
                        String::new()
                    };
                    let _ = writeln!(
                        out,
                        "  {}. {} ({}/{}{blocked}, score {})",
                        i + 1,
                        s.profile,
                        s.successes,
                        s.total,
                        s.score()
                    );
                }
            }
        }
    }

    let _ = writeln!(out, "\nDetailed results:");
    for (profile, results) in group_by_profile(&run.results) {
        let _ = writeln!(out, "\n{profile}");
        for r in results {
            let _ = writeln!(
                out,
                "  {} [{}]: {} - {}",
                r.target,
                r.kind,
                r.outcome().status_word(),
                r.message
            );
        }
    }
    out
}

/// Plain-text file report. One `Profile:` section per profile with results.
pub fn render_report(run: &TestRun, generated_at: DateTime<Local>) -> String {
    let mut out = String::new();
    let groups = group_by_profile(&run.results);

    let _ = writeln!(out, "DpiVerify Test Results - {}", generated_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "Test Type: {}", run.suite.title());
    let _ = writeln!(out, "Total Profiles Tested: {}", groups.len());
    let _ = writeln!(out, "Total Tests Executed: {}", run.results.len());
    if run.cancelled {
        let _ = writeln!(out, "Status: CANCELLED (partial results)");
    }
    let _ = writeln!(out, "{}", "-".repeat(HEADER_RULE));
    let _ = writeln!(out);

    for (profile, results) in groups {
        let _ = writeln!(out, "{SECTION_PREFIX}{profile}");
        let _ = writeln!(out, "{}", "-".repeat(SECTION_RULE));

        for init in results.iter().filter(|r| r.kind == ProbeKind::Init) {
            let _ = writeln!(out, "Engine: FAILED - {}", init.message);
            let _ = writeln!(out);
        }
        let probes: Vec<&ProbeResult> = results.into_iter().filter(|r| r.kind != ProbeKind::Init).collect();

        match run.suite {
            SuiteKind::Standard => write_standard_section(&mut out, &probes),
            SuiteKind::Dpi => write_dpi_section(&mut out, &probes),
        }
        let _ = writeln!(out);
    }
    out
}

fn host_key(result: &ProbeResult) -> String {
    if result.kind == ProbeKind::Ping {
        return result.target.to_ascii_lowercase();
    }
    StandardTarget::parse(&result.target)
        .map(|t| t.host.to_ascii_lowercase())
        .unwrap_or_else(|| result.target.to_ascii_lowercase())
}

fn write_standard_section(out: &mut String, results: &[&ProbeResult]) {
    let mut by_host: Vec<(String, Vec<&ProbeResult>)> = Vec::new();
    for r in results {
        let key = host_key(r);
        match by_host.iter_mut().find(|(k, _)| *k == key) {
            Some((_, items)) => items.push(r),
            None => by_host.push((key, vec![r])),
        }
    }

    for (host, tests) in by_host {
        let display = tests
            .iter()
            .find(|t| t.kind != ProbeKind::Ping)
            .map(|t| t.target.clone())
            .unwrap_or(host);
        let _ = writeln!(out, "Target: {display}");
        for kind in STANDARD_KIND_ORDER {
            if let Some(r) = tests.iter().find(|t| t.kind == kind) {
                let _ = writeln!(out, "  {}: {} - {}", kind, r.outcome().status_word(), r.message);
            }
        }
        let _ = writeln!(out);
    }
}

fn write_dpi_section(out: &mut String, results: &[&ProbeResult]) {
    for r in results {
        let _ = writeln!(out, "Target: {}", r.target);
        let _ = writeln!(out, "Status: {}", r.outcome().status_word());
        let _ = writeln!(out, "Message: {}", r.message);
        if let Some(code) = r.status_code {
            let _ = writeln!(out, "HTTP Status: {code}");
        }
        if let Some(bytes) = r.bytes {
            let _ = writeln!(out, "Content Length: {bytes} bytes ({:.1} KB)", bytes as f64 / 1024.0);
        }
        let _ = writeln!(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).single().unwrap()
    }

    fn standard_run() -> TestRun {
        let ok = |kind, target: &str, msg: &str| ProbeResult {
            success: true,
            ..ProbeResult::failure("ALT", target, kind, msg)
        };
        TestRun {
            suite: SuiteKind::Standard,
            started_at: fixed_time(),
            finished_at: fixed_time(),
            profiles: vec!["ALT".into(), "Broken".into()],
            results: vec![
                ok(ProbeKind::Http, "https://discord.com", "HTTP 200"),
                ok(ProbeKind::Tls12, "https://discord.com", "HTTP 200"),
                ProbeResult {
                    unsupported: true,
                    ..ProbeResult::failure("ALT", "https://discord.com", ProbeKind::Tls13, "TLS1.3 is not supported")
                },
                ok(ProbeKind::Ping, "discord.com", "12 ms"),
                ProbeResult::init_failure("Broken", "Engine binary not found: bin/nfqws"),
            ],
            cancelled: false,
        }
    }

    #[test]
    fn standard_report_layout() {
        let text = render_report(&standard_run(), fixed_time());
        assert!(text.starts_with("DpiVerify Test Results - 2025-03-14 09:26:53\n"));
        assert!(text.contains("Test Type: Standard\n"));
        assert!(text.contains("Total Profiles Tested: 2\n"));
        assert!(text.contains("Total Tests Executed: 5\n"));
        assert!(text.contains("Target: https://discord.com\n  HTTP: SUCCESS - HTTP 200\n  TLS1.2: SUCCESS - HTTP 200\n  TLS1.3: UNSUPPORTED"));
        assert!(text.contains("  Ping: SUCCESS - 12 ms\n"));
        assert!(text.contains("Engine: FAILED - Engine binary not found"));
        assert_eq!(text.matches(SECTION_PREFIX).count(), 2);
    }

    #[test]
    fn dpi_report_includes_size_details() {
        let mut r = ProbeResult::failure("P", "US.CF-01 <Cloudflare>", ProbeKind::Dpi, "HTTP 403 size=18432 KB=18.0 LIKELY_BLOCKED");
        r.likely_blocked = true;
        r.status_code = Some(403);
        r.bytes = Some(18432);
        let run = TestRun {
            suite: SuiteKind::Dpi,
            started_at: fixed_time(),
            finished_at: fixed_time(),
            profiles: vec!["P".into()],
            results: vec![r],
            cancelled: true,
        };
        let text = render_report(&run, fixed_time());
        assert!(text.contains("Status: CANCELLED"));
        assert!(text.contains("Status: LIKELY BLOCKED\n"));
        assert!(text.contains("HTTP Status: 403\n"));
        assert!(text.contains("Content Length: 18432 bytes (18.0 KB)\n"));
    }

    #[test]
    fn summary_lists_working_profiles() {
        let text = render_summary(&standard_run());
        assert!(text.contains("Working profiles (1):"));
        assert!(text.contains("1. ALT (3/4)"));
        assert!(text.contains("[Init]: FAILED"));
    }
}
