//! Per-profile aggregation and ranking.

use crate::orchestrator::{SuiteKind, TestRun};
use crate::probe::{ProbeKind, ProbeResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSummary {
    pub profile: String,
    /// Results excluding the Init record.
    pub total: usize,
    pub successes: usize,
    pub likely_blocked: usize,
    pub unsupported: usize,
    /// Successful probes other than ping.
    pub transport_successes: usize,
    pub init_failed: bool,
}

impl ProfileSummary {
    fn from_results(profile: &str, results: &[&ProbeResult]) -> Self {
        let mut summary = Self {
            profile: profile.to_string(),
            total: 0,
            successes: 0,
            likely_blocked: 0,
            unsupported: 0,
            transport_successes: 0,
            init_failed: false,
        };
        for r in results {
            if r.kind == ProbeKind::Init {
                summary.init_failed = true;
                continue;
            }
            summary.total += 1;
            if r.success {
                summary.successes += 1;
                if r.kind != ProbeKind::Ping {
                    summary.transport_successes += 1;
                }
            }
            if r.likely_blocked {
                summary.likely_blocked += 1;
            }
            if r.unsupported {
                summary.unsupported += 1;
            }
        }
        summary
    }

    /// DPI score: successes minus likely-blocked responses.
    pub fn score(&self) -> i64 {
        self.successes as i64 - self.likely_blocked as i64
    }

    /// Whether the profile counts as working for the given suite.
    pub fn is_bypassing(&self, suite: SuiteKind) -> bool {
        match suite {
            SuiteKind::Standard => self.transport_successes > 0,
            SuiteKind::Dpi => self.successes > 0,
        }
    }
}

/// Results grouped by profile, in first-seen order.
pub fn group_by_profile(results: &[ProbeResult]) -> Vec<(&str, Vec<&ProbeResult>)> {
    let mut groups: Vec<(&str, Vec<&ProbeResult>)> = Vec::new();
    for r in results {
        match groups.iter_mut().find(|(name, _)| *name == r.profile) {
            Some((_, items)) => items.push(r),
            None => groups.push((r.profile.as_str(), vec![r])),
        }
    }
    groups
}

/// One summary per profile, in test order.
pub fn summarize(run: &TestRun) -> Vec<ProfileSummary> {
    group_by_profile(&run.results)
        .into_iter()
        .map(|(profile, results)| ProfileSummary::from_results(profile, &results))
        .collect()
}

/// Working profiles, best first.
///
/// Standard: by success count, descending. DPI: by score, descending.
/// Ties are broken by profile name.
pub fn rank(run: &TestRun) -> Vec<ProfileSummary> {
    let mut ranked: Vec<ProfileSummary> = summarize(run)
        .into_iter()
        .filter(|s| s.is_bypassing(run.suite))
        .collect();

    match run.suite {
        SuiteKind::Standard => ranked.sort_by(|a, b| {
            b.successes.cmp(&a.successes).then_with(|| a.profile.cmp(&b.profile))
        }),
        SuiteKind::Dpi => ranked.sort_by(|a, b| {
            b.score().cmp(&a.score()).then_with(|| a.profile.cmp(&b.profile))
        }),
    }
    ranked
}
