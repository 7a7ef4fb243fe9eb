//! Aggregation and report rendering benchmarks.
//!
//! Measures ranking and text rendering for runs of increasing size.

use chrono::Local;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use dpi_verify::orchestrator::{SuiteKind, TestRun};
use dpi_verify::probe::{builtin_dpi_targets, ProbeKind, ProbeResult};
use dpi_verify::report::{rank, render_report, render_summary};

fn dpi_run(profiles: usize) -> TestRun {
    let targets = builtin_dpi_targets();
    let mut results = Vec::with_capacity(profiles * targets.len());
    for p in 0..profiles {
        let profile = format!("profile-{p:03}");
        for (i, t) in targets.iter().enumerate() {
            let mut r = ProbeResult::failure(&profile, t.display_name(), ProbeKind::Dpi, "HTTP 200 size=262144 KB=256.0 OK");
            r.success = (p + i) % 3 != 0;
            r.likely_blocked = !r.success && i % 2 == 0;
            r.status_code = Some(if r.success { 200 } else { 403 });
            r.bytes = Some(if r.success { 262_144 } else { 18_432 });
            results.push(r);
        }
    }
    TestRun {
        suite: SuiteKind::Dpi,
        started_at: Local::now(),
        finished_at: Local::now(),
        profiles: (0..profiles).map(|p| format!("profile-{p:03}")).collect(),
        results,
        cancelled: false,
    }
}

fn bench_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank");

    for profiles in [10usize, 50, 200] {
        let run = dpi_run(profiles);
        group.throughput(Throughput::Elements(run.results.len() as u64));
        group.bench_with_input(BenchmarkId::new("dpi", profiles), &run, |b, run| {
            b.iter(|| black_box(rank(black_box(run))))
        });
    }

    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    let run = dpi_run(50);
    let at = Local::now();

    group.throughput(Throughput::Elements(run.results.len() as u64));
    group.bench_function("report", |b| b.iter(|| black_box(render_report(black_box(&run), at))));
    group.bench_function("summary", |b| b.iter(|| black_box(render_summary(black_box(&run)))));

    group.finish();
}

criterion_group!(benches, bench_rank, bench_render);
criterion_main!(benches);
