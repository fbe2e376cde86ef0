//! Benchmarks for the diff engine.
//!
//! Run with: cargo bench --bench diff_benchmark

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use scan_diff::model::{HostCounts, HostStatus, RunInfo, RunStats, ScanInfo, ServiceFingerprint};
use scan_diff::{ContentHash, DiffEngine, EngineConfig, Host, PortState, Report, Service};
use std::hint::black_box;

const PORTS: [u16; 8] = [22, 25, 53, 80, 110, 143, 443, 8080];

fn generate_host(index: usize, state: &str) -> Host {
    let services = PORTS.iter().map(|&port| {
        Service::new(port, "tcp")
            .with_state(PortState::new(state))
            .with_fingerprint(ServiceFingerprint::named(format!("svc-{port}")))
    });
    Host::new(format!("10.{}.{}.{}", index / 65536, (index / 256) % 256, index % 256))
        .with_status(HostStatus::new("up", "syn-ack"))
        .with_services(services)
}

fn generate_report(hosts: usize, changed_every: usize) -> Report {
    let total = u32::try_from(hosts).unwrap_or(u32::MAX);
    Report::new()
        .with_run_info(RunInfo::default())
        .with_scan_info(ScanInfo::default())
        .with_hosts((0..hosts).map(|i| {
            let state = if changed_every > 0 && i % changed_every == 0 { "closed" } else { "open" };
            generate_host(i, state)
        }))
        .with_run_stats(RunStats {
            hosts: Some(HostCounts { up: total, down: 0, total }),
            ..RunStats::default()
        })
}

fn bench_content_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("content_hash");
    for size in [100, 1_000, 10_000] {
        let report = generate_report(size, 0);
        group.bench_with_input(BenchmarkId::from_parameter(size), &report, |b, report| {
            b.iter(|| black_box(report.content_hash()));
        });
    }
    group.finish();
}

fn bench_diff_reports(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_reports");
    for size in [100, 1_000, 10_000] {
        let old = generate_report(size, 0);
        let new = generate_report(size, 10);

        group.bench_with_input(BenchmarkId::new("parallel", size), &(&old, &new), |b, (o, n)| {
            let engine = DiffEngine::new();
            b.iter(|| black_box(engine.diff_reports(o, n)));
        });
        group.bench_with_input(BenchmarkId::new("sequential", size), &(&old, &new), |b, (o, n)| {
            let engine = DiffEngine::with_config(EngineConfig::sequential());
            b.iter(|| black_box(engine.diff_reports(o, n)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_content_hash, bench_diff_reports);
criterion_main!(benches);
