//! Integration tests for scan-diff.
//!
//! These exercise the public surface end to end: loading reports from their
//! raw JSON form, comparing them level by level and through the engine, and
//! persisting them.

use scan_diff::error::LookupErrorKind;
use scan_diff::model::{HostCounts, HostStatus, RunInfo, RunStats, ScanInfo, ServiceFingerprint};
use scan_diff::{
    ContentHash, DiffEngine, DiffKey, Host, HostId, MemoryBackend, PortState, Report,
    ReportBackend, ReportSection, ScanDiffError, Service, ServiceId,
};

const MONDAY: &str = r#"{
  "nmaprun": {
    "scanner": "nmap",
    "args": "nmap -sV 10.0.0.0/30",
    "start": "1700000000",
    "version": "7.94"
  },
  "scaninfo": { "type": "syn", "protocol": "tcp", "numservices": "1000" },
  "hosts": [
    {
      "starttime": "1700000001",
      "endtime": "1700000042",
      "address": { "addr": "10.0.0.1", "addrtype": "ipv4" },
      "status": { "state": "up", "reason": "syn-ack" },
      "hostnames": ["gw.example", "router.example"],
      "services": [
        {
          "portid": "22",
          "protocol": "tcp",
          "state": { "state": "open", "reason": "syn-ack" },
          "service": {
            "name": "ssh",
            "method": "probed",
            "conf": "10",
            "product": "OpenSSH",
            "version": "8.9"
          }
        },
        {
          "portid": 53,
          "protocol": "udp",
          "state": { "state": "open" },
          "service": { "name": "domain", "method": "table" }
        }
      ],
      "extras": {
        "distance": { "value": "2" },
        "uptime": { "seconds": "3600", "lastboot": "Tue Nov 14 21:13:20 2023" }
      }
    }
  ],
  "runstats": {
    "finished": { "time": "1700000050", "elapsed": "50.12", "summary": "1 IP address (1 host up)" },
    "hosts": { "up": "1", "down": "3", "total": "4" }
  }
}"#;

fn ssh(state: &str) -> Service {
    Service::new(22, "tcp")
        .with_state(PortState::new(state).with_reason("syn-ack"))
        .with_fingerprint(ServiceFingerprint::named("ssh"))
}

fn host(addr: &str, services: Vec<Service>) -> Host {
    Host::new(addr)
        .with_status(HostStatus::new("up", "syn-ack"))
        .with_services(services)
}

fn report(hosts: Vec<Host>) -> Report {
    let up = u32::try_from(hosts.len()).unwrap();
    Report::new()
        .with_run_info(RunInfo {
            scanner: "nmap".to_string(),
            ..RunInfo::default()
        })
        .with_scan_info(ScanInfo::default())
        .with_hosts(hosts)
        .with_run_stats(RunStats {
            hosts: Some(HostCounts {
                up,
                down: 0,
                total: up,
            }),
            ..RunStats::default()
        })
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_load_report_from_json() {
    let report = Report::from_json(MONDAY).unwrap();

    assert!(report.is_consistent());
    assert_eq!(report.scanner(), "nmap");
    assert_eq!(report.version(), "7.94");
    assert_eq!(report.commandline(), "nmap -sV 10.0.0.0/30");
    assert_eq!(report.scan_type(), "syn");
    assert_eq!(report.hosts_up(), 1);
    assert_eq!(report.hosts_down(), 3);
    assert_eq!(report.hosts_total(), 4);
    assert_eq!(report.elapsed(), "50.12");

    let gw = report.get_host("10.0.0.1").unwrap().expect("host present");
    assert!(gw.is_up());
    assert_eq!(gw.services().len(), 2);
    assert_eq!(gw.distance(), 2);
    assert_eq!(gw.uptime(), 3600);
    assert!(gw.os_class_probabilities().is_empty());
    assert_eq!(gw.tcpsequence(), "");

    let sshd = gw.get_service(22, "tcp").unwrap().expect("ssh present");
    assert_eq!(sshd.service(), Some("ssh"));
    assert_eq!(sshd.banner(), "product: OpenSSH version: 8.9");

    let dns = gw.get_service(53, "udp").unwrap().expect("dns present");
    assert_eq!(dns.banner(), "");
    assert!(gw.get_service(53, "tcp").unwrap().is_none());
}

#[test]
fn test_load_rejects_out_of_range_port() {
    let json = MONDAY.replace("\"portid\": 53", "\"portid\": 70000");
    let err = Report::from_json(&json).unwrap_err();
    assert!(matches!(err, ScanDiffError::Serialization(_)));
}

#[test]
fn test_load_rejects_non_numeric_port() {
    let json = MONDAY.replace("\"portid\": \"22\"", "\"portid\": \"ssh\"");
    assert!(Report::from_json(&json).is_err());
}

#[test]
fn test_load_tolerates_malformed_optional_fields() {
    let json = MONDAY
        .replace("\"up\": \"1\"", "\"up\": \"n/a\"")
        .replace("\"elapsed\": \"50.12\"", "\"elapsed\": 50.12")
        .replace(
            "\"status\": { \"state\": \"up\", \"reason\": \"syn-ack\" }",
            "\"status\": \"up\"",
        );
    let report = Report::from_json(&json).unwrap();

    assert!(report.is_consistent());
    assert_eq!(report.hosts_up(), 0);
    assert_eq!(report.hosts_total(), 4);
    assert_eq!(report.elapsed(), "50.12");
    let gw = report.get_host("10.0.0.1").unwrap().expect("host present");
    assert!(gw.is_up());
    assert_eq!(gw.status_reason(), None);

    // the unreadable counter still takes part in the comparison, as 0
    let original = Report::from_json(MONDAY).unwrap();
    let diff = original.diff(&report).into_compared().unwrap();
    assert!(diff.changed().contains(&DiffKey::Field("hosts_up")));
}

#[test]
fn test_round_trip_through_raw_form() {
    let report = Report::from_json(MONDAY).unwrap();
    let rebuilt = Report::from_raw(report.raw_data());

    assert_eq!(rebuilt, report);
    assert_eq!(rebuilt.changed(&report), 0);
    assert_eq!(rebuilt.content_hash(), report.content_hash());

    let reparsed = Report::from_json(&report.to_json().unwrap()).unwrap();
    assert_eq!(reparsed, report);
    assert_eq!(reparsed.version(), "7.94");
}

// ============================================================================
// Service-level and host-level diffs
// ============================================================================

#[test]
fn test_service_port_validation() {
    assert!(Service::try_new(0, "tcp").is_ok());
    assert!(Service::try_new(65535, "tcp").is_ok());
    assert!(Service::try_new(65536, "tcp").unwrap_err().is_validation());
    assert!(Service::try_new(-1, "udp").unwrap_err().is_validation());
}

#[test]
fn test_host_service_state_change() {
    let h1 = host("10.0.0.1", vec![ssh("open")]);
    let h2 = host("10.0.0.1", vec![ssh("closed")]);

    let diff = h1.diff(&h2);
    assert!(diff.changed().contains(&DiffKey::Service(ServiceId::tcp(22))));
    assert!(diff.added().is_empty());
    assert!(diff.removed().is_empty());
    assert_eq!(h1.changed(&h2), 1);
    assert_ne!(h1, h2);
}

#[test]
fn test_duplicate_service_lookup_is_an_error() {
    let host = Host::new("10.0.0.1")
        .with_service(Service::new(80, "tcp"))
        .with_service(Service::new(80, "tcp").with_state(PortState::new("open")));

    let err = host.get_service(80, "tcp").unwrap_err();
    assert!(err.is_lookup());
    assert!(matches!(
        err,
        ScanDiffError::Lookup {
            source: LookupErrorKind::DuplicateService { port: 80, count: 2, .. },
            ..
        }
    ));
    assert_eq!(host.duplicate_service_ids(), vec![ServiceId::tcp(80)]);
}

#[test]
fn test_duplicate_service_surfaces_through_engine() {
    // the later duplicate wins in the comparison view, so it must differ
    let old = host("10.0.0.1", vec![Service::new(80, "tcp"), Service::new(80, "tcp")]);
    let new = host(
        "10.0.0.1",
        vec![
            Service::new(80, "tcp"),
            Service::new(80, "tcp").with_state(PortState::new("open")),
        ],
    );

    let err = DiffEngine::new().diff_hosts(&old, &new).unwrap_err();
    assert!(err.is_lookup());
}

#[test]
fn test_hostname_order_is_not_significant() {
    let a = Host::new("10.0.0.1")
        .with_hostname("b.example")
        .with_hostname("a.example");
    let b = Host::new("10.0.0.1")
        .with_hostname("a.example")
        .with_hostname("b.example");

    assert_eq!(a, b);
    assert!(a.hash_eq(&b));
    assert!(!a.diff(&b).has_changes());
}

// ============================================================================
// Report-level diffs
// ============================================================================

#[test]
fn test_report_new_host_discovered() {
    let a = host("10.0.0.1", vec![ssh("open")]);
    let b = host("10.0.0.2", vec![]);

    let r1 = report(vec![a.clone()]);
    let r2 = report(vec![a, b]);

    let diff = r1.diff(&r2).into_compared().expect("consistent reports");
    assert_eq!(
        diff.added_hosts().collect::<Vec<_>>(),
        vec![&HostId::new("10.0.0.2")]
    );
    assert_eq!(diff.removed_hosts().count(), 0);
    assert_eq!(diff.changed_hosts().count(), 0);
    assert!(diff.unchanged().contains(&DiffKey::Host(HostId::new("10.0.0.1"))));
}

#[test]
fn test_report_missing_runstats_is_skipped() {
    let complete = report(vec![host("10.0.0.1", vec![])]);
    let incomplete = Report::new()
        .with_run_info(RunInfo::default())
        .with_scan_info(ScanInfo::default())
        .with_hosts(vec![host("10.0.0.9", vec![])]);

    let outcome = incomplete.diff(&complete);
    let reason = outcome.skip_reason().expect("skipped");
    assert_eq!(reason.old_missing, vec![ReportSection::RunStats]);
    assert!(!incomplete.is_consistent());
    assert_eq!(incomplete.changed(&complete), 0);
    assert!(complete.diff(&incomplete).is_skipped());
}

#[test]
fn test_report_diff_symmetry() {
    let r1 = report(vec![host("10.0.0.1", vec![]), host("10.0.0.2", vec![])]);
    let r2 = report(vec![host("10.0.0.2", vec![]), host("10.0.0.3", vec![])]);

    let forward = r1.diff(&r2).into_diff_or_empty();
    let backward = r2.diff(&r1).into_diff_or_empty();
    assert_eq!(forward.added(), backward.removed());
    assert_eq!(forward.removed(), backward.added());
    assert_eq!(forward.changed(), backward.changed());
}

#[test]
fn test_report_host_order_independent() {
    let hosts = vec![
        host("10.0.0.1", vec![ssh("open")]),
        host("10.0.0.2", vec![Service::new(443, "tcp")]),
    ];
    let mut reversed = hosts.clone();
    reversed.reverse();

    let (r1, r2) = (report(hosts), report(reversed));
    assert_eq!(r1.content_hash(), r2.content_hash());
    assert_eq!(r1, r2);
    assert!(!r1.diff(&r2).into_diff_or_empty().has_changes());
}

// ============================================================================
// Engine
// ============================================================================

#[test]
fn test_engine_explains_changes() {
    let monday = Report::from_json(MONDAY).unwrap();
    let tuesday_json = MONDAY
        .replace("\"version\": \"8.9\"", "\"version\": \"9.6\"")
        .replace(
            "\"portid\": 53,\n          \"protocol\": \"udp\"",
            "\"portid\": 443,\n          \"protocol\": \"tcp\"",
        );
    let tuesday = Report::from_json(&tuesday_json).unwrap();

    let delta = DiffEngine::new()
        .diff_reports(&monday, &tuesday)
        .unwrap()
        .into_compared()
        .expect("consistent reports");

    assert_eq!(delta.summary.hosts_changed, 1);
    let gw = delta.host(&HostId::new("10.0.0.1")).expect("host detail");
    assert_eq!(gw.diff.added_services().collect::<Vec<_>>(), vec![&ServiceId::tcp(443)]);
    assert_eq!(
        gw.diff.removed_services().collect::<Vec<_>>(),
        vec![&ServiceId::new("udp", 53)]
    );

    let sshd = gw.services.get(&ServiceId::tcp(22)).expect("ssh detail");
    assert_eq!(sshd.changed_fields().collect::<Vec<_>>(), vec!["banner"]);

    let json = delta.to_json_pretty().unwrap();
    assert!(json.contains("Host.10.0.0.1"));
    assert!(json.contains("Service.tcp/443"));
}

#[test]
fn test_engine_identity_mismatch() {
    let engine = DiffEngine::new();
    let err = engine
        .diff_hosts(&host("10.0.0.1", vec![]), &host("10.0.0.2", vec![]))
        .unwrap_err();
    assert!(matches!(err, ScanDiffError::Diff { .. }));
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_save_and_reload() {
    let backend = MemoryBackend::new();
    let report = Report::from_json(MONDAY).unwrap();

    let id = report.save(&backend).unwrap();
    let loaded = backend.get(&id).unwrap().expect("stored");
    assert_eq!(loaded, report);
    assert_eq!(backend.list().unwrap(), vec![id]);
}

#[test]
fn test_save_inconsistent_report_fails() {
    let backend = MemoryBackend::new();
    let err = Report::new().with_hosts(vec![]).save(&backend).unwrap_err();
    assert!(matches!(err, ScanDiffError::Persistence { .. }));
    assert!(backend.list().unwrap().is_empty());
}
