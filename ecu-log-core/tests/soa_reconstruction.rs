// SOA channel reconstruction from log files and a manifest on disk
use ecu_log_core::{CounterKind, ServiceBusReconstructor, SoaConfig};
use std::fs;

const BUS_LOG_1: &str = "\
2025-08-25 16:52:08.434 BZCU I 5ae0 SOA cnt on0:20,45109
2025-08-25 16:52:08.434 BZCU I 5ae1 SOA cnt on2:7,0,
2025-08-25 16:52:08.434 BZCU I 5ae2 SOA ASW drop cnt on0:0,2,0,0
2025-08-25 16:52:08.500 BZCU I 5ae3 unrelated line
";

const BUS_LOG_2: &str = "\
2026-02-02 15:10:24.573 PZCU I 4793 (ZCAN) SOA cnt on0:25,45200,0,0
2026-02-02 15:10:24.573 PZCU I 4794 (ZCAN) SOA ASW drop cnt on0:0,0,0,0
";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn reconstruct_from_files() {
    init_logging();

    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("Summary_Report.json");
    fs::write(
        &manifest,
        r#"{"TOPIC": ["VehicleSpeed", "DoorState", "Climate", "VehicleSpeed"], "version": 2}"#,
    )
    .unwrap();
    fs::write(dir.path().join("bus1.log"), BUS_LOG_1).unwrap();
    fs::write(dir.path().join("bus2.log"), BUS_LOG_2).unwrap();

    let mut soa = ServiceBusReconstructor::new(&SoaConfig::default()).unwrap();
    assert!(soa.load_manifest(&manifest));
    assert_eq!(soa.parse_log_file(&dir.path().join("bus1.log")), 3);
    assert_eq!(soa.parse_log_file(&dir.path().join("bus2.log")), 2);
    assert_eq!(soa.parse_log_file(&dir.path().join("missing.log")), 0);
    assert!(soa.process());

    let speed = soa.channel("VehicleSpeed").unwrap();
    assert_eq!(
        speed.received,
        vec![
            ("2025-08-25 16:52:08.434".to_string(), 20),
            ("2026-02-02 15:10:24.573".to_string(), 25),
        ]
    );
    assert_eq!(speed.sent[0].1, 0);
    assert_eq!(speed.sent.len(), 2);

    let door = soa.channel("DoorState").unwrap();
    assert_eq!(door.received[0].1, 45109);
    assert_eq!(door.dropped[0].1, 2);

    let climate = soa.channel("Climate").unwrap();
    assert_eq!(climate.received[0].1, 7);

    let report = soa.report().unwrap();
    assert_eq!(report.channels.len(), 3);
    assert_eq!(report.statistics.topic_count, 4);
    assert_eq!(report.statistics.total_lost_data, 2);

    let details = soa.log_details();
    assert_eq!(details.len(), 5);
    assert_eq!(details[0].file_name, "bus1.log");
    assert_eq!(details[2].kind, CounterKind::Drop);
    assert_eq!(details[4].file_name, "bus2.log");

    // VehicleSpeed has no positive sent value, so only its received series is charted
    let series = soa.channel_series();
    let speed_series = series.iter().find(|s| s.name == "VehicleSpeed").unwrap();
    assert!(speed_series.received.is_some());
    assert!(speed_series.sent.is_none());

    let summary = soa.summary_series();
    assert_eq!(summary.timestamps.len(), 2);
    assert_eq!(summary.received, vec![20 + 45109 + 7, 25 + 45200]);
}

#[test]
fn lowercase_manifest_key() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("topics.json");
    fs::write(&manifest, r#"{"topic": ["A"]}"#).unwrap();

    let mut soa = ServiceBusReconstructor::new(&SoaConfig::default()).unwrap();
    assert!(soa.load_manifest(&manifest));
    assert_eq!(soa.manifest(), ["A".to_string()]);
}

#[test]
fn malformed_manifest_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("bad.json");
    fs::write(&manifest, r#"{"TOPIC": "not a list"}"#).unwrap();

    let mut soa = ServiceBusReconstructor::new(&SoaConfig::default()).unwrap();
    assert!(!soa.load_manifest(&manifest));
    assert!(!soa.process());
}

#[test]
fn out_of_range_offsets_are_skipped() {
    init_logging();

    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("bus.log");
    fs::write(
        &log,
        "\
2025-08-25 16:52:08.434 BZCU I 1 SOA cnt on18446744073709551615:1
2025-08-25 16:52:08.434 BZCU I 2 SOA cnt on4611686018427387904:1
2025-08-25 16:52:08.434 BZCU I 3 SOA ASW drop cnt on5000000000:1
2025-08-25 16:52:08.434 BZCU I 4 SOA cnt on0:3,4
",
    )
    .unwrap();

    let mut soa = ServiceBusReconstructor::new(&SoaConfig::default()).unwrap();
    soa.set_manifest(vec!["A".to_string(), "B".to_string()]);
    assert_eq!(soa.parse_log_file(&log), 1);
    assert!(soa.process());

    assert_eq!(soa.channel("B").unwrap().received[0].1, 4);
    assert_eq!(soa.log_details().len(), 1);
}
