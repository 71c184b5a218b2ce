//! Exports taken while the acquisition thread keeps appending.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use erp_sensor::{shared, ScriptedSource};
use recording::{AcquisitionThread, ConnectionLink, ConnectionState, SampleBuffer};

#[test]
fn export_during_push_is_a_clean_prefix() {
    let (source, feed) = ScriptedSource::new(3, 1000.0);
    feed.push_range(0.0, 5.0, 1000.0, &[1.0, 2.0, 3.0]);

    let buffer = Arc::new(SampleBuffer::new());
    let link = ConnectionLink::new(ConnectionState::Collecting);
    let mut acq = AcquisitionThread::spawn(
        shared(source),
        buffer.clone(),
        link.clone(),
        Duration::from_millis(1),
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let mut exported = Vec::new();
    for i in 0..5 {
        let path = dir.path().join(format!("snapshot_{}.csv", i));
        let rows = buffer.write_table(&path, false).unwrap();
        exported.push((path, rows));
        thread::sleep(Duration::from_millis(3));
    }
    acq.stop();

    let total = buffer.len();
    for (path, rows) in exported {
        assert!(rows <= total);
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), rows);
        for (n, line) in lines.iter().enumerate() {
            let fields: Vec<&str> = line.split(',').collect();
            assert_eq!(fields.len(), 5, "torn row {:?}", line);
            let t: f64 = fields[0].parse().unwrap();
            assert!((t - n as f64 / 1000.0).abs() < 1e-9, "row {} out of order", n);
            assert_eq!(&fields[1..], &["0", "1", "2", "3"]);
        }
    }
}

#[test]
fn samples_outside_collection_are_not_exported() {
    let (source, feed) = ScriptedSource::new(1, 100.0);
    let buffer = Arc::new(SampleBuffer::new());
    let link = ConnectionLink::new(ConnectionState::Connected);
    let _acq = AcquisitionThread::spawn(
        shared(source),
        buffer.clone(),
        link.clone(),
        Duration::from_millis(1),
    )
    .unwrap();

    feed.push_range(0.0, 0.5, 100.0, &[0.0]);
    while feed.pending() > 0 {
        thread::sleep(Duration::from_millis(1));
    }
    thread::sleep(Duration::from_millis(20));
    assert!(buffer.is_empty());
}
