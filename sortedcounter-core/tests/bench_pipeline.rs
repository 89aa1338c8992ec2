use sortedcounter_core::bencher::Bencher;
use sortedcounter_core::reporter::{OpKind, Reporter};
use std::sync::mpsc;
use std::thread;

#[test]
fn benchers_feed_reporter_and_csv() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("latency.csv");

    let (tx, rx) = mpsc::channel();
    let reporter_path = csv_path.clone();
    let reporter_thread = thread::spawn(move || {
        let mut reporter = Reporter {
            receiver: rx,
            latency_csv: Some(reporter_path),
            show_progress: false,
        };
        reporter.start(2 * 300)
    });

    let handles: Vec<_> = (0..2)
        .map(|id| {
            let bencher = Bencher {
                id,
                num_ops: 300,
                key_range: 5,
                add_ratio: 0.5,
                max_times: 2,
                seed: 4092 + id as u64,
            };
            let tx = tx.clone();
            thread::spawn(move || bencher.bench(tx))
        })
        .collect();
    drop(tx);

    let counters: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let report = reporter_thread.join().unwrap().unwrap();

    assert_eq!(report.completed + report.errors.size(), 600);
    assert_eq!(report.trials.len(), 2);
    let mut finals: Vec<u64> = counters.iter().map(|c| c.size()).collect();
    let mut reported: Vec<u64> = report.trials.iter().map(|(size, _)| *size).collect();
    finals.sort();
    reported.sort();
    assert_eq!(finals, reported);

    // adds never fail with small multiplicities
    assert!(report.latencies.contains_key(&OpKind::Add));
    assert!(report.errors.keys().all(|e| !e.starts_with("add")));

    let rows = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(rows.lines().count() as u64, report.completed);
    assert!(rows.lines().all(|line| line.split(',').count() == 4));
}
