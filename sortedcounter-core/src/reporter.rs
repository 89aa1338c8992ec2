use crate::counter::SortedCounter;
use crate::error::Error;
use csv::WriterBuilder;
use hdrhistogram::errors::CreationError;
use hdrhistogram::Histogram;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;
use thiserror::Error as ThisError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OpKind {
    Add,
    Remove,
    Minimum,
    Maximum,
    Get,
}

impl OpKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OpKind::Add => "add",
            OpKind::Remove => "remove",
            OpKind::Minimum => "minimum",
            OpKind::Maximum => "maximum",
            OpKind::Get => "get",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// (bencher id, sequence number within the trial, operation, latency)
pub type Message = (usize, usize, OpKind, Duration);

pub enum Event {
    OpStart,
    OpDone(Message),
    OpErrored(OpKind, Error),
    TrialDone { size: u64, distinct_keys: usize },
}

#[derive(ThisError, Debug)]
pub enum ReportError {
    #[error("invalid progress template: {0}")]
    Template(#[from] indicatif::style::TemplateError),

    #[error("cannot create latency histogram: {0:?}")]
    Histogram(CreationError),

    #[error("cannot write latency csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("cannot flush latency csv: {0}")]
    Io(#[from] std::io::Error),

    #[error("error tally: {0}")]
    Counter(#[from] Error),
}

pub struct Report {
    pub expected: u64,
    pub completed: u64,
    pub errors: SortedCounter<String>,
    /// Latencies in nanoseconds, per operation kind.
    pub latencies: BTreeMap<OpKind, Histogram<u64>>,
    /// Final `(size, distinct keys)` of every trial, in completion order.
    pub trials: Vec<(u64, usize)>,
}

impl Report {
    pub fn print_summary(&self) {
        println!(
            "Completed {}/{} (errored {})",
            self.completed,
            self.expected,
            self.errors.size()
        );

        if !self.errors.is_empty() {
            println!("Errors");
            println!("{}", self.errors);
        }

        for (kind, hist) in &self.latencies {
            println!("{} latency percentiles (ns, {} samples)", kind, hist.len());
            for perc in &[0.1, 0.5, 0.9, 0.95, 0.99] {
                println!(
                    "{} Percentile: {}",
                    perc,
                    hist.value_at_quantile(*perc)
                )
            }
        }

        for (size, distinct) in &self.trials {
            println!("Trial finished with size {} over {} keys", size, distinct);
        }
    }
}

pub struct Reporter {
    pub receiver: mpsc::Receiver<Event>,
    pub latency_csv: Option<PathBuf>,
    pub show_progress: bool,
}

impl Reporter {
    /// Drains events until every sender has hung up.
    pub fn start(&mut self, num_ops: u64) -> Result<Report, ReportError> {
        let sent_progress = if self.show_progress {
            let sty = ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")?
                .progress_chars("##-");
            let bar = ProgressBar::new(num_ops);
            bar.set_style(sty);
            bar
        } else {
            ProgressBar::hidden()
        };
        sent_progress.set_message("Running operations");

        // rows are only kept when they will be written out
        let mut rows: Option<Vec<Message>> = self.latency_csv.as_ref().map(|_| vec![]);
        let mut completed: u64 = 0;
        let mut errors = SortedCounter::new();
        let mut latencies: BTreeMap<OpKind, Histogram<u64>> = BTreeMap::new();
        let mut trials = vec![];

        while let Ok(message) = self.receiver.recv() {
            match message {
                Event::OpStart => sent_progress.inc(1),
                Event::OpDone(msg) => {
                    let (_, _, kind, latency) = msg;
                    let hist = match latencies.entry(kind) {
                        Entry::Occupied(entry) => entry.into_mut(),
                        Entry::Vacant(entry) => entry.insert(
                            Histogram::<u64>::new(3).map_err(ReportError::Histogram)?,
                        ),
                    };
                    hist.saturating_record(latency.as_nanos() as u64);
                    completed += 1;
                    if let Some(rows) = rows.as_mut() {
                        rows.push(msg);
                    }
                }
                Event::OpErrored(kind, error) => {
                    errors.insert(format!("{}: {}", kind, error))?;
                }
                Event::TrialDone {
                    size,
                    distinct_keys,
                } => {
                    debug!("trial done, size {} over {} keys", size, distinct_keys);
                    trials.push((size, distinct_keys));
                }
            }
        }
        sent_progress.finish();

        if let (Some(path), Some(rows)) = (&self.latency_csv, &rows) {
            let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
            for (bencher, seq, kind, latency) in rows {
                writer.serialize((bencher, seq, kind.as_str(), latency.as_nanos() as u64))?;
            }
            writer.flush()?;
            debug!("wrote {} latency rows to {}", rows.len(), path.display());
        }

        Ok(Report {
            expected: num_ops,
            completed,
            errors,
            latencies,
            trials,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tallies_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(Event::OpStart).unwrap();
        tx.send(Event::OpDone((0, 0, OpKind::Add, Duration::from_nanos(120))))
            .unwrap();
        tx.send(Event::OpStart).unwrap();
        tx.send(Event::OpErrored(OpKind::Remove, Error::KeyNotFound))
            .unwrap();
        tx.send(Event::OpStart).unwrap();
        tx.send(Event::OpErrored(OpKind::Remove, Error::KeyNotFound))
            .unwrap();
        tx.send(Event::TrialDone {
            size: 1,
            distinct_keys: 1,
        })
        .unwrap();
        drop(tx);

        let mut reporter = Reporter {
            receiver: rx,
            latency_csv: None,
            show_progress: false,
        };
        let report = reporter.start(3).unwrap();
        assert_eq!(report.completed, 1);
        assert_eq!(report.errors.size(), 2);
        assert_eq!(
            report.errors.get("remove: key not present in the counter"),
            Ok(2)
        );
        assert_eq!(report.latencies[&OpKind::Add].len(), 1);
        assert!(!report.latencies.contains_key(&OpKind::Get));
        assert_eq!(report.trials, vec![(1, 1)]);
    }

    #[test]
    fn writes_one_row_per_completed_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latency.csv");

        let (tx, rx) = mpsc::channel();
        tx.send(Event::OpDone((3, 0, OpKind::Get, Duration::from_nanos(50))))
            .unwrap();
        tx.send(Event::OpErrored(OpKind::Minimum, Error::EmptyContainer))
            .unwrap();
        tx.send(Event::OpDone((3, 2, OpKind::Remove, Duration::from_nanos(70))))
            .unwrap();
        drop(tx);

        let mut reporter = Reporter {
            receiver: rx,
            latency_csv: Some(path.clone()),
            show_progress: false,
        };
        let report = reporter.start(3).unwrap();
        assert_eq!(report.completed, 2);

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "3,0,get,50\n3,2,remove,70\n");
    }
}
