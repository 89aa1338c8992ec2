use anyhow::{anyhow, ensure, Context};
use log::info;
use rayon::prelude::*;
use std::path::PathBuf;
use structopt::StructOpt;

use sortedcounter_core::bencher::Bencher;
use sortedcounter_core::reporter::Reporter;
use sortedcounter_core::SortedCounter;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "sortedcounter-bench",
    about = "Random workload generator for the sorted counter."
)]
struct Opt {
    #[structopt(short = "n", long, default_value = "1")]
    num_benchers: usize,

    #[structopt(long, default_value = "100000")]
    num_ops: usize,

    /// Keys are drawn from -key_range..=key_range
    #[structopt(long, default_value = "10")]
    key_range: i64,

    /// Probability that an operation is an add
    #[structopt(long, default_value = "0.5")]
    add_ratio: f64,

    #[structopt(long, default_value = "1")]
    max_times: i64,

    #[structopt(long, default_value = "4092")]
    seed: u64,

    /// Write one `bencher,seq,op,latency_ns` row per successful operation
    #[structopt(long, parse(from_os_str))]
    latency_csv: Option<PathBuf>,

    #[structopt(long)]
    no_progress: bool,
}

impl Opt {
    /// Rejects values `Bencher::bench` would panic on. NaN fails the ratio check.
    fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.key_range >= 0, "--key-range must not be negative");
        ensure!(self.max_times >= 1, "--max-times must be at least 1");
        ensure!(
            (0.0..=1.0).contains(&self.add_ratio),
            "--add-ratio must lie in [0, 1]"
        );
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();
    info!("Configuration: {:?}", opt);

    opt.validate()?;

    let (send_chan, recv_chan) = std::sync::mpsc::channel();

    let num_ops = opt.num_ops as u64 * opt.num_benchers as u64;
    let latency_csv = opt.latency_csv.clone();
    let show_progress = !opt.no_progress;
    let reporter_thread = std::thread::spawn(move || {
        let mut reporter = Reporter {
            receiver: recv_chan,
            latency_csv,
            show_progress,
        };
        reporter.start(num_ops)
    });

    let benchers: Vec<_> = (0..opt.num_benchers)
        .map(|id| {
            let bencher = Bencher {
                id,
                num_ops: opt.num_ops,
                key_range: opt.key_range,
                add_ratio: opt.add_ratio,
                max_times: opt.max_times,
                seed: opt.seed.wrapping_add(id as u64),
            };
            (bencher, send_chan.clone())
        })
        .collect();
    drop(send_chan);

    let counters: Vec<SortedCounter<i64>> = benchers
        .into_par_iter()
        .map(|(bencher, chan)| bencher.bench(chan))
        .collect();

    let report = reporter_thread
        .join()
        .map_err(|_| anyhow!("reporter thread panicked"))?
        .context("reporting failed")?;
    report.print_summary();

    for (id, counter) in counters.iter().enumerate() {
        match (counter.minimum(), counter.maximum()) {
            (Ok(min), Ok(max)) => info!(
                "bencher {}: size {}, {} keys in [{}, {}]",
                id,
                counter.size(),
                counter.distinct_keys(),
                min,
                max
            ),
            _ => info!("bencher {}: counter ended empty", id),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Opt {
        let mut argv = vec!["sortedcounter-bench"];
        argv.extend_from_slice(args);
        Opt::from_iter(argv)
    }

    #[test]
    fn defaults_are_valid() {
        let opt = parse(&[]);
        assert!(opt.validate().is_ok());
        assert_eq!(opt.num_benchers, 1);
        assert_eq!(opt.seed, 4092);
        assert!(opt.latency_csv.is_none());
    }

    #[test]
    fn boundary_values_are_valid() {
        assert!(parse(&["--key-range", "0", "--max-times", "1", "--add-ratio", "0"])
            .validate()
            .is_ok());
        assert!(parse(&["--add-ratio", "1"]).validate().is_ok());
    }

    #[test]
    fn rejects_negative_key_range() {
        let mut opt = parse(&[]);
        opt.key_range = -1;
        let err = opt.validate().unwrap_err();
        assert!(err.to_string().contains("--key-range"));
    }

    #[test]
    fn rejects_max_times_below_one() {
        assert!(parse(&["--max-times", "0"]).validate().is_err());
        let mut opt = parse(&[]);
        opt.max_times = -3;
        assert!(opt.validate().is_err());
    }

    #[test]
    fn rejects_add_ratio_outside_unit_interval() {
        assert!(parse(&["--add-ratio", "1.5"]).validate().is_err());
        let mut opt = parse(&[]);
        opt.add_ratio = -0.1;
        assert!(opt.validate().is_err());
        assert!(parse(&["--add-ratio", "NaN"]).validate().is_err());
    }
}
