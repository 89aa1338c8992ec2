use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::counter::SortedCounter;
use crate::reporter::{Event, OpKind};
use std::sync::mpsc as ThreadedMpcs;
use std::time::Instant;

/// One reproducible trial of random operations against a private counter.
///
/// Keys are drawn uniformly from `-key_range..=key_range` and multiplicities
/// from `1..=max_times`. With probability `add_ratio` an operation is an add,
/// otherwise it is one of remove/minimum/maximum/get with equal odds.
///
/// # Panics
///
/// `bench` panics if `key_range` is negative, `max_times < 1` or `add_ratio`
/// lies outside `0.0..=1.0`.
#[derive(Clone, Debug)]
pub struct Bencher {
    pub id: usize,
    pub num_ops: usize,
    pub key_range: i64,
    pub add_ratio: f64,
    pub max_times: i64,
    pub seed: u64,
}

impl Bencher {
    fn pick_op(&self, rng: &mut StdRng) -> OpKind {
        if rng.gen_bool(self.add_ratio) {
            return OpKind::Add;
        }
        match rng.gen_range(0..4) {
            0 => OpKind::Remove,
            1 => OpKind::Minimum,
            2 => OpKind::Maximum,
            _ => OpKind::Get,
        }
    }

    /// Runs the trial, reporting every operation on `send_channel`, and hands
    /// back the counter in its final state. Stops early if the reporter hangs up.
    pub fn bench(self, send_channel: ThreadedMpcs::Sender<Event>) -> SortedCounter<i64> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut counter = SortedCounter::new();

        for seq in 0..self.num_ops {
            if send_channel.send(Event::OpStart).is_err() {
                debug!("bencher {}: reporter hung up after {} ops", self.id, seq);
                return counter;
            }

            let kind = self.pick_op(&mut rng);
            let key = rng.gen_range(-self.key_range..=self.key_range);
            let times = rng.gen_range(1..=self.max_times);

            let start = Instant::now();
            let outcome = match kind {
                OpKind::Add => counter.add(key, times),
                OpKind::Remove => counter.remove(&key, times),
                OpKind::Minimum => counter.minimum().map(|_| ()),
                OpKind::Maximum => counter.maximum().map(|_| ()),
                OpKind::Get => counter.get(&key).map(|_| ()),
            };
            let latency = start.elapsed();

            let event = match outcome {
                Ok(()) => Event::OpDone((self.id, seq, kind, latency)),
                Err(err) => Event::OpErrored(kind, err),
            };
            if send_channel.send(event).is_err() {
                return counter;
            }
        }

        let _ = send_channel.send(Event::TrialDone {
            size: counter.size(),
            distinct_keys: counter.distinct_keys(),
        });
        counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn bencher(seed: u64) -> Bencher {
        Bencher {
            id: 0,
            num_ops: 500,
            key_range: 10,
            add_ratio: 0.6,
            max_times: 3,
            seed,
        }
    }

    #[test]
    fn same_seed_same_counter() {
        let (tx, _rx) = mpsc::channel();
        let first = bencher(4092).bench(tx.clone());
        let second = bencher(4092).bench(tx.clone());
        let other = bencher(4093).bench(tx);
        assert!(first.size() > 0);
        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn stops_when_reporter_hangs_up() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let counter = bencher(1).bench(tx);
        assert!(counter.is_empty());
    }

    #[test]
    fn emits_one_start_per_op() {
        let (tx, rx) = mpsc::channel();
        let counter = bencher(7).bench(tx);

        let events: Vec<Event> = rx.iter().collect();
        let starts = events
            .iter()
            .filter(|e| matches!(e, Event::OpStart))
            .count();
        assert_eq!(starts, 500);
        match events.last() {
            Some(Event::TrialDone {
                size,
                distinct_keys,
            }) => {
                assert_eq!(*size, counter.size());
                assert_eq!(*distinct_keys, counter.distinct_keys());
            }
            _ => panic!("trial did not finish"),
        }
        assert!(counter.keys().all(|k| (-10..=10).contains(k)));
    }
}
