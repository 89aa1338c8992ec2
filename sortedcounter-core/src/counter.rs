use std::borrow::Borrow;
use std::collections::btree_map::{self, BTreeMap};
use std::convert::TryFrom;
use std::fmt;
use std::iter::FromIterator;

use log::trace;

use crate::error::{Error, Result};

/// A multiset that keeps its distinct keys in ascending order.
///
/// Every stored count is strictly positive and `size()` is always the sum of
/// all counts. All mutation funnels through one private increment and one
/// private decrement primitive.
///
/// Adding is strict (a non-positive multiplicity is rejected) while removing
/// more occurrences than are present is tolerated: the key is dropped and
/// only what was actually there is debited from the total, so
/// `remove(key, i64::MAX)` removes every occurrence of `key`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortedCounter<K>
where
    K: Ord,
{
    entries: BTreeMap<K, u64>,
    total: u64,
}

impl<K> Default for SortedCounter<K>
where
    K: Ord,
{
    fn default() -> Self {
        SortedCounter::new()
    }
}

fn positive(times: i64) -> Option<u64> {
    u64::try_from(times).ok().filter(|t| *t > 0)
}

impl<K> SortedCounter<K>
where
    K: Ord,
{
    pub fn new() -> SortedCounter<K> {
        SortedCounter {
            entries: BTreeMap::new(),
            total: 0,
        }
    }

    /// Counts every occurrence in `items`; duplicates accumulate.
    pub fn from_items<I>(items: I) -> SortedCounter<K>
    where
        I: IntoIterator<Item = K>,
    {
        let mut counter = SortedCounter::new();
        for item in items {
            // unchecked: the total only overflows past u64::MAX yielded items
            counter.increment(item, 1);
        }
        counter
    }

    /// Builds a counter from pre-aggregated `(key, count)` pairs.
    ///
    /// Counts are taken as-is rather than accumulated. If the same key is
    /// yielded twice the later count wins. Any count `<= 0` fails the whole
    /// construction with [`Error::InvalidCount`].
    pub fn from_counts<I>(counts: I) -> Result<SortedCounter<K>>
    where
        I: IntoIterator<Item = (K, i64)>,
    {
        let mut counter = SortedCounter::new();
        for (key, count) in counts {
            let count = positive(count).ok_or(Error::InvalidCount { count })?;
            if let Some(previous) = counter.entries.insert(key, count) {
                counter.total -= previous;
            }
            counter.total = counter
                .total
                .checked_add(count)
                .ok_or(Error::CountOverflow)?;
        }
        Ok(counter)
    }

    /// Adds `times` occurrences of `key`.
    pub fn add(&mut self, key: K, times: i64) -> Result<()> {
        let times = positive(times).ok_or_else(|| Error::invalid_add(times))?;
        self.reserve_total(times)?;
        self.increment(key, times);
        Ok(())
    }

    pub fn insert(&mut self, key: K) -> Result<()> {
        self.add(key, 1)
    }

    /// Removes up to `times` occurrences of `key`.
    ///
    /// Fails with [`Error::KeyNotFound`] if `key` is absent. Asking for more
    /// occurrences than are stored removes the key entirely.
    pub fn remove<Q>(&mut self, key: &Q, times: i64) -> Result<()>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let times = positive(times).ok_or_else(|| Error::invalid_remove(times))?;
        self.decrement(key, times)
    }

    pub fn remove_one<Q>(&mut self, key: &Q) -> Result<()>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.remove(key, 1)
    }

    /// Adds one occurrence per item. Nothing is added if the total would overflow.
    pub fn extend_items<I>(&mut self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = K>,
    {
        let items: Vec<K> = items.into_iter().collect();
        self.reserve_total(items.len() as u64)?;
        for item in items {
            self.increment(item, 1);
        }
        Ok(())
    }

    /// Adds `count` occurrences for every `(key, count)` pair.
    ///
    /// Unlike [`from_counts`](Self::from_counts) this accumulates onto the
    /// existing counts. All pairs are validated before the first one is
    /// applied, so a rejected call leaves the counter untouched.
    pub fn extend_counts<I>(&mut self, counts: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, i64)>,
    {
        let mut added: u64 = 0;
        let mut validated = Vec::new();
        for (key, times) in counts {
            let times = positive(times).ok_or_else(|| Error::invalid_add(times))?;
            added = added.checked_add(times).ok_or(Error::CountOverflow)?;
            validated.push((key, times));
        }
        self.reserve_total(added)?;
        for (key, times) in validated {
            self.increment(key, times);
        }
        Ok(())
    }

    /// Smallest key by key order (not by count).
    pub fn minimum(&self) -> Result<&K> {
        self.entries
            .first_key_value()
            .map(|(key, _)| key)
            .ok_or(Error::EmptyContainer)
    }

    /// Largest key by key order (not by count).
    pub fn maximum(&self) -> Result<&K> {
        self.entries
            .last_key_value()
            .map(|(key, _)| key)
            .ok_or(Error::EmptyContainer)
    }

    /// Strict lookup: an absent key is an error and is never inserted.
    pub fn get<Q>(&self, key: &Q) -> Result<u64>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entries.get(key).copied().ok_or(Error::KeyNotFound)
    }

    /// Like [`get`](Self::get) but reports 0 for absent keys.
    pub fn count<Q>(&self, key: &Q) -> u64
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entries.get(key).copied().unwrap_or(0)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entries.contains_key(key)
    }

    /// Sum of all occurrence counts, not the number of distinct keys.
    pub fn size(&self) -> u64 {
        self.total
    }

    pub fn distinct_keys(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(key, count)` pairs in ascending key order.
    pub fn iter(&self) -> btree_map::Iter<'_, K, u64> {
        self.entries.iter()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, K, u64> {
        self.entries.keys()
    }

    pub fn as_map(&self) -> &BTreeMap<K, u64> {
        &self.entries
    }

    pub fn into_map(self) -> BTreeMap<K, u64> {
        self.entries
    }

    fn reserve_total(&self, additional: u64) -> Result<()> {
        self.total
            .checked_add(additional)
            .map(|_| ())
            .ok_or(Error::CountOverflow)
    }

    // Callers must have checked that `total + times` fits.
    fn increment(&mut self, key: K, times: u64) {
        *self.entries.entry(key).or_insert(0) += times;
        self.total += times;
    }

    fn decrement<Q>(&mut self, key: &Q, times: u64) -> Result<()>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let current = self.entries.get_mut(key).ok_or(Error::KeyNotFound)?;
        if *current <= times {
            let present = *current;
            self.entries.remove(key);
            self.total -= present;
            if present < times {
                trace!("clamped removal of {} occurrences to {}", times, present);
            }
        } else {
            *current -= times;
            self.total -= times;
        }
        Ok(())
    }
}

impl<K> FromIterator<K> for SortedCounter<K>
where
    K: Ord,
{
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        SortedCounter::from_items(iter)
    }
}

impl<'a, K> IntoIterator for &'a SortedCounter<K>
where
    K: Ord,
{
    type Item = (&'a K, &'a u64);
    type IntoIter = btree_map::Iter<'a, K, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<K> IntoIterator for SortedCounter<K>
where
    K: Ord,
{
    type Item = (K, u64);
    type IntoIter = btree_map::IntoIter<K, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Renders as `{k1: c1, k2: c2}` in ascending key order.
impl<K> fmt::Display for SortedCounter<K>
where
    K: Ord + fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, count)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", key, count)?;
        }
        f.write_str("}")
    }
}
