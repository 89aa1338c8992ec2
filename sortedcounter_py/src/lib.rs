use ordered_float::NotNan;
use pyo3::exceptions::{PyIndexError, PyKeyError, PyOverflowError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyDict, PyFloat, PyMapping, PyString};
use std::convert::TryFrom;

use sortedcounter_core::{Error, SortedCounter as Counter};

type Key = NotNan<f64>;

fn to_py_err(err: Error) -> PyErr {
    match err {
        Error::EmptyContainer => PyIndexError::new_err(err.to_string()),
        _ => PyValueError::new_err(err.to_string()),
    }
}

fn to_key(value: f64) -> PyResult<Key> {
    NotNan::new(value).map_err(|_| PyValueError::new_err("NaN cannot be used as a key"))
}

/// The two input shapes the counter understands.
enum Input {
    Items(Vec<Key>),
    Counts(Vec<(Key, i64)>),
}

fn classify(items: &Bound<'_, PyAny>) -> PyResult<Input> {
    if items.is_instance_of::<PyString>() || items.is_instance_of::<PyBytes>() {
        return Err(PyTypeError::new_err(
            "expected an iterable of numbers or a mapping of number to count, not a string",
        ));
    }

    if let Ok(mapping) = items.downcast::<PyMapping>() {
        let mut counts = vec![];
        for pair in mapping.items()?.iter() {
            let (key, count): (f64, i64) = pair.extract()?;
            counts.push((to_key(key)?, count));
        }
        return Ok(Input::Counts(counts));
    }

    let mut keys = vec![];
    for item in items.iter()? {
        keys.push(to_key(item?.extract::<f64>()?)?);
    }
    Ok(Input::Items(keys))
}

/// SortedCounter(items=None)
///
/// A counter of float keys kept in ascending order. `items` may be an
/// iterable of numbers, each counted once per occurrence, or a mapping of
/// number to a positive count.
#[pyclass(name = "SortedCounter", module = "sortedcounter")]
#[derive(Clone)]
struct PySortedCounter {
    inner: Counter<Key>,
}

#[pymethods]
impl PySortedCounter {
    #[new]
    #[pyo3(signature = (items=None))]
    fn new(items: Option<&Bound<'_, PyAny>>) -> PyResult<Self> {
        let inner = match items.map(classify).transpose()? {
            None => Counter::new(),
            Some(Input::Items(keys)) => Counter::from_items(keys),
            Some(Input::Counts(counts)) => Counter::from_counts(counts).map_err(to_py_err)?,
        };
        Ok(PySortedCounter { inner })
    }

    #[pyo3(signature = (key, times=1))]
    fn add(&mut self, key: f64, times: i64) -> PyResult<()> {
        self.inner.add(to_key(key)?, times).map_err(to_py_err)
    }

    /// Removes up to `times` occurrences; removing more than are present drops the key.
    #[pyo3(signature = (key, times=1))]
    fn remove(&mut self, key: f64, times: i64) -> PyResult<()> {
        self.inner.remove(&to_key(key)?, times).map_err(to_py_err)
    }

    /// Adds occurrences from an iterable, or counts from a mapping.
    fn extend(&mut self, items: &Bound<'_, PyAny>) -> PyResult<()> {
        match classify(items)? {
            Input::Items(keys) => self.inner.extend_items(keys),
            Input::Counts(counts) => self.inner.extend_counts(counts),
        }
        .map_err(to_py_err)
    }

    fn minimum(&self) -> PyResult<f64> {
        self.inner
            .minimum()
            .map(|key| key.into_inner())
            .map_err(to_py_err)
    }

    fn maximum(&self) -> PyResult<f64> {
        self.inner
            .maximum()
            .map(|key| key.into_inner())
            .map_err(to_py_err)
    }

    fn distinct_keys(&self) -> usize {
        self.inner.distinct_keys()
    }

    /// Return a copy of the SortedCounter as a dictionary
    fn to_dict<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let dict = PyDict::new_bound(py);
        for (key, count) in &self.inner {
            dict.set_item(key.into_inner(), *count)?;
        }
        Ok(dict)
    }

    fn __getitem__(&self, key: f64) -> PyResult<u64> {
        let key = to_key(key)?;
        self.inner
            .get(&key)
            .map_err(|_| PyKeyError::new_err(key.into_inner()))
    }

    fn __contains__(&self, key: f64) -> bool {
        NotNan::new(key)
            .map(|key| self.inner.contains_key(&key))
            .unwrap_or(false)
    }

    fn __len__(&self) -> PyResult<usize> {
        usize::try_from(self.inner.size())
            .map_err(|_| PyOverflowError::new_err("counter size does not fit in a Py_ssize_t"))
    }

    fn __repr__(&self, py: Python<'_>) -> PyResult<String> {
        let mut body = Vec::with_capacity(self.inner.distinct_keys());
        for (key, count) in &self.inner {
            let key: String = PyFloat::new_bound(py, key.into_inner())
                .repr()?
                .extract()?;
            body.push(format!("{}: {}", key, count));
        }
        Ok(format!("SortedCounter({{{}}})", body.join(", ")))
    }

    fn __copy__(&self) -> Self {
        self.clone()
    }

    fn __deepcopy__(&self, _memo: &Bound<'_, PyAny>) -> Self {
        self.clone()
    }
}

/// Sorted counter of floats, backed by a Rust BTreeMap.
#[pymodule]
fn sortedcounter(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PySortedCounter>()?;
    Ok(())
}
