//! Parsed metric samples.

use std::collections::BTreeMap;
use std::fmt;

/// Identity of one metric reading.
///
/// For unlabeled samples this is the bare metric name. For labeled samples it
/// is the whole exposition line, so the label set is reproduced byte for byte
/// when the snapshot is rendered again.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SampleKey(String);

impl SampleKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this key carries a full labeled line.
    pub fn is_labeled(&self) -> bool {
        self.0.contains('{') && self.0.contains('}')
    }

    /// The metric name, without any label set or value.
    pub fn metric_name(&self) -> &str {
        match self.0.find('{') {
            Some(idx) if self.is_labeled() => self.0[..idx].trim(),
            _ => &self.0,
        }
    }
}

impl fmt::Display for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SampleKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Value of one reading: a number when the token parses as one, otherwise the
/// raw token.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    Number(f64),
    Text(String),
}

impl SampleValue {
    /// Parse a value token; a numeric parse always wins over text.
    pub fn parse(token: &str) -> Self {
        match token.parse::<f64>() {
            Ok(v) => SampleValue::Number(v),
            Err(_) => SampleValue::Text(token.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SampleValue::Number(v) => Some(*v),
            SampleValue::Text(_) => None,
        }
    }
}

/// The full set of samples from one successful scrape.
///
/// An empty snapshot means the last refresh failed or returned nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    samples: BTreeMap<SampleKey, SampleValue>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Insert a sample, replacing any earlier value with the same key.
    pub fn insert(&mut self, key: SampleKey, value: SampleValue) {
        self.samples.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&SampleValue> {
        self.samples.get(&SampleKey::new(key))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Iterate samples in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&SampleKey, &SampleValue)> {
        self.samples.iter()
    }

    /// Keep only the samples for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&SampleKey) -> bool) {
        self.samples.retain(|k, _| keep(k));
    }
}

impl FromIterator<(SampleKey, SampleValue)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (SampleKey, SampleValue)>>(iter: I) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}
