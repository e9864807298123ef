use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Canonical schema
// ---------------------------------------------------------------------------

/// Positional column names every source is read with. The header row of a
/// source is discarded and replaced by these.
pub const COLUMNS: [&str; 9] = [
    "name",
    "latitude",
    "longitude",
    "depth",
    "depthincore",
    "age",
    "species",
    "d18O",
    "d13C",
];

// ---------------------------------------------------------------------------
// CoreRecord – one row of a core database
// ---------------------------------------------------------------------------

/// A single isotope measurement as loaded from a source.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreRecord {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Water depth of the core site (m).
    pub depth: f64,
    pub depth_in_core: f64,
    /// Age in ka BP.
    pub age: f64,
    pub species: String,
    pub d18o: Option<f64>,
    pub d13c: Option<f64>,
}

// ---------------------------------------------------------------------------
// StageInterval – a named age window
// ---------------------------------------------------------------------------

/// A Marine Isotope Stage with its inclusive age bounds (ka BP).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageInterval {
    pub label: String,
    pub min_age: f64,
    pub max_age: f64,
}

impl StageInterval {
    pub fn new(label: &str, min_age: f64, max_age: f64) -> Self {
        Self {
            label: label.to_string(),
            min_age,
            max_age,
        }
    }

    /// Both bounds are inclusive.
    pub fn contains(&self, age: f64) -> bool {
        age >= self.min_age && age <= self.max_age
    }
}

impl fmt::Display for StageInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}, {}] ka", self.label, self.min_age, self.max_age)
    }
}

// ---------------------------------------------------------------------------
// Intermediate row shapes
// ---------------------------------------------------------------------------

/// A record that fell inside a stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedRecord {
    pub stage: String,
    pub record: CoreRecord,
}

impl StagedRecord {
    /// Composite sort / group key.
    pub fn key(&self) -> (&str, &str) {
        (self.stage.as_str(), self.record.name.as_str())
    }
}

/// A staged record known to carry a d13C value. Columns that are never
/// aggregated (species, d18O) are not carried.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub stage: String,
    pub core: String,
    pub latitude: f64,
    pub longitude: f64,
    pub depth: f64,
    pub depth_in_core: f64,
    pub age: f64,
    pub d13c: f64,
}

// ---------------------------------------------------------------------------
// CoreMean / StageTable – the finalized output
// ---------------------------------------------------------------------------

/// Per-core means within one stage, rounded for presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreMean {
    pub stage: String,
    pub core: String,
    pub latitude: f64,
    pub longitude: f64,
    pub depth: f64,
    pub d13c: f64,
}

/// The finalized table keyed by (stage, core), sorted on both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageTable {
    rows: Vec<CoreMean>,
}

impl StageTable {
    /// Build from rows in any order; rows are sorted by (stage, core).
    pub fn from_rows(mut rows: Vec<CoreMean>) -> Self {
        rows.sort_by(|a, b| (&a.stage, &a.core).cmp(&(&b.stage, &b.core)));
        Self { rows }
    }

    pub fn rows(&self) -> &[CoreMean] {
        &self.rows
    }

    /// All rows for one stage. Unknown or empty stages yield an empty slice.
    pub fn stage(&self, label: &str) -> &[CoreMean] {
        let start = self.rows.partition_point(|r| r.stage.as_str() < label);
        let end = self.rows.partition_point(|r| r.stage.as_str() <= label);
        &self.rows[start..end]
    }

    /// Distinct stage labels present, in sort order.
    pub fn stages(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.rows.iter().map(|r| r.stage.as_str()).collect();
        labels.dedup();
        labels
    }

    pub fn get(&self, stage: &str, core: &str) -> Option<&CoreMean> {
        self.stage(stage).iter().find(|r| r.core == core)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
