use std::path::Path;

use super::filter::{assign_stages, filter_longitude, LongitudeBand};
use super::loader::{load_sources, LoadError};
use super::model::{CoreMean, CoreRecord, Measurement, StageInterval, StageTable, StagedRecord};

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The cleaning / binning / aggregation chain. Every step is a plain function
/// from one table state to the next; `Pipeline` only holds their parameters.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub band: LongitudeBand,
    pub stages: Vec<StageInterval>,
    /// Groups with fewer rows than this are discarded.
    pub min_group_size: usize,
}

impl Pipeline {
    pub fn new(band: LongitudeBand, stages: Vec<StageInterval>, min_group_size: usize) -> Self {
        Self {
            band,
            stages,
            min_group_size,
        }
    }

    /// Load and merge `sources`, then run every step.
    pub fn run<P: AsRef<Path>>(&self, sources: &[P]) -> Result<StageTable, LoadError> {
        let records = load_sources(sources)?;
        log::info!("Loaded {} records from {} sources", records.len(), sources.len());
        Ok(self.process(records))
    }

    /// Run every step after loading.
    pub fn process(&self, records: Vec<CoreRecord>) -> StageTable {
        let records = filter_longitude(records, self.band);
        log::debug!("{} records inside longitude band", records.len());

        let staged = assign_stages(records, &self.stages);
        log::debug!("{} records inside a stage", staged.len());

        let staged = sort_by_key(staged);

        let measurements = drop_missing_d13c(staged);
        log::debug!("{} records with d13C", measurements.len());

        let groups = filter_min_count(group_by_key(measurements), self.min_group_size);
        log::debug!("{} (stage, core) groups kept", groups.len());

        let table = StageTable::from_rows(
            groups
                .iter()
                .map(aggregate)
                .map(project_and_round)
                .collect(),
        );
        for stage in &self.stages {
            log::info!("{}: {} cores", stage.label, table.stage(&stage.label).len());
        }
        table
    }
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Stable sort on (stage, core name).
pub fn sort_by_key(mut staged: Vec<StagedRecord>) -> Vec<StagedRecord> {
    staged.sort_by(|a, b| a.key().cmp(&b.key()));
    staged
}

/// Drop rows without a d13C value, narrowing to [`Measurement`].
pub fn drop_missing_d13c(staged: Vec<StagedRecord>) -> Vec<Measurement> {
    staged
        .into_iter()
        .filter_map(|StagedRecord { stage, record }| {
            Some(Measurement {
                d13c: record.d13c?,
                stage,
                core: record.name,
                latitude: record.latitude,
                longitude: record.longitude,
                depth: record.depth,
                depth_in_core: record.depth_in_core,
                age: record.age,
            })
        })
        .collect()
}

/// All measurements sharing one (stage, core) key.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub stage: String,
    pub core: String,
    pub rows: Vec<Measurement>,
}

/// Collect runs of equal keys. Input must already be sorted by key.
pub fn group_by_key(measurements: Vec<Measurement>) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    for m in measurements {
        match groups.last_mut() {
            Some(g) if g.stage == m.stage && g.core == m.core => g.rows.push(m),
            _ => groups.push(Group {
                stage: m.stage.clone(),
                core: m.core.clone(),
                rows: vec![m],
            }),
        }
    }
    groups
}

/// Keep groups with at least `min_size` rows.
pub fn filter_min_count(groups: Vec<Group>, min_size: usize) -> Vec<Group> {
    groups
        .into_iter()
        .filter(|g| {
            let keep = g.rows.len() >= min_size;
            if !keep {
                log::debug!("{}/{}: only {} records, dropped", g.stage, g.core, g.rows.len());
            }
            keep
        })
        .collect()
}

/// Unrounded per-group means of every numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMean {
    pub stage: String,
    pub core: String,
    pub latitude: f64,
    pub longitude: f64,
    pub depth: f64,
    pub depth_in_core: f64,
    pub age: f64,
    pub d13c: f64,
}

pub fn aggregate(group: &Group) -> GroupMean {
    let mean_of = |f: fn(&Measurement) -> f64| nan_mean(group.rows.iter().map(f));
    GroupMean {
        stage: group.stage.clone(),
        core: group.core.clone(),
        latitude: mean_of(|m| m.latitude),
        longitude: mean_of(|m| m.longitude),
        depth: mean_of(|m| m.depth),
        depth_in_core: mean_of(|m| m.depth_in_core),
        age: mean_of(|m| m.age),
        d13c: mean_of(|m| m.d13c),
    }
}

/// Drop depth-in-core and age, then round for presentation.
pub fn project_and_round(mean: GroupMean) -> CoreMean {
    CoreMean {
        stage: mean.stage,
        core: mean.core,
        latitude: round_to(mean.latitude, 2),
        longitude: round_to(mean.longitude, 2),
        depth: round_to(mean.depth, 0),
        d13c: round_to(mean.d13c, 2),
    }
}

// ---------------------------------------------------------------------------
// Numeric helpers
// ---------------------------------------------------------------------------

/// Arithmetic mean ignoring NaN entries; NaN when nothing is left.
pub fn nan_mean<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (sum, n) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, longitude: f64, age: f64, d13c: Option<f64>) -> CoreRecord {
        CoreRecord {
            name: name.into(),
            latitude: 10.0,
            longitude,
            depth: 3000.0,
            depth_in_core: 1.0,
            age,
            species: "C. wuellerstorfi".into(),
            d18o: Some(3.0),
            d13c,
        }
    }

    fn default_pipeline() -> Pipeline {
        Pipeline::new(
            LongitudeBand::ATLANTIC,
            vec![
                StageInterval::new("MIS1", 0.0, 5.0),
                StageInterval::new("MIS2", 19.0, 24.0),
                StageInterval::new("MIS4", 61.0, 66.0),
                StageInterval::new("MIS5d", 108.0, 114.0),
                StageInterval::new("MIS5e", 120.0, 130.0),
                StageInterval::new("MIS6", 137.0, 142.0),
            ],
            3,
        )
    }

    #[test]
    fn merged_sources_average_into_one_row() {
        let first = vec![
            record("X", 0.0, 1.0, Some(0.1)),
            record("X", 0.0, 2.0, Some(0.2)),
            record("X", 0.0, 3.0, Some(0.3)),
        ];
        let second = vec![
            record("X", 0.0, 1.0, Some(0.15)),
            record("X", 0.0, 2.0, Some(0.25)),
            record("X", 0.0, 3.0, Some(0.35)),
        ];
        let merged: Vec<CoreRecord> = first.into_iter().chain(second).collect();

        let table = default_pipeline().process(merged);
        assert_eq!(table.len(), 1);
        let row = table.get("MIS1", "X").unwrap();
        // 0.225 rounds half away from zero.
        assert_eq!(row.d13c, 0.23);
        assert_eq!(row.latitude, 10.0);
        assert_eq!(row.depth, 3000.0);
    }

    #[test]
    fn cores_with_two_records_are_excluded() {
        let table = default_pipeline().process(vec![
            record("Y", 0.0, 20.0, Some(0.4)),
            record("Y", 0.0, 21.0, Some(0.5)),
            record("Z", 0.0, 20.0, Some(0.4)),
            record("Z", 0.0, 21.0, Some(0.5)),
            record("Z", 0.0, 22.0, Some(0.6)),
        ]);
        assert!(table.get("MIS2", "Y").is_none());
        assert_eq!(table.get("MIS2", "Z").map(|r| r.d13c), Some(0.5));
    }

    #[test]
    fn out_of_band_longitude_is_dropped() {
        let table = default_pipeline().process(vec![
            record("W", 20.0, 1.0, Some(0.4)),
            record("W", 20.0, 2.0, Some(0.4)),
            record("W", 20.0, 3.0, Some(0.4)),
        ]);
        assert!(table.is_empty());
    }

    #[test]
    fn missing_d13c_counts_toward_nothing() {
        // Three rows in MIS1, one with an unparseable d13C: the group falls to two.
        let table = default_pipeline().process(vec![
            record("V", 0.0, 1.0, Some(0.4)),
            record("V", 0.0, 2.0, None),
            record("V", 0.0, 3.0, Some(0.6)),
        ]);
        assert!(table.is_empty());

        let staged = sort_by_key(assign_stages(
            vec![record("V", 0.0, 2.0, None)],
            &default_pipeline().stages,
        ));
        assert_eq!(staged.len(), 1);
        assert!(drop_missing_d13c(staged).is_empty());
    }

    #[test]
    fn ages_between_stages_never_appear() {
        let table = default_pipeline().process(vec![
            record("U", 0.0, 10.0, Some(0.1)),
            record("U", 0.0, 11.0, Some(0.1)),
            record("U", 0.0, 12.0, Some(0.1)),
            record("U", 0.0, 115.0, Some(0.1)),
        ]);
        assert!(table.is_empty());
    }

    #[test]
    fn output_is_sorted_by_stage_then_core() {
        let mut records = Vec::new();
        for (core, age) in [("B", 121.0), ("A", 121.0), ("C", 1.0), ("A", 62.0)] {
            for _ in 0..3 {
                records.push(record(core, -10.0, age, Some(0.2)));
            }
        }
        let table = default_pipeline().process(records);
        let keys: Vec<(&str, &str)> = table
            .rows()
            .iter()
            .map(|r| (r.stage.as_str(), r.core.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![("MIS1", "C"), ("MIS4", "A"), ("MIS5e", "A"), ("MIS5e", "B")]
        );
    }

    #[test]
    fn each_output_group_has_at_least_three_sources() {
        let mut records = Vec::new();
        for (i, core) in ["P", "Q", "R", "S"].iter().enumerate() {
            for k in 0..=i {
                records.push(record(core, 0.0, 138.0, Some(k as f64 * 0.1)));
            }
        }
        let measurements = drop_missing_d13c(sort_by_key(assign_stages(
            records.clone(),
            &default_pipeline().stages,
        )));
        let table = default_pipeline().process(records);
        assert_eq!(table.len(), 2);
        for row in table.rows() {
            let n = measurements
                .iter()
                .filter(|m| m.stage == row.stage && m.core == row.core)
                .count();
            assert!(n >= 3);
        }
    }

    #[test]
    fn aggregate_then_project_drops_extra_columns() {
        let group = Group {
            stage: "MIS6".into(),
            core: "T".into(),
            rows: (0..3)
                .map(|i| Measurement {
                    stage: "MIS6".into(),
                    core: "T".into(),
                    latitude: 10.123 + i as f64,
                    longitude: -20.456,
                    depth: 3500.4 + i as f64,
                    depth_in_core: f64::NAN,
                    age: 140.0,
                    d13c: 0.3 + 0.1 * i as f64,
                })
                .collect(),
        };
        let mean = aggregate(&group);
        assert!(mean.depth_in_core.is_nan());
        assert_eq!(mean.age, 140.0);

        let row = project_and_round(mean);
        assert_eq!(row.latitude, 11.12);
        assert_eq!(row.longitude, -20.46);
        assert_eq!(row.depth, 3501.0);
        assert_eq!(row.d13c, 0.4);
    }

    #[test]
    fn nan_mean_skips_missing_values() {
        assert_eq!(nan_mean([1.0, f64::NAN, 3.0]), 2.0);
        assert!(nan_mean([f64::NAN]).is_nan());
        assert!(nan_mean(Vec::<f64>::new()).is_nan());
    }

    #[test]
    fn rounding_is_idempotent() {
        for v in [0.225, -1.005, 12.3456, 3499.5, -0.004, 0.0] {
            for d in [0, 2] {
                let once = round_to(v, d);
                assert_eq!(round_to(once, d), once);
            }
        }
        assert_eq!(round_to(3499.5, 0), 3500.0);
        assert_eq!(round_to(-2.5, 0), -3.0);
    }
}
