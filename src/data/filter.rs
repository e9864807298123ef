use super::model::{CoreRecord, StageInterval, StagedRecord};

// ---------------------------------------------------------------------------
// Geographic filter
// ---------------------------------------------------------------------------

/// Inclusive longitude window, degrees east.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LongitudeBand {
    pub west: f64,
    pub east: f64,
}

impl LongitudeBand {
    /// Atlantic Ocean band.
    pub const ATLANTIC: LongitudeBand = LongitudeBand {
        west: -70.0,
        east: 15.0,
    };

    /// NaN longitudes never pass.
    pub fn contains(&self, longitude: f64) -> bool {
        longitude >= self.west && longitude <= self.east
    }
}

/// Keep records whose longitude lies inside `band`.
pub fn filter_longitude(records: Vec<CoreRecord>, band: LongitudeBand) -> Vec<CoreRecord> {
    records
        .into_iter()
        .filter(|r| band.contains(r.longitude))
        .collect()
}

// ---------------------------------------------------------------------------
// Stage assignment
// ---------------------------------------------------------------------------

/// Label of the interval containing `age`. Intervals are checked in order and
/// a later match replaces an earlier one, so overlaps resolve to the last
/// interval listed.
pub fn stage_for(age: f64, stages: &[StageInterval]) -> Option<&StageInterval> {
    stages.iter().rev().find(|s| s.contains(age))
}

/// Tag every record with its stage; records outside all stages are dropped.
pub fn assign_stages(records: Vec<CoreRecord>, stages: &[StageInterval]) -> Vec<StagedRecord> {
    records
        .into_iter()
        .filter_map(|record| {
            let stage = stage_for(record.age, stages)?;
            Some(StagedRecord {
                stage: stage.label.clone(),
                record,
            })
        })
        .collect()
}
