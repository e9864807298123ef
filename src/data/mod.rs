/// Data layer: core types, loading, filtering and aggregation.
///
/// Architecture:
/// ```text
///  core databases (.csv / .parquet)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse + merge → Vec<CoreRecord>
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  longitude band, stage assignment → Vec<StagedRecord>
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ pipeline  │  sort, drop missing d13C, min count, mean, round
///   └──────────┘
///        │
///        ▼
///     StageTable   (stage, core) → CoreMean
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod pipeline;
