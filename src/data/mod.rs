/// Data layer: core types, loading, and extraction.
///
/// Architecture:
/// ```text
///  .parquet / .csv (model)    .json (observations)
///        │                          │
///        ▼                          ▼
///   ┌──────────┐  time column  ┌──────────┐  recursive Time walk,
///   │  loader   │──────────────│  loader   │  datenum conversion
///   └──────────┘               └──────────┘
///        │                          │
///        └──────────┬───────────────┘
///                   ▼
///            ┌──────────┐
///            │  Bundle   │  BTreeMap<key, Dataset>
///            └──────────┘
///                   │  series(key, query)
///                   ▼
///            ┌──────────┐
///            │TimeSeries │  sorted (timestamp, value) channel
///            └──────────┘
/// ```

pub mod error;
pub mod loader;
pub mod matdate;
pub mod model;
