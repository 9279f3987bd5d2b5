use thiserror::Error;

// ---------------------------------------------------------------------------
// Error taxonomy for the data and analysis layers
// ---------------------------------------------------------------------------

/// Errors raised when looking up datasets or channels, when a file carries a
/// bad shape, or when an alignment option does not parse.
///
/// Missing input files are *not* represented here: the bulk loader logs and
/// skips them without propagating anything (see [`crate::data::loader`]).
#[derive(Debug, Error)]
pub enum DataError {
    /// The requested dataset key does not exist in the bundle.
    #[error("dataset '{key}' not found; available: {available:?}")]
    DatasetNotFound {
        key: String,
        available: Vec<String>,
    },

    /// The requested channel matched nothing, neither exactly nor as a
    /// substring.
    #[error("channel '{query}' not found in '{dataset}'; available: {available:?}")]
    ChannelNotFound {
        query: String,
        dataset: String,
        available: Vec<String>,
    },

    /// A channel's value count disagrees with its time axis.
    #[error("'{channel}' has {values} values but the time axis has {times} entries")]
    ShapeMismatch {
        channel: String,
        values: usize,
        times: usize,
    },

    /// An unrecognized alignment method name.
    #[error("unknown alignment method '{0}'; expected one of: inner, outer, asof")]
    UnknownMethod(String),

    /// An unrecognized resample aggregation name.
    #[error("unknown resample aggregation '{0}'; expected one of: mean, median, sum")]
    UnknownAggregation(String),
}
