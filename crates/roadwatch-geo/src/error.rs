//! Error types for the `roadwatch-geo` crate.
//!
//! Seed and construction failures are fatal at startup: a half-built index
//! must never serve queries. Lookup misses are ordinary errors the caller
//! decides how to treat.

/// Errors raised while building or querying the road network.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// A seed line could not be parsed.
    #[error("seed line {line}: {reason}")]
    Seed {
        /// 1-based line number in the seed source.
        line: usize,
        /// What was wrong with the line.
        reason: String,
    },

    /// Reading the seed source failed.
    #[error("failed to read seed source: {0}")]
    Io(#[from] std::io::Error),

    /// A segment polyline had fewer than two points.
    #[error("segment {0} has fewer than two points")]
    TooFewPoints(String),

    /// A coordinate was non-finite or outside WGS84 range.
    #[error("segment {segment}: invalid coordinate ({lat}, {lon})")]
    InvalidCoordinate {
        /// The segment carrying the coordinate.
        segment: String,
        /// Offending latitude.
        lat: f64,
        /// Offending longitude.
        lon: f64,
    },

    /// Two seed records used the same segment identity.
    #[error("duplicate segment id: {0}")]
    DuplicateSegment(String),

    /// No segment with this identity is indexed.
    #[error("road segment not found: {0}")]
    SegmentNotFound(String),

    /// No road with this identity is indexed.
    #[error("road not found: {0}")]
    RoadNotFound(String),
}

impl NetworkError {
    /// Whether this is a lookup miss rather than a construction failure.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::SegmentNotFound(_) | Self::RoadNotFound(_))
    }
}
