//! Line-oriented seed format.
//!
//! One road segment per line: `roadID;segmentID;lat1;lon1;lat2;lon2[;...]`.
//! Blank lines are skipped, so blank input yields no records.

use std::io::BufRead;

use crate::error::NetworkError;
use crate::geometry::Point;

/// One parsed seed line.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedRecord {
    /// Owning road identity.
    pub road_id: String,
    /// Segment identity.
    pub segment_id: String,
    /// Polyline, at least two points.
    pub points: Vec<Point>,
}

/// Parse every record in `reader`.
///
/// # Errors
///
/// Returns [`NetworkError::Seed`] naming the first malformed line, or
/// [`NetworkError::Io`] if reading fails.
pub fn parse_seed(reader: impl BufRead) -> Result<Vec<SeedRecord>, NetworkError> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        records.push(parse_line(line, index.saturating_add(1))?);
    }
    Ok(records)
}

/// Parse a single seed line; `line_no` is only used for error reporting.
///
/// # Errors
///
/// Returns [`NetworkError::Seed`] when the line is malformed.
pub fn parse_line(line: &str, line_no: usize) -> Result<SeedRecord, NetworkError> {
    let fail = |reason: String| NetworkError::Seed { line: line_no, reason };

    let mut fields = line.split(';').map(str::trim);
    let road_id = fields
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| fail("missing road id".to_owned()))?;
    let segment_id = fields
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| fail("missing segment id".to_owned()))?;

    let coords = fields
        .map(|raw| {
            raw.parse::<f64>()
                .map_err(|e| fail(format!("invalid coordinate {raw:?}: {e}")))
        })
        .collect::<Result<Vec<f64>, _>>()?;

    if coords.len() < 4 || coords.len() % 2 != 0 {
        return Err(fail(format!(
            "expected an even number of at least 4 coordinates, got {}",
            coords.len()
        )));
    }

    let points: Vec<Point> = coords
        .chunks_exact(2)
        .filter_map(|pair| match pair {
            &[lat, lon] => Some(Point::new(lat, lon)),
            _ => None,
        })
        .collect();

    if let Some(bad) = points.iter().find(|p| !p.is_valid()) {
        return Err(fail(format!(
            "coordinate ({}, {}) is out of range",
            bad.lat, bad.lon
        )));
    }

    Ok(SeedRecord {
        road_id: road_id.to_owned(),
        segment_id: segment_id.to_owned(),
        points,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const SAMPLE: &str = "21277:153930;21277:153930;62.389109;17.310863;62.389084;17.310852;62.389073;17.310854;62.389059;17.310878;62.389057;17.310897;62.389052;17.310940\n";

    #[test]
    fn parses_sample_line() {
        let records = parse_seed(SAMPLE.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.road_id, "21277:153930");
        assert_eq!(r.segment_id, "21277:153930");
        assert_eq!(r.points.len(), 6);
        assert_eq!(r.points[0], Point::new(62.389109, 17.310863));
        assert_eq!(r.points[5], Point::new(62.389052, 17.310940));
    }

    #[test]
    fn blank_input_is_empty() {
        assert!(parse_seed("".as_bytes()).unwrap().is_empty());
        assert!(parse_seed("\n\r\n  \n".as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn crlf_lines_parse() {
        let records = parse_seed("r;s;1.0;2.0;3.0;4.0\r\nr;t;3.0;4.0;5.0;6.0\r\n".as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].points[1], Point::new(5.0, 6.0));
    }

    #[test]
    fn rejects_odd_or_short_coordinate_lists() {
        for bad in ["r;s;1.0;2.0", "r;s;1.0;2.0;3.0", "r;s", "r;s;1;2;3;4;5"] {
            let err = parse_seed(bad.as_bytes()).unwrap_err();
            assert!(matches!(err, NetworkError::Seed { line: 1, .. }), "{bad}: {err}");
        }
    }

    #[test]
    fn rejects_garbage_and_out_of_range() {
        let err = parse_seed("ok;ok;1;2;3;4\nr;s;1.0;x;3.0;4.0".as_bytes()).unwrap_err();
        assert!(matches!(err, NetworkError::Seed { line: 2, .. }));

        let err = parse_seed("r;s;95.0;2.0;3.0;4.0".as_bytes()).unwrap_err();
        assert!(matches!(err, NetworkError::Seed { line: 1, .. }));

        let err = parse_seed(";s;1;2;3;4".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("road id"));
    }
}
