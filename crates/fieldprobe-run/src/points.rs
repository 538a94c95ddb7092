//! Probe point files.
//!
//! One point per line, whitespace separated. The first three columns are the
//! coordinates; further columns are ignored. Blank lines and lines starting
//! with `#` are skipped.

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PointsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: expected at least 3 columns, got {got}")]
    TooFewColumns { line: usize, got: usize },

    #[error("line {line}: invalid number {token:?}")]
    InvalidNumber { line: usize, token: String },

    #[error("no points found")]
    Empty,
}

pub fn load(path: &Path) -> Result<Vec<[f64; 3]>, PointsError> {
    let text = std::fs::read_to_string(path).map_err(|source| PointsError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse(&text)
}

pub fn parse(text: &str) -> Result<Vec<[f64; 3]>, PointsError> {
    let mut points = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let columns: Vec<&str> = line.split_whitespace().collect();
        if columns.len() < 3 {
            return Err(PointsError::TooFewColumns {
                line: line_no,
                got: columns.len(),
            });
        }

        let mut point = [0.0; 3];
        for (coord, token) in point.iter_mut().zip(&columns) {
            *coord = token.parse().map_err(|_| PointsError::InvalidNumber {
                line: line_no,
                token: token.to_string(),
            })?;
        }
        points.push(point);
    }

    if points.is_empty() {
        return Err(PointsError::Empty);
    }
    Ok(points)
}

/// Component-wise lower and upper corners of the points.
pub fn bounding_box(points: &[[f64; 3]]) -> ([f64; 3], [f64; 3]) {
    let mut lower = [f64::INFINITY; 3];
    let mut upper = [f64::NEG_INFINITY; 3];
    for point in points {
        for axis in 0..3 {
            lower[axis] = lower[axis].min(point[axis]);
            upper[axis] = upper[axis].max(point[axis]);
        }
    }
    (lower, upper)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_and_skips_comments() {
        let text = "# x y z s\n0.0 1.0 2.0 7.5\n\n  3 4 5\n";
        let points = parse(text).unwrap();
        assert_eq!(points, vec![[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]]);
    }

    #[test]
    fn rejects_short_rows() {
        match parse("0.0 1.0\n") {
            Err(PointsError::TooFewColumns { line: 1, got: 2 }) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_numbers() {
        match parse("0 0 0\n1 x 2\n") {
            Err(PointsError::InvalidNumber { line: 2, token }) => assert_eq!(token, "x"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(parse("# nothing\n"), Err(PointsError::Empty)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cl.dat");
        std::fs::write(&path, "1 2 3\n").unwrap();
        assert_eq!(load(&path).unwrap(), vec![[1.0, 2.0, 3.0]]);
    }

    #[test]
    fn bounding_box_spans_points() {
        let (lower, upper) = bounding_box(&[[0.0, 2.0, -1.0], [1.0, -2.0, 3.0]]);
        assert_eq!(lower, [0.0, -2.0, -1.0]);
        assert_eq!(upper, [1.0, 2.0, 3.0]);
    }
}
