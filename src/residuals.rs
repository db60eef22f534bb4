//! Loading of solver residual histories that have been preprocessed into one
//! text file per variable, and decimation down to the final residual per
//! iteration when a variable ran with non-orthogonal correctors.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::Float;

/// One residual history, named after the variable it tracks.
#[derive(Debug, Clone)]
pub struct ResidualSeries {
    pub name: String,
    pub values: Vec<Float>,
}

/// Read a whitespace-separated residual file: first column only, blank lines
/// and `#` comments skipped. Any malformed line is an error; a truncated
/// history should fail loudly rather than plot half a run.
pub fn load_series(path: &Path) -> Result<Vec<Float>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading residual file {}", path.display()))?;
    let mut values = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let first = line
            .split_whitespace()
            .next()
            .with_context(|| format!("{}:{}: empty record", path.display(), lineno + 1))?;
        let value: Float = first.parse().with_context(|| {
            format!("{}:{}: bad residual value {first:?}", path.display(), lineno + 1)
        })?;
        values.push(value);
    }
    Ok(values)
}

/// Keep only the last residual of each solver iteration: with `correctors`
/// non-orthogonal correctors every iteration logs `correctors + 1` values.
pub fn decimate(values: &[Float], correctors: usize) -> Vec<Float> {
    values.iter().copied().step_by(correctors + 1).collect()
}

/// Path of the residual file for one variable.
pub fn series_path(residuals_dir: &Path, var: &str) -> PathBuf {
    residuals_dir.join(format!("{var}.txt"))
}

/// Load a set of variables, decimating each by its corrector count.
pub fn load_set(
    residuals_dir: &Path,
    vars: &[(&str, usize)],
) -> Result<Vec<ResidualSeries>> {
    vars.iter()
        .map(|&(var, correctors)| {
            let raw = load_series(&series_path(residuals_dir, var))?;
            Ok(ResidualSeries {
                name: var.to_string(),
                values: decimate(&raw, correctors),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn decimation_keeps_every_nth_value() {
        let values: Vec<Float> = (0..10).map(|i| i as Float).collect();
        assert_eq!(decimate(&values, 0), values);
        assert_eq!(decimate(&values, 1), vec![0.0, 2.0, 4.0, 6.0, 8.0]);
        assert_eq!(decimate(&values, 2), vec![0.0, 3.0, 6.0, 9.0]);
        assert!(decimate(&[], 1).is_empty());
    }

    #[test]
    fn loads_first_column_and_skips_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ux.txt");
        fs::write(&path, "# initial residuals\n1e-2 4\n\n5e-3 7\n2.5e-3 9\n").unwrap();
        let values = load_series(&path).unwrap();
        assert_eq!(values, vec![1e-2, 5e-3, 2.5e-3]);
    }

    #[test]
    fn malformed_line_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.txt");
        fs::write(&path, "1e-2\nnot-a-number\n").unwrap();
        let err = load_series(&path).unwrap_err();
        assert!(err.to_string().contains("p.txt:2"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_series(&dir.path().join("k.txt")).is_err());
    }

    #[test]
    fn set_loading_applies_per_variable_correctors() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ux.txt"), "1\n2\n3\n4\n").unwrap();
        fs::write(dir.path().join("p.txt"), "1\n2\n3\n4\n").unwrap();
        let set = load_set(dir.path(), &[("ux", 0), ("p", 1)]).unwrap();
        assert_eq!(set[0].values.len(), 4);
        assert_eq!(set[1].values, vec![1.0, 3.0]);
    }
}
