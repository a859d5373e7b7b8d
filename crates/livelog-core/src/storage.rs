//! Storage layer: TSV scalar histories, pretty JSON documents, file system management.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;
use crate::models::MetricValue;

// ─── Directory helpers ────────────────────────────────────────────────────────

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

pub fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

/// Remove a directory tree, treating an absent target as success.
pub fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Remove a single file, treating an absent target as success.
pub fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Append `suffix` to the final component of `path` (`run1` + `.json` → `run1.json`).
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

/// Join a `/`-separated metric name onto a directory.
///
/// Empty, `.` and `..` segments are dropped so the result stays under `dir`.
pub fn join_name(dir: &Path, name: &str) -> PathBuf {
    name.split('/')
        .filter(|part| !matches!(*part, "" | "." | ".."))
        .fold(dir.to_path_buf(), |acc, part| acc.join(part))
}

// ─── JSON I/O ────────────────────────────────────────────────────────────────

/// Write `data` as JSON indented with four spaces, replacing any prior content.
pub fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    data.serialize(&mut ser)?;
    buf.push(b'\n');
    ensure_parent(path)?;
    fs::write(path, buf)?;
    Ok(())
}

pub fn load_json(path: &Path) -> Result<serde_json::Value> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

// ─── TSV scalar history ──────────────────────────────────────────────────────

/// One line of a scalar history file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalarRow {
    /// Unix milliseconds.
    pub timestamp: i64,
    /// Empty in the file when the value was logged before any step was set.
    pub step: Option<u64>,
    pub value: MetricValue,
}

pub fn read_scalar_rows(path: &Path) -> Result<Vec<ScalarRow>> {
    if !path.exists() {
        return Ok(vec![]);
    }
    let content = fs::read_to_string(path)?;
    let rows = content
        .lines()
        .skip(1)
        .filter_map(parse_scalar_row)
        .collect();
    Ok(rows)
}

fn parse_scalar_row(line: &str) -> Option<ScalarRow> {
    let mut cols = line.split('\t');
    let timestamp = cols.next()?.trim().parse().ok()?;
    let step = match cols.next()?.trim() {
        "" => None,
        s => Some(s.parse().ok()?),
    };
    let raw = cols.next()?.trim();
    let value = match raw.parse::<i64>() {
        Ok(i) => MetricValue::Int(i),
        Err(_) => MetricValue::Float(raw.parse().ok()?),
    };
    Some(ScalarRow {
        timestamp,
        step,
        value,
    })
}

/// Rewrite a scalar history file from scratch.
pub fn write_scalar_rows(path: &Path, name: &str, rows: &[ScalarRow]) -> Result<()> {
    let mut out = format!("timestamp\tstep\t{}\n", name);
    for row in rows {
        let step = row.step.map(|s| s.to_string()).unwrap_or_default();
        out += &format!("{}\t{}\t{}\n", row.timestamp, step, row.value);
    }
    ensure_parent(path)?;
    fs::write(path, out)?;
    Ok(())
}

/// List every scalar history under `scalars_dir` as `(metric name, file)`,
/// sorted by name. Nested directories map back to `/`-separated names.
pub fn list_scalar_files(scalars_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = vec![];
    if scalars_dir.is_dir() {
        collect_tsv(scalars_dir, scalars_dir, &mut files)?;
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

fn collect_tsv(root: &Path, dir: &Path, out: &mut Vec<(String, PathBuf)>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_tsv(root, &path, out)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("tsv") {
            let rel = path.strip_prefix(root).unwrap_or(&path).with_extension("");
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            out.push((name, path));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn suffix_is_appended_to_last_component() {
        assert_eq!(with_suffix(Path::new("out/run1"), ".json"), PathBuf::from("out/run1.json"));
        assert_eq!(
            with_suffix(Path::new("dvclive"), "_dvc_plots/index.html"),
            PathBuf::from("dvclive_dvc_plots/index.html")
        );
    }

    #[test]
    fn names_cannot_escape_their_directory() {
        let dir = Path::new("run/scalars");
        assert_eq!(join_name(dir, "../escape.tsv"), PathBuf::from("run/scalars/escape.tsv"));
        assert_eq!(join_name(dir, "a/./../b.tsv"), PathBuf::from("run/scalars/a/b.tsv"));
    }

    #[test]
    fn removing_absent_targets_is_ok() {
        let tmp = TempDir::new().unwrap();
        remove_dir_if_exists(&tmp.path().join("nope")).unwrap();
        remove_file_if_exists(&tmp.path().join("nope.json")).unwrap();
    }

    #[test]
    fn scalar_rows_survive_a_rewrite() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scalars").join("loss.tsv");
        let rows = vec![
            ScalarRow { timestamp: 10, step: None, value: MetricValue::Float(1.5) },
            ScalarRow { timestamp: 11, step: Some(3), value: MetricValue::Int(7) },
        ];
        write_scalar_rows(&path, "loss", &rows).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("timestamp\tstep\tloss\n"));
        assert!(content.contains("10\t\t1.5\n"));
        assert_eq!(read_scalar_rows(&path).unwrap(), rows);
    }

    #[test]
    fn nested_scalar_files_are_listed_with_slash_names() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("scalars");
        write_scalar_rows(&join_name(&dir, "train/loss.tsv"), "train/loss", &[]).unwrap();
        write_scalar_rows(&dir.join("acc.tsv"), "acc", &[]).unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let names: Vec<String> = list_scalar_files(&dir)
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, vec!["acc", "train/loss"]);
    }

    #[test]
    fn json_is_indented_with_four_spaces() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("s.json");
        save_json(&path, &serde_json::json!({"step": 1})).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\n    \"step\": 1\n}\n");
    }
}
