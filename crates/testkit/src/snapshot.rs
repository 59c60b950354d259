//! Golden-file snapshot helpers for protocol transcripts.
//!
//! Snapshots are plain text with `\n` line endings. A missing golden file is recorded on first
//! run; an existing one is compared byte for byte. To re-record every golden, rerun with
//! `HEXBRIDGE_UPDATE_SNAPSHOTS=1`.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Environment variable that enables snapshot updates.
pub const UPDATE_SNAPSHOTS_ENV: &str = "HEXBRIDGE_UPDATE_SNAPSHOTS";

/// Assert that `actual` matches the text snapshot stored at `path`.
pub fn assert_text_snapshot<P: AsRef<Path>>(path: P, actual: &str) -> Result<()> {
    let path = path.as_ref();
    let actual = normalize_newlines(actual);

    if should_update_snapshots() || !path.exists() {
        tracing::info!(path = %path.display(), "recording snapshot");
        write_snapshot(path, &actual)?;
        return Ok(());
    }

    let expected = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let expected = normalize_newlines(&expected);

    if expected != actual {
        let first_diff = expected
            .lines()
            .zip(actual.lines())
            .position(|(e, a)| e != a)
            .unwrap_or_else(|| expected.lines().count().min(actual.lines().count()));
        anyhow::bail!(
            "Snapshot mismatch at {} line {} (run with {}=1 to update)",
            path.display(),
            first_diff + 1,
            UPDATE_SNAPSHOTS_ENV
        );
    }

    Ok(())
}

/// Assert that `value` matches the canonical JSON snapshot stored at `path`.
pub fn assert_json_snapshot<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<()> {
    assert_text_snapshot(path, &canonical_json(value)?)
}

fn should_update_snapshots() -> bool {
    matches!(
        std::env::var(UPDATE_SNAPSHOTS_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE") | Ok("yes") | Ok("YES")
    )
}

fn normalize_newlines(text: &str) -> String {
    let mut out = text.replace("\r\n", "\n");
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn write_snapshot(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create snapshot directory {}", parent.display()))?;
    }
    fs::write(path, contents)
        .with_context(|| format!("Failed to write snapshot {}", path.display()))
}

fn canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let value = serde_json::to_value(value).context("Failed to serialize snapshot value")?;
    let value = canonicalize_value(value);
    serde_json::to_string_pretty(&value).context("Failed to format snapshot JSON")
}

fn canonicalize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut out = serde_json::Map::with_capacity(entries.len());
            for (k, v) in entries {
                out.insert(k, canonicalize_value(v));
            }
            Value::Object(out)
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize_value).collect()),
        other => other,
    }
}
