#![warn(missing_docs)]
//! Shared test fixtures: scenario builders, protocol response parsing and golden snapshots.

mod fixtures;
mod snapshot;

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub use fixtures::*;
pub use snapshot::*;

/// A parsed `[RESULT]` envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// `true` for `status=ok`.
    pub ok: bool,
    /// Value of the `command=` line.
    pub command: String,
    /// Everything after the blank separator line.
    pub body: String,
}

impl Envelope {
    /// `key=value` lines of the body.
    pub fn fields(&self) -> BTreeMap<String, String> {
        body_fields(&self.body)
    }

    /// Value of a body field, if present.
    pub fn field(&self, key: &str) -> Option<String> {
        self.fields().remove(key)
    }
}

/// Parse one response envelope. Trailing `[END]` markers are ignored.
pub fn parse_envelope(text: &str) -> Result<Envelope> {
    let mut lines = text.lines();
    let header = lines.next().context("empty response")?;
    anyhow::ensure!(header == "[RESULT]", "unexpected header {header:?}");
    let status = lines
        .next()
        .and_then(|line| line.strip_prefix("status="))
        .context("missing status line")?;
    let command = lines
        .next()
        .and_then(|line| line.strip_prefix("command="))
        .context("missing command line")?;
    let separator = lines.next().unwrap_or_default();
    anyhow::ensure!(separator.is_empty(), "missing blank separator line");

    let body: Vec<&str> = lines.take_while(|line| *line != "[END]").collect();
    Ok(Envelope {
        ok: status == "ok",
        command: command.to_string(),
        body: body.join("\n"),
    })
}

/// Collect the `key=value` lines of a response body.
///
/// Section headers (`[MODE]`) and entry rows (`[12] name=...`) are skipped; when a key repeats
/// the first occurrence wins.
pub fn body_fields(body: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for line in body.lines() {
        if line.starts_with('[') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            fields
                .entry(key.to_string())
                .or_insert_with(|| value.to_string());
        }
    }
    fields
}

/// Lines belonging to `header` (e.g. `"[NPCS]"`), up to the next section header.
pub fn section_lines<'a>(body: &'a str, header: &str) -> Vec<&'a str> {
    body.lines()
        .skip_while(|line| *line != header)
        .skip(1)
        .take_while(|line| !is_section_header(line))
        .collect()
}

/// Object ids of the `[id] ...` entry rows in `lines`, in order.
pub fn entry_ids(lines: &[&str]) -> Vec<i32> {
    lines
        .iter()
        .filter_map(|line| {
            let rest = line.strip_prefix('[')?;
            let (id, _) = rest.split_once(']')?;
            id.parse().ok()
        })
        .collect()
}

fn is_section_header(line: &str) -> bool {
    line.len() > 2
        && line.starts_with('[')
        && line.ends_with(']')
        && line[1..line.len() - 1]
            .chars()
            .all(|ch| ch.is_ascii_uppercase() || ch == '_')
}

/// Read a newline-delimited JSON log.
pub fn read_jsonl<P: AsRef<Path>>(path: P) -> Result<Vec<Value>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).context("invalid JSONL record"))
        .collect()
}

/// Fresh, empty directory under the system temp dir.
pub fn unique_temp_dir(prefix: &str) -> Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!(
        "{prefix}-{}-{}",
        std::process::id(),
        rand::random::<u64>()
    ));
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = "[RESULT]\nstatus=ok\ncommand=state\n\n[MODE]\nmode=exploration\n\
        game_state=1\n[SURROUNDINGS]\nrange=15\ncount=2\n[4] name=Rat distance=1\n\
        [9] name=Door distance=3\n[DISPLAY_LOG]\nlines=0\n[END]\n";

    #[test]
    fn envelope_parses_status_command_and_body() {
        let envelope = parse_envelope(RESPONSE).expect("envelope parses");
        assert!(envelope.ok);
        assert_eq!(envelope.command, "state");
        assert!(envelope.body.starts_with("[MODE]"));
        assert!(!envelope.body.contains("[END]"));
        assert_eq!(envelope.field("mode").as_deref(), Some("exploration"));
        assert_eq!(envelope.field("count").as_deref(), Some("2"));
    }

    #[test]
    fn sections_stop_at_next_header() {
        let envelope = parse_envelope(RESPONSE).expect("envelope parses");
        let lines = section_lines(&envelope.body, "[SURROUNDINGS]");
        assert_eq!(lines.len(), 4);
        assert_eq!(entry_ids(&lines), vec![4, 9]);
        assert!(section_lines(&envelope.body, "[COMBAT]").is_empty());
    }

    #[test]
    fn malformed_envelope_is_rejected() {
        assert!(parse_envelope("status=ok\n").is_err());
        assert!(parse_envelope("[RESULT]\nstatus=ok\ncommand=x\nbody\n").is_err());
    }
}
