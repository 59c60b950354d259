//! Protocol lines scheduled against simulation ticks.
//!
//! A script file is `{"steps": [{"tick": N, "command": "..."}]}`. Every line is tokenized and
//! its verb resolved when the file is loaded, so a typo stops the bridge before the channel
//! opens instead of surfacing as an error reply mid-run.

use crate::commands::{tokenize, Verb};
use anyhow::{Context, Result};
use hexbridge_core::SimTick;
use serde::Deserialize;
use std::{collections::VecDeque, fs, path::Path};
use thiserror::Error;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptFile {
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStep {
    tick: u64,
    command: String,
}

/// Why a script was refused. Steps are numbered from 1 in file order.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("command script contains no steps")]
    Empty,
    #[error("step {step} (tick {tick}): empty command")]
    Blank { step: usize, tick: u64 },
    #[error("step {step} (tick {tick}): unknown command `{verb}` in `{line}`")]
    UnknownVerb {
        step: usize,
        tick: u64,
        verb: String,
        line: String,
    },
    #[error("step {step} (tick {tick}): scheduled before tick {previous} of the step above")]
    OutOfOrder { step: usize, tick: u64, previous: u64 },
}

#[derive(Debug, Clone)]
struct ScheduledLine {
    tick: SimTick,
    verb: Verb,
    line: String,
}

/// Replays validated protocol lines once their tick comes up, in file order.
#[derive(Debug)]
pub struct CommandScriptPlayer {
    pending: VecDeque<ScheduledLine>,
}

impl CommandScriptPlayer {
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read command script {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("invalid command script {}", path.display()))
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let file: ScriptFile =
            serde_json::from_str(contents).context("command script is not valid JSON")?;
        Ok(Self::schedule(file.steps)?)
    }

    fn schedule(steps: Vec<RawStep>) -> Result<Self, ScriptError> {
        if steps.is_empty() {
            return Err(ScriptError::Empty);
        }
        let mut pending: VecDeque<ScheduledLine> = VecDeque::with_capacity(steps.len());
        for (index, raw) in steps.into_iter().enumerate() {
            let (step, tick) = (index + 1, raw.tick);
            if let Some(previous) = pending.back().map(|last| last.tick.0).filter(|p| *p > tick) {
                return Err(ScriptError::OutOfOrder { step, tick, previous });
            }
            let line = raw.command.trim().to_string();
            let tokens = tokenize(&line);
            let first = tokens.first().ok_or(ScriptError::Blank { step, tick })?;
            let verb = Verb::parse(first).ok_or_else(|| ScriptError::UnknownVerb {
                step,
                tick,
                verb: first.clone(),
                line: line.clone(),
            })?;
            pending.push_back(ScheduledLine {
                tick: SimTick(tick),
                verb,
                line,
            });
        }
        Ok(Self { pending })
    }

    /// Pop every line due at or before `tick`.
    pub fn drain_ready_commands(&mut self, tick: SimTick) -> Vec<String> {
        let due = self
            .pending
            .iter()
            .take_while(|scheduled| scheduled.tick <= tick)
            .count();
        self.pending
            .drain(..due)
            .map(|scheduled| {
                tracing::trace!(tick = scheduled.tick.0, verb = scheduled.verb.as_str(), "script line due");
                scheduled.line
            })
            .collect()
    }

    pub fn is_finished(&self) -> bool {
        self.pending.is_empty()
    }
}
