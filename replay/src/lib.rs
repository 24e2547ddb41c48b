//! Replays a scripted search session against a [`ScopeModel`].
//!
//! A script is a JSON-lines file; each line is one [`Step`]. Every update
//! the model publishes is written back as one JSON line, so a session can
//! be inspected or diffed without a UI.

use anyhow::Context;
use anyhow::Result;
use anyhow::anyhow;
use scopes_engine::ChunkOutcome;
use scopes_engine::EngineConfig;
use scopes_engine::NavigationKind;
use scopes_engine::ScopeModel;
use scopes_engine::SearchChunk;
use scopes_engine::SearchTicket;
use scopes_results_model::IdentityKey;
use scopes_results_model::ResultRecord;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use std::io::BufRead;
use std::io::Write;
use std::time::Duration;
use tracing::debug;

/// One line of a replay script.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Search {
        #[serde(default)]
        query: String,
        #[serde(default)]
        navigation_id: String,
    },
    Chunk {
        chunk: SearchChunk,
        /// Time since the search started
        #[serde(default)]
        elapsed_ms: u64,
    },
    Flush,
    ClearTimeout,
    BindNavigation {
        navigation_id: String,
    },
    BindAltNavigation {
        navigation_id: String,
    },
    Navigate {
        #[serde(default = "default_kind")]
        kind: NavigationKind,
        navigation_id: String,
    },
    /// Replace the shown result `old` with `new`.
    UpdateResult {
        old: ResultRecord,
        new: ResultRecord,
    },
    Invalidate,
}

fn default_kind() -> NavigationKind {
    NavigationKind::Departments
}

fn no_search() -> anyhow::Error {
    anyhow!("no search has been started")
}

/// Drives a [`ScopeModel`] one [`Step`] at a time.
#[derive(Debug)]
pub struct Replay {
    model: ScopeModel,
    ticket: Option<SearchTicket>,
}

impl Replay {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            model: ScopeModel::new(config),
            ticket: None,
        }
    }

    pub fn model(&self) -> &ScopeModel {
        &self.model
    }

    /// Apply one step and return the JSON lines it produced.
    pub fn apply(&mut self, step: Step) -> Result<Vec<Value>> {
        let updates = match step {
            Step::Search {
                query,
                navigation_id,
            } => {
                let (ticket, updates) = self.model.start_search(query, navigation_id);
                self.ticket = Some(ticket);
                updates
            }
            Step::Chunk { chunk, elapsed_ms } => {
                let ticket = self.ticket.as_ref().ok_or_else(no_search)?;
                let elapsed = Duration::from_millis(elapsed_ms);
                match self.model.push_chunk(ticket, chunk, elapsed)? {
                    ChunkOutcome::Buffered { flush_in } => {
                        debug!("chunk buffered, flush due in {flush_in:?}");
                        Vec::new()
                    }
                    ChunkOutcome::Completed(updates)
                    | ChunkOutcome::Cancelled(updates) => updates,
                }
            }
            Step::Flush => self.model.flush()?,
            Step::ClearTimeout => {
                let ticket = self.ticket.as_ref().ok_or_else(no_search)?;
                self.model.clear_timeout_expired(ticket)?
            }
            Step::BindNavigation { navigation_id } => {
                return Ok(vec![self.bind(NavigationKind::Departments, &navigation_id)]);
            }
            Step::BindAltNavigation { navigation_id } => {
                return Ok(vec![self.bind(NavigationKind::AltNavigation, &navigation_id)]);
            }
            Step::Navigate {
                kind,
                navigation_id,
            } => self.model.set_current_navigation_id(kind, navigation_id),
            Step::UpdateResult { old, new } => {
                let category_id = old.category_id.clone();
                let key = IdentityKey::for_record(&old);
                self.model
                    .update_result(&category_id, &key, new)?
                    .into_iter()
                    .collect()
            }
            Step::Invalidate => {
                self.ticket = None;
                self.model.invalidate()
            }
        };

        updates
            .iter()
            .map(|update| serde_json::to_value(update).context("failed to serialize update"))
            .collect()
    }

    fn bind(&mut self, kind: NavigationKind, navigation_id: &str) -> Value {
        let handle = self.model.bind_navigation(kind, navigation_id);
        let view = handle.and_then(|handle| self.model.navigation_view(kind, handle));
        json!({
            "update": "view_bound",
            "kind": kind,
            "navigation_id": navigation_id,
            "view": handle,
            "navigation": view,
        })
    }
}

/// Run every step of `script`, writing one JSON line per update to `out`.
///
/// Blank lines are skipped. Returns the number of steps applied.
pub fn run<R: BufRead, W: Write>(config: EngineConfig, script: R, out: &mut W) -> Result<usize> {
    let mut replay = Replay::new(config);
    let mut steps = 0;
    for (index, line) in script.lines().enumerate() {
        let number = index + 1;
        let line = line.with_context(|| format!("failed to read line {number}"))?;
        if line.trim().is_empty() {
            continue;
        }
        let step: Step = serde_json::from_str(&line)
            .with_context(|| format!("line {number}: invalid step"))?;
        let output = replay
            .apply(step)
            .with_context(|| format!("line {number}: step failed"))?;
        for value in output {
            serde_json::to_writer(&mut *out, &value)?;
            writeln!(out)?;
        }
        steps += 1;
    }
    out.flush()?;
    Ok(steps)
}
