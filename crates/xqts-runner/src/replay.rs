// crates/xqts-runner/src/replay.rs
// ============================================================================
// Module: Replay Engine
// Description: Query engine answering from recorded outcomes.
// Purpose: Drive the runner without a live engine and audit session release.
// Dependencies: serde, serde_json, thiserror, xqts-assert,
//              crate::{interfaces, request}
// ============================================================================

//! ## Overview
//! Recordings are a JSON object keyed by query text. Each entry is one of
//! `{"items": [...]}`, `{"error": "CODE"}` or `{"fault": "message"}`. Items
//! carry a `type` label, a `value` projection and, for nodes, optional
//! `markup` parsed into a tree at load time. Keys are matched after trimming
//! surrounding whitespace and must stay unique once trimmed. Queries without
//! a recording are engine faults. Open sessions are counted so tests can verify release.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use thiserror::Error;
use xqts_assert::HarnessFault;
use xqts_assert::ItemKind;
use xqts_assert::Node;
use xqts_assert::ResultItem;
use xqts_assert::parse_fragment;

use crate::interfaces::EngineError;
use crate::interfaces::EngineSession;
use crate::interfaces::QueryEngine;
use crate::request::QueryOptions;
use crate::request::QueryRequest;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum recording file size in bytes.
pub const MAX_RECORDING_FILE_SIZE: usize = 32 * 1024 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Recording loading errors.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// I/O failure while reading recordings.
    #[error("replay io error: {0}")]
    Io(String),
    /// Recordings could not be decoded.
    #[error("replay parse error: {0}")]
    Parse(String),
    /// A recording is inconsistent.
    #[error("invalid recording for `{query}`: {reason}")]
    Invalid {
        /// Query the recording belongs to.
        query: String,
        /// Failure description.
        reason: String,
    },
}

// ============================================================================
// SECTION: Recorded Form
// ============================================================================

/// Authored recording.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
enum RecordedOutcome {
    /// Successful result sequence.
    Items(Vec<RecordedItem>),
    /// Classified error code.
    Error(String),
    /// Unclassified engine fault.
    Fault(String),
}

/// Authored result item.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecordedItem {
    /// Sequence-type label.
    #[serde(rename = "type")]
    kind: ItemKind,
    /// String projection.
    #[serde(default)]
    value: String,
    /// Markup for node items.
    #[serde(default)]
    markup: Option<String>,
}

impl RecordedItem {
    /// Builds the result item, parsing markup when present.
    fn into_item(self) -> Result<ResultItem, String> {
        let Some(markup) = self.markup else {
            return Ok(ResultItem::new(self.kind, self.value));
        };
        if !self.kind.is_node() {
            return Err(format!("markup given for non-node type {}", self.kind.label()));
        }
        let mut nodes = parse_fragment(&markup).map_err(|err| err.to_string())?;
        if self.kind == ItemKind::Document {
            return Ok(ResultItem::node(Node::Document {
                children: nodes,
            }));
        }
        match (nodes.pop(), nodes.is_empty()) {
            (Some(node), true) if node.kind() == self.kind => Ok(ResultItem::node(node)),
            (Some(node), true) => Err(format!(
                "markup is {} but type is {}",
                node.kind().label(),
                self.kind.label()
            )),
            _ => Err("markup must contain exactly one node".to_string()),
        }
    }
}

/// Resolved recording.
#[derive(Debug, Clone)]
enum Recording {
    /// Items to return.
    Items(Vec<ResultItem>),
    /// Code to raise as a classified error.
    Error(String),
    /// Message to raise as an unclassified error.
    Fault(String),
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Engine that replays recorded outcomes.
#[derive(Debug, Default)]
pub struct ReplayEngine {
    /// Recordings by trimmed query text.
    recordings: Arc<BTreeMap<String, Recording>>,
    /// Sessions opened and not yet released.
    open: Arc<AtomicUsize>,
    /// Sessions opened in total.
    opened: Arc<AtomicUsize>,
}

impl ReplayEngine {
    /// Loads recordings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError`] when reading or decoding fails.
    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let bytes = fs::read(path).map_err(|err| ReplayError::Io(err.to_string()))?;
        if bytes.len() > MAX_RECORDING_FILE_SIZE {
            return Err(ReplayError::Io("recording file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ReplayError::Parse("recording file must be utf-8".to_string()))?;
        Self::from_json(content)
    }

    /// Decodes recordings from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError`] when decoding fails or an item is inconsistent.
    pub fn from_json(content: &str) -> Result<Self, ReplayError> {
        let authored: BTreeMap<String, RecordedOutcome> =
            serde_json::from_str(content).map_err(|err| ReplayError::Parse(err.to_string()))?;
        let mut recordings = BTreeMap::new();
        for (query, outcome) in authored {
            let recording = match outcome {
                RecordedOutcome::Items(items) => Recording::Items(
                    items
                        .into_iter()
                        .map(RecordedItem::into_item)
                        .collect::<Result<_, _>>()
                        .map_err(|reason| ReplayError::Invalid {
                            query: query.clone(),
                            reason,
                        })?,
                ),
                RecordedOutcome::Error(code) => Recording::Error(code),
                RecordedOutcome::Fault(message) => Recording::Fault(message),
            };
            let key = query.trim().to_string();
            if recordings.contains_key(&key) {
                return Err(ReplayError::Invalid {
                    query,
                    reason: "duplicate recording after trimming whitespace".to_string(),
                });
            }
            recordings.insert(key, recording);
        }
        Ok(Self {
            recordings: Arc::new(recordings),
            ..Self::default()
        })
    }

    /// Number of recorded queries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recordings.len()
    }

    /// Returns true when nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recordings.is_empty()
    }

    /// Sessions currently open.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Sessions opened since creation.
    #[must_use]
    pub fn sessions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl QueryEngine for ReplayEngine {
    type Session = ReplaySession;

    fn open_session(&self, _options: &QueryOptions) -> Result<Self::Session, HarnessFault> {
        self.open.fetch_add(1, Ordering::SeqCst);
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(ReplaySession {
            recordings: Arc::clone(&self.recordings),
            open: Arc::clone(&self.open),
            released: false,
        })
    }
}

/// Session handed out by [`ReplayEngine`].
#[derive(Debug)]
pub struct ReplaySession {
    /// Shared recordings.
    recordings: Arc<BTreeMap<String, Recording>>,
    /// Open-session counter of the owning engine.
    open: Arc<AtomicUsize>,
    /// Set once released.
    released: bool,
}

impl EngineSession for ReplaySession {
    fn execute(&mut self, request: &QueryRequest) -> Result<Vec<ResultItem>, EngineError> {
        match self.recordings.get(request.query.trim()) {
            Some(Recording::Items(items)) => Ok(items.clone()),
            Some(Recording::Error(code)) => {
                Err(EngineError::classified(code.as_str(), "recorded error"))
            }
            Some(Recording::Fault(message)) => Err(EngineError::Unclassified(message.clone())),
            None => Err(EngineError::Unclassified(format!(
                "no recording for query: {}",
                request.query.trim()
            ))),
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
