use serde::{Deserialize, Serialize};

use crate::dao::models::{GameStateEntity, RosterEntity};

/// Prefix of every document id.
pub const DOC_PREFIX: &str = "game::";

/// CouchDB envelope around one of the two shared documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchDocument<T> {
    /// Fixed document id.
    #[serde(rename = "_id")]
    pub id: String,
    /// Current revision, absent on first write.
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Stored document.
    pub body: T,
}

/// Minimal view used to fetch the current revision without decoding the body.
#[derive(Debug, Deserialize)]
pub struct RevisionOnly {
    /// Current revision.
    #[serde(rename = "_rev")]
    pub rev: Option<String>,
}

/// Envelope of the game document.
pub type CouchGameStateDocument = CouchDocument<GameStateEntity>;
/// Envelope of the roster document.
pub type CouchRosterDocument = CouchDocument<RosterEntity>;

impl<T> CouchDocument<T> {
    /// Wrap `body` under the id derived from `key`.
    pub fn new(key: &str, body: T, rev: Option<String>) -> Self {
        Self {
            id: doc_id(key),
            rev,
            body,
        }
    }
}

/// Document id for a store key.
pub fn doc_id(key: &str) -> String {
    format!("{DOC_PREFIX}{key}")
}
