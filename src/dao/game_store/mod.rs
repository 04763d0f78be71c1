/// CouchDB backend.
#[cfg(feature = "couch-store")]
pub mod couchdb;
/// JSON-file backend.
pub mod file;
/// In-memory backend.
pub mod memory;

use crate::dao::models::{GameStateEntity, RosterEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Fixed key of the game configuration/status document.
pub const GAME_STATE_KEY: &str = "state";
/// Fixed key of the player roster document.
pub const ROSTER_KEY: &str = "players";

/// Abstraction over the persistence layer holding the two shared documents.
///
/// `None` from a load means the document was never written.
pub trait GameStore: Send + Sync {
    fn load_game_state(&self) -> BoxFuture<'static, StorageResult<Option<GameStateEntity>>>;
    fn save_game_state(&self, game: GameStateEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn load_roster(&self) -> BoxFuture<'static, StorageResult<Option<RosterEntity>>>;
    fn save_roster(&self, roster: RosterEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
