use tracing::{debug, error, warn};

use crate::{
    dao::models::{GameStateEntity, RosterEntity},
    error::ServiceError,
    services::sse_events::broadcast_snapshot,
    state::{
        SharedState,
        game::{Documents, Timestamp, now_ms},
        load_documents,
    },
};

/// Run one read-modify-write cycle under the exclusive side of the gate.
///
/// Both documents are read, `transition` runs synchronously on a copy, and when it
/// changed anything both documents are written and the fresh snapshot is pushed before
/// the gate is released. A rejected transition leaves the store untouched.
pub async fn run_mutation<T, F>(
    state: &SharedState,
    operation: &'static str,
    transition: F,
) -> Result<T, ServiceError>
where
    F: FnOnce(&mut Documents, Timestamp) -> Result<T, ServiceError>,
{
    let store = state.require_game_store().await?;
    let _exclusive = state.gate().write().await;

    let current = load_documents(store.as_ref(), state.config()).await?;
    let mut next = current.clone();
    let value = match transition(&mut next, now_ms()) {
        Ok(value) => value,
        Err(err) => {
            warn!(operation, error = %err, "operation rejected");
            return Err(err);
        }
    };

    if next == current {
        debug!(operation, "operation left state unchanged; skipping write");
        return Ok(value);
    }

    store
        .save_game_state(GameStateEntity::from(&next.game))
        .await?;
    if let Err(err) = store.save_roster(RosterEntity::from(&next.roster)).await {
        // Put the previous game document back so both documents stay from one state.
        match store
            .save_game_state(GameStateEntity::from(&current.game))
            .await
        {
            Ok(()) => warn!(operation, error = %err, "roster write failed; game state rolled back"),
            Err(rollback) => error!(
                operation,
                error = %err,
                rollback_error = %rollback,
                "roster write failed and game state rollback failed"
            ),
        }
        return Err(err.into());
    }
    broadcast_snapshot(state, &next);
    debug!(operation, players = next.roster.len(), "operation applied");
    Ok(value)
}
