use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::ActionError;
use crate::models::event::{EventKind, GameEvent};
use crate::models::player::{Participant, Player, PlayerId};
use crate::models::session::{GamePhase, GroupId, Session};
use crate::services::role_assignment::MAX_PLAYERS;
use crate::state::{AppState, SessionSlot};

pub async fn open_lobby(state: &AppState, group: GroupId) -> Result<(), ActionError> {
    let session = Session::new(group);
    {
        let mut sessions = state.sessions.lock().await;
        if sessions.contains_key(&group) {
            return Err(ActionError::SessionExists);
        }
        sessions.insert(group, Arc::new(Mutex::new(SessionSlot::new(session.clone()))));
    }

    state.checkpoint(&session);
    state.publish(vec![GameEvent::group(group, EventKind::LobbyOpened)]);
    info!(group = %group, "lobby opened");
    Ok(())
}

/// Adds a participant to an open lobby. Returns the registered head-count.
pub async fn register(
    state: &AppState,
    group: GroupId,
    participant: Participant,
) -> Result<usize, ActionError> {
    let slot = state.slot(group).await?;
    let mut slot = slot.lock().await;
    let session = &mut slot.session;

    if session.phase != GamePhase::Lobby {
        return Err(ActionError::LobbyClosed);
    }
    if session.player(participant.id).is_some() {
        return Err(ActionError::AlreadyRegistered);
    }
    if session.players.len() >= MAX_PLAYERS {
        return Err(ActionError::RosterSize(session.players.len() + 1));
    }

    let player = participant.id;
    let name = participant.name.clone();
    session.players.push(Player::new(participant));
    let registered = session.players.len();

    state.checkpoint(session);
    state.publish(vec![GameEvent::group(
        group,
        EventKind::ParticipantJoined {
            player,
            name,
            registered,
        },
    )]);
    Ok(registered)
}

pub async fn withdraw(state: &AppState, group: GroupId, player: PlayerId) -> Result<usize, ActionError> {
    let slot = state.slot(group).await?;
    let mut slot = slot.lock().await;
    let session = &mut slot.session;

    if session.phase != GamePhase::Lobby {
        return Err(ActionError::LobbyClosed);
    }
    let index = session
        .players
        .iter()
        .position(|p| p.id == player)
        .ok_or(ActionError::NotAParticipant)?;
    session.players.remove(index);
    let registered = session.players.len();

    state.checkpoint(session);
    state.publish(vec![GameEvent::group(
        group,
        EventKind::ParticipantLeft { player, registered },
    )]);
    Ok(registered)
}
