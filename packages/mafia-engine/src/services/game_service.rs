//! Phase supervisor: owns every transition of a running session.
//!
//! Each public operation locks the session slot for its whole duration, so a
//! participant action and a timer firing for the same session are serialized.
//! Timers carry the phase and epoch they were armed for and do nothing once
//! either has moved on.

use tracing::{debug, info, warn};

use crate::error::ActionError;
use crate::models::action::NightActionRequest;
use crate::models::event::{Audience, EventKind, GameEvent};
use crate::models::player::PlayerId;
use crate::models::session::{FinalChoice, FinalVotes, GamePhase, GroupId, Session};
use crate::services::night_actions;
use crate::services::role_assignment::{self, MAX_PLAYERS, MIN_PLAYERS};
use crate::services::voting::{self, Tally, Verdict};
use crate::services::win_check::{self, GameOutcome};
use crate::state::{AppState, SessionSlot};

fn rejected(group: GroupId, error: ActionError) -> ActionError {
    debug!(group = %group, error = %error, "action rejected");
    error
}

pub async fn start_game(state: &AppState, group: GroupId) -> Result<(), ActionError> {
    let slot = state.slot(group).await?;
    let mut slot = slot.lock().await;

    let phase = slot.session.phase;
    if phase != GamePhase::Lobby {
        return Err(rejected(
            group,
            ActionError::InvalidPhase {
                expected: GamePhase::Lobby,
                actual: phase,
            },
        ));
    }
    let count = slot.session.players.len();
    if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&count) {
        return Err(rejected(group, ActionError::RosterSize(count)));
    }

    state.with_rng(|rng| {
        role_assignment::assign_roles(&mut slot.session, state.role_table.as_ref(), rng)
    })?;

    let mut events = deal_events(&slot.session);
    info!(group = %group, players = count, "game started");
    enter_night(state, &mut slot, &mut events);
    settle(state, &mut slot, events).await;
    Ok(())
}

pub async fn submit_night_action(
    state: &AppState,
    group: GroupId,
    request: NightActionRequest,
) -> Result<(), ActionError> {
    let slot = state.slot(group).await?;
    let mut slot = slot.lock().await;

    let action =
        night_actions::validate(&slot.session, &request).map_err(|e| rejected(group, e))?;
    let mut events = night_actions::record(&mut slot.session, action);

    if night_actions::is_complete(&slot.session) {
        info!(group = %group, day = slot.session.day_number, "every night action is in, resolving early");
        events.extend(advance_locked(state, &mut slot)?);
    }
    settle(state, &mut slot, events).await;
    Ok(())
}

pub async fn cast_vote(
    state: &AppState,
    group: GroupId,
    actor: PlayerId,
    as_voter: Option<PlayerId>,
    target: PlayerId,
) -> Result<(), ActionError> {
    let slot = state.slot(group).await?;
    let mut slot = slot.lock().await;

    let event = voting::record_vote(&mut slot.session, actor, as_voter, target)
        .map_err(|e| rejected(group, e))?;
    settle(state, &mut slot, vec![event]).await;
    Ok(())
}

pub async fn cast_final_vote(
    state: &AppState,
    group: GroupId,
    voter: PlayerId,
    choice: FinalChoice,
) -> Result<(), ActionError> {
    let slot = state.slot(group).await?;
    let mut slot = slot.lock().await;

    let event = voting::record_final_vote(&mut slot.session, voter, choice)
        .map_err(|e| rejected(group, e))?;
    settle(state, &mut slot, vec![event]).await;
    Ok(())
}

/// One statement per dead participant, broadcast to the group.
pub async fn leave_last_words(
    state: &AppState,
    group: GroupId,
    player: PlayerId,
    text: String,
) -> Result<(), ActionError> {
    let slot = state.slot(group).await?;
    let mut slot = slot.lock().await;

    let session = &slot.session;
    if session.phase == GamePhase::Ended {
        return Err(ActionError::UnknownSession);
    }
    let dead = session.player(player).ok_or(ActionError::NotAParticipant)?;
    if dead.is_alive || dead.role.is_none() || session.last_words.contains_key(&player) {
        return Err(rejected(group, ActionError::LastWordsUnavailable));
    }

    slot.session.last_words.insert(player, text.clone());
    let event = GameEvent::group(group, EventKind::LastWords { player, text });
    settle(state, &mut slot, vec![event]).await;
    Ok(())
}

/// Ends a session immediately with a report built from the current head-count.
pub async fn abort_game(state: &AppState, group: GroupId) -> Result<GameOutcome, ActionError> {
    let slot = state.slot(group).await?;
    let mut slot = slot.lock().await;
    if slot.session.phase == GamePhase::Ended {
        return Err(ActionError::UnknownSession);
    }

    let outcome = match slot.session.phase {
        GamePhase::Lobby => win_check::report(&slot.session, None),
        _ => win_check::evaluate(&slot.session)
            .unwrap_or_else(|| win_check::report(&slot.session, None)),
    };
    warn!(group = %group, phase = %slot.session.phase, "session aborted");

    slot.session.phase = GamePhase::Ended;
    let event = GameEvent::group(group, outcome.clone().into_event());
    settle(state, &mut slot, vec![event]).await;
    Ok(outcome)
}

pub async fn get_session(state: &AppState, group: GroupId) -> Result<Session, ActionError> {
    let slot = state.slot(group).await?;
    let slot = slot.lock().await;
    Ok(slot.session.clone())
}

/// Ends the current timed phase as if its timer had expired.
///
/// Returns the phase the session is in afterwards.
pub async fn advance_phase(state: &AppState, group: GroupId) -> Result<GamePhase, ActionError> {
    let slot = state.slot(group).await?;
    let mut slot = slot.lock().await;

    let events = advance_locked(state, &mut slot).map_err(|e| rejected(group, e))?;
    let phase = slot.session.phase;
    settle(state, &mut slot, events).await;
    Ok(phase)
}

/// Rebuilds a slot for a stored session and re-arms its timer.
/// Returns `None` for sessions that had already ended.
pub fn resume(state: &AppState, mut session: Session) -> Option<SessionSlot> {
    match session.phase {
        GamePhase::Ended => return None,
        GamePhase::NightResolving => {
            warn!(group = %session.group, "snapshot taken mid-resolution, replaying the night");
            session.phase = GamePhase::Night;
        }
        _ => {}
    }

    let mut slot = SessionSlot::new(session);
    if slot.session.phase.is_timed() {
        arm_timer(state, &mut slot);
    }
    Some(slot)
}

/// Checkpoints the session, or tears it down once it has ended, then
/// publishes the events produced by the step.
async fn settle(state: &AppState, slot: &mut SessionSlot, events: Vec<GameEvent>) {
    let group = slot.session.group;
    if slot.session.phase == GamePhase::Ended {
        slot.cancel_timer();
        state.sessions.lock().await.remove(&group);
        state.forget(group);
        info!(group = %group, "session closed");
    } else {
        state.checkpoint(&slot.session);
    }
    state.publish(events);
}

fn arm_timer(state: &AppState, slot: &mut SessionSlot) {
    slot.cancel_timer();
    let phase = slot.session.phase;
    let Some(duration) = state.config.duration_of(phase) else {
        return;
    };

    slot.epoch += 1;
    let epoch = slot.epoch;
    let group = slot.session.group;
    let state = state.clone();
    slot.timer = Some(tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        on_timer(state, group, phase, epoch).await;
    }));
}

async fn on_timer(state: AppState, group: GroupId, phase: GamePhase, epoch: u64) {
    let Ok(slot) = state.slot(group).await else {
        return;
    };
    let mut slot = slot.lock().await;
    if slot.epoch != epoch || slot.session.phase != phase {
        debug!(group = %group, phase = %phase, "stale timer ignored");
        return;
    }
    // This task is the pending timer; detach it so re-arming cannot abort it.
    slot.timer = None;

    debug!(group = %group, phase = %phase, "phase timer expired");
    match advance_locked(&state, &mut slot) {
        Ok(events) => settle(&state, &mut slot, events).await,
        Err(e) => warn!(group = %group, error = %e, "timer could not advance the session"),
    }
}

fn advance_locked(state: &AppState, slot: &mut SessionSlot) -> Result<Vec<GameEvent>, ActionError> {
    let mut events = Vec::new();
    match slot.session.phase {
        GamePhase::Night => {
            let outcome = state.with_rng(|rng| night_actions::resolve(&mut slot.session, rng));
            if let Some(outcome) = outcome {
                events.extend(outcome.events);
                if !conclude_if_over(&mut slot.session, &mut events) {
                    enter_day(state, slot, &mut events);
                }
            }
        }
        GamePhase::Day => enter_voting(state, slot, &mut events),
        GamePhase::Voting => close_voting(state, slot, &mut events),
        GamePhase::FinalVote => {
            let (verdict, event) = voting::resolve_final(&mut slot.session);
            events.push(event);
            if let Verdict::Executed { player, .. } = verdict {
                events.push(GameEvent::private(
                    slot.session.group,
                    player,
                    EventKind::LastWordsOffered { player },
                ));
            }
            if !conclude_if_over(&mut slot.session, &mut events) {
                enter_night(state, slot, &mut events);
            }
        }
        GamePhase::Ended => return Err(ActionError::UnknownSession),
        actual => {
            return Err(ActionError::InvalidPhase {
                expected: GamePhase::Night,
                actual,
            })
        }
    }
    Ok(events)
}

fn conclude_if_over(session: &mut Session, events: &mut Vec<GameEvent>) -> bool {
    let Some(outcome) = win_check::evaluate(session) else {
        return false;
    };
    info!(
        group = %session.group,
        day = session.day_number,
        winner = ?outcome.winner,
        "game over"
    );
    session.phase = GamePhase::Ended;
    events.push(GameEvent::group(session.group, outcome.into_event()));
    true
}

fn deal_events(session: &Session) -> Vec<GameEvent> {
    let mut events = Vec::new();
    for player in &session.players {
        let Some(role) = player.role else {
            continue;
        };
        events.push(GameEvent::private(
            session.group,
            player.id,
            EventKind::RoleDealt {
                player: player.id,
                role,
            },
        ));

        if role.is_mafia_aligned() {
            let allies: Vec<_> = session
                .players
                .iter()
                .filter(|other| other.id != player.id && other.is_mafia_aligned())
                .filter_map(|other| other.role.map(|r| (other.id, r)))
                .collect();
            if !allies.is_empty() {
                events.push(GameEvent::private(
                    session.group,
                    player.id,
                    EventKind::AlliesRevealed { allies },
                ));
            }
        }
    }
    events
}

fn enter_night(state: &AppState, slot: &mut SessionSlot, events: &mut Vec<GameEvent>) {
    let session = &mut slot.session;
    session.phase = GamePhase::Night;
    session.day_number += 1;
    session.night_actions.clear();
    session.night_visits.clear();
    session.lover_blocked_this_night.clear();
    session.day_votes.clear();
    session.final_votes = FinalVotes::default();
    session.execution_candidate = None;
    session.last_bite_target = session.current_bite_target.take();
    for player in session.players.iter_mut() {
        player.alibi_current = None;
        player.vote_blocked = false;
    }

    let members: Vec<PlayerId> = session
        .alive()
        .filter(|p| p.is_mafia_aligned())
        .map(|p| p.id)
        .collect();
    session.mafia_chat_open = members.len() > 1;
    if session.mafia_chat_open {
        events.push(GameEvent::new(
            session.group,
            Audience::Players(members.clone()),
            EventKind::MafiaChatOpened { members },
        ));
    }

    events.push(GameEvent::group(
        session.group,
        EventKind::NightFell {
            day: session.day_number,
            alive: session.alive_ids(),
        },
    ));
    info!(group = %session.group, day = session.day_number, "night falls");
    arm_timer(state, slot);
}

fn enter_day(state: &AppState, slot: &mut SessionSlot, events: &mut Vec<GameEvent>) {
    let session = &mut slot.session;
    session.phase = GamePhase::Day;
    session.mafia_chat_open = false;
    events.push(GameEvent::group(
        session.group,
        EventKind::DayBegan {
            day: session.day_number,
            alive: session.alive_ids(),
        },
    ));
    info!(group = %session.group, day = session.day_number, "day begins");
    arm_timer(state, slot);
}

fn enter_voting(state: &AppState, slot: &mut SessionSlot, events: &mut Vec<GameEvent>) {
    let session = &mut slot.session;
    if session.alive_count() < 2 {
        let outcome = win_check::evaluate(session)
            .unwrap_or_else(|| win_check::report(session, None));
        session.phase = GamePhase::Ended;
        events.push(GameEvent::group(session.group, outcome.into_event()));
        return;
    }

    session.phase = GamePhase::Voting;
    session.day_votes.clear();
    events.push(GameEvent::group(
        session.group,
        EventKind::VotingOpened {
            alive: session.alive_ids(),
        },
    ));
    info!(group = %session.group, day = session.day_number, "voting opens");
    arm_timer(state, slot);
}

fn close_voting(state: &AppState, slot: &mut SessionSlot, events: &mut Vec<GameEvent>) {
    let group = slot.session.group;
    match voting::tally(&slot.session) {
        Tally::NoVotes => {
            events.push(GameEvent::group(group, EventKind::NoVotes));
            enter_night(state, slot, events);
        }
        Tally::Split { tied, votes } => {
            events.push(GameEvent::group(group, EventKind::TownSplit { tied, votes }));
            enter_night(state, slot, events);
        }
        Tally::Candidate { candidate, votes } => {
            let session = &mut slot.session;
            session.execution_candidate = Some(candidate);
            session.final_votes = FinalVotes::default();
            session.phase = GamePhase::FinalVote;
            events.push(GameEvent::group(
                group,
                EventKind::ExecutionProposed { candidate, votes },
            ));
            info!(group = %group, candidate = %candidate, votes, "final vote opens");
            arm_timer(state, slot);
        }
    }
}
