use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::ActionError;
use crate::models::event::{EventKind, GameEvent};
use crate::models::player::PlayerId;
use crate::models::role::Role;
use crate::models::session::{FinalChoice, GamePhase, Session};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tally {
    NoVotes,
    Split { tied: Vec<PlayerId>, votes: usize },
    Candidate { candidate: PlayerId, votes: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Executed { player: PlayerId, role: Role },
    AlibiSaved { player: PlayerId },
    Pardoned { player: Option<PlayerId> },
}

fn expect_phase(session: &Session, expected: GamePhase) -> Result<(), ActionError> {
    if session.phase != expected {
        return Err(ActionError::InvalidPhase {
            expected,
            actual: session.phase,
        });
    }
    Ok(())
}

/// Files an accusation ballot.
///
/// `as_voter` is only used by a Vampire filing the vote of the participant
/// they control; everyone else votes under their own name.
pub fn record_vote(
    session: &mut Session,
    actor: PlayerId,
    as_voter: Option<PlayerId>,
    target: PlayerId,
) -> Result<GameEvent, ActionError> {
    expect_phase(session, GamePhase::Voting)?;

    let player = session.player(actor).ok_or(ActionError::NotAParticipant)?;
    if !player.is_alive {
        return Err(ActionError::ActorNotAlive);
    }

    let voter = as_voter.unwrap_or(actor);
    if voter == actor {
        if session.controller_of(actor).is_some() {
            return Err(ActionError::UnderControl);
        }
    } else if session.controlled_by(actor) != Some(voter) {
        return Err(ActionError::NotControlling);
    }

    let ballot_owner = session.alive_player(voter).ok_or(ActionError::NotControlling)?;
    if ballot_owner.vote_blocked {
        return Err(ActionError::VoteBlocked);
    }
    if target == voter {
        return Err(ActionError::SelfTarget);
    }
    if !session.is_alive(target) {
        return Err(ActionError::UnknownOrDeadTarget);
    }

    session.day_votes.insert(voter, target);
    debug!(group = %session.group, voter = %voter, target = %target, "vote recorded");

    Ok(GameEvent::group(
        session.group,
        EventKind::VoteCast {
            voter,
            target,
            cast_by: actor,
        },
    ))
}

/// Counts accusation ballots. Votes naming someone who has since died are ignored.
pub fn tally(session: &Session) -> Tally {
    let mut counts: BTreeMap<PlayerId, usize> = BTreeMap::new();
    for target in session.day_votes.values() {
        if session.is_alive(*target) {
            *counts.entry(*target).or_default() += 1;
        }
    }

    let Some(max) = counts.values().copied().max() else {
        return Tally::NoVotes;
    };
    let leaders: Vec<PlayerId> = counts
        .iter()
        .filter(|(_, n)| **n == max)
        .map(|(id, _)| *id)
        .collect();

    match leaders.as_slice() {
        [candidate] => Tally::Candidate {
            candidate: *candidate,
            votes: max,
        },
        _ => Tally::Split {
            tied: leaders,
            votes: max,
        },
    }
}

pub fn record_final_vote(
    session: &mut Session,
    voter: PlayerId,
    choice: FinalChoice,
) -> Result<GameEvent, ActionError> {
    expect_phase(session, GamePhase::FinalVote)?;

    let player = session.player(voter).ok_or(ActionError::NotAParticipant)?;
    if !player.is_alive {
        return Err(ActionError::ActorNotAlive);
    }
    if session.execution_candidate == Some(voter) {
        return Err(ActionError::NotACandidateVoter);
    }
    if session.controller_of(voter).is_some() {
        return Err(ActionError::UnderControl);
    }

    session.final_votes.cast(voter, choice);
    let (execute, pardon) = session.final_votes.counts();

    Ok(GameEvent::group(
        session.group,
        EventKind::FinalVoteCast {
            voter,
            choice,
            execute,
            pardon,
        },
    ))
}

/// Applies the runoff result. A strict `execute` majority kills the candidate
/// unless the Advocate's live alibi names them, in which case the alibi is
/// spent instead.
pub fn resolve_final(session: &mut Session) -> (Verdict, GameEvent) {
    let (execute, pardon) = session.final_votes.counts();
    let group = session.group;
    let candidate = session
        .execution_candidate
        .filter(|id| session.is_alive(*id));

    let verdict = match candidate {
        Some(player) if execute > pardon => {
            let alibi_holder = session
                .alive()
                .find(|p| p.has_role(Role::Advocate) && p.alibi_current == Some(player))
                .map(|p| p.id);
            match alibi_holder {
                Some(advocate) => {
                    if let Some(advocate) = session.player_mut(advocate) {
                        advocate.alibi_current = None;
                    }
                    Verdict::AlibiSaved { player }
                }
                None => match session.role_of(player) {
                    Some(role) if session.kill(player) => Verdict::Executed { player, role },
                    _ => Verdict::Pardoned {
                        player: Some(player),
                    },
                },
            }
        }
        player => Verdict::Pardoned { player },
    };

    info!(group = %group, execute, pardon, verdict = ?verdict, "final vote resolved");

    let kind = match &verdict {
        Verdict::Executed { player, role } => EventKind::Executed {
            player: *player,
            role: *role,
            execute,
            pardon,
        },
        Verdict::AlibiSaved { player } => EventKind::AlibiSaved { player: *player },
        Verdict::Pardoned { player } => EventKind::Pardoned {
            player: *player,
            execute,
            pardon,
        },
    };
    (verdict, GameEvent::group(group, kind))
}
