use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::action::ActionKind;
use crate::models::role::Role;
use crate::models::session::GamePhase;

/// Limits that reject an otherwise valid action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cooldown {
    SelfHeal,
    SelfAlibi,
    AlibiRepeat,
    RepeatBite,
}

impl fmt::Display for Cooldown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cooldown::SelfHeal => write!(f, "the doctor has already healed themself this game"),
            Cooldown::SelfAlibi => write!(f, "the advocate has already given themself an alibi"),
            Cooldown::AlibiRepeat => {
                write!(f, "this player received an alibi less than two nights ago")
            }
            Cooldown::RepeatBite => write!(f, "this player was bitten last night"),
        }
    }
}

/// Why a participant action was refused. Nothing is mutated on error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("no session is running for this group")]
    UnknownSession,
    #[error("a session already exists for this group")]
    SessionExists,
    #[error("the actor is not part of this session")]
    NotAParticipant,
    #[error("dead participants cannot act")]
    ActorNotAlive,
    #[error("action not accepted during {actual} (expected {expected})")]
    InvalidPhase {
        expected: GamePhase,
        actual: GamePhase,
    },
    #[error("target is unknown or no longer alive")]
    UnknownOrDeadTarget,
    #[error("allies cannot be targeted")]
    AllyTargetForbidden,
    #[error("{role} cannot perform {kind} now")]
    RoleMismatch { role: Role, kind: ActionKind },
    #[error("this action cannot target yourself")]
    SelfTarget,
    #[error("this action needs a target")]
    MissingTarget,
    #[error("this target cannot be chosen for that action")]
    TargetImmune,
    #[error("cooldown: {0}")]
    CooldownViolation(Cooldown),
    #[error("the lover has taken your vote today")]
    VoteBlocked,
    #[error("your vote is controlled by the vampire")]
    UnderControl,
    #[error("you do not control that participant")]
    NotControlling,
    #[error("the candidate cannot vote on their own fate")]
    NotACandidateVoter,
    #[error("registration is closed")]
    LobbyClosed,
    #[error("already registered")]
    AlreadyRegistered,
    #[error("cannot run a table of {0} players")]
    RosterSize(usize),
    #[error("no last words can be left")]
    LastWordsUnavailable,
}

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("snapshot io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding failed: {0}")]
    Serde(#[from] serde_json::Error),
}
