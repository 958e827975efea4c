use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::action::ActionKind;
use super::player::PlayerId;
use super::role::{Faction, Role};
use super::session::{FinalChoice, GroupId};

/// Who an event is addressed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "to", content = "ids")]
pub enum Audience {
    Group,
    Player(PlayerId),
    Players(Vec<PlayerId>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub group: GroupId,
    pub audience: Audience,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
}

impl GameEvent {
    pub fn group(group: GroupId, kind: EventKind) -> Self {
        Self::new(group, Audience::Group, kind)
    }

    pub fn private(group: GroupId, player: PlayerId, kind: EventKind) -> Self {
        Self::new(group, Audience::Player(player), kind)
    }

    pub fn new(group: GroupId, audience: Audience, kind: EventKind) -> Self {
        GameEvent {
            group,
            audience,
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn is_for(&self, player: PlayerId) -> bool {
        match &self.audience {
            Audience::Group => true,
            Audience::Player(id) => *id == player,
            Audience::Players(ids) => ids.contains(&player),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub player: PlayerId,
    pub name: String,
    pub role: Role,
    pub alive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeathReport {
    pub player: PlayerId,
    pub role: Role,
    /// Role whose kill landed.
    pub killer_role: Role,
    /// Roles that visited the victim tonight, Doctor and Bum left out.
    pub visitors: Vec<Role>,
}

/// What a visited participant is told in the morning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitNotice {
    /// Sheriff visit, identity withheld.
    SomeoneCurious,
    DoctorHealed,
    DoctorVisited,
    KilledByDon,
    VampireBit,
    VampireRepelledByDoctor,
    LoverVisited,
    /// Doctor and Lover came the same night; the Doctor sent the Lover away.
    LoverSentAwayByDoctor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum EventKind {
    LobbyOpened,
    ParticipantJoined {
        player: PlayerId,
        name: String,
        registered: usize,
    },
    ParticipantLeft {
        player: PlayerId,
        registered: usize,
    },
    RoleDealt {
        player: PlayerId,
        role: Role,
    },
    AlliesRevealed {
        allies: Vec<(PlayerId, Role)>,
    },
    NightFell {
        day: u32,
        alive: Vec<PlayerId>,
    },
    MafiaChatOpened {
        members: Vec<PlayerId>,
    },
    ActionRecorded {
        actor: PlayerId,
        kind: ActionKind,
        target: Option<PlayerId>,
    },
    /// Public hint that a role has made its move.
    RoleStirred {
        role: Role,
    },
    Morning {
        day: u32,
        deaths: Vec<DeathReport>,
    },
    LastWordsOffered {
        player: PlayerId,
    },
    LastWords {
        player: PlayerId,
        text: String,
    },
    Visited {
        player: PlayerId,
        notices: Vec<VisitNotice>,
    },
    DoctorReport {
        patient: PlayerId,
        saved: bool,
        visitors: Vec<Role>,
    },
    SheriffReport {
        target: PlayerId,
        appears_mafia: bool,
    },
    RoleRevealed {
        player: PlayerId,
        role: Role,
    },
    BumWitness {
        victim: PlayerId,
        killer: PlayerId,
        killer_role: Role,
    },
    BiteTookHold {
        vampire: PlayerId,
        victim: PlayerId,
    },
    DayBegan {
        day: u32,
        alive: Vec<PlayerId>,
    },
    VotingOpened {
        alive: Vec<PlayerId>,
    },
    VoteCast {
        voter: PlayerId,
        target: PlayerId,
        cast_by: PlayerId,
    },
    NoVotes,
    TownSplit {
        tied: Vec<PlayerId>,
        votes: usize,
    },
    ExecutionProposed {
        candidate: PlayerId,
        votes: usize,
    },
    FinalVoteCast {
        voter: PlayerId,
        choice: FinalChoice,
        execute: usize,
        pardon: usize,
    },
    Executed {
        player: PlayerId,
        role: Role,
        execute: usize,
        pardon: usize,
    },
    AlibiSaved {
        player: PlayerId,
    },
    Pardoned {
        player: Option<PlayerId>,
        execute: usize,
        pardon: usize,
    },
    GameOver {
        winner: Option<Faction>,
        winners: Vec<RosterEntry>,
        others: Vec<RosterEntry>,
    },
}
