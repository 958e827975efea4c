use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::role::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub i64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Roster entry handed over by the registration flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: PlayerId,
    pub name: String,
    /// Opaque address of the participant's private channel.
    pub channel: i64,
}

impl Participant {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id: PlayerId(id),
            name: name.into(),
            channel: id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub channel: i64,
    /// None only while the session is still in the lobby.
    pub role: Option<Role>,
    pub is_alive: bool,

    // Doctor
    #[serde(default)]
    pub last_guarded_target: Option<PlayerId>,
    #[serde(default)]
    pub self_heal_used: bool,

    // Advocate
    #[serde(default)]
    pub alibi_given_to_self: bool,
    /// target -> night number the alibi was given
    #[serde(default)]
    pub alibi_history: BTreeMap<PlayerId, u32>,
    #[serde(default)]
    pub alibi_current: Option<PlayerId>,

    // Lover victim, cleared at the next night
    #[serde(default)]
    pub vote_blocked: bool,

    // Stukach
    #[serde(default)]
    pub stukach_target: Option<PlayerId>,

    /// Never read by the engine; stored snapshots carry it.
    #[serde(default)]
    pub votes_against: u32,
}

impl Player {
    pub fn new(participant: Participant) -> Self {
        Self {
            id: participant.id,
            name: participant.name,
            channel: participant.channel,
            role: None,
            is_alive: true,
            last_guarded_target: None,
            self_heal_used: false,
            alibi_given_to_self: false,
            alibi_history: BTreeMap::new(),
            alibi_current: None,
            vote_blocked: false,
            stukach_target: None,
            votes_against: 0,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == Some(role)
    }

    pub fn is_mafia_aligned(&self) -> bool {
        self.role.map(Role::is_mafia_aligned).unwrap_or(false)
    }

    pub fn is_ally_of(&self, other: &Player) -> bool {
        match (self.role, other.role) {
            (Some(a), Some(b)) => a.is_ally_of(b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_counter_rides_along_in_snapshots() {
        let player = Player::new(Participant::new(7, "Seven"));
        let value = serde_json::to_value(&player).unwrap();
        assert_eq!(value["votes_against"], 0);

        let older = serde_json::json!({
            "id": 7,
            "name": "Seven",
            "channel": 7,
            "role": null,
            "is_alive": true,
        });
        let loaded: Player = serde_json::from_value(older).unwrap();
        assert_eq!(loaded, player);
    }
}
