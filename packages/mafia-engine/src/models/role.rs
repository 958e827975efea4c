use serde::{Deserialize, Serialize};
use std::fmt;

use super::action::ActionKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Civilian,
    Mafia,
    Sheriff,
    Don,
    Advocate,
    Doctor,
    Maniac,
    Stukach,
    Lover,
    Vampire,
    Bum,
}

/// Head-count factions used by the win check and the ally rule.
///
/// The Maniac is counted with the town even though it plays for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    Mafia,
    Town,
}

impl Role {
    pub fn faction(self) -> Faction {
        match self {
            Role::Mafia | Role::Don | Role::Advocate | Role::Vampire => Faction::Mafia,
            _ => Faction::Town,
        }
    }

    pub fn is_mafia_aligned(self) -> bool {
        self.faction() == Faction::Mafia
    }

    /// Two roles are allies iff both are mafia-aligned.
    pub fn is_ally_of(self, other: Role) -> bool {
        self.is_mafia_aligned() && other.is_mafia_aligned()
    }

    /// How the role looks to a Sheriff's check. The Vampire reads as clean.
    pub fn appears_mafia(self) -> bool {
        matches!(self, Role::Mafia | Role::Don | Role::Advocate)
    }

    /// Every action kind this role may ever file at night.
    pub fn night_kinds(self) -> &'static [ActionKind] {
        match self {
            Role::Mafia | Role::Don | Role::Maniac => &[ActionKind::Kill],
            Role::Advocate => &[ActionKind::Alibi, ActionKind::Kill],
            Role::Sheriff => &[ActionKind::Check, ActionKind::Kill],
            Role::Doctor => &[ActionKind::Guard],
            Role::Stukach => &[ActionKind::StukachCheck],
            Role::Lover => &[ActionKind::LoverVisit],
            Role::Vampire => &[ActionKind::VampireBite, ActionKind::Kill],
            Role::Bum => &[ActionKind::BumVisit],
            Role::Civilian => &[],
        }
    }

    pub fn is_night_capable(self) -> bool {
        !self.night_kinds().is_empty()
    }

    pub fn can_file(self, kind: ActionKind) -> bool {
        self.night_kinds().contains(&kind)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Civilian => write!(f, "Civilian"),
            Role::Mafia => write!(f, "Mafia"),
            Role::Sheriff => write!(f, "Sheriff"),
            Role::Don => write!(f, "Don"),
            Role::Advocate => write!(f, "Advocate"),
            Role::Doctor => write!(f, "Doctor"),
            Role::Maniac => write!(f, "Maniac"),
            Role::Stukach => write!(f, "Stukach"),
            Role::Lover => write!(f, "Lover"),
            Role::Vampire => write!(f, "Vampire"),
            Role::Bum => write!(f, "Bum"),
        }
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Faction::Mafia => write!(f, "mafia"),
            Faction::Town => write!(f, "town"),
        }
    }
}
