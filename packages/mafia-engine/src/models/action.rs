use serde::{Deserialize, Serialize};
use std::fmt;

use super::player::PlayerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Kill,
    Guard,
    Alibi,
    Check,
    StukachCheck,
    LoverVisit,
    VampireBite,
    BumVisit,
}

impl ActionKind {
    /// Kinds that may be filed without a target.
    pub fn allows_skip(self) -> bool {
        matches!(self, ActionKind::Kill | ActionKind::Alibi)
    }

    /// Kinds that may not name a mafia ally of the actor.
    pub fn is_harmful(self) -> bool {
        matches!(self, ActionKind::Kill | ActionKind::VampireBite)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Kill => "kill",
            ActionKind::Guard => "guard",
            ActionKind::Alibi => "alibi",
            ActionKind::Check => "check",
            ActionKind::StukachCheck => "stukach-check",
            ActionKind::LoverVisit => "lover-visit",
            ActionKind::VampireBite => "vampire-bite",
            ActionKind::BumVisit => "bum-visit",
        };
        write!(f, "{}", name)
    }
}

/// One registry entry. `target == None` is a skip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightAction {
    pub actor: PlayerId,
    pub kind: ActionKind,
    pub target: Option<PlayerId>,
}

impl NightAction {
    pub fn new(actor: PlayerId, kind: ActionKind, target: Option<PlayerId>) -> Self {
        Self {
            actor,
            kind,
            target,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NightActionRequest {
    pub actor: PlayerId,
    pub kind: ActionKind,
    #[serde(default)]
    pub target: Option<PlayerId>,
}

/// Night submissions in the order they were first recorded.
///
/// At most one entry per (actor, kind); re-filing overwrites in place so the
/// first filing position is kept. Sheriff `check` and `kill` are exclusive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NightRegistry {
    entries: Vec<NightAction>,
}

impl NightRegistry {
    pub fn record(&mut self, action: NightAction, exclusive_with: Option<ActionKind>) {
        if let Some(other) = exclusive_with {
            self.entries
                .retain(|e| !(e.actor == action.actor && e.kind == other));
        }
        match self
            .entries
            .iter_mut()
            .find(|e| e.actor == action.actor && e.kind == action.kind)
        {
            Some(existing) => existing.target = action.target,
            None => self.entries.push(action),
        }
    }

    pub fn get(&self, actor: PlayerId, kind: ActionKind) -> Option<&NightAction> {
        self.entries
            .iter()
            .find(|e| e.actor == actor && e.kind == kind)
    }

    pub fn contains(&self, actor: PlayerId, kind: ActionKind) -> bool {
        self.get(actor, kind).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NightAction> {
        self.entries.iter()
    }

    pub fn of_kind(&self, kind: ActionKind) -> impl Iterator<Item = &NightAction> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    /// Drops every entry filed by one of `actors`.
    pub fn strip_actors(&mut self, actors: &[PlayerId]) {
        self.entries.retain(|e| !actors.contains(&e.actor));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
