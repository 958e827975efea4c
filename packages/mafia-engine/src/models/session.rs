use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::action::{ActionKind, NightRegistry};
use super::player::{Participant, Player, PlayerId};
use super::role::{Faction, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub i64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Lobby,
    Night,
    NightResolving,
    Day,
    Voting,
    FinalVote,
    Ended,
}

impl GamePhase {
    /// Phases that own a timer.
    pub fn is_timed(self) -> bool {
        matches!(
            self,
            GamePhase::Night | GamePhase::Day | GamePhase::Voting | GamePhase::FinalVote
        )
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinalChoice {
    Execute,
    Pardon,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalVotes {
    pub execute: BTreeSet<PlayerId>,
    pub pardon: BTreeSet<PlayerId>,
}

impl FinalVotes {
    /// Moves the voter's single ballot to `choice`.
    pub fn cast(&mut self, voter: PlayerId, choice: FinalChoice) {
        self.execute.remove(&voter);
        self.pardon.remove(&voter);
        match choice {
            FinalChoice::Execute => self.execute.insert(voter),
            FinalChoice::Pardon => self.pardon.insert(voter),
        };
    }

    pub fn counts(&self) -> (usize, usize) {
        (self.execute.len(), self.pardon.len())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Session {
    pub group: GroupId,
    pub players: Vec<Player>,
    pub phase: GamePhase,
    pub day_number: u32,
    #[serde(default)]
    pub night_actions: NightRegistry,
    /// target -> roles of everyone who visited them tonight
    #[serde(default)]
    pub night_visits: BTreeMap<PlayerId, Vec<Role>>,
    /// voter -> accused
    #[serde(default)]
    pub day_votes: BTreeMap<PlayerId, PlayerId>,
    #[serde(default)]
    pub final_votes: FinalVotes,
    #[serde(default)]
    pub execution_candidate: Option<PlayerId>,
    #[serde(default)]
    pub last_bite_target: Option<PlayerId>,
    #[serde(default)]
    pub current_bite_target: Option<PlayerId>,
    /// vampire -> controlled victim
    #[serde(default)]
    pub bite_links: BTreeMap<PlayerId, PlayerId>,
    #[serde(default)]
    pub lover_blocked_this_night: BTreeSet<PlayerId>,
    #[serde(default)]
    pub mafia_chat_open: bool,
    #[serde(default)]
    pub last_words: BTreeMap<PlayerId, String>,
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Session {{ group: {}, phase: {}, day: {}, players: {}, alive: {} }}",
            self.group,
            self.phase,
            self.day_number,
            self.players.len(),
            self.alive_count()
        )
    }
}

impl Session {
    pub fn new(group: GroupId) -> Self {
        Session {
            group,
            players: Vec::new(),
            phase: GamePhase::Lobby,
            day_number: 0,
            night_actions: NightRegistry::default(),
            night_visits: BTreeMap::new(),
            day_votes: BTreeMap::new(),
            final_votes: FinalVotes::default(),
            execution_candidate: None,
            last_bite_target: None,
            current_bite_target: None,
            bite_links: BTreeMap::new(),
            lover_blocked_this_night: BTreeSet::new(),
            mafia_chat_open: false,
            last_words: BTreeMap::new(),
        }
    }

    /// Test and tooling helper: a session with roles already dealt.
    pub fn with_roles(group: GroupId, roster: &[(i64, &str, Role)]) -> Self {
        let mut session = Session::new(group);
        for (id, name, role) in roster {
            let mut player = Player::new(Participant::new(*id, *name));
            player.role = Some(*role);
            session.players.push(player);
        }
        session
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn alive_player(&self, id: PlayerId) -> Option<&Player> {
        self.player(id).filter(|p| p.is_alive)
    }

    pub fn is_alive(&self, id: PlayerId) -> bool {
        self.alive_player(id).is_some()
    }

    pub fn role_of(&self, id: PlayerId) -> Option<Role> {
        self.player(id).and_then(|p| p.role)
    }

    pub fn alive(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_alive)
    }

    pub fn alive_ids(&self) -> Vec<PlayerId> {
        self.alive().map(|p| p.id).collect()
    }

    pub fn alive_count(&self) -> usize {
        self.alive().count()
    }

    pub fn alive_with_role(&self, role: Role) -> Option<&Player> {
        self.alive().find(|p| p.has_role(role))
    }

    pub fn don_alive(&self) -> bool {
        self.alive_with_role(Role::Don).is_some()
    }

    pub fn alive_in_faction(&self, faction: Faction) -> Vec<&Player> {
        self.alive()
            .filter(|p| p.role.map(|r| r.faction()) == Some(faction))
            .collect()
    }

    /// The living Vampire currently steering `victim`'s vote, if any.
    pub fn controller_of(&self, victim: PlayerId) -> Option<PlayerId> {
        self.bite_links
            .iter()
            .find(|(vampire, bitten)| **bitten == victim && self.is_alive(**vampire))
            .map(|(vampire, _)| *vampire)
    }

    /// The living victim a Vampire currently controls, if any.
    pub fn controlled_by(&self, vampire: PlayerId) -> Option<PlayerId> {
        if !self.is_alive(vampire) {
            return None;
        }
        self.bite_links
            .get(&vampire)
            .copied()
            .filter(|victim| self.is_alive(*victim))
    }

    /// Rebuilds the visit log and the per-night indexes from the registry.
    pub fn reindex_night(&mut self) {
        let mut visits: BTreeMap<PlayerId, Vec<Role>> = BTreeMap::new();
        let mut blocked = BTreeSet::new();
        let mut bite = None;

        for action in self.night_actions.iter() {
            let Some(target) = action.target else {
                continue;
            };
            if let Some(role) = self.role_of(action.actor) {
                visits.entry(target).or_default().push(role);
            }
            match action.kind {
                ActionKind::LoverVisit => {
                    blocked.insert(target);
                }
                ActionKind::VampireBite => bite = Some(target),
                _ => {}
            }
        }

        self.night_visits = visits;
        self.lover_blocked_this_night = blocked;
        self.current_bite_target = bite;
    }

    pub fn visitors_of(&self, target: PlayerId) -> &[Role] {
        self.night_visits
            .get(&target)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn kill(&mut self, id: PlayerId) -> bool {
        match self.player_mut(id) {
            Some(player) if player.is_alive => {
                player.is_alive = false;
                true
            }
            _ => false,
        }
    }
}
