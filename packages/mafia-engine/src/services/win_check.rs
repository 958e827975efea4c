use crate::models::event::{EventKind, RosterEntry};
use crate::models::player::Player;
use crate::models::role::Faction;
use crate::models::session::Session;

#[derive(Debug, Clone, PartialEq)]
pub struct GameOutcome {
    /// `None` only for an aborted session.
    pub winner: Option<Faction>,
    pub winners: Vec<RosterEntry>,
    pub others: Vec<RosterEntry>,
}

impl GameOutcome {
    pub fn into_event(self) -> EventKind {
        EventKind::GameOver {
            winner: self.winner,
            winners: self.winners,
            others: self.others,
        }
    }
}

/// Head-count check run after every death. The Maniac counts as town.
///
/// Fewer than two survivors always satisfies one of the faction conditions,
/// so it needs no branch of its own.
pub fn evaluate(session: &Session) -> Option<GameOutcome> {
    let alive = session.alive_count();
    let mafia = session.alive_in_faction(Faction::Mafia).len();
    let town = alive - mafia;

    let winner = if mafia == 0 {
        Some(Faction::Town)
    } else if mafia >= town {
        Some(Faction::Mafia)
    } else {
        return None;
    };

    Some(report(session, winner))
}

/// Splits the roster into winners and everyone else.
pub fn report(session: &Session, winner: Option<Faction>) -> GameOutcome {
    let (winners, others): (Vec<&Player>, Vec<&Player>) = session.players.iter().partition(|p| {
        p.is_alive && winner.is_some() && p.role.map(|r| r.faction()) == winner
    });

    GameOutcome {
        winner,
        winners: winners.into_iter().filter_map(entry).collect(),
        others: others.into_iter().filter_map(entry).collect(),
    }
}

fn entry(player: &Player) -> Option<RosterEntry> {
    Some(RosterEntry {
        player: player.id,
        name: player.name.clone(),
        role: player.role?,
        alive: player.is_alive,
    })
}
