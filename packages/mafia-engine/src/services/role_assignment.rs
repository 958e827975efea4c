use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::error::ActionError;
use crate::models::role::Role;
use crate::models::session::Session;

pub const MIN_PLAYERS: usize = 4;
pub const MAX_PLAYERS: usize = 10;

/// Role distribution keyed by table size.
pub trait RoleTable: Send + Sync {
    fn roles_for(&self, players: usize) -> Result<Vec<Role>, ActionError>;
}

/// Fixed tables for 4-7 players and the flat fallback for 8-10.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClassicRoleTable;

impl RoleTable for ClassicRoleTable {
    fn roles_for(&self, players: usize) -> Result<Vec<Role>, ActionError> {
        use Role::*;
        let roles = match players {
            4 => vec![Sheriff, Vampire, Doctor, Lover],
            5 => vec![Sheriff, Advocate, Doctor, Stukach, Civilian],
            6 => vec![Sheriff, Don, Doctor, Advocate, Lover, Civilian],
            7 => vec![Sheriff, Vampire, Doctor, Advocate, Lover, Bum, Civilian],
            // TODO: balance 8-10 once there is a product decision; it stays flat 1 Mafia / 1 Sheriff
            8..=MAX_PLAYERS => {
                let mut roles = vec![Mafia, Sheriff];
                roles.resize(players, Civilian);
                roles
            }
            _ => return Err(ActionError::RosterSize(players)),
        };
        Ok(roles)
    }
}

/// Shuffles the roster and deals one role per seat.
///
/// Fails without touching the session when the table has no row for the
/// roster size or when roles were already dealt.
pub fn assign_roles<R: Rng + ?Sized>(
    session: &mut Session,
    table: &dyn RoleTable,
    rng: &mut R,
) -> Result<(), ActionError> {
    let count = session.players.len();
    let roles = table.roles_for(count)?;
    if roles.len() != count || session.players.iter().any(|p| p.role.is_some()) {
        return Err(ActionError::RosterSize(count));
    }

    let mut seats: Vec<usize> = (0..count).collect();
    seats.shuffle(rng);

    for (seat, role) in seats.into_iter().zip(roles) {
        session.players[seat].role = Some(role);
    }

    debug!(group = %session.group, players = count, "roles dealt");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::player::{Participant, Player};
    use crate::models::session::GroupId;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn lobby(count: usize) -> Session {
        let mut session = Session::new(GroupId(1));
        for i in 0..count {
            session
                .players
                .push(Player::new(Participant::new(i as i64 + 1, format!("P{}", i + 1))));
        }
        session
    }

    fn dealt(session: &Session) -> Vec<Role> {
        let mut roles: Vec<Role> = session.players.iter().filter_map(|p| p.role).collect();
        roles.sort_by_key(|r| *r as u8);
        roles
    }

    #[test]
    fn every_small_table_gets_exactly_its_roles() {
        let mut rng = StdRng::seed_from_u64(7);
        for count in MIN_PLAYERS..=7 {
            let mut session = lobby(count);
            assign_roles(&mut session, &ClassicRoleTable, &mut rng).unwrap();

            let mut expected = ClassicRoleTable.roles_for(count).unwrap();
            expected.sort_by_key(|r| *r as u8);
            assert_eq!(dealt(&session), expected);
            assert!(session.players.iter().all(|p| p.role.is_some()));
        }
    }

    #[test]
    fn large_tables_fall_back_to_one_mafia_one_sheriff() {
        for count in 8..=MAX_PLAYERS {
            let roles = ClassicRoleTable.roles_for(count).unwrap();
            assert_eq!(roles.len(), count);
            assert_eq!(roles.iter().filter(|r| **r == Role::Mafia).count(), 1);
            assert_eq!(roles.iter().filter(|r| **r == Role::Sheriff).count(), 1);
            assert_eq!(roles.iter().filter(|r| **r == Role::Civilian).count(), count - 2);
        }
    }

    #[test]
    fn out_of_range_sizes_are_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        for count in [0, 3, 11] {
            let mut session = lobby(count);
            assert_eq!(
                assign_roles(&mut session, &ClassicRoleTable, &mut rng),
                Err(ActionError::RosterSize(count))
            );
            assert!(session.players.iter().all(|p| p.role.is_none()));
        }
    }

    #[test]
    fn roles_are_dealt_only_once() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut session = lobby(5);
        assign_roles(&mut session, &ClassicRoleTable, &mut rng).unwrap();
        let first = session.clone();

        assert!(assign_roles(&mut session, &ClassicRoleTable, &mut rng).is_err());
        assert_eq!(session, first);
    }

    #[test]
    fn shuffle_moves_roles_between_seats() {
        let mut rng = StdRng::seed_from_u64(42);
        let seat_roles: Vec<Role> = (0..20)
            .map(|_| {
                let mut session = lobby(4);
                assign_roles(&mut session, &ClassicRoleTable, &mut rng).unwrap();
                session.players[0].role.unwrap()
            })
            .collect();
        assert!(seat_roles.iter().any(|r| *r != seat_roles[0]));
    }
}
