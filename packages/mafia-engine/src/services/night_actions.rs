//! Night action registry: validation, completion detection and resolution.
//!
//! Everything here is synchronous and works on a borrowed [`Session`]; the
//! supervisor in `game_service` owns locking, timers and event delivery.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::error::{ActionError, Cooldown};
use crate::models::action::{ActionKind, NightAction, NightActionRequest};
use crate::models::event::{Audience, DeathReport, EventKind, GameEvent, VisitNotice};
use crate::models::player::PlayerId;
use crate::models::role::Role;
use crate::models::session::{GamePhase, Session};

/// A kill that is about to be attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Strike {
    killer: PlayerId,
    killer_role: Role,
    target: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Death {
    pub player: PlayerId,
    pub role: Role,
    pub killer: PlayerId,
    pub killer_role: Role,
}

#[derive(Debug, Clone, Default)]
pub struct NightOutcome {
    pub deaths: Vec<Death>,
    /// Targets whose kill was voided by the Doctor.
    pub saved: BTreeSet<PlayerId>,
    pub events: Vec<GameEvent>,
}

/// Checks a submission against the session without mutating anything.
pub fn validate(session: &Session, request: &NightActionRequest) -> Result<NightAction, ActionError> {
    if session.phase != GamePhase::Night {
        return Err(ActionError::InvalidPhase {
            expected: GamePhase::Night,
            actual: session.phase,
        });
    }

    let actor = session
        .player(request.actor)
        .ok_or(ActionError::NotAParticipant)?;
    if !actor.is_alive {
        return Err(ActionError::ActorNotAlive);
    }
    let role = actor.role.ok_or(ActionError::NotAParticipant)?;
    let kind = request.kind;

    let mismatch = ActionError::RoleMismatch { role, kind };
    if !role.can_file(kind) {
        return Err(mismatch);
    }
    match (role, kind) {
        (Role::Advocate, ActionKind::Alibi) if !session.don_alive() => return Err(mismatch),
        (Role::Vampire, ActionKind::Kill) => {
            let bitten = session
                .night_actions
                .get(actor.id, ActionKind::VampireBite)
                .map(|a| a.target.is_some())
                .unwrap_or(false);
            if !bitten {
                return Err(mismatch);
            }
        }
        _ => {}
    }

    let Some(target_id) = request.target else {
        if kind.allows_skip() {
            return Ok(NightAction::new(actor.id, kind, None));
        }
        return Err(ActionError::MissingTarget);
    };
    let target = session
        .alive_player(target_id)
        .ok_or(ActionError::UnknownOrDeadTarget)?;

    let own = target.id == actor.id;
    if own && !matches!(kind, ActionKind::Guard | ActionKind::Alibi) {
        return Err(ActionError::SelfTarget);
    }
    if !own && kind.is_harmful() && actor.is_ally_of(target) {
        return Err(ActionError::AllyTargetForbidden);
    }

    match kind {
        ActionKind::Guard if own && actor.self_heal_used => {
            return Err(ActionError::CooldownViolation(Cooldown::SelfHeal));
        }
        ActionKind::Alibi if own && actor.alibi_given_to_self => {
            return Err(ActionError::CooldownViolation(Cooldown::SelfAlibi));
        }
        ActionKind::Alibi if !own => {
            if let Some(night) = actor.alibi_history.get(&target.id) {
                if night + 1 >= session.day_number {
                    return Err(ActionError::CooldownViolation(Cooldown::AlibiRepeat));
                }
            }
        }
        ActionKind::VampireBite => {
            if target.has_role(Role::Sheriff) {
                return Err(ActionError::TargetImmune);
            }
            if session.last_bite_target == Some(target.id) {
                return Err(ActionError::CooldownViolation(Cooldown::RepeatBite));
            }
        }
        _ => {}
    }

    Ok(NightAction::new(actor.id, kind, Some(target.id)))
}

/// Stores a validated action, replacing the actor's earlier entry of the
/// same kind, and returns the confirmation events.
pub fn record(session: &mut Session, action: NightAction) -> Vec<GameEvent> {
    let role = session.role_of(action.actor);
    let exclusive_with = match (role, action.kind) {
        (Some(Role::Sheriff), ActionKind::Check) => Some(ActionKind::Kill),
        (Some(Role::Sheriff), ActionKind::Kill) => Some(ActionKind::Check),
        _ => None,
    };

    let group = session.group;
    let mut events = vec![GameEvent::private(
        group,
        action.actor,
        EventKind::ActionRecorded {
            actor: action.actor,
            kind: action.kind,
            target: action.target,
        },
    )];
    if let Some(role) = role.filter(|r| stirs_publicly(*r)) {
        if action.target.is_some() {
            events.push(GameEvent::group(group, EventKind::RoleStirred { role }));
        }
    }

    debug!(group = %group, actor = %action.actor, kind = %action.kind, "night action recorded");
    session.night_actions.record(action, exclusive_with);
    session.reindex_night();
    events
}

/// Roles whose move is hinted to the whole table.
fn stirs_publicly(role: Role) -> bool {
    !matches!(role, Role::Mafia | Role::Maniac | Role::Advocate | Role::Civilian)
}

/// What each living night-capable participant must file before the night
/// can close early. Any kind in a slice satisfies that requirement.
pub fn required_actions(session: &Session) -> Vec<(PlayerId, &'static [ActionKind])> {
    let don_alive = session.don_alive();
    let mut required = Vec::new();

    for player in session.alive() {
        let Some(role) = player.role else {
            continue;
        };
        match role {
            Role::Mafia | Role::Don | Role::Maniac => {
                required.push((player.id, &[ActionKind::Kill][..]));
            }
            Role::Advocate => {
                if don_alive {
                    required.push((player.id, &[ActionKind::Alibi][..]));
                }
                required.push((player.id, &[ActionKind::Kill][..]));
            }
            Role::Sheriff => required.push((player.id, &[ActionKind::Check, ActionKind::Kill][..])),
            Role::Doctor => required.push((player.id, &[ActionKind::Guard][..])),
            Role::Stukach => required.push((player.id, &[ActionKind::StukachCheck][..])),
            Role::Lover => required.push((player.id, &[ActionKind::LoverVisit][..])),
            Role::Vampire => {
                required.push((player.id, &[ActionKind::VampireBite][..]));
                // a bite opens the follow-up kill, which must then be filed or skipped
                let bitten = session
                    .night_actions
                    .get(player.id, ActionKind::VampireBite)
                    .is_some_and(|a| a.target.is_some());
                if bitten {
                    required.push((player.id, &[ActionKind::Kill][..]));
                }
            }
            Role::Bum => required.push((player.id, &[ActionKind::BumVisit][..])),
            Role::Civilian => {}
        }
    }
    required
}

pub fn is_complete(session: &Session) -> bool {
    session.phase == GamePhase::Night
        && required_actions(session).iter().all(|(actor, kinds)| {
            kinds
                .iter()
                .any(|kind| session.night_actions.contains(*actor, *kind))
        })
}

/// Resolves the night exactly once.
///
/// Returns `None` when the session is no longer in `Night`, which is how a
/// late timer and an early-completion trigger are told apart. On success the
/// session is left in `NightResolving`; the caller moves it on.
pub fn resolve<R: Rng + ?Sized>(session: &mut Session, rng: &mut R) -> Option<NightOutcome> {
    if session.phase != GamePhase::Night {
        return None;
    }
    session.phase = GamePhase::NightResolving;

    let group = session.group;
    // the Lover's block does not reach the Doctor's guard
    let guards: Vec<(PlayerId, PlayerId)> = session
        .night_actions
        .of_kind(ActionKind::Guard)
        .filter_map(|a| a.target.map(|target| (a.actor, target)))
        .collect();
    let blocked: Vec<PlayerId> = session.lover_blocked_this_night.iter().copied().collect();
    session.night_actions.strip_actors(&blocked);

    let don_alive = session.don_alive();
    let mut don_kill = None;
    let mut advocate_kill = None;
    let mut sheriff_kill = None;
    let mut vampire_kill = None;
    let mut other_kills = Vec::new();

    for action in session.night_actions.of_kind(ActionKind::Kill) {
        let Some(target) = action.target.filter(|t| session.is_alive(*t)) else {
            continue;
        };
        let Some(killer_role) = session.role_of(action.actor) else {
            continue;
        };
        let strike = Strike {
            killer: action.actor,
            killer_role,
            target,
        };
        match killer_role {
            Role::Don => don_kill = Some(strike),
            Role::Advocate => advocate_kill = Some(strike),
            Role::Sheriff => sheriff_kill = Some(strike),
            Role::Vampire => vampire_kill = Some(strike),
            _ => other_kills.push(strike),
        }
    }

    let primary = if don_alive {
        don_kill.or_else(|| other_kills.first().copied())
    } else {
        advocate_kill.or_else(|| other_kills.choose(rng).copied())
    };

    let guarded: BTreeSet<PlayerId> = guards.iter().map(|(_, patient)| *patient).collect();

    let mut outcome = NightOutcome::default();
    let primary_landed = primary
        .map(|strike| land(session, strike, &guarded, &mut outcome))
        .unwrap_or(false);
    if let Some(strike) = vampire_kill {
        if !primary_landed && (!don_alive || don_kill.is_none()) {
            land(session, strike, &guarded, &mut outcome);
        }
    }
    if let Some(strike) = sheriff_kill {
        land(session, strike, &guarded, &mut outcome);
    }

    apply_guards(session, &guards);
    apply_standing_actions(session, &mut outcome);
    apply_bite(session, &guarded, &mut outcome);

    for death in &outcome.deaths {
        outcome.events.push(GameEvent::private(
            group,
            death.player,
            EventKind::LastWordsOffered {
                player: death.player,
            },
        ));
    }

    let deaths = outcome
        .deaths
        .iter()
        .map(|d| DeathReport {
            player: d.player,
            role: d.role,
            killer_role: d.killer_role,
            visitors: session
                .visitors_of(d.player)
                .iter()
                .copied()
                .filter(|r| !matches!(r, Role::Doctor | Role::Bum))
                .collect(),
        })
        .collect();
    outcome.events.push(GameEvent::group(
        group,
        EventKind::Morning {
            day: session.day_number,
            deaths,
        },
    ));

    reveal_coincidence(session, &mut outcome);
    bum_witness(session, &mut outcome);
    visit_notices(session, &mut outcome);
    doctor_reports(session, &guards, &mut outcome);

    info!(
        group = %group,
        day = session.day_number,
        deaths = outcome.deaths.len(),
        saved = outcome.saved.len(),
        "night resolved"
    );
    Some(outcome)
}

fn land(
    session: &mut Session,
    strike: Strike,
    guarded: &BTreeSet<PlayerId>,
    outcome: &mut NightOutcome,
) -> bool {
    if guarded.contains(&strike.target) {
        outcome.saved.insert(strike.target);
        return false;
    }
    if outcome.deaths.iter().any(|d| d.player == strike.target) {
        return false;
    }
    let Some(role) = session.role_of(strike.target) else {
        return false;
    };
    if !session.kill(strike.target) {
        return false;
    }
    outcome.deaths.push(Death {
        player: strike.target,
        role,
        killer: strike.killer,
        killer_role: strike.killer_role,
    });
    true
}

fn apply_guards(session: &mut Session, guards: &[(PlayerId, PlayerId)]) {
    for &(actor, patient) in guards {
        if let Some(doctor) = session.player_mut(actor) {
            doctor.last_guarded_target = Some(patient);
            if patient == doctor.id {
                doctor.self_heal_used = true;
            }
        }
    }
}

/// Side effects of actions that survived the Lover's block.
fn apply_standing_actions(session: &mut Session, outcome: &mut NightOutcome) {
    let day = session.day_number;
    let group = session.group;
    let standing: Vec<NightAction> = session.night_actions.iter().cloned().collect();

    for action in standing {
        let Some(target) = action.target else {
            continue;
        };
        match action.kind {
            ActionKind::Alibi => {
                if let Some(advocate) = session.player_mut(action.actor) {
                    advocate.alibi_current = Some(target);
                    advocate.alibi_history.insert(target, day);
                    if target == advocate.id {
                        advocate.alibi_given_to_self = true;
                    }
                }
            }
            ActionKind::StukachCheck => {
                if let Some(stukach) = session.player_mut(action.actor) {
                    stukach.stukach_target = Some(target);
                }
            }
            ActionKind::LoverVisit => {
                if let Some(victim) = session.player_mut(target) {
                    victim.vote_blocked = true;
                }
            }
            ActionKind::Check => {
                if let Some(role) = session.role_of(target) {
                    outcome.events.push(GameEvent::private(
                        group,
                        action.actor,
                        EventKind::SheriffReport {
                            target,
                            appears_mafia: role.appears_mafia(),
                        },
                    ));
                }
            }
            _ => {}
        }
    }
}

fn apply_bite(session: &mut Session, guarded: &BTreeSet<PlayerId>, outcome: &mut NightOutcome) {
    let Some(bite) = session
        .night_actions
        .of_kind(ActionKind::VampireBite)
        .next()
        .cloned()
    else {
        return;
    };
    let Some(victim) = bite.target else {
        return;
    };
    if !session.is_alive(bite.actor) || !session.is_alive(victim) || guarded.contains(&victim) {
        return;
    }

    let already_controlled = session.bite_links.get(&bite.actor) == Some(&victim);
    session.bite_links.insert(bite.actor, victim);
    if !already_controlled {
        outcome.events.push(GameEvent::new(
            session.group,
            Audience::Players(vec![bite.actor, victim]),
            EventKind::BiteTookHold {
                vampire: bite.actor,
                victim,
            },
        ));
    }
}

/// The Stukach and the Sheriff checked the same participant: everyone learns
/// that participant's role.
fn reveal_coincidence(session: &Session, outcome: &mut NightOutcome) {
    let Some(stukach) = session.alive_with_role(Role::Stukach) else {
        return;
    };
    let sheriff_check = session
        .night_actions
        .of_kind(ActionKind::Check)
        .find_map(|a| a.target);
    let stukach_check = session
        .night_actions
        .get(stukach.id, ActionKind::StukachCheck)
        .and_then(|a| a.target);

    if let (Some(a), Some(b)) = (sheriff_check, stukach_check) {
        if a == b {
            if let Some(role) = session.role_of(a) {
                outcome.events.push(GameEvent::group(
                    session.group,
                    EventKind::RoleRevealed { player: a, role },
                ));
            }
        }
    }
}

fn bum_witness(session: &Session, outcome: &mut NightOutcome) {
    let Some(bum) = session.alive_with_role(Role::Bum) else {
        return;
    };
    let Some(visited) = session
        .night_actions
        .get(bum.id, ActionKind::BumVisit)
        .and_then(|a| a.target)
    else {
        return;
    };
    if let Some(death) = outcome.deaths.iter().find(|d| d.player == visited) {
        outcome.events.push(GameEvent::private(
            session.group,
            bum.id,
            EventKind::BumWitness {
                victim: death.player,
                killer: death.killer,
                killer_role: death.killer_role,
            },
        ));
    }
}

fn visit_notices(session: &Session, outcome: &mut NightOutcome) {
    for player in &session.players {
        let visitors = session.visitors_of(player.id);
        if visitors.is_empty() {
            continue;
        }

        let has_doctor = visitors.contains(&Role::Doctor);
        let has_lover = visitors.contains(&Role::Lover);
        let mut notices = Vec::new();
        if has_doctor && has_lover {
            notices.push(VisitNotice::LoverSentAwayByDoctor);
        }

        let mut seen = Vec::new();
        for role in visitors {
            if seen.contains(role) {
                continue;
            }
            seen.push(*role);

            let notice = match role {
                Role::Sheriff => Some(VisitNotice::SomeoneCurious),
                Role::Doctor if outcome.saved.contains(&player.id) => Some(VisitNotice::DoctorHealed),
                Role::Doctor => Some(VisitNotice::DoctorVisited),
                Role::Don => outcome
                    .deaths
                    .iter()
                    .any(|d| d.player == player.id && d.killer_role == Role::Don)
                    .then_some(VisitNotice::KilledByDon),
                Role::Vampire if session.current_bite_target == Some(player.id) => {
                    if has_doctor {
                        Some(VisitNotice::VampireRepelledByDoctor)
                    } else {
                        Some(VisitNotice::VampireBit)
                    }
                }
                Role::Lover if !has_doctor => Some(VisitNotice::LoverVisited),
                _ => None,
            };
            notices.extend(notice);
        }

        if !notices.is_empty() {
            outcome.events.push(GameEvent::private(
                session.group,
                player.id,
                EventKind::Visited {
                    player: player.id,
                    notices,
                },
            ));
        }
    }
}

/// A save is reported with the Vampire or Lover who came by; a guard that
/// saved nobody and met neither is reported as not needed. Anything else
/// stays silent.
fn doctor_reports(session: &Session, guards: &[(PlayerId, PlayerId)], outcome: &mut NightOutcome) {
    for &(doctor, patient) in guards {
        if !session.is_alive(doctor) {
            continue;
        }
        let mut visitors = Vec::new();
        for role in session.visitors_of(patient) {
            if matches!(role, Role::Vampire | Role::Lover) && !visitors.contains(role) {
                visitors.push(*role);
            }
        }
        let saved = outcome.saved.contains(&patient);
        if saved == visitors.is_empty() {
            continue;
        }
        outcome.events.push(GameEvent::private(
            session.group,
            doctor,
            EventKind::DoctorReport {
                patient,
                saved,
                visitors,
            },
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::GroupId;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn night(roster: &[(i64, &str, Role)]) -> Session {
        let mut session = Session::with_roles(GroupId(-1), roster);
        session.phase = GamePhase::Night;
        session.day_number = 1;
        session
    }

    fn submit(session: &mut Session, actor: i64, kind: ActionKind, target: Option<i64>) {
        let request = NightActionRequest {
            actor: PlayerId(actor),
            kind,
            target: target.map(PlayerId),
        };
        let action = validate(session, &request).expect("valid action");
        record(session, action);
    }

    fn try_submit(
        session: &Session,
        actor: i64,
        kind: ActionKind,
        target: Option<i64>,
    ) -> Result<NightAction, ActionError> {
        validate(
            session,
            &NightActionRequest {
                actor: PlayerId(actor),
                kind,
                target: target.map(PlayerId),
            },
        )
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    fn six() -> Session {
        night(&[
            (1, "Sheriff", Role::Sheriff),
            (2, "Don", Role::Don),
            (3, "Doctor", Role::Doctor),
            (4, "Advocate", Role::Advocate),
            (5, "Lover", Role::Lover),
            (6, "Civ", Role::Civilian),
        ])
    }

    fn dead(outcome: &NightOutcome) -> Vec<i64> {
        outcome.deaths.iter().map(|d| d.player.0).collect()
    }

    #[test]
    fn don_kill_overrides_advocate_and_mafia() {
        let mut session = night(&[
            (1, "Don", Role::Don),
            (2, "Advocate", Role::Advocate),
            (3, "Mafia", Role::Mafia),
            (4, "Civ A", Role::Civilian),
            (5, "Civ B", Role::Civilian),
            (6, "Civ C", Role::Civilian),
        ]);
        submit(&mut session, 3, ActionKind::Kill, Some(5));
        submit(&mut session, 2, ActionKind::Kill, Some(6));
        submit(&mut session, 1, ActionKind::Kill, Some(4));

        let outcome = resolve(&mut session, &mut rng()).unwrap();
        assert_eq!(dead(&outcome), vec![4]);
        assert_eq!(outcome.deaths[0].killer_role, Role::Don);
    }

    #[test]
    fn advocate_kill_only_counts_without_a_living_don() {
        let mut session = six();
        session.kill(PlayerId(2));
        submit(&mut session, 4, ActionKind::Kill, Some(6));

        let outcome = resolve(&mut session, &mut rng()).unwrap();
        assert_eq!(dead(&outcome), vec![6]);
        assert_eq!(outcome.deaths[0].killer_role, Role::Advocate);
    }

    #[test]
    fn advocate_kill_is_suppressed_while_don_lives() {
        let mut session = six();
        submit(&mut session, 2, ActionKind::Kill, None);
        submit(&mut session, 4, ActionKind::Kill, Some(6));

        let outcome = resolve(&mut session, &mut rng()).unwrap();
        assert!(outcome.deaths.is_empty());
    }

    #[test]
    fn guarded_target_survives_every_kill_path() {
        let mut session = six();
        submit(&mut session, 2, ActionKind::Kill, Some(6));
        submit(&mut session, 1, ActionKind::Kill, Some(6));
        submit(&mut session, 3, ActionKind::Guard, Some(6));

        let outcome = resolve(&mut session, &mut rng()).unwrap();
        assert!(outcome.deaths.is_empty());
        assert!(outcome.saved.contains(&PlayerId(6)));
        assert!(session.is_alive(PlayerId(6)));
        assert!(outcome.events.iter().any(|e| matches!(
            &e.kind,
            EventKind::Morning { deaths, .. } if deaths.is_empty()
        )));
    }

    #[test]
    fn sheriff_kill_lands_alongside_the_mafia_kill() {
        let mut session = six();
        submit(&mut session, 2, ActionKind::Kill, Some(6));
        submit(&mut session, 1, ActionKind::Kill, Some(4));

        let outcome = resolve(&mut session, &mut rng()).unwrap();
        let mut victims = dead(&outcome);
        victims.sort();
        assert_eq!(victims, vec![4, 6]);
    }

    #[test]
    fn same_target_is_not_killed_twice() {
        let mut session = six();
        submit(&mut session, 2, ActionKind::Kill, Some(6));
        submit(&mut session, 1, ActionKind::Kill, Some(6));

        let outcome = resolve(&mut session, &mut rng()).unwrap();
        assert_eq!(dead(&outcome), vec![6]);
        assert_eq!(outcome.deaths[0].killer_role, Role::Don);
    }

    #[test]
    fn lover_block_nullifies_the_visited_actor() {
        let mut session = six();
        submit(&mut session, 2, ActionKind::Kill, Some(6));
        submit(&mut session, 5, ActionKind::LoverVisit, Some(2));

        let outcome = resolve(&mut session, &mut rng()).unwrap();
        assert!(outcome.deaths.is_empty());
        assert!(session.player(PlayerId(2)).unwrap().vote_blocked);
    }

    #[test]
    fn blocked_doctor_still_guards() {
        let mut session = six();
        submit(&mut session, 2, ActionKind::Kill, Some(6));
        submit(&mut session, 3, ActionKind::Guard, Some(6));
        submit(&mut session, 5, ActionKind::LoverVisit, Some(3));

        let outcome = resolve(&mut session, &mut rng()).unwrap();
        assert!(outcome.deaths.is_empty());
        assert!(session.is_alive(PlayerId(6)));
        assert!(outcome.saved.contains(&PlayerId(6)));
        let doctor = session.player(PlayerId(3)).unwrap();
        assert_eq!(doctor.last_guarded_target, Some(PlayerId(6)));
        assert!(doctor.vote_blocked);
    }

    #[test]
    fn resolution_runs_once() {
        let mut session = six();
        submit(&mut session, 2, ActionKind::Kill, Some(6));
        assert!(resolve(&mut session, &mut rng()).is_some());

        let before = session.clone();
        assert!(resolve(&mut session, &mut rng()).is_none());
        assert_eq!(session, before);
    }

    #[test]
    fn kill_on_target_that_died_meanwhile_is_dropped() {
        let mut session = six();
        submit(&mut session, 2, ActionKind::Kill, Some(6));
        session.kill(PlayerId(6));

        let outcome = resolve(&mut session, &mut rng()).unwrap();
        assert!(outcome.deaths.is_empty());
    }

    #[test]
    fn completion_tracks_every_required_pair() {
        let mut session = six();
        assert!(!is_complete(&session));

        submit(&mut session, 1, ActionKind::Check, Some(2));
        submit(&mut session, 2, ActionKind::Kill, Some(6));
        submit(&mut session, 3, ActionKind::Guard, Some(3));
        submit(&mut session, 4, ActionKind::Kill, None);
        submit(&mut session, 5, ActionKind::LoverVisit, Some(6));
        assert!(!is_complete(&session), "advocate still owes an alibi while the don lives");

        submit(&mut session, 4, ActionKind::Alibi, None);
        assert!(is_complete(&session));
    }

    #[test]
    fn doctor_self_heal_is_once_per_session() {
        let mut session = six();
        submit(&mut session, 3, ActionKind::Guard, Some(3));
        resolve(&mut session, &mut rng()).unwrap();
        assert!(session.player(PlayerId(3)).unwrap().self_heal_used);

        session.phase = GamePhase::Night;
        session.day_number = 2;
        session.night_actions.clear();
        assert_eq!(
            try_submit(&session, 3, ActionKind::Guard, Some(3)),
            Err(ActionError::CooldownViolation(Cooldown::SelfHeal))
        );
        assert!(try_submit(&session, 3, ActionKind::Guard, Some(1)).is_ok());
    }

    #[test]
    fn alibi_cooldowns() {
        let mut session = six();
        submit(&mut session, 4, ActionKind::Alibi, Some(6));
        resolve(&mut session, &mut rng()).unwrap();
        assert_eq!(session.player(PlayerId(4)).unwrap().alibi_current, Some(PlayerId(6)));

        session.phase = GamePhase::Night;
        session.day_number = 2;
        session.night_actions.clear();
        assert_eq!(
            try_submit(&session, 4, ActionKind::Alibi, Some(6)),
            Err(ActionError::CooldownViolation(Cooldown::AlibiRepeat))
        );
        submit(&mut session, 4, ActionKind::Alibi, Some(4));
        resolve(&mut session, &mut rng()).unwrap();

        session.phase = GamePhase::Night;
        session.day_number = 3;
        session.night_actions.clear();
        assert!(try_submit(&session, 4, ActionKind::Alibi, Some(6)).is_ok());
        assert_eq!(
            try_submit(&session, 4, ActionKind::Alibi, Some(4)),
            Err(ActionError::CooldownViolation(Cooldown::SelfAlibi))
        );
    }

    #[test]
    fn alibi_needs_a_living_don() {
        let mut session = six();
        session.kill(PlayerId(2));
        assert!(matches!(
            try_submit(&session, 4, ActionKind::Alibi, Some(6)),
            Err(ActionError::RoleMismatch { .. })
        ));
    }

    #[test]
    fn allies_cannot_be_killed() {
        let session = six();
        assert_eq!(
            try_submit(&session, 2, ActionKind::Kill, Some(4)),
            Err(ActionError::AllyTargetForbidden)
        );
    }

    #[test]
    fn rejections_cover_phase_role_and_target() {
        let mut session = six();
        assert!(matches!(
            try_submit(&session, 6, ActionKind::Kill, Some(2)),
            Err(ActionError::RoleMismatch { .. })
        ));
        assert_eq!(
            try_submit(&session, 3, ActionKind::Guard, None),
            Err(ActionError::MissingTarget)
        );
        assert_eq!(
            try_submit(&session, 2, ActionKind::Kill, Some(2)),
            Err(ActionError::SelfTarget)
        );
        assert_eq!(
            try_submit(&session, 2, ActionKind::Kill, Some(42)),
            Err(ActionError::UnknownOrDeadTarget)
        );
        assert_eq!(
            try_submit(&session, 42, ActionKind::Kill, Some(1)),
            Err(ActionError::NotAParticipant)
        );

        session.phase = GamePhase::Day;
        assert!(matches!(
            try_submit(&session, 2, ActionKind::Kill, Some(6)),
            Err(ActionError::InvalidPhase { .. })
        ));
    }

    fn seven() -> Session {
        night(&[
            (1, "Sheriff", Role::Sheriff),
            (2, "Vampire", Role::Vampire),
            (3, "Doctor", Role::Doctor),
            (4, "Advocate", Role::Advocate),
            (5, "Lover", Role::Lover),
            (6, "Bum", Role::Bum),
            (7, "Civ", Role::Civilian),
        ])
    }

    #[test]
    fn vampire_must_bite_before_killing() {
        let mut session = seven();
        assert!(matches!(
            try_submit(&session, 2, ActionKind::Kill, Some(7)),
            Err(ActionError::RoleMismatch { .. })
        ));

        submit(&mut session, 2, ActionKind::VampireBite, Some(5));
        submit(&mut session, 2, ActionKind::Kill, Some(7));

        let outcome = resolve(&mut session, &mut rng()).unwrap();
        assert_eq!(dead(&outcome), vec![7]);
        assert_eq!(session.controller_of(PlayerId(5)), Some(PlayerId(2)));
        assert!(outcome
            .events
            .iter()
            .any(|e| matches!(e.kind, EventKind::BiteTookHold { .. })));
    }

    #[test]
    fn vampire_bite_limits() {
        let mut session = seven();
        assert_eq!(
            try_submit(&session, 2, ActionKind::VampireBite, Some(1)),
            Err(ActionError::TargetImmune)
        );
        assert_eq!(
            try_submit(&session, 2, ActionKind::VampireBite, Some(4)),
            Err(ActionError::AllyTargetForbidden)
        );
        session.last_bite_target = Some(PlayerId(7));
        assert_eq!(
            try_submit(&session, 2, ActionKind::VampireBite, Some(7)),
            Err(ActionError::CooldownViolation(Cooldown::RepeatBite))
        );
    }

    #[test]
    fn vampire_kill_yields_to_a_landed_primary_kill() {
        let mut session = night(&[
            (1, "Vampire", Role::Vampire),
            (2, "Mafia", Role::Mafia),
            (3, "Civ A", Role::Civilian),
            (4, "Civ B", Role::Civilian),
            (5, "Civ C", Role::Civilian),
        ]);
        submit(&mut session, 2, ActionKind::Kill, Some(3));
        submit(&mut session, 1, ActionKind::VampireBite, Some(5));
        submit(&mut session, 1, ActionKind::Kill, Some(4));

        let outcome = resolve(&mut session, &mut rng()).unwrap();
        assert_eq!(dead(&outcome), vec![3]);
    }

    #[test]
    fn guarded_bite_does_not_take_hold() {
        let mut session = seven();
        submit(&mut session, 2, ActionKind::VampireBite, Some(7));
        submit(&mut session, 3, ActionKind::Guard, Some(7));

        let outcome = resolve(&mut session, &mut rng()).unwrap();
        assert_eq!(session.controller_of(PlayerId(7)), None);
        assert!(outcome.events.iter().any(|e| matches!(
            &e.kind,
            EventKind::Visited { notices, .. } if notices.contains(&VisitNotice::VampireRepelledByDoctor)
        )));
    }

    #[test]
    fn bum_sees_the_killer() {
        let mut session = seven();
        session.kill(PlayerId(4));
        submit(&mut session, 2, ActionKind::VampireBite, Some(5));
        submit(&mut session, 2, ActionKind::Kill, Some(7));
        submit(&mut session, 6, ActionKind::BumVisit, Some(7));

        let outcome = resolve(&mut session, &mut rng()).unwrap();
        let witness = outcome
            .events
            .iter()
            .find_map(|e| match &e.kind {
                EventKind::BumWitness { killer, killer_role, .. } => Some((*killer, *killer_role)),
                _ => None,
            })
            .expect("bum witness event");
        assert_eq!(witness, (PlayerId(2), Role::Vampire));
    }

    #[test]
    fn stukach_and_sheriff_on_same_target_reveal_role() {
        let mut session = night(&[
            (1, "Sheriff", Role::Sheriff),
            (2, "Advocate", Role::Advocate),
            (3, "Doctor", Role::Doctor),
            (4, "Stukach", Role::Stukach),
            (5, "Civ", Role::Civilian),
        ]);
        submit(&mut session, 1, ActionKind::Check, Some(2));
        submit(&mut session, 4, ActionKind::StukachCheck, Some(2));

        let outcome = resolve(&mut session, &mut rng()).unwrap();
        assert!(outcome.events.iter().any(|e| e.kind
            == EventKind::RoleRevealed {
                player: PlayerId(2),
                role: Role::Advocate
            }
            && e.audience == Audience::Group));
        assert!(outcome.events.iter().any(|e| e.kind
            == EventKind::SheriffReport {
                target: PlayerId(2),
                appears_mafia: true
            }));
    }

    #[test]
    fn sheriff_visit_is_anonymous() {
        let mut session = six();
        submit(&mut session, 1, ActionKind::Check, Some(6));

        let outcome = resolve(&mut session, &mut rng()).unwrap();
        let notices = outcome
            .events
            .iter()
            .find_map(|e| match &e.kind {
                EventKind::Visited { player, notices } if *player == PlayerId(6) => {
                    Some(notices.clone())
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(notices, vec![VisitNotice::SomeoneCurious]);
    }

    #[test]
    fn generic_kills_pick_first_recorded_under_a_living_don() {
        let mut session = night(&[
            (1, "Don", Role::Don),
            (2, "Mafia", Role::Mafia),
            (3, "Maniac", Role::Maniac),
            (4, "Civ A", Role::Civilian),
            (5, "Civ B", Role::Civilian),
            (6, "Civ C", Role::Civilian),
        ]);
        submit(&mut session, 3, ActionKind::Kill, Some(5));
        submit(&mut session, 2, ActionKind::Kill, Some(4));
        submit(&mut session, 1, ActionKind::Kill, None);

        let outcome = resolve(&mut session, &mut rng()).unwrap();
        assert_eq!(dead(&outcome), vec![5]);
    }

    fn doctor_reports_of(outcome: &NightOutcome) -> Vec<(PlayerId, bool, Vec<Role>)> {
        outcome
            .events
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::DoctorReport {
                    patient,
                    saved,
                    visitors,
                } => {
                    assert_eq!(e.audience, Audience::Player(PlayerId(3)));
                    Some((*patient, *saved, visitors.clone()))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn doctor_hears_about_a_save_with_its_visitors() {
        let mut session = seven();
        submit(&mut session, 2, ActionKind::VampireBite, Some(7));
        submit(&mut session, 2, ActionKind::Kill, Some(7));
        submit(&mut session, 3, ActionKind::Guard, Some(7));

        let outcome = resolve(&mut session, &mut rng()).unwrap();
        assert!(outcome.deaths.is_empty());
        assert_eq!(
            doctor_reports_of(&outcome),
            vec![(PlayerId(7), true, vec![Role::Vampire])]
        );
    }

    #[test]
    fn doctor_hears_a_quiet_night_was_not_needed() {
        let mut session = six();
        submit(&mut session, 3, ActionKind::Guard, Some(1));

        let outcome = resolve(&mut session, &mut rng()).unwrap();
        assert_eq!(doctor_reports_of(&outcome), vec![(PlayerId(1), false, vec![])]);
    }

    #[test]
    fn doctor_hears_nothing_when_visitors_came_without_a_save() {
        let mut session = seven();
        submit(&mut session, 2, ActionKind::VampireBite, Some(7));
        submit(&mut session, 3, ActionKind::Guard, Some(7));

        let outcome = resolve(&mut session, &mut rng()).unwrap();
        assert!(doctor_reports_of(&outcome).is_empty());
    }

    #[test]
    fn vampire_kill_lands_when_the_living_don_filed_none() {
        let roster = [
            (1, "Don", Role::Don),
            (2, "Vampire", Role::Vampire),
            (3, "Civ A", Role::Civilian),
            (4, "Civ B", Role::Civilian),
            (5, "Civ C", Role::Civilian),
            (6, "Civ D", Role::Civilian),
        ];

        let mut silent = night(&roster);
        submit(&mut silent, 2, ActionKind::VampireBite, Some(3));
        submit(&mut silent, 2, ActionKind::Kill, Some(4));
        let outcome = resolve(&mut silent, &mut rng()).unwrap();
        assert_eq!(dead(&outcome), vec![4]);
        assert_eq!(outcome.deaths[0].killer_role, Role::Vampire);

        let mut skipped = night(&roster);
        submit(&mut skipped, 1, ActionKind::Kill, None);
        submit(&mut skipped, 2, ActionKind::VampireBite, Some(3));
        submit(&mut skipped, 2, ActionKind::Kill, Some(5));
        let outcome = resolve(&mut skipped, &mut rng()).unwrap();
        assert_eq!(dead(&outcome), vec![5]);
    }

    #[test]
    fn bite_keeps_the_night_open_for_the_follow_up_kill() {
        let mut session = night(&[
            (1, "Sheriff", Role::Sheriff),
            (2, "Vampire", Role::Vampire),
            (3, "Doctor", Role::Doctor),
            (4, "Civ", Role::Civilian),
        ]);
        submit(&mut session, 1, ActionKind::Check, Some(2));
        submit(&mut session, 3, ActionKind::Guard, Some(3));
        submit(&mut session, 2, ActionKind::VampireBite, Some(4));
        assert!(!is_complete(&session));

        submit(&mut session, 2, ActionKind::Kill, None);
        assert!(is_complete(&session));
    }
}
