use std::env;
use std::path::PathBuf;
use std::time::Duration;

use super::session::GamePhase;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub night_duration: Duration,
    // discussion before the accusation vote opens
    pub day_duration: Duration,
    pub voting_duration: Duration,
    pub final_vote_duration: Duration,
    /// Where JSON snapshots go. None keeps sessions in memory only.
    pub snapshot_dir: Option<PathBuf>,
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            night_duration: Duration::from_secs(40),
            day_duration: Duration::from_secs(45),
            voting_duration: Duration::from_secs(40),
            final_vote_duration: Duration::from_secs(25),
            snapshot_dir: None,
            event_capacity: 1000,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let night_duration = seconds_var("MAFIA_NIGHT_SECONDS").unwrap_or(defaults.night_duration);
        let day_duration = seconds_var("MAFIA_DAY_SECONDS").unwrap_or(defaults.day_duration);
        let voting_duration =
            seconds_var("MAFIA_VOTING_SECONDS").unwrap_or(defaults.voting_duration);
        let final_vote_duration =
            seconds_var("MAFIA_FINAL_VOTE_SECONDS").unwrap_or(defaults.final_vote_duration);
        let snapshot_dir = env::var("MAFIA_SNAPSHOT_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        let event_capacity = env::var("MAFIA_EVENT_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.event_capacity);

        Self {
            night_duration,
            day_duration,
            voting_duration,
            final_vote_duration,
            snapshot_dir,
            event_capacity,
        }
    }

    /// Timer length for a timed phase.
    pub fn duration_of(&self, phase: GamePhase) -> Option<Duration> {
        match phase {
            GamePhase::Night => Some(self.night_duration),
            GamePhase::Day => Some(self.day_duration),
            GamePhase::Voting => Some(self.voting_duration),
            GamePhase::FinalVote => Some(self.final_vote_duration),
            _ => None,
        }
    }
}

fn seconds_var(name: &str) -> Option<Duration> {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}
