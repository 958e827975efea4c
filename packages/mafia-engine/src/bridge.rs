//! Line-delimited JSON adapter for a messaging front end.
//!
//! Each input line is one [`Command`]; each command gets one reply line, and
//! every engine event is written as its own line as soon as it is published.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::Receiver;
use tracing::{debug, warn};

use crate::error::ActionError;
use crate::models::action::{ActionKind, NightActionRequest};
use crate::models::event::GameEvent;
use crate::models::player::{Participant, PlayerId};
use crate::models::session::{FinalChoice, GroupId};
use crate::services::{game_service, lobby_service};
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case", tag = "command")]
pub enum Command {
    OpenLobby {
        group: GroupId,
    },
    Register {
        group: GroupId,
        participant: Participant,
    },
    Withdraw {
        group: GroupId,
        player: PlayerId,
    },
    Start {
        group: GroupId,
    },
    Night {
        group: GroupId,
        actor: PlayerId,
        kind: ActionKind,
        #[serde(default)]
        target: Option<PlayerId>,
    },
    Vote {
        group: GroupId,
        actor: PlayerId,
        #[serde(default)]
        as_voter: Option<PlayerId>,
        target: PlayerId,
    },
    FinalVote {
        group: GroupId,
        voter: PlayerId,
        choice: FinalChoice,
    },
    LastWords {
        group: GroupId,
        player: PlayerId,
        text: String,
    },
    Advance {
        group: GroupId,
    },
    Abort {
        group: GroupId,
    },
    Show {
        group: GroupId,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case", tag = "line")]
enum Output<'a> {
    Reply {
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(skip_serializing_if = "Value::is_null")]
        data: Value,
    },
    Event(&'a GameEvent),
}

pub async fn dispatch(state: &AppState, command: Command) -> Result<Value, ActionError> {
    match command {
        Command::OpenLobby { group } => {
            lobby_service::open_lobby(state, group).await?;
            Ok(Value::Null)
        }
        Command::Register { group, participant } => {
            let registered = lobby_service::register(state, group, participant).await?;
            Ok(json!({ "registered": registered }))
        }
        Command::Withdraw { group, player } => {
            let registered = lobby_service::withdraw(state, group, player).await?;
            Ok(json!({ "registered": registered }))
        }
        Command::Start { group } => {
            game_service::start_game(state, group).await?;
            Ok(Value::Null)
        }
        Command::Night {
            group,
            actor,
            kind,
            target,
        } => {
            let request = NightActionRequest {
                actor,
                kind,
                target,
            };
            game_service::submit_night_action(state, group, request).await?;
            Ok(Value::Null)
        }
        Command::Vote {
            group,
            actor,
            as_voter,
            target,
        } => {
            game_service::cast_vote(state, group, actor, as_voter, target).await?;
            Ok(Value::Null)
        }
        Command::FinalVote {
            group,
            voter,
            choice,
        } => {
            game_service::cast_final_vote(state, group, voter, choice).await?;
            Ok(Value::Null)
        }
        Command::LastWords {
            group,
            player,
            text,
        } => {
            game_service::leave_last_words(state, group, player, text).await?;
            Ok(Value::Null)
        }
        Command::Advance { group } => {
            let phase = game_service::advance_phase(state, group).await?;
            Ok(json!({ "phase": phase }))
        }
        Command::Abort { group } => {
            let outcome = game_service::abort_game(state, group).await?;
            Ok(json!({ "winner": outcome.winner }))
        }
        Command::Show { group } => {
            let session = game_service::get_session(state, group).await?;
            Ok(serde_json::to_value(session).unwrap_or(Value::Null))
        }
    }
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, line: &Output<'_>) -> std::io::Result<()> {
    let mut bytes = serde_json::to_vec(line)?;
    bytes.push(b'\n');
    output.write_all(&bytes).await?;
    output.flush().await
}

async fn drain<W: AsyncWrite + Unpin>(
    events: &mut Receiver<GameEvent>,
    output: &mut W,
) -> std::io::Result<()> {
    loop {
        match events.try_recv() {
            Ok(event) => write_line(output, &Output::Event(&event)).await?,
            Err(TryRecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return Ok(()),
        }
    }
}

/// Serves commands from `input` until it reaches end of file.
pub async fn run<R, W>(state: AppState, input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut events = state.subscribe();
    let mut lines = input.lines();

    loop {
        tokio::select! {
            biased;

            event = events.recv() => match event {
                Ok(event) => write_line(&mut output, &Output::Event(&event)).await?,
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                let reply = match serde_json::from_str::<Command>(&line) {
                    Ok(command) => {
                        debug!(?command, "command received");
                        dispatch(&state, command).await
                    }
                    Err(e) => {
                        warn!(error = %e, "unparseable command");
                        write_line(
                            &mut output,
                            &Output::Reply {
                                ok: false,
                                error: Some(format!("bad command: {}", e)),
                                data: Value::Null,
                            },
                        )
                        .await?;
                        continue;
                    }
                };

                drain(&mut events, &mut output).await?;
                let line = match reply {
                    Ok(data) => Output::Reply { ok: true, error: None, data },
                    Err(e) => Output::Reply { ok: false, error: Some(e.to_string()), data: Value::Null },
                };
                write_line(&mut output, &line).await?;
            }
        }
    }

    drain(&mut events, &mut output).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_setup::test_state;

    #[test]
    fn commands_parse_from_json_lines() {
        let command: Command = serde_json::from_str(
            r#"{"command":"night","group":-5,"actor":2,"kind":"vampire_bite","target":3}"#,
        )
        .unwrap();
        assert_eq!(
            command,
            Command::Night {
                group: GroupId(-5),
                actor: PlayerId(2),
                kind: ActionKind::VampireBite,
                target: Some(PlayerId(3)),
            }
        );

        let skip: Command =
            serde_json::from_str(r#"{"command":"night","group":-5,"actor":2,"kind":"kill"}"#)
                .unwrap();
        assert!(matches!(skip, Command::Night { target: None, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn script_produces_replies_and_events() {
        let state = test_state(9);
        let mut script = String::from("{\"command\":\"open_lobby\",\"group\":-5}\n");
        for id in 1..=4 {
            script.push_str(&format!(
                "{{\"command\":\"register\",\"group\":-5,\"participant\":{{\"id\":{id},\"name\":\"P{id}\",\"channel\":{id}}}}}\n"
            ));
        }
        script.push_str("{\"command\":\"start\",\"group\":-5}\n");
        script.push_str("{\"command\":\"start\",\"group\":-5}\n");
        script.push_str("not json\n");

        let mut output = Vec::new();
        run(state, script.as_bytes(), &mut output).await.unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        let replies: Vec<&Value> = lines.iter().filter(|l| l["line"] == "reply").collect();
        assert_eq!(replies.len(), 8);
        assert_eq!(replies[5]["ok"], true);
        assert_eq!(replies[6]["ok"], false);
        assert_eq!(replies[7]["ok"], false);
        assert!(lines
            .iter()
            .any(|l| l["line"] == "event" && l["kind"]["type"] == "night_fell"));
    }
}
