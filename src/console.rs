//! Line-oriented operator console on stdin/stdout.
//!
//! Each line is one command; every reply and every [`TrialEvent`] is printed as a single
//! JSON line so a front end can drive the kiosk through a pipe.

use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use log::{info, warn};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::{
    io::{self, AsyncBufReadExt, BufReader},
    sync::broadcast,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    events::TrialEvent,
    hardware::commands as hardware,
    player_commands as players,
    trial::{commands as trial, CaptureMode},
    AppState,
};

const HELP: &str = "players | add <name>[, <position>[, <side>]] | remove <id> | history <id> | \
select <id> | difficulty <level> | begin | hit <target> | catches <n> | back | cancel | \
board [n] | mode <software|hardware> | magnets <on|off> | status | state | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Players,
    Add {
        name: String,
        position: Option<String>,
        side: Option<String>,
    },
    Remove(i64),
    History(i64),
    Select(Option<i64>),
    Difficulty(Option<String>),
    Begin,
    Hit(u32),
    Catches(Option<i64>),
    Back,
    Cancel,
    Board(Option<usize>),
    Mode(CaptureMode),
    Magnets(bool),
    Status,
    State,
    Help,
    Quit,
}

fn optional_arg(rest: &str) -> Option<&str> {
    Some(rest.trim()).filter(|s| !s.is_empty())
}

fn parse_number<T: FromStr>(raw: &str, what: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| anyhow!("{what} must be a whole number, got '{raw}'"))
}

impl FromStr for ConsoleCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        let command = match verb.to_ascii_lowercase().as_str() {
            "players" => ConsoleCommand::Players,
            "add" => {
                let mut fields = rest.split(',').map(str::trim);
                let name = fields.next().filter(|n| !n.is_empty()).ok_or_else(|| {
                    anyhow!("usage: add <name>[, <position>[, <side>]]")
                })?;
                ConsoleCommand::Add {
                    name: name.to_string(),
                    position: fields.next().and_then(optional_arg).map(String::from),
                    side: fields.next().and_then(optional_arg).map(String::from),
                }
            }
            "remove" => ConsoleCommand::Remove(parse_number(rest, "player id")?),
            "history" => ConsoleCommand::History(parse_number(rest, "player id")?),
            "select" => ConsoleCommand::Select(
                optional_arg(rest)
                    .map(|id| parse_number(id, "player id"))
                    .transpose()?,
            ),
            "difficulty" => ConsoleCommand::Difficulty(optional_arg(rest).map(String::from)),
            "begin" | "start" => ConsoleCommand::Begin,
            "hit" => ConsoleCommand::Hit(parse_number(rest, "target")?),
            "catches" => ConsoleCommand::Catches(
                optional_arg(rest)
                    .map(|n| parse_number(n, "catches"))
                    .transpose()?,
            ),
            "back" => ConsoleCommand::Back,
            "cancel" => ConsoleCommand::Cancel,
            "board" | "leaderboard" => ConsoleCommand::Board(
                optional_arg(rest)
                    .map(|n| parse_number(n, "row count"))
                    .transpose()?,
            ),
            "mode" => ConsoleCommand::Mode(rest.parse()?),
            "magnets" => match rest.to_ascii_lowercase().as_str() {
                "on" => ConsoleCommand::Magnets(true),
                "off" => ConsoleCommand::Magnets(false),
                _ => bail!("usage: magnets <on|off>"),
            },
            "status" => ConsoleCommand::Status,
            "state" => ConsoleCommand::State,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            "" => bail!("empty command"),
            other => bail!("unknown command '{other}'"),
        };
        Ok(command)
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

/// Runs one command against the kiosk and returns the JSON reply payload.
pub async fn execute(state: &AppState, command: ConsoleCommand) -> Result<Value, String> {
    match command {
        ConsoleCommand::Players => to_value(players::list_players(state).await?),
        ConsoleCommand::Add {
            name,
            position,
            side,
        } => {
            let id =
                players::add_player(state, &name, position.as_deref(), side.as_deref()).await?;
            Ok(json!({ "playerId": id }))
        }
        ConsoleCommand::Remove(id) => to_value(players::remove_player(state, id).await?),
        ConsoleCommand::History(id) => to_value(players::player_history(state, id).await?),
        ConsoleCommand::Select(id) => to_value(trial::select_player(state, id).await?),
        ConsoleCommand::Difficulty(level) => {
            to_value(trial::select_difficulty(state, level.as_deref()).await?)
        }
        ConsoleCommand::Begin => to_value(trial::begin_trial(state).await?),
        ConsoleCommand::Hit(index) => to_value(trial::register_hit(state, index).await?),
        ConsoleCommand::Catches(n) => to_value(trial::submit_catches(state, n).await?),
        ConsoleCommand::Back => to_value(trial::go_back(state).await?),
        ConsoleCommand::Cancel => to_value(trial::cancel_trial(state).await?),
        ConsoleCommand::Board(limit) => to_value(trial::get_leaderboard(state, limit).await?),
        ConsoleCommand::Mode(mode) => {
            trial::set_capture_mode(state, mode).await?;
            to_value(trial::get_settings(state).await?)
        }
        ConsoleCommand::Magnets(true) => to_value(hardware::magnets_on(state).await?),
        ConsoleCommand::Magnets(false) => to_value(hardware::magnets_off(state).await?),
        ConsoleCommand::Status => to_value(hardware::hardware_status(state).await?),
        ConsoleCommand::State => to_value(trial::get_trial_state(state).await?),
        ConsoleCommand::Help => Ok(json!({ "commands": HELP })),
        ConsoleCommand::Quit => Ok(Value::Null),
    }
}

fn reply(result: Result<Value, String>) -> String {
    match result {
        Ok(value) => json!({ "ok": value }).to_string(),
        Err(message) => json!({ "error": message }).to_string(),
    }
}

/// Prints every trial event as one JSON line until `shutdown` fires.
pub fn spawn_event_printer(
    mut events: broadcast::Receiver<TrialEvent>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => event,
            };
            match event {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(err) => warn!("Failed to serialize event: {err}"),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Event printer fell behind; {skipped} events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Reads commands until `quit`, end of input, or `shutdown`.
pub async fn run_console(state: &AppState, shutdown: CancellationToken) -> Result<()> {
    let mut lines = BufReader::new(io::stdin()).lines();
    info!("Console ready; type 'help' for commands");

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line.context("failed to read from stdin")?,
        };
        let Some(line) = line else {
            info!("stdin closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<ConsoleCommand>() {
            Ok(command) => command,
            Err(err) => {
                println!("{}", reply(Err(err.to_string())));
                continue;
            }
        };
        let quit = command == ConsoleCommand::Quit;
        println!("{}", reply(execute(state, command).await));
        if quit {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::Database,
        events::EventBus,
        settings::SettingsStore,
        testing::{HardwareScript, ScriptedHardware, TempFile},
        trial::{TrialController, TrialPhase},
    };
    use std::sync::Arc;

    fn kiosk() -> (AppState, TempFile) {
        let db = Database::in_memory().unwrap();
        let settings_file = TempFile::new("console", "json");
        let settings = Arc::new(SettingsStore::new(settings_file.path().to_path_buf()).unwrap());
        let hardware = Arc::new(ScriptedHardware::new(HardwareScript::Ack));
        let trial = TrialController::new(
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            hardware.clone(),
            settings.clone(),
            EventBus::new(64),
        );
        let state = AppState {
            db,
            trial,
            settings,
            hardware,
        };
        (state, settings_file)
    }

    async fn run(state: &AppState, line: &str) -> Result<Value, String> {
        let command = line.parse::<ConsoleCommand>().map_err(|e| e.to_string())?;
        execute(state, command).await
    }

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!(
            "add Jamie Lee, WR, Offense".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Add {
                name: "Jamie Lee".into(),
                position: Some("WR".into()),
                side: Some("Offense".into()),
            }
        );
        assert_eq!(
            "add Sky".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Add {
                name: "Sky".into(),
                position: None,
                side: None,
            }
        );
        assert_eq!(
            "select".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Select(None)
        );
        assert_eq!(
            "CATCHES 7".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Catches(Some(7))
        );
        assert_eq!(
            "mode software".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Mode(CaptureMode::Software)
        );
        assert_eq!(
            "board".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Board(None)
        );
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!("".parse::<ConsoleCommand>().is_err());
        assert!("jump".parse::<ConsoleCommand>().is_err());
        assert!("hit".parse::<ConsoleCommand>().is_err());
        assert!("catches lots".parse::<ConsoleCommand>().is_err());
        assert!("magnets maybe".parse::<ConsoleCommand>().is_err());
        assert!("add , WR".parse::<ConsoleCommand>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn full_hardware_trial_through_console() {
        let (state, _settings_file) = kiosk();

        let added = run(&state, "add Riley, CB, Defense").await.unwrap();
        let id = added["playerId"].as_i64().unwrap();
        assert!(run(&state, "add Riley").await.unwrap_err().contains("already exists"));

        run(&state, &format!("select {id}")).await.unwrap();
        let configured = run(&state, "difficulty very hard").await.unwrap();
        assert_eq!(configured["difficulty"], "Very Hard");
        assert_eq!(configured["captureMode"], "hardware");

        run(&state, "begin").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(4500)).await;
        assert_eq!(state.trial.snapshot().await.phase, TrialPhase::ScoreEntry);

        let err = run(&state, "catches 12").await.unwrap_err();
        assert!(err.contains("between 0 and 10"));

        let result = run(&state, "catches 3").await.unwrap();
        assert_eq!(result["score"], 15);

        let board = run(&state, "board").await.unwrap();
        assert_eq!(board[0]["name"], "Riley");
        assert_eq!(board[0]["score"], 15);

        let history = run(&state, &format!("history {id}")).await.unwrap();
        assert_eq!(history.as_array().map(Vec::len), Some(1));
        assert_eq!(history[0]["difficulty"], "Very Hard");
    }

    #[tokio::test]
    async fn operator_errors_come_back_as_messages() {
        let (state, _settings_file) = kiosk();
        assert!(run(&state, "select").await.unwrap_err().contains("select a player"));
        assert!(run(&state, "select 9").await.unwrap_err().contains("does not exist"));
        assert!(run(&state, "begin").await.is_err());
        assert!(run(&state, "difficulty impossible").await.is_err());
        assert!(run(&state, "remove 9").await.is_err());
        assert_eq!(run(&state, "cancel").await.unwrap()["phase"], "idle");
    }
}
