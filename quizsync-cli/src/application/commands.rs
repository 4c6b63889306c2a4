use crate::application::render;
use crate::infrastructure::{CliError, Result};
use quizsync_core::{ProgressStore, SessionId, Timestamp};
use quizsync_p2p::{SyncSession, Transport};
use std::str::FromStr;

/// One line typed at the prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    Show,
    /// Toggle the answer at a 1-based display position
    Toggle(usize),
    Check,
    Next,
    Peers,
    Reset,
    Help,
    Quit,
}

impl FromStr for UserCommand {
    type Err = CliError;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or("show").to_ascii_lowercase();

        let parsed = match command.as_str() {
            "show" | "s" => UserCommand::Show,
            "toggle" | "t" => {
                let position = words
                    .next()
                    .ok_or_else(|| CliError::InvalidConfig("toggle needs a position".to_string()))?;
                let position: usize = position.parse().map_err(|_| {
                    CliError::InvalidConfig(format!("not a position: {}", position))
                })?;
                if position == 0 {
                    return Err(CliError::InvalidConfig("positions start at 1".to_string()));
                }
                UserCommand::Toggle(position)
            }
            "check" | "c" => UserCommand::Check,
            "next" | "n" => UserCommand::Next,
            "peers" | "p" => UserCommand::Peers,
            "reset" => UserCommand::Reset,
            "help" | "h" | "?" => UserCommand::Help,
            "quit" | "q" | "exit" => UserCommand::Quit,
            other => {
                return Err(CliError::InvalidConfig(format!(
                    "unknown command: {} (try help)",
                    other
                )))
            }
        };
        Ok(parsed)
    }
}

pub const HELP: &str = "\
commands:
  show            redraw the current question
  toggle <n>      select or deselect answer n
  check           check the current selection
  next            go to the next question
  peers           list connected devices
  reset           start over (host or solo only)
  quit            leave the session";

/// Whether the prompt loop keeps going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Apply one command and return the text to print
pub fn execute<T, S>(
    command: UserCommand,
    sync: &mut SyncSession<T>,
    store: &mut S,
    session_id: &SessionId,
    now: Timestamp,
) -> Result<(Flow, String)>
where
    T: Transport,
    S: ProgressStore + ?Sized,
{
    let output = match command {
        UserCommand::Show => render::view(&sync.view(now)),
        UserCommand::Toggle(position) => {
            let view = sync.view(now);
            let index = view
                .session
                .question
                .as_ref()
                .and_then(|q| q.answers.get(position - 1))
                .map(|a| a.index)
                .ok_or_else(|| CliError::InvalidConfig(format!("no answer {}", position)))?;
            sync.toggle_answer(index)?;
            render::view(&sync.view(now))
        }
        UserCommand::Check => {
            let verdict = sync.check_answer()?;
            let mut output = render::view(&sync.view(now));
            if verdict.is_none() {
                output.push_str("\n(already checked)");
            }
            output
        }
        UserCommand::Next => {
            sync.next_question();
            render::view(&sync.view(now))
        }
        UserCommand::Peers => render::peers(&sync.peers()),
        UserCommand::Reset => {
            sync.reset_progress(now)?;
            store.reset_progress(session_id)?;
            render::view(&sync.view(now))
        }
        UserCommand::Help => HELP.to_string(),
        UserCommand::Quit => return Ok((Flow::Quit, "bye".to_string())),
    };
    Ok((Flow::Continue, output))
}
