//! `support-chat chat`: interactive session.
//!
//! Lines typed at the prompt are sent to the selected admin. Lines starting
//! with `/` are commands:
//!
//! | Command | Effect |
//! |---|---|
//! | `/select <n\|id>` | Open the conversation with the n-th listed admin, or by id |
//! | `/search <term>` | Filter the admin list (empty term clears) |
//! | `/back` | Close the conversation |
//! | `/hide`, `/show` | Mark the session as in the background / foreground |
//! | `/list` | Toggle the admin list |
//! | `/help` | Show this table |
//! | `/quit` | Leave |
//!
//! While hidden, new admin replies raise a notice instead of being marked
//! read.

use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};

use support_chat_client::{ChatEvent, ChatHandle, ChatSnapshot, ClientConfig, Command};
use support_chat_core::AdminId;

use crate::render;

const HELP: &str = "Commands: /select <n|id>, /search <term>, /back, /hide, /show, /list, /help, /quit\n";

/// Parsed prompt line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Message(String),
    Select(String),
    Search(String),
    Back,
    Hide,
    Show,
    ToggleList,
    Help,
    Quit,
    Unknown(String),
    Empty,
}

fn parse_input(line: &str) -> Input {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Input::Empty;
    }
    let Some(command) = trimmed.strip_prefix('/') else {
        return Input::Message(line.trim_end_matches(['\r', '\n']).to_string());
    };

    let (name, argument) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(name, rest)| (name, rest.trim()));
    match name {
        "select" | "s" => Input::Select(argument.to_string()),
        "search" | "find" => Input::Search(argument.to_string()),
        "back" => Input::Back,
        "hide" => Input::Hide,
        "show" => Input::Show,
        "list" => Input::ToggleList,
        "help" | "?" => Input::Help,
        "quit" | "q" | "exit" => Input::Quit,
        _ => Input::Unknown(name.to_string()),
    }
}

/// Resolve a `/select` argument: 1-based position in the listed admins, or
/// an admin id.
fn resolve_admin(argument: &str, snapshot: &ChatSnapshot) -> Option<AdminId> {
    if let Ok(position) = argument.parse::<usize>() {
        return position
            .checked_sub(1)
            .and_then(|index| snapshot.rows.get(index))
            .map(|row| row.admin.id.clone());
    }
    AdminId::parse(argument).ok()
}

/// Run the interactive session until `/quit` or end of input.
#[allow(clippy::print_stdout)]
pub async fn run(config: &ClientConfig, admin: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let mut handle = support_chat_client::connect(config)?;
    if let Some(admin) = admin {
        handle
            .commands
            .send(Command::SelectAdmin(AdminId::parse(admin)?))?;
    }

    print!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_frame = String::new();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_input(parse_input(&line), &handle)? {
                    break;
                }
            }
            Some(event) = handle.events.recv() => match event {
                ChatEvent::Notice(notice) => print!("{}", render::notice(&notice)),
                // The terminal always shows the newest lines.
                ChatEvent::ScrollToLatest => {}
            },
            changed = handle.snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = handle.snapshots.borrow_and_update().clone();
                let frame = render::frame(&snapshot, &Local, Local::now().date_naive());
                if frame != last_frame {
                    print!("\n{frame}");
                    last_frame = frame;
                }
            }
        }
    }

    handle.shutdown().await?;
    Ok(())
}

/// Apply one prompt line. Returns `false` when the session should end.
#[allow(clippy::print_stdout)]
fn handle_input(input: Input, handle: &ChatHandle) -> Result<bool, Box<dyn std::error::Error>> {
    let commands = &handle.commands;
    match input {
        Input::Empty => {}
        Input::Message(text) => {
            if handle.snapshot().selected.is_none() {
                println!("Select an admin first (/select <n>)");
            } else {
                commands.send(Command::SetDraft(text))?;
                commands.send(Command::Send)?;
            }
        }
        Input::Select(argument) => match resolve_admin(&argument, &handle.snapshot()) {
            Some(admin) => commands.send(Command::SelectAdmin(admin))?,
            None => println!("No admin at \"{argument}\""),
        },
        Input::Search(term) => commands.send(Command::SetSearchTerm(term))?,
        Input::Back => commands.send(Command::ClearSelection)?,
        Input::Hide => commands.send(Command::SetVisibility(false))?,
        Input::Show => commands.send(Command::SetVisibility(true))?,
        Input::ToggleList => {
            let visible = handle.snapshot().sidebar_visible;
            commands.send(Command::SetSidebarVisible(!visible))?;
        }
        Input::Help => print!("{HELP}"),
        Input::Quit => return Ok(false),
        Input::Unknown(name) => print!("Unknown command /{name}. {HELP}"),
    }
    Ok(true)
}
