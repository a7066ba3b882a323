//! Input line parsing
//!
//! Lines starting with `/` are commands; everything else is a message.

use std::path::PathBuf;

/// One line of user input
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    /// Send as a chat message
    Message(String),
    /// Cancel the reply being generated
    Abort,
    /// Leave the chat
    Quit,
    /// Attach an image to the next message
    Image(PathBuf),
    /// Switch the selected model
    Model(String),
    /// Show the controller state
    Status,
    /// Show the command list
    Help,
    /// Nothing to do (blank line)
    Empty,
    /// A command that needs an argument was given none, or is unknown
    Invalid(String),
}

impl Input {
    /// Parse one line
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }

        let Some(command) = trimmed.strip_prefix('/') else {
            return Self::Message(line.trim_end_matches(['\r', '\n']).to_string());
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };

        match (name, arg) {
            ("abort" | "stop", _) => Self::Abort,
            ("quit" | "exit", _) => Self::Quit,
            ("help" | "?", _) => Self::Help,
            ("status", _) => Self::Status,
            ("image" | "img", "") => Self::Invalid("usage: /image PATH".to_string()),
            ("image" | "img", path) => Self::Image(PathBuf::from(path)),
            ("model", "") => Self::Invalid("usage: /model NAME".to_string()),
            ("model", model) => Self::Model(model.to_string()),
            (other, _) => Self::Invalid(format!("unknown command /{other}, try /help")),
        }
    }
}

/// Command summary printed by `/help`
pub const HELP: &str = "\
Commands:
  /abort         stop the reply being generated (also Ctrl-C)
  /image PATH    attach an image to the next message
  /model NAME    switch the chat model
  /status        show what the session is doing
  /quit          leave (also Ctrl-C while idle, or Ctrl-D)
Anything else is sent as a message.";
