#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Plan,
    Work,
    Accept,
    Reject,
    Model(String),
    Models,
    Cancel,
    Diff(String),
    Retry,
    New,
    Quit,
    Unknown(String),
}

/// One line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Empty,
    Command(SlashCommand),
    Message(String),
}

pub const HELP_TEXT: &str = "Commands: /help, /plan, /work, /accept, /reject, /model <id>, \
                              /models, /cancel, /diff <call_id>, /retry, /new, /quit";

pub fn parse_input(line: &str) -> ConsoleInput {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ConsoleInput::Empty;
    }

    match parse_slash_command(trimmed) {
        Some(command) => ConsoleInput::Command(command),
        None => ConsoleInput::Message(trimmed.to_string()),
    }
}

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let mut parts = trimmed.split_whitespace();
    let command = parts.next().unwrap_or(trimmed).to_string();
    let argument = parts.next().map(str::to_string);

    let parsed = match (command.as_str(), argument) {
        ("/help", _) => SlashCommand::Help,
        ("/plan", _) => SlashCommand::Plan,
        ("/work", _) => SlashCommand::Work,
        ("/accept", _) => SlashCommand::Accept,
        ("/reject", _) => SlashCommand::Reject,
        ("/model", Some(model)) => SlashCommand::Model(model),
        ("/model" | "/models", None) | ("/models", Some(_)) => SlashCommand::Models,
        ("/cancel", _) => SlashCommand::Cancel,
        ("/diff", Some(call_id)) => SlashCommand::Diff(call_id),
        ("/retry", _) => SlashCommand::Retry,
        ("/new", _) => SlashCommand::New,
        ("/quit" | "/exit", _) => SlashCommand::Quit,
        _ => SlashCommand::Unknown(command),
    };

    Some(parsed)
}
