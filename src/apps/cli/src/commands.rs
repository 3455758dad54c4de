//! Slash commands understood by the interactive loop.

pub const HELP_TEXT: &str = "Commands:
  /reset   start a new conversation
  /help    show this help
  /quit    exit (also /exit or Ctrl-C while idle)
Press Ctrl-C while a response is streaming to stop it.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Reset,
    Help,
    Unknown(String),
    Message(String),
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        if !trimmed.starts_with('/') {
            return Self::Message(trimmed.to_string());
        }
        match trimmed.to_lowercase().as_str() {
            "/quit" | "/exit" => Self::Quit,
            "/reset" => Self::Reset,
            "/help" | "/?" => Self::Help,
            _ => Self::Unknown(trimmed.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_messages() {
        assert_eq!(Command::parse("  /QUIT "), Command::Quit);
        assert_eq!(Command::parse("/exit"), Command::Quit);
        assert_eq!(Command::parse("/reset"), Command::Reset);
        assert_eq!(Command::parse("/help"), Command::Help);
        assert_eq!(Command::parse("   "), Command::Empty);
        assert_eq!(
            Command::parse("/frobnicate"),
            Command::Unknown("/frobnicate".to_string())
        );
        assert_eq!(
            Command::parse(" top sales by region? "),
            Command::Message("top sales by region?".to_string())
        );
    }
}
