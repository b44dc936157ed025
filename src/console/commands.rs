use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    CheckIn,
    CheckOut,
    Capture,
    Cancel,
    Status,
    History,
    Refresh,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown command `{0}`, type `help` for the list of commands")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let command = match input.trim().to_lowercase().as_str() {
            "in" | "checkin" | "check-in" => Command::CheckIn,
            "out" | "checkout" | "check-out" => Command::CheckOut,
            "capture" | "snap" | "c" => Command::Capture,
            "cancel" | "x" => Command::Cancel,
            "status" | "s" => Command::Status,
            "history" | "h" => Command::History,
            "refresh" | "r" => Command::Refresh,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => return Err(UnknownCommand(other.to_string())),
        };
        Ok(command)
    }
}

pub const HELP: &str = "\
Commands:
  in       start check-in capture
  out      start check-out capture
  capture  take the photo and submit it
  cancel   stop the camera and abandon the capture
  status   show today's attendance
  history  show the last four days
  refresh  reload today's attendance
  quit     exit";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases_case_insensitively() {
        assert_eq!("in".parse(), Ok(Command::CheckIn));
        assert_eq!("Check-Out".parse(), Ok(Command::CheckOut));
        assert_eq!("  SNAP ".parse(), Ok(Command::Capture));
        assert_eq!("q".parse(), Ok(Command::Quit));
    }

    #[test]
    fn unknown_input_is_reported() {
        assert_eq!(
            "dance".parse::<Command>(),
            Err(UnknownCommand("dance".to_string()))
        );
    }
}
