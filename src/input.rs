use anyhow::{Context, Result, anyhow, bail};

/// One line of the interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  Add(String),
  /// 1-based grid position.
  Remove(usize),
  Label(usize, String),
  Audio(usize),
  List,
  Dismiss,
  Location,
  Help,
  Quit,
}

pub const HELP: &str = "\
commands:
  add <link>          add a stream (a bare link works too)
  remove <n>          remove stream n
  label <n> <text>    rename stream n
  audio <n>           give stream n the audio, or mute all if it has it
  list                show the grid
  location            show the share link
  dismiss             clear the last error
  help                this text
  quit                leave";

fn position(arg: Option<&str>) -> Result<usize> {
  let raw = arg.ok_or_else(|| anyhow!("Missing stream number."))?;
  let n: usize = raw.parse().with_context(|| format!("'{}' is not a stream number.", raw))?;
  if n == 0 {
    bail!("Stream numbers start at 1.");
  }
  Ok(n)
}

/// Parse a session line. Blank lines yield `None`; anything that is not a
/// known command is treated as a link to add.
pub fn parse_command(line: &str) -> Result<Option<Command>> {
  let line = line.trim();
  if line.is_empty() {
    return Ok(None);
  }
  let (word, rest) = match line.split_once(char::is_whitespace) {
    Some((word, rest)) => (word, rest.trim()),
    None => (line, ""),
  };
  let rest = Some(rest).filter(|r| !r.is_empty());

  let command = match word.to_lowercase().as_str() {
    "add" | "a" => Command::Add(rest.ok_or_else(|| anyhow!("Paste a link after 'add'."))?.to_string()),
    "remove" | "rm" => Command::Remove(position(rest)?),
    "label" => {
      let rest = rest.ok_or_else(|| anyhow!("Usage: label <n> <text>"))?;
      let (n, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
      Command::Label(position(Some(n))?, text.trim().to_string())
    }
    "audio" | "unmute" => Command::Audio(position(rest)?),
    "list" | "ls" => Command::List,
    "dismiss" => Command::Dismiss,
    "location" | "loc" => Command::Location,
    "help" | "?" => Command::Help,
    "quit" | "exit" | "q" => Command::Quit,
    _ => Command::Add(line.to_string()),
  };
  Ok(Some(command))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(line: &str) -> Command {
    parse_command(line).unwrap().unwrap()
  }

  #[test]
  fn blank_line_is_nothing() {
    assert_eq!(parse_command("   ").unwrap(), None);
  }

  #[test]
  fn bare_link_is_add() {
    assert_eq!(parse("https://youtu.be/dQw4w9WgXcQ"), Command::Add("https://youtu.be/dQw4w9WgXcQ".to_string()));
  }

  #[test]
  fn add_with_link() {
    assert_eq!(parse("add  https://youtu.be/x "), Command::Add("https://youtu.be/x".to_string()));
    assert!(parse_command("add").is_err());
  }

  #[test]
  fn label_keeps_spaces() {
    assert_eq!(parse("label 2 Main  stage"), Command::Label(2, "Main  stage".to_string()));
    assert_eq!(parse("label 1"), Command::Label(1, String::new()));
  }

  #[test]
  fn positions_are_validated() {
    assert_eq!(parse("rm 3"), Command::Remove(3));
    assert_eq!(parse("AUDIO 1"), Command::Audio(1));
    assert!(parse_command("rm").is_err());
    assert!(parse_command("rm zero").is_err());
    assert!(parse_command("audio 0").is_err());
  }

  #[test]
  fn simple_commands() {
    assert_eq!(parse("ls"), Command::List);
    assert_eq!(parse("dismiss"), Command::Dismiss);
    assert_eq!(parse("loc"), Command::Location);
    assert_eq!(parse("?"), Command::Help);
    assert_eq!(parse("q"), Command::Quit);
  }
}
