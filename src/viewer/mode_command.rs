//! Command mode handler (`:` prompt).

use std::io;

use super::input::CommandAction;
use super::state::Layout;
use super::terminal;
use super::{Effect, ViewerMode};

/// Mutable state for command mode (`:` prompt).
pub(super) struct CommandState {
    pub input: String,
}

pub(super) fn handle(
    action: CommandAction,
    cs: &mut CommandState,
    layout: &Layout,
) -> io::Result<Vec<Effect>> {
    match action {
        CommandAction::Type(c) => {
            cs.input.push(c);
            terminal::draw_command_bar(layout, &cs.input)?;
            Ok(vec![])
        }
        CommandAction::Backspace => {
            if cs.input.is_empty() {
                // Empty input + Backspace → cancel (vim behavior)
                Ok(vec![Effect::SetMode(ViewerMode::Normal), Effect::MarkDirty])
            } else {
                cs.input.pop();
                terminal::draw_command_bar(layout, &cs.input)?;
                Ok(vec![])
            }
        }
        CommandAction::Execute => Ok(execute(cs.input.trim())),
        CommandAction::Cancel => Ok(vec![Effect::SetMode(ViewerMode::Normal), Effect::MarkDirty]),
    }
}

fn execute(cmd: &str) -> Vec<Effect> {
    let (verb, arg) = match cmd.split_once(char::is_whitespace) {
        Some((verb, arg)) => (verb, arg.trim()),
        None => (cmd, ""),
    };
    match (verb, arg) {
        ("", _) => vec![Effect::SetMode(ViewerMode::Normal), Effect::MarkDirty],
        ("q" | "quit", _) => vec![Effect::Exit],
        ("open" | "o", "") => vec![
            Effect::SetMode(ViewerMode::Normal),
            Effect::Flash("Usage: :open <series>".into()),
            Effect::MarkDirty,
        ],
        ("open" | "o", name) => vec![
            Effect::SetMode(ViewerMode::Normal),
            Effect::Open(name.to_string()),
            Effect::MarkDirty,
        ],
        _ => vec![
            Effect::SetMode(ViewerMode::Normal),
            Effect::Flash(format!("Unknown command: {cmd}")),
            Effect::MarkDirty,
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_takes_series_name() {
        let effects = execute("open  dungeon ");
        assert!(effects.iter().any(|e| matches!(e, Effect::Open(n) if n == "dungeon")));
    }

    #[test]
    fn open_without_name_flashes_usage() {
        let effects = execute("open");
        assert!(effects.iter().any(|e| matches!(e, Effect::Flash(_))));
        assert!(!effects.iter().any(|e| matches!(e, Effect::Open(_))));
    }

    #[test]
    fn quit_exits() {
        assert!(matches!(execute("q")[..], [Effect::Exit]));
        assert!(matches!(execute("quit")[..], [Effect::Exit]));
    }

    #[test]
    fn unknown_command_flashes() {
        let effects = execute("frobnicate");
        assert!(
            effects
                .iter()
                .any(|e| matches!(e, Effect::Flash(m) if m.contains("frobnicate")))
        );
    }

    #[test]
    fn empty_command_returns_to_normal() {
        assert!(matches!(
            execute("")[..],
            [Effect::SetMode(ViewerMode::Normal), Effect::MarkDirty]
        ));
    }
}
