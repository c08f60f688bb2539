//! Input processing layer: key mapping and numeric prefix accumulator.
//!
//! Pure logic, no I/O. All functions are deterministic and testable.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

const MAX_COUNT: u32 = 9_999;

/// Accumulated numeric prefix: `5n` flips five pages, `10j` scrolls ten steps.
pub(super) struct InputAccumulator {
    count: Option<u32>,
}

impl InputAccumulator {
    pub(super) fn new() -> Self {
        Self { count: None }
    }

    /// Feed a digit (0..=9). Returns false if overflow would occur.
    fn push_digit(&mut self, d: u32) -> bool {
        let current = self.count.unwrap_or(0);
        let new = current.saturating_mul(10).saturating_add(d);
        if new > MAX_COUNT {
            return false; // ignore further digits
        }
        self.count = Some(new);
        true
    }

    /// Take the accumulated count, resetting to None.
    fn take(&mut self) -> Option<u32> {
        self.count.take()
    }

    /// Peek at the current accumulated count without consuming it.
    pub(super) fn peek(&self) -> Option<u32> {
        self.count
    }

    pub(super) fn reset(&mut self) {
        self.count = None;
    }

    pub(super) fn is_active(&self) -> bool {
        self.count.is_some()
    }
}

/// Actions produced by key input processing in normal mode.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Action {
    Quit,
    NextPage(u32),
    PrevPage(u32),
    ScrollDown(u32),
    ScrollUp(u32),
    JumpToTop,
    JumpToBottom,
    EnterCommand,
    CancelInput,
    /// A digit was accumulated; caller should redraw status bar.
    Digit,
}

/// Map a key event to an `Action`, consuming/updating the accumulator as needed.
///
/// Returns `None` for unknown keys (caller should reset accumulator).
pub(super) fn map_key_event(key: KeyEvent, acc: &mut InputAccumulator) -> Option<Action> {
    let KeyEvent { code, modifiers, .. } = key;
    let count = |acc: &mut InputAccumulator| acc.take().unwrap_or(1);

    match (code, modifiers) {
        (KeyCode::Char('q'), _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Action::Quit),

        // Esc cancels a pending count first, quits otherwise
        (KeyCode::Esc, _) => {
            if acc.is_active() {
                acc.reset();
                Some(Action::CancelInput)
            } else {
                Some(Action::Quit)
            }
        }

        (KeyCode::Char(c @ '0'..='9'), KeyModifiers::NONE) => {
            let d = c as u32 - '0' as u32;
            acc.push_digit(d);
            Some(Action::Digit)
        }

        (KeyCode::Char('l' | 'n' | ' '), _) | (KeyCode::Right, _) | (KeyCode::PageDown, _) => {
            Some(Action::NextPage(count(acc)))
        }
        (KeyCode::Char('h' | 'p'), _) | (KeyCode::Left, _) | (KeyCode::PageUp, _) => {
            Some(Action::PrevPage(count(acc)))
        }

        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => Some(Action::ScrollDown(count(acc))),
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => Some(Action::ScrollUp(count(acc))),

        (KeyCode::Char('g'), _) | (KeyCode::Home, _) => {
            acc.reset();
            Some(Action::JumpToTop)
        }
        (KeyCode::Char('G'), _) | (KeyCode::End, _) => {
            acc.reset();
            Some(Action::JumpToBottom)
        }

        (KeyCode::Char(':'), _) => {
            acc.reset();
            Some(Action::EnterCommand)
        }

        _ => None,
    }
}

/// Actions in command mode (`:` prompt).
#[derive(Debug, PartialEq, Eq)]
pub(super) enum CommandAction {
    Type(char),
    Backspace,
    Execute,
    Cancel,
}

pub(super) fn map_command_key(key: KeyEvent) -> Option<CommandAction> {
    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
            Some(CommandAction::Cancel)
        }
        (KeyCode::Enter, _) => Some(CommandAction::Execute),
        (KeyCode::Backspace, _) => Some(CommandAction::Backspace),
        (KeyCode::Char(c), m) if !m.contains(KeyModifiers::CONTROL) => {
            Some(CommandAction::Type(c))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState};

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn simple_key(code: KeyCode) -> KeyEvent {
        key(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_arrows_flip_pages() {
        let mut acc = InputAccumulator::new();
        assert_eq!(map_key_event(simple_key(KeyCode::Right), &mut acc), Some(Action::NextPage(1)));
        assert_eq!(map_key_event(simple_key(KeyCode::Left), &mut acc), Some(Action::PrevPage(1)));
    }

    #[test]
    fn test_space_is_next_page() {
        let mut acc = InputAccumulator::new();
        let a = map_key_event(simple_key(KeyCode::Char(' ')), &mut acc);
        assert_eq!(a, Some(Action::NextPage(1)));
    }

    #[test]
    fn test_5n_flips_five() {
        let mut acc = InputAccumulator::new();
        let a = map_key_event(simple_key(KeyCode::Char('5')), &mut acc);
        assert_eq!(a, Some(Action::Digit));
        let a = map_key_event(simple_key(KeyCode::Char('n')), &mut acc);
        assert_eq!(a, Some(Action::NextPage(5)));
        assert!(!acc.is_active());
    }

    #[test]
    fn test_12j_scroll_down() {
        let mut acc = InputAccumulator::new();
        map_key_event(simple_key(KeyCode::Char('1')), &mut acc);
        map_key_event(simple_key(KeyCode::Char('2')), &mut acc);
        assert_eq!(acc.peek(), Some(12));
        let a = map_key_event(simple_key(KeyCode::Char('j')), &mut acc);
        assert_eq!(a, Some(Action::ScrollDown(12)));
    }

    #[test]
    fn test_count_overflow_ignored() {
        let mut acc = InputAccumulator::new();
        for _ in 0..6 {
            map_key_event(simple_key(KeyCode::Char('9')), &mut acc);
        }
        assert_eq!(acc.peek(), Some(9_999));
    }

    #[test]
    fn test_q_quits() {
        let mut acc = InputAccumulator::new();
        let a = map_key_event(simple_key(KeyCode::Char('q')), &mut acc);
        assert_eq!(a, Some(Action::Quit));
    }

    #[test]
    fn test_ctrl_c_quits() {
        let mut acc = InputAccumulator::new();
        let a = map_key_event(key(KeyCode::Char('c'), KeyModifiers::CONTROL), &mut acc);
        assert_eq!(a, Some(Action::Quit));
    }

    #[test]
    fn test_esc_cancels_count_then_quits() {
        let mut acc = InputAccumulator::new();
        map_key_event(simple_key(KeyCode::Char('5')), &mut acc);
        assert_eq!(map_key_event(simple_key(KeyCode::Esc), &mut acc), Some(Action::CancelInput));
        assert!(!acc.is_active());
        assert_eq!(map_key_event(simple_key(KeyCode::Esc), &mut acc), Some(Action::Quit));
    }

    #[test]
    fn test_big_g_bottom() {
        let mut acc = InputAccumulator::new();
        let a = map_key_event(key(KeyCode::Char('G'), KeyModifiers::SHIFT), &mut acc);
        assert_eq!(a, Some(Action::JumpToBottom));
    }

    #[test]
    fn test_colon_enters_command() {
        let mut acc = InputAccumulator::new();
        let a = map_key_event(simple_key(KeyCode::Char(':')), &mut acc);
        assert_eq!(a, Some(Action::EnterCommand));
    }

    #[test]
    fn test_unknown_key_returns_none() {
        let mut acc = InputAccumulator::new();
        let a = map_key_event(simple_key(KeyCode::Char('x')), &mut acc);
        assert!(a.is_none());
    }

    #[test]
    fn test_command_keys() {
        assert_eq!(map_command_key(simple_key(KeyCode::Char('o'))), Some(CommandAction::Type('o')));
        assert_eq!(map_command_key(simple_key(KeyCode::Enter)), Some(CommandAction::Execute));
        assert_eq!(map_command_key(simple_key(KeyCode::Backspace)), Some(CommandAction::Backspace));
        assert_eq!(map_command_key(simple_key(KeyCode::Esc)), Some(CommandAction::Cancel));
        assert_eq!(map_command_key(key(KeyCode::Char('w'), KeyModifiers::CONTROL)), None);
    }
}
