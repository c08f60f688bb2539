//! Normal mode handler: page turning, scrolling, mode transitions.

use log::debug;

use super::mode_command::CommandState;
use super::state::ViewState;
use super::{Effect, ViewerMode};
use crate::viewer::input::Action;

pub(super) struct NormalCtx<'a> {
    pub state: &'a ViewState,
    pub max_scroll: u32,
    pub scroll_step: u32,
}

pub(super) fn handle(action: Action, ctx: &NormalCtx) -> Vec<Effect> {
    match action {
        Action::Quit => vec![Effect::Exit],

        Action::CancelInput => vec![Effect::RedrawStatusBar],

        Action::Digit => vec![Effect::RedrawStatusBar],

        Action::NextPage(count) => vec![Effect::NextPage(count)],
        Action::PrevPage(count) => vec![Effect::PrevPage(count)],

        Action::ScrollDown(count) => {
            let y = ctx
                .state
                .y_offset
                .saturating_add(count.saturating_mul(ctx.scroll_step))
                .min(ctx.max_scroll);
            debug!(
                "scroll down: y_offset {} → {} (count={count}, step={}, max={})",
                ctx.state.y_offset, y, ctx.scroll_step, ctx.max_scroll
            );
            vec![Effect::ScrollTo(y)]
        }
        Action::ScrollUp(count) => {
            let y = ctx
                .state
                .y_offset
                .saturating_sub(count.saturating_mul(ctx.scroll_step));
            debug!(
                "scroll up: y_offset {} → {} (count={count}, step={}, max={})",
                ctx.state.y_offset, y, ctx.scroll_step, ctx.max_scroll
            );
            vec![Effect::ScrollTo(y)]
        }

        Action::JumpToTop => vec![Effect::ScrollTo(0)],
        Action::JumpToBottom => vec![Effect::ScrollTo(ctx.max_scroll)],

        Action::EnterCommand => vec![Effect::SetMode(ViewerMode::Command(CommandState {
            input: String::new(),
        }))],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(y_offset: u32) -> ViewState {
        ViewState {
            y_offset,
            img_w: 100,
            img_h: 1000,
            series: "s".into(),
            page_label: "0".into(),
        }
    }

    fn run(action: Action, y_offset: u32) -> Vec<Effect> {
        let state = view(y_offset);
        let ctx = NormalCtx {
            state: &state,
            max_scroll: 400,
            scroll_step: 60,
        };
        handle(action, &ctx)
    }

    #[test]
    fn scroll_clamps_at_bottom() {
        assert!(matches!(run(Action::ScrollDown(10), 0)[..], [Effect::ScrollTo(400)]));
        assert!(matches!(run(Action::ScrollDown(2), 100)[..], [Effect::ScrollTo(220)]));
    }

    #[test]
    fn scroll_clamps_at_top() {
        assert!(matches!(run(Action::ScrollUp(3), 100)[..], [Effect::ScrollTo(0)]));
    }

    #[test]
    fn page_actions_pass_count_through() {
        assert!(matches!(run(Action::NextPage(4), 0)[..], [Effect::NextPage(4)]));
        assert!(matches!(run(Action::PrevPage(1), 0)[..], [Effect::PrevPage(1)]));
    }

    #[test]
    fn colon_opens_empty_prompt() {
        let effects = run(Action::EnterCommand, 0);
        match &effects[..] {
            [Effect::SetMode(ViewerMode::Command(cs))] => assert!(cs.input.is_empty()),
            _ => panic!("expected command mode"),
        }
    }
}
