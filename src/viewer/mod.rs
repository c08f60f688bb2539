//! Terminal page viewer with Kitty Graphics Protocol
//!
//! Layout:
//!   rows 0..term_rows-1 : current page, centred, scrolled vertically
//!   row term_rows-1     : status bar
//!
//! Page turning:
//!   Pages come from a `PrefetchCache`. Its worker keeps pages on both sides
//!   of the current one loaded, so `n`/`p` usually return without touching
//!   the provider. When the buffer is empty the main thread blocks in
//!   `next()`/`previous()` until the page arrives or the wait times out.
//!
//! Kitty response suppression:
//!   All Kitty Graphics Protocol commands use `q=2` (suppress all responses).
//!   Without this, error responses are delivered as APC sequences that
//!   crossterm misparses as key events.

mod input;
mod mode_command;
mod mode_normal;
mod state;
mod terminal;

use crossterm::{
    event::{self, Event, KeyEventKind},
    terminal as crossterm_terminal,
};
use log::{debug, info, warn};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::display;
use crate::page::Page;
use crate::prefetch::PrefetchCache;
use crate::series::Series;

use input::{InputAccumulator, map_command_key, map_key_event};
use mode_command::CommandState;
use mode_normal::NormalCtx;
use state::{Layout, ViewState};
use terminal::PAGE_IMAGE_ID;

/// Side effects requested by the mode handlers, applied by the event loop.
enum Effect {
    ScrollTo(u32),
    NextPage(u32),
    PrevPage(u32),
    Open(String),
    SetMode(ViewerMode),
    Flash(String),
    RedrawStatusBar,
    MarkDirty,
    Exit,
}

enum ViewerMode {
    Normal,
    Command(CommandState),
}

/// Run the terminal viewer on `series` until the user quits.
///
/// The bookmark is saved after every page turn and once more on exit.
pub fn run(series: Series, config: &Config) -> anyhow::Result<()> {
    terminal::check_tty()?;

    let provider = series.provider(&config.http)?;
    let seed = series.load_seed(provider.as_ref())?;
    let cache = PrefetchCache::new(provider, seed, config.prefetch.clone());

    let winsize = crossterm_terminal::window_size()
        .map_err(|e| anyhow::anyhow!("failed to get terminal size: {e}"))?;
    if winsize.width == 0 || winsize.height == 0 {
        anyhow::bail!(
            "terminal pixel size {}x{} is zero; Kitty graphics requires non-zero pixel dimensions",
            winsize.width,
            winsize.height
        );
    }
    let layout = state::compute_layout(
        winsize.columns,
        winsize.rows,
        winsize.width,
        winsize.height,
    );

    let mut guard = terminal::RawGuard::enter()?;
    let mut viewer = Viewer {
        series,
        cache: &cache,
        config,
        layout,
    };
    let result = viewer.event_loop();

    let current = cache.current();
    if let Err(e) = viewer.series.save_bookmark(current.id()) {
        warn!("bookmark not saved: {e:#}");
    }
    cache.stop();
    guard.cleanup();
    info!("viewer: closed {} at {}", viewer.series.name, current.id());
    result
}

struct Viewer<'a> {
    series: Series,
    cache: &'a PrefetchCache,
    config: &'a Config,
    layout: Layout,
}

impl Viewer<'_> {
    fn event_loop(&mut self) -> anyhow::Result<()> {
        let mut mode = ViewerMode::Normal;
        let mut acc = InputAccumulator::new();
        // Flash message (e.g., "Last page"), cleared on next keypress
        let mut flash: Option<String> = None;

        let mut page = self.cache.current();
        let mut view = self.show(&page, &mut flash)?;
        self.redraw(&view, acc.peek(), flash.as_deref())?;

        let frame_budget = self.config.viewer.frame_budget;
        let mut dirty = false;
        let mut last_render = Instant::now();

        loop {
            let timeout = if dirty {
                frame_budget.saturating_sub(last_render.elapsed())
            } else {
                Duration::from_secs(86400)
            };

            if event::poll(timeout)? {
                let ev = event::read()?;
                debug!("event: {:?}", ev);

                let effects = match ev {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        let had_flash = flash.take().is_some();
                        match &mut mode {
                            ViewerMode::Normal => match map_key_event(key, &mut acc) {
                                Some(action) => {
                                    let ctx = NormalCtx {
                                        state: &view,
                                        max_scroll: view.max_scroll(&self.layout),
                                        scroll_step: self.config.viewer.scroll_step
                                            * self.layout.cell_h as u32,
                                    };
                                    mode_normal::handle(action, &ctx)
                                }
                                None => {
                                    // Unknown key: reset accumulator
                                    if acc.is_active() || had_flash {
                                        acc.reset();
                                        vec![Effect::RedrawStatusBar]
                                    } else {
                                        vec![]
                                    }
                                }
                            },
                            ViewerMode::Command(cs) => match map_command_key(key) {
                                Some(action) => mode_command::handle(action, cs, &self.layout)?,
                                None => vec![],
                            },
                        }
                    }
                    Event::Resize(new_cols, new_rows) => {
                        let winsize = crossterm_terminal::window_size()?;
                        self.layout = state::compute_layout(
                            new_cols,
                            new_rows,
                            winsize.width,
                            winsize.height,
                        );
                        debug!("resize: {new_cols}x{new_rows}, re-preparing page");
                        let y_offset = view.y_offset;
                        view = self.show(&page, &mut flash)?;
                        view.y_offset = y_offset.min(view.max_scroll(&self.layout));
                        vec![Effect::MarkDirty]
                    }
                    _ => vec![],
                };

                for effect in effects {
                    match effect {
                        Effect::ScrollTo(y) => {
                            view.y_offset = y;
                            dirty = true;
                        }
                        Effect::NextPage(count) | Effect::PrevPage(count) => {
                            let forward = matches!(effect, Effect::NextPage(_));
                            let turned = self.turn(&page, forward, count, &view)?;
                            if turned.id() == page.id() {
                                flash = Some(self.stuck_message(&page, forward));
                                self.draw_status(&view, None, flash.as_deref())?;
                            } else {
                                page = turned;
                                if let Err(e) = self.series.save_bookmark(page.id()) {
                                    warn!("bookmark not saved: {e:#}");
                                }
                                view = self.show(&page, &mut flash)?;
                                dirty = true;
                            }
                        }
                        Effect::Open(name) => match self.open(&name) {
                            Ok(()) => {
                                page = self.cache.current();
                                terminal::delete_all_images()?;
                                view = self.show(&page, &mut flash)?;
                                dirty = true;
                            }
                            Err(e) => {
                                warn!("open {name}: {e:#}");
                                flash = Some(format!("{e:#}"));
                                self.draw_status(&view, None, flash.as_deref())?;
                            }
                        },
                        Effect::SetMode(m) => {
                            if matches!(m, ViewerMode::Command(_)) {
                                terminal::draw_command_bar(&self.layout, "")?;
                            }
                            mode = m;
                        }
                        Effect::Flash(msg) => flash = Some(msg),
                        Effect::RedrawStatusBar => {
                            self.draw_status(&view, acc.peek(), flash.as_deref())?;
                        }
                        Effect::MarkDirty => dirty = true,
                        Effect::Exit => return Ok(()),
                    }
                }
                continue;
            }

            // poll timeout → frame budget elapsed, execute redraw
            if dirty {
                self.redraw(&view, acc.peek(), flash.as_deref())?;
                dirty = false;
            }
            last_render = Instant::now();
        }
    }

    /// Move `count` pages, stopping early at either end of the series.
    fn turn(
        &self,
        from: &Arc<Page>,
        forward: bool,
        count: u32,
        view: &ViewState,
    ) -> io::Result<Arc<Page>> {
        let buffered = {
            let snap = self.cache.snapshot();
            if forward {
                snap.forward.len()
            } else {
                snap.backward.len()
            }
        };
        if buffered < count as usize {
            self.draw_status(view, None, Some("loading…"))?;
        }

        let mut page = Arc::clone(from);
        for _ in 0..count {
            let next = if forward {
                self.cache.next()
            } else {
                self.cache.previous()
            };
            if next.id() == page.id() {
                break;
            }
            page = next;
        }
        debug!("turn: {} -> {} (forward={forward}, count={count})", from.id(), page.id());
        Ok(page)
    }

    fn stuck_message(&self, page: &Page, forward: bool) -> String {
        match (forward, page.has_next(), page.has_previous()) {
            (true, false, _) => "Last page".into(),
            (false, _, false) => "First page".into(),
            _ => "Timed out waiting for page".into(),
        }
    }

    /// Switch to another series, keeping the old one's bookmark.
    fn open(&mut self, name: &str) -> anyhow::Result<()> {
        let series = Series::open(&self.config.series_dir, name)?;
        let provider = series.provider(&self.config.http)?;
        let seed = series.load_seed(provider.as_ref())?;

        if let Err(e) = self.series.save_bookmark(self.cache.current().id()) {
            warn!("bookmark not saved: {e:#}");
        }
        self.cache.reset_with(provider, seed);
        info!("viewer: switched {} -> {}", self.series.name, series.name);
        self.series = series;
        Ok(())
    }

    /// Prepare and upload `page`. A page that fails to decode is shown empty.
    fn show(&self, page: &Page, flash: &mut Option<String>) -> io::Result<ViewState> {
        let (img_w, img_h) = match display::prepare(page.content(), self.layout.vp_w()) {
            Ok(image) => {
                terminal::send_image(&image.png, PAGE_IMAGE_ID)?;
                (image.width, image.height)
            }
            Err(e) => {
                warn!("page {}: {e:#}", page.id());
                *flash = Some(format!("page {}: cannot display", page.id()));
                (0, 0)
            }
        };
        Ok(ViewState {
            y_offset: 0,
            img_w,
            img_h,
            series: self.series.name.clone(),
            page_label: page.id().to_string(),
        })
    }

    fn redraw(
        &self,
        view: &ViewState,
        acc_peek: Option<u32>,
        flash: Option<&str>,
    ) -> io::Result<()> {
        terminal::delete_placements(PAGE_IMAGE_ID)?;
        if view.img_w > 0 {
            let p = state::placement(&self.layout, view);
            terminal::place_image(PAGE_IMAGE_ID, &p, view.img_w)?;
        }
        self.draw_status(view, acc_peek, flash)
    }

    fn draw_status(
        &self,
        view: &ViewState,
        acc_peek: Option<u32>,
        flash: Option<&str>,
    ) -> io::Result<()> {
        terminal::draw_status_bar(&self.layout, view, acc_peek, flash)
    }
}
