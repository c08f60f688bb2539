//! Terminal I/O layer: raw mode, Kitty Graphics Protocol, status bar.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use crossterm::{
    ExecutableCommand, QueueableCommand, cursor,
    style::{self, Stylize},
    terminal,
};
use std::io::{self, Write, stdout};

use super::state::{Layout, Placement, ViewState};

const CHUNK_SIZE: usize = 4096;

/// Kitty image id used for the page on screen. Re-uploading replaces it.
pub(super) const PAGE_IMAGE_ID: u32 = 1;

// ---------------------------------------------------------------------------
// RawGuard: restores raw mode / alternate screen / images on drop
// ---------------------------------------------------------------------------

pub(super) struct RawGuard {
    cleaned: bool,
}

impl RawGuard {
    pub(super) fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        stdout().execute(terminal::EnterAlternateScreen)?;
        stdout().execute(cursor::Hide)?;
        Ok(Self { cleaned: false })
    }

    pub(super) fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;
        let mut out = stdout();
        let _ = write!(out, "\x1b_Ga=d,d=A,q=2\x1b\\");
        let _ = out.execute(cursor::Show);
        let _ = out.execute(terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

impl Drop for RawGuard {
    fn drop(&mut self) {
        self.cleanup();
    }
}

// ---------------------------------------------------------------------------
// Kitty protocol helpers
// ---------------------------------------------------------------------------

/// Send PNG data in base64 chunks (a=t: transfer only, no placement).
pub(super) fn send_image(png_data: &[u8], image_id: u32) -> io::Result<()> {
    let encoded = BASE64.encode(png_data);
    let chunks: Vec<&[u8]> = encoded.as_bytes().chunks(CHUNK_SIZE).collect();

    let mut out = stdout();
    for (i, chunk) in chunks.iter().enumerate() {
        let m = if i + 1 == chunks.len() { 0 } else { 1 };
        if i == 0 {
            write!(out, "\x1b_Ga=t,f=100,i={image_id},t=d,q=2,m={m};")?;
        } else {
            write!(out, "\x1b_Gm={m},q=2;")?;
        }
        out.write_all(chunk)?;
        write!(out, "\x1b\\")?;
    }
    out.flush()
}

/// Delete the image's placements, keeping its data.
pub(super) fn delete_placements(image_id: u32) -> io::Result<()> {
    let mut out = stdout();
    write!(out, "\x1b_Ga=d,d=i,i={image_id},q=2\x1b\\")?;
    out.flush()
}

/// Delete all images and their data.
pub(super) fn delete_all_images() -> io::Result<()> {
    let mut out = stdout();
    write!(out, "\x1b_Ga=d,d=A,q=2\x1b\\")?;
    out.flush()
}

/// Place the visible slice of the page image.
pub(super) fn place_image(image_id: u32, p: &Placement, img_w: u32) -> io::Result<()> {
    let mut out = stdout();
    out.queue(cursor::MoveTo(p.col, 0))?;
    write!(
        out,
        "\x1b_Ga=p,i={image_id},x=0,y={},w={img_w},h={},c={},r={},C=1,q=2\x1b\\",
        p.src_y, p.src_h, p.cols, p.rows,
    )?;
    out.flush()
}

/// Draw the status bar on the last terminal row.
///
/// `acc_peek`: shows `5_` while a count prefix is being typed
/// `flash`: one-shot message (cleared on next keypress)
pub(super) fn draw_status_bar(
    layout: &Layout,
    state: &ViewState,
    acc_peek: Option<u32>,
    flash: Option<&str>,
) -> io::Result<()> {
    let mut out = stdout();
    out.queue(cursor::MoveTo(0, layout.status_row))?;

    let pct = state.percent(layout);
    let head = format!(" {} | {}", state.series, state.page_label);
    let middle = if let Some(msg) = flash {
        format!("{head} | {msg}  {pct}%")
    } else if let Some(n) = acc_peek {
        format!("{head} | {n}_  {pct}%")
    } else {
        format!("{head}  {pct}%  [n/p:page j/k:scroll g/G:top/bottom :open q:quit]")
    };

    write_bar(&mut out, &middle, layout.term_cols as usize)
}

/// Draw command input bar on the status row (`:input_` prompt).
pub(super) fn draw_command_bar(layout: &Layout, input: &str) -> io::Result<()> {
    let mut out = stdout();
    out.queue(cursor::MoveTo(0, layout.status_row))?;
    write_bar(&mut out, &format!(":{input}_"), layout.term_cols as usize)
}

fn write_bar(out: &mut io::Stdout, text: &str, width: usize) -> io::Result<()> {
    let clipped: String = text.chars().take(width).collect();
    let padded = format!("{clipped:<width$}");
    write!(out, "{}", padded.on_dark_grey().white())?;
    out.queue(style::ResetColor)?;
    out.flush()
}

pub(super) fn check_tty() -> anyhow::Result<()> {
    use std::io::IsTerminal;
    // Only stdout matters. crossterm's `use-dev-tty` reads keyboard from /dev/tty.
    if !io::stdout().is_terminal() {
        anyhow::bail!(
            "pageturn viewer requires an interactive terminal.\n\
             \n\
             Supported terminals: Kitty, Ghostty, WezTerm\n\
             To save pages to files instead, use: pageturn dump <series> -o <dir>"
        );
    }
    Ok(())
}
