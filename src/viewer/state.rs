//! Viewer state: layout, scroll position, image placement math.

// ---------------------------------------------------------------------------
// Layout / ViewState
// ---------------------------------------------------------------------------

pub(super) struct Layout {
    pub term_cols: u16,
    pub image_rows: u16, // rows available to the page image (= term_rows - 1)
    pub status_row: u16, // status bar row (= term_rows - 1)
    pub cell_w: u16,     // pixels per cell (width)
    pub cell_h: u16,     // pixels per cell (height)
}

impl Layout {
    /// Viewport width in pixels; page images are shrunk to fit it.
    pub fn vp_w(&self) -> u32 {
        self.term_cols as u32 * self.cell_w as u32
    }

    /// Viewport height in pixels.
    pub fn vp_h(&self) -> u32 {
        self.image_rows as u32 * self.cell_h as u32
    }
}

pub(super) struct ViewState {
    pub y_offset: u32, // scroll offset into the page image (pixels)
    pub img_w: u32,
    pub img_h: u32,
    pub series: String,
    pub page_label: String,
}

impl ViewState {
    pub fn max_scroll(&self, layout: &Layout) -> u32 {
        self.img_h.saturating_sub(layout.vp_h())
    }

    /// Scroll progress through the current page, 0..=100.
    pub fn percent(&self, layout: &Layout) -> u32 {
        let max_y = self.max_scroll(layout);
        if max_y == 0 {
            100
        } else {
            ((self.y_offset as u64 * 100) / max_y as u64) as u32
        }
    }
}

pub(super) fn compute_layout(term_cols: u16, term_rows: u16, pixel_w: u16, pixel_h: u16) -> Layout {
    let image_rows = term_rows.saturating_sub(1);
    let status_row = term_rows.saturating_sub(1);
    let cell_w = if term_cols > 0 {
        (pixel_w / term_cols).max(1)
    } else {
        1
    };
    let cell_h = if term_rows > 0 {
        (pixel_h / term_rows).max(1)
    } else {
        1
    };
    Layout {
        term_cols,
        image_rows,
        status_row,
        cell_w,
        cell_h,
    }
}

/// Kitty placement for the visible slice of the page image.
#[derive(Debug, PartialEq, Eq)]
pub(super) struct Placement {
    pub col: u16,
    pub src_y: u32,
    pub src_h: u32,
    pub cols: u16,
    pub rows: u16,
}

/// Centre the image horizontally and crop it vertically at `y_offset`.
pub(super) fn placement(layout: &Layout, state: &ViewState) -> Placement {
    let src_y = state.y_offset.min(state.max_scroll(layout));
    let src_h = state.img_h.saturating_sub(src_y).min(layout.vp_h()).max(1);
    let cols = (state.img_w.div_ceil(layout.cell_w as u32) as u16)
        .clamp(1, layout.term_cols.max(1));
    let rows = (src_h.div_ceil(layout.cell_h as u32) as u16).clamp(1, layout.image_rows.max(1));
    let col = (layout.term_cols.saturating_sub(cols)) / 2;
    Placement {
        col,
        src_y,
        src_h,
        cols,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Layout {
        // 100x31 cells of 10x20 px → viewport 1000x600
        compute_layout(100, 31, 1000, 620)
    }

    fn state(img_w: u32, img_h: u32, y_offset: u32) -> ViewState {
        ViewState {
            y_offset,
            img_w,
            img_h,
            series: "s".into(),
            page_label: "0".into(),
        }
    }

    #[test]
    fn layout_reserves_status_row() {
        let l = layout();
        assert_eq!(l.image_rows, 30);
        assert_eq!(l.status_row, 30);
        assert_eq!((l.cell_w, l.cell_h), (10, 20));
        assert_eq!((l.vp_w(), l.vp_h()), (1000, 600));
    }

    #[test]
    fn zero_sized_terminal_does_not_divide_by_zero() {
        let l = compute_layout(0, 0, 0, 0);
        assert_eq!((l.cell_w, l.cell_h), (1, 1));
    }

    #[test]
    fn short_page_has_no_scroll() {
        let s = state(500, 400, 0);
        assert_eq!(s.max_scroll(&layout()), 0);
        assert_eq!(s.percent(&layout()), 100);
    }

    #[test]
    fn tall_page_scrolls() {
        let s = state(800, 1800, 600);
        assert_eq!(s.max_scroll(&layout()), 1200);
        assert_eq!(s.percent(&layout()), 50);
    }

    #[test]
    fn placement_centres_and_crops() {
        let p = placement(&layout(), &state(500, 1800, 300));
        assert_eq!(
            p,
            Placement {
                col: 25,
                src_y: 300,
                src_h: 600,
                cols: 50,
                rows: 30,
            }
        );
    }

    #[test]
    fn placement_clamps_offset() {
        let p = placement(&layout(), &state(1000, 700, 5000));
        assert_eq!(p.src_y, 100);
        assert_eq!(p.src_h, 600);
        assert_eq!(p.col, 0);
    }

    #[test]
    fn placement_of_short_image() {
        let p = placement(&layout(), &state(200, 90, 0));
        assert_eq!(p.src_h, 90);
        assert_eq!(p.rows, 5);
        assert_eq!(p.cols, 20);
    }
}
