use ratatui::layout::Rect;
use ratatui::text::Span;

use crate::util::unicode;

/// Total display width of a slice of spans
pub(super) fn spans_width(spans: &[Span]) -> usize {
    spans
        .iter()
        .map(|s| unicode::display_width(&s.content))
        .sum()
}

/// Fixed-size rect centered in `area`, clamped to fit
pub(super) fn centered_rect_fixed(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width, height)
}

/// Right-align `hint` after `spans` when there is room
pub(super) fn pad_with_hint<'a>(spans: &mut Vec<Span<'a>>, hint: Span<'a>, width: usize, fill: Span<'a>) {
    let used = spans_width(spans);
    let hint_width = unicode::display_width(&hint.content);
    if used + hint_width < width {
        spans.push(Span::styled(" ".repeat(width - used - hint_width), fill.style));
        spans.push(hint);
    }
}
