use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use regex::Regex;

use crate::model::{Priority, Task};
use crate::tui::app::App;
use crate::util::unicode;
use crate::view::{ViewMode, VisibleRow};

use super::helpers::spans_width;
use super::push_highlighted_spans;

/// Keep the cursor row inside the viewport
fn adjust_scroll(offset: usize, cursor: Option<usize>, height: usize) -> usize {
    let Some(cursor) = cursor else {
        return 0;
    };
    if height == 0 {
        return offset;
    }
    if cursor < offset {
        cursor
    } else if cursor >= offset + height {
        cursor + 1 - height
    } else {
        offset
    }
}

pub fn render_task_list(frame: &mut Frame, app: &mut App, area: Rect) {
    let bg = app.theme.background;
    let rows = app.view.rows();

    if rows.is_empty() {
        let message = if app.view.index().len() == 0 {
            "No tasks. Press i to import a document."
        } else {
            "No tasks match the current filter."
        };
        let empty = Paragraph::new(format!(" {}", message))
            .style(Style::default().fg(app.theme.dim).bg(bg));
        frame.render_widget(empty, area);
        return;
    }

    let height = area.height as usize;
    app.scroll_offset = adjust_scroll(app.scroll_offset, app.view.selected_index(), height);

    let app = &*app;
    let search_re = app.view.options().search_regex();
    let cursor = app.view.selected_index();
    let width = area.width as usize;

    let lines: Vec<Line> = app
        .view
        .rows()
        .iter()
        .enumerate()
        .skip(app.scroll_offset)
        .take(height)
        .filter_map(|(i, row)| {
            let task = app.view.index().resolve(&row.id)?;
            Some(render_row(app, row, task, cursor == Some(i), width, search_re.as_ref()))
        })
        .collect();

    let paragraph = Paragraph::new(lines).style(Style::default().bg(bg));
    frame.render_widget(paragraph, area);
}

fn render_row<'a>(
    app: &'a App,
    row: &VisibleRow,
    task: &Task,
    is_cursor: bool,
    width: usize,
    search_re: Option<&Regex>,
) -> Line<'a> {
    let theme = &app.theme;
    let is_multi = app.view.cursor().is_multi_selected(&row.id);
    let row_bg = if is_cursor { theme.selection_bg } else { theme.background };
    let dim = Style::default().fg(theme.dim).bg(row_bg);

    let mut spans: Vec<Span> = Vec::new();

    // Column 0: cursor bar or multi-select marker
    if is_multi {
        spans.push(Span::styled("\u{258C}", Style::default().fg(theme.multi_select).bg(row_bg)));
    } else if is_cursor {
        spans.push(Span::styled("\u{258E}", Style::default().fg(theme.highlight).bg(row_bg)));
    } else {
        spans.push(Span::styled(" ", dim));
    }

    // Tree guides
    if app.view.options().mode == ViewMode::Tree && row.depth > 0 {
        for (d, ancestor_is_last) in row.ancestor_last.iter().enumerate() {
            if d == 0 || *ancestor_is_last {
                spans.push(Span::styled("   ", dim));
            } else {
                spans.push(Span::styled("\u{2502}  ", dim));
            }
        }
        let connector = if row.is_last_sibling { "\u{2514}" } else { "\u{251C}" };
        spans.push(Span::styled(format!("{}\u{2500}", connector), dim));
    } else if row.depth > 0 {
        spans.push(Span::styled("  ".repeat(row.depth), dim));
    }

    let expand_char = match (row.has_children, row.is_expanded) {
        (true, true) => "\u{25BC}",
        (true, false) => "\u{25B6}",
        _ => " ",
    };
    spans.push(Span::styled(expand_char, dim));

    let status_color = theme.status_color(task.status);
    spans.push(Span::styled(
        format!("[{}] ", task.status.glyph()),
        Style::default().fg(status_color).bg(row_bg),
    ));

    let id_style = if row.matched {
        Style::default().fg(theme.text_bright).bg(row_bg)
    } else {
        dim
    };
    spans.push(Span::styled(format!("{} ", task.id), id_style));

    // Right-hand columns: priority, complexity, dependency count
    let mut tail: Vec<Span> = Vec::new();
    if !task.dependencies.is_empty() {
        tail.push(Span::styled(format!(" \u{2190}{}", task.dependencies.len()), dim));
    }
    if let Some(score) = task.complexity {
        let color = theme.complexity_color(score, app.config.analysis.threshold);
        tail.push(Span::styled(format!(" c{}", score), Style::default().fg(color).bg(row_bg)));
    }
    let priority = match task.priority {
        Priority::High => Span::styled(" !", Style::default().fg(theme.red).bg(row_bg)),
        Priority::Medium => Span::styled("  ", dim),
        Priority::Low => Span::styled(" \u{2193}", dim),
    };
    tail.push(priority);
    tail.push(Span::styled(" ", dim));

    // Title fills what is left, truncated to fit
    let used = spans_width(&spans) + spans_width(&tail);
    let title_budget = width.saturating_sub(used + 1);
    let title = unicode::truncate_to_width(&task.title, title_budget);
    let title_color = if row.matched { theme.text } else { theme.dim };
    let base = Style::default().fg(title_color).bg(row_bg);
    let highlight = Style::default()
        .fg(theme.search_match_fg)
        .bg(theme.search_match_bg)
        .add_modifier(Modifier::BOLD);
    push_highlighted_spans(&mut spans, &title, base, highlight, search_re);

    let gap = width.saturating_sub(spans_width(&spans) + spans_width(&tail));
    spans.push(Span::styled(" ".repeat(gap), Style::default().bg(row_bg)));
    spans.extend(tail);

    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_follows_cursor() {
        assert_eq!(adjust_scroll(0, Some(3), 10), 0);
        assert_eq!(adjust_scroll(0, Some(12), 10), 3);
        assert_eq!(adjust_scroll(5, Some(2), 10), 2);
        assert_eq!(adjust_scroll(5, None, 10), 0);
    }
}
