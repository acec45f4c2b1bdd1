use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::tui::app::{App, Mode};

use super::helpers::pad_with_hint;

/// Render the status row (bottom of screen)
pub fn render_status_row(frame: &mut Frame, app: &App, area: Rect) {
    let bg = app.theme.background;
    let width = area.width as usize;
    let fill = Span::styled("", Style::default().bg(bg));
    let dim = Style::default().fg(app.theme.dim).bg(bg);

    let line = match app.mode {
        Mode::Search => {
            let mut spans = vec![
                Span::styled(
                    format!("/{}", app.search_input),
                    Style::default().fg(app.theme.text_bright).bg(bg),
                ),
                Span::styled("\u{258C}", Style::default().fg(app.theme.highlight).bg(bg)),
            ];
            pad_with_hint(&mut spans, Span::styled("Enter keep  Esc cancel", dim), width, fill);
            Line::from(spans)
        }
        Mode::Navigate => {
            let mut spans = Vec::new();
            if let Some(message) = &app.status_message {
                spans.push(Span::styled(
                    format!(" {}", message),
                    Style::default().fg(app.theme.yellow).bg(bg),
                ));
            } else if let Some(task) = app.view.selected_task() {
                spans.push(Span::styled(
                    format!(" {} \u{00B7} {} \u{00B7} {}", task.id, task.status, task.priority),
                    dim,
                ));
            }
            let hint = if app.undo.is_active() {
                "u undo  ? help"
            } else {
                "? help"
            };
            pad_with_hint(&mut spans, Span::styled(hint, dim), width, fill);
            Line::from(spans)
        }
    };

    let paragraph = Paragraph::new(line).style(Style::default().bg(bg));
    frame.render_widget(paragraph, area);
}
