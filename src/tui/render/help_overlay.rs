use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::tui::app::App;

use super::helpers::centered_rect_fixed;

const BINDINGS: &[(&str, &[(&str, &str)])] = &[
    (
        "Navigation",
        &[
            ("\u{2191}\u{2193}/jk", "Move cursor"),
            ("\u{2190}/h", "Collapse / go to parent"),
            ("\u{2192}/l", "Expand"),
            ("Space/Enter", "Toggle expand"),
            ("E / C", "Expand / collapse all"),
            (":", "Go to task ID"),
        ],
    ),
    (
        "View",
        &[
            ("v", "Tree / flat view"),
            ("f", "Cycle status filter"),
            ("o", "Cycle sort"),
            ("/", "Search"),
            ("r", "Reload from disk"),
        ],
    ),
    (
        "Tasks",
        &[
            ("x", "Toggle multi-select"),
            ("s", "Cycle status"),
            ("a", "Analyze complexity"),
            ("i", "Import document"),
            ("e", "Expand into subtasks"),
            ("d", "Delete"),
            ("u", "Undo delete"),
            ("q", "Quit"),
        ],
    ),
];

/// Render the help overlay (toggled with ?)
pub fn render_help_overlay(frame: &mut Frame, app: &App, area: Rect) {
    let bg = app.theme.background;
    let key_style = Style::default()
        .fg(app.theme.highlight)
        .bg(bg)
        .add_modifier(Modifier::BOLD);
    let desc_style = Style::default().fg(app.theme.text).bg(bg);
    let header_style = Style::default()
        .fg(app.theme.text_bright)
        .bg(bg)
        .add_modifier(Modifier::BOLD);

    let mut lines: Vec<Line> = Vec::new();
    for (section, bindings) in BINDINGS {
        if !lines.is_empty() {
            lines.push(Line::from(""));
        }
        lines.push(Line::from(Span::styled(format!(" {}", section), header_style)));
        for (key, desc) in *bindings {
            lines.push(Line::from(vec![
                Span::styled(format!(" {:<14}", key), key_style),
                Span::styled(*desc, desc_style),
            ]));
        }
    }

    let height = lines.len() as u16 + 2;
    let overlay_area = centered_rect_fixed(44, height, area);
    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
        .title(Span::styled(" Key Bindings ", header_style))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(app.theme.dim).bg(bg))
        .style(Style::default().bg(bg));
    frame.render_widget(Paragraph::new(lines).block(block), overlay_area);
}
