use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::tui::app::App;

/// Two rows: project, tag and view state on top, a separator below.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let bg = app.theme.background;
    let dim = Style::default().fg(app.theme.dim).bg(bg);
    let text = Style::default().fg(app.theme.text).bg(bg);
    let options = app.view.options();

    let project = app
        .project_root()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "taskdeck".into());

    let mut spans = vec![
        Span::styled(
            format!(" {} ", project),
            Style::default()
                .fg(app.theme.text_bright)
                .bg(bg)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("\u{2502} ", dim),
        Span::styled(
            format!("tag {}", app.store.tag()),
            Style::default().fg(app.theme.highlight).bg(bg),
        ),
    ];
    if app.tags.len() > 1 {
        spans.push(Span::styled(format!(" (+{})", app.tags.len() - 1), dim));
    }
    let total = app.view.index().len();
    let count = if options.is_filtered() {
        format!("  {} of {} shown", app.view.rows().len(), total)
    } else {
        format!("  {} tasks", total)
    };
    spans.push(Span::styled(count, text));
    spans.push(Span::styled(format!("  {} view", options.mode.as_str()), dim));
    spans.push(Span::styled(format!("  sort {}", options.sort.as_str()), dim));
    if let Some(status) = options.status_filter {
        spans.push(Span::styled(
            format!("  status:{}", status),
            Style::default().fg(app.theme.status_color(status)).bg(bg),
        ));
    }
    if let Some(query) = &options.search {
        spans.push(Span::styled(
            format!("  /{}", query),
            Style::default().fg(app.theme.cyan).bg(bg),
        ));
    }
    let selected = app.view.cursor().multi_selected().len();
    if selected > 0 {
        spans.push(Span::styled(
            format!("  {} selected", selected),
            Style::default().fg(app.theme.multi_select).bg(bg),
        ));
    }
    for workflow in app.orchestrator.running() {
        let mut label = format!("  {}", workflow.kind.label().to_lowercase());
        if workflow.cancel_requested {
            label.push_str(" (cancelling)");
        } else if let Some(progress) = &workflow.last_progress {
            label.push_str(&format!(" {}/{}", progress.current, progress.total));
        }
        spans.push(Span::styled(
            label,
            Style::default().fg(app.theme.yellow).bg(bg),
        ));
    }

    let separator = Line::from(Span::styled(
        "\u{2500}".repeat(area.width as usize),
        dim,
    ));
    let paragraph = Paragraph::new(vec![Line::from(spans), separator]).style(Style::default().bg(bg));
    frame.render_widget(paragraph, area);
}
