use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use crate::tui::app::App;
use crate::util::unicode;
use crate::workflow::dialog::{
    ChoiceDialog, DeleteOptionsDialog, Dialog, ImpactReviewDialog, ProgressDialog,
    TextInputDialog, UndoDialog,
};

use super::helpers::centered_rect_fixed;

const DIALOG_WIDTH: u16 = 56;
const BAR_WIDTH: usize = 30;

/// Draw one dialog as a bordered popup centered in `area`
pub fn render_dialog(frame: &mut Frame, app: &App, dialog: &Dialog, area: Rect) {
    let theme = &app.theme;
    let bg = theme.background;
    let text = Style::default().fg(theme.text).bg(bg);
    let dim = Style::default().fg(theme.dim).bg(bg);
    let key = Style::default().fg(theme.highlight).bg(bg);

    let (lines, border) = match dialog {
        Dialog::Choice(choice) => (choice_lines(app, choice), theme.highlight),
        Dialog::Confirm(confirm) => (
            vec![
                Line::from(Span::styled(confirm.message.clone(), text)),
                Line::from(""),
                hint_line(&[("y", "confirm"), ("n", "cancel")], key, dim),
            ],
            theme.yellow,
        ),
        Dialog::DeleteOptions(options) => (delete_option_lines(app, options), theme.yellow),
        Dialog::ImpactReview(review) => {
            let border = if review.impact.is_blocked() { theme.red } else { theme.yellow };
            (impact_lines(app, review), border)
        }
        Dialog::TextInput(input) => (text_input_lines(app, input), theme.highlight),
        Dialog::Progress(progress) => (progress_lines(app, progress), theme.cyan),
        Dialog::Result(result) => {
            let mut lines: Vec<Line> = result
                .lines
                .iter()
                .map(|l| Line::from(Span::styled(l.clone(), text)))
                .collect();
            lines.push(Line::from(""));
            lines.push(hint_line(&[("Enter", "close")], key, dim));
            (lines, theme.green)
        }
        Dialog::Error(err) => {
            let mut lines = vec![Line::from(Span::styled(
                err.message.clone(),
                Style::default().fg(theme.text_bright).bg(bg),
            ))];
            if let Some(details) = &err.details {
                lines.push(Line::from(Span::styled(details.clone(), dim)));
            }
            if !err.hints.is_empty() {
                lines.push(Line::from(""));
                for hint in &err.hints {
                    lines.push(Line::from(Span::styled(format!("\u{2022} {}", hint), text)));
                }
            }
            lines.push(Line::from(""));
            lines.push(Line::from(vec![
                Span::styled(format!("{} error  ", err.kind.label()), dim),
                Span::styled("Enter", key),
                Span::styled(" close", dim),
            ]));
            (lines, theme.red)
        }
        Dialog::Undo(undo) => (undo_lines(app, undo), theme.highlight),
    };

    let height = (lines.len() as u16 + 2).min(area.height.saturating_sub(2));
    let popup = centered_rect_fixed(DIALOG_WIDTH, height, area);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .title(Span::styled(
            format!(" {} ", dialog.title()),
            Style::default()
                .fg(theme.text_bright)
                .bg(bg)
                .add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border).bg(bg))
        .style(Style::default().bg(bg));
    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, popup);
}

fn hint_line<'a>(pairs: &[(&'a str, &'a str)], key: Style, dim: Style) -> Line<'a> {
    let mut spans = Vec::new();
    for (i, (k, desc)) in pairs.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled("  ", dim));
        }
        spans.push(Span::styled(*k, key));
        spans.push(Span::styled(format!(" {}", desc), dim));
    }
    Line::from(spans)
}

fn marker_style(selected: bool, app: &App) -> Style {
    let theme = &app.theme;
    if selected {
        Style::default()
            .fg(theme.text_bright)
            .bg(theme.selection_bg)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.text).bg(theme.background)
    }
}

fn choice_lines<'a>(app: &App, choice: &ChoiceDialog) -> Vec<Line<'a>> {
    let dim = Style::default().fg(app.theme.dim).bg(app.theme.background);
    let key = Style::default().fg(app.theme.highlight).bg(app.theme.background);
    let mut lines: Vec<Line> = choice
        .options
        .iter()
        .enumerate()
        .map(|(i, option)| {
            let selected = i == choice.selected;
            let marker = if selected { "\u{25B8} " } else { "  " };
            Line::from(Span::styled(format!("{}{}", marker, option), marker_style(selected, app)))
        })
        .collect();
    lines.push(Line::from(""));
    lines.push(hint_line(&[("j/k", "choose"), ("Enter", "run"), ("Esc", "cancel")], key, dim));
    lines
}

fn checkbox(on: bool) -> &'static str {
    if on { "[x]" } else { "[ ]" }
}

fn delete_option_lines<'a>(app: &App, dialog: &DeleteOptionsDialog) -> Vec<Line<'a>> {
    let theme = &app.theme;
    let bg = theme.background;
    let dim = Style::default().fg(theme.dim).bg(bg);
    let key = Style::default().fg(theme.highlight).bg(bg);

    let mut lines = vec![Line::from(Span::styled(
        format!("Deleting {}", dialog.ids.join(", ")),
        Style::default().fg(theme.text).bg(bg),
    ))];
    if let Some(notice) = &dialog.notice {
        lines.push(Line::from(Span::styled(
            format!("Blocked: {}", notice),
            Style::default().fg(theme.red).bg(bg),
        )));
    }
    lines.push(Line::from(""));
    let rows = [
        (dialog.options.recursive, "Recursive: include subtasks"),
        (dialog.options.force, "Force: strip dependency references"),
    ];
    for (i, (on, label)) in rows.iter().enumerate() {
        lines.push(Line::from(Span::styled(
            format!("{} {}", checkbox(*on), label),
            marker_style(dialog.focus == i, app),
        )));
    }
    lines.push(Line::from(""));
    lines.push(hint_line(
        &[("Space", "toggle"), ("Enter", "review"), ("Esc", "cancel")],
        key,
        dim,
    ));
    lines
}

fn impact_lines<'a>(app: &App, review: &ImpactReviewDialog) -> Vec<Line<'a>> {
    let theme = &app.theme;
    let bg = theme.background;
    let text = Style::default().fg(theme.text).bg(bg);
    let dim = Style::default().fg(theme.dim).bg(bg);
    let key = Style::default().fg(theme.highlight).bg(bg);
    let impact = &review.impact;

    let mut lines = vec![Line::from(Span::styled(
        format!("{} will be deleted", crate::util::plural(impact.total_delete_count, "task")),
        text,
    ))];
    if !impact.dependents.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("Dependents: {}", impact.dependents.join(", ")),
            dim,
        )));
    }
    for warning in &impact.warnings {
        lines.push(Line::from(Span::styled(
            format!("! {}", warning),
            Style::default().fg(theme.yellow).bg(bg),
        )));
    }
    lines.push(Line::from(""));
    match impact.blocking_reason() {
        Some(reason) => {
            lines.push(Line::from(Span::styled(
                format!("Cannot delete: {}", reason),
                Style::default().fg(theme.red).bg(bg),
            )));
            lines.push(hint_line(&[("Enter", "change options"), ("Esc", "cancel")], key, dim));
        }
        None => lines.push(hint_line(&[("y", "delete"), ("n", "cancel")], key, dim)),
    }
    lines
}

fn text_input_lines<'a>(app: &App, input: &TextInputDialog) -> Vec<Line<'a>> {
    let theme = &app.theme;
    let bg = theme.background;
    let dim = Style::default().fg(theme.dim).bg(bg);
    let key = Style::default().fg(theme.highlight).bg(bg);
    let budget = (DIALOG_WIDTH as usize).saturating_sub(6 + unicode::display_width(&input.prompt));
    // Keep the tail of long values visible
    let value = tail_to_width(&input.value, budget);
    vec![
        Line::from(vec![
            Span::styled(format!("{} ", input.prompt), dim),
            Span::styled(value, Style::default().fg(theme.text_bright).bg(bg)),
            Span::styled("\u{258C}", Style::default().fg(theme.highlight).bg(bg)),
        ]),
        Line::from(""),
        hint_line(&[("Enter", "ok"), ("Esc", "cancel")], key, dim),
    ]
}

fn tail_to_width(s: &str, max_cells: usize) -> String {
    if unicode::display_width(s) <= max_cells {
        return s.to_string();
    }
    let reversed: String = s.chars().rev().collect();
    let cut = unicode::truncate_to_width(&reversed, max_cells);
    cut.chars().rev().collect()
}

fn progress_bar(ratio: f64, fill: Color, empty: Color, bg: Color) -> Vec<Span<'static>> {
    let filled = ((ratio * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    vec![
        Span::styled("\u{2588}".repeat(filled), Style::default().fg(fill).bg(bg)),
        Span::styled("\u{2591}".repeat(BAR_WIDTH - filled), Style::default().fg(empty).bg(bg)),
    ]
}

fn progress_lines<'a>(app: &App, dialog: &ProgressDialog) -> Vec<Line<'a>> {
    let theme = &app.theme;
    let bg = theme.background;
    let text = Style::default().fg(theme.text).bg(bg);
    let dim = Style::default().fg(theme.dim).bg(bg);
    let key = Style::default().fg(theme.highlight).bg(bg);

    let mut lines = Vec::new();
    match &dialog.progress {
        Some(progress) => {
            lines.push(Line::from(Span::styled(
                format!("{}: {}", progress.stage, progress.message),
                text,
            )));
            let mut bar = progress_bar(progress.ratio(), theme.cyan, theme.dim, bg);
            if progress.total > 0 {
                bar.push(Span::styled(
                    format!(" {}/{}", progress.current.min(progress.total), progress.total),
                    dim,
                ));
            }
            lines.push(Line::from(bar));
        }
        None => {
            lines.push(Line::from(Span::styled("Starting\u{2026}", text)));
            lines.push(Line::from(progress_bar(0.0, theme.cyan, theme.dim, bg)));
        }
    }
    lines.push(Line::from(""));
    if dialog.cancelling {
        lines.push(Line::from(Span::styled(
            "Cancelling\u{2026}",
            Style::default().fg(theme.yellow).bg(bg),
        )));
    } else {
        lines.push(hint_line(&[("Esc", "cancel")], key, dim));
    }
    lines
}

fn undo_lines<'a>(app: &App, dialog: &UndoDialog) -> Vec<Line<'a>> {
    let theme = &app.theme;
    let bg = theme.background;
    let key = Style::default().fg(theme.highlight).bg(bg);
    let dim = Style::default().fg(theme.dim).bg(bg);
    vec![
        Line::from(Span::styled(
            dialog.token.summary.clone(),
            Style::default().fg(theme.text).bg(bg),
        )),
        Line::from(Span::styled(
            format!("Undo available for {}s", dialog.remaining_secs.max(0)),
            Style::default().fg(theme.yellow).bg(bg),
        )),
        Line::from(""),
        hint_line(&[("u", "undo"), ("Esc", "dismiss")], key, dim),
    ]
}
