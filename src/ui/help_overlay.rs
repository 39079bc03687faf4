//! Help overlay listing the chart's key bindings and what the bar colours mean

use ratatui::{
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::prices::ChartMode;

/// Key bindings shown in the overlay, as (keys, action)
const SHORTCUTS: [(&str, &str); 5] = [
    ("\u{2190}/h, \u{2192}/l", "Scroll through date pairs"),
    ("Home, End", "Jump to first / last bar"),
    ("m", "Switch lowest-price / grouped"),
    ("?", "Toggle this help"),
    ("q, Esc", "Quit"),
];

const OVERLAY_WIDTH: u16 = 48;

/// Title, blank, shortcuts, blank, legend, blank, footer, plus the border
const OVERLAY_HEIGHT: u16 = SHORTCUTS.len() as u16 + 8;

/// Draws the overlay centred over whatever is already on screen
pub fn render(frame: &mut Frame, mode: ChartMode) {
    let overlay_area = centered_rect(OVERLAY_WIDTH, OVERLAY_HEIGHT, frame.area());
    frame.render_widget(Clear, overlay_area);

    let mut lines = vec![
        Line::from(Span::styled(
            "Keyboard Shortcuts",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    lines.extend(SHORTCUTS.iter().map(|(keys, action)| shortcut_line(keys, action)));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        legend(mode),
        Style::default().fg(Color::Gray),
    )));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Press Esc or ? to close",
        Style::default().fg(Color::DarkGray),
    )));

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    frame.render_widget(Paragraph::new(lines).block(block), overlay_area);
}

fn legend(mode: ChartMode) -> &'static str {
    match mode {
        ChartMode::LowestPrice => "Green: mean price <= average - 1 std dev",
        ChartMode::Grouped => "Each colour is one run of date pairs",
    }
}

fn shortcut_line(keys: &str, action: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<12}", keys), Style::default().fg(Color::Yellow)),
        Span::raw(action.to_string()),
    ])
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let [row] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    let [cell] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(row);
    cell
}
