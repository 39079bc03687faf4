//! Fare chart view
//!
//! Renders one bar per (departure date, arrival date) entry of the price table,
//! coloured by its [`BarClass`], with a header summarising the chart and a help
//! bar at the bottom.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph},
    Frame,
};

use crate::app::App;
use crate::prices::{BarClass, ChartMode, PriceEntry};

use super::help_overlay;

/// Color palette for the chart view
mod colors {
    use ratatui::style::Color;

    /// Section headers
    pub const HEADER: Color = Color::Cyan;
    /// Primary text
    pub const PRIMARY: Color = Color::White;
    /// Secondary/dimmed text
    pub const SECONDARY: Color = Color::Gray;
    /// Bars at or below the low-price threshold
    pub const CHEAP: Color = Color::Green;
    /// Bars above the low-price threshold
    pub const REGULAR: Color = Color::DarkGray;
}

/// Colours for consecutive groups; reused in order once exhausted
pub const GROUP_PALETTE: [Color; 6] = [
    Color::Cyan,
    Color::Magenta,
    Color::Yellow,
    Color::Blue,
    Color::LightRed,
    Color::LightGreen,
];

/// Width of a single bar; fits a `15/03-26/07` label
const BAR_WIDTH: u16 = 11;

/// Gap between bars
const BAR_GAP: u16 = 1;

/// Colour of a bar of the given class
pub fn bar_color(class: BarClass) -> Color {
    match class {
        BarClass::Below => colors::CHEAP,
        BarClass::Above => colors::REGULAR,
        BarClass::Group(n) => GROUP_PALETTE[n % GROUP_PALETTE.len()],
    }
}

/// Label under a bar: departure and arrival as day/month
fn bar_label(entry: &PriceEntry) -> String {
    format!(
        "{}-{}",
        entry.departure.format("%d/%m"),
        entry.arrival.format("%d/%m")
    )
}

/// Number of bars that fit in `width` columns inside a bordered block
pub fn visible_bar_count(width: u16) -> usize {
    let inner = width.saturating_sub(2) + BAR_GAP;
    usize::from((inner / (BAR_WIDTH + BAR_GAP)).max(1))
}

/// Builds the bars for entries starting at `offset`, at most `count` of them
pub fn build_bars<'a>(
    entries: &[PriceEntry],
    classes: &[BarClass],
    offset: usize,
    count: usize,
) -> Vec<Bar<'a>> {
    entries
        .iter()
        .zip(classes)
        .skip(offset)
        .take(count)
        .map(|(entry, class)| {
            let color = bar_color(*class);
            Bar::default()
                .value(entry.mean_price.round().max(0.0) as u64)
                .text_value(format!("{:.0}", entry.mean_price))
                .label(Line::from(bar_label(entry)))
                .style(Style::default().fg(color))
                .value_style(Style::default().fg(Color::Black).bg(color))
        })
        .collect()
}

/// Renders the chart view
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(5),    // Chart
            Constraint::Length(1), // Help bar
        ])
        .split(area);

    render_header(frame, app, chunks[0]);
    render_chart(frame, app, chunks[1]);
    render_help_bar(frame, chunks[2]);

    if app.show_help {
        help_overlay::render(frame, app.mode);
    }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(
            app.title.clone(),
            Style::default()
                .fg(colors::HEADER)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("  Mode: ", Style::default().fg(colors::SECONDARY)),
        Span::styled(app.mode.label(), Style::default().fg(colors::PRIMARY)),
    ];

    if app.mode == ChartMode::LowestPrice {
        let threshold = app.table.low_price_threshold();
        let text = if threshold.is_nan() {
            "n/a".to_string()
        } else {
            format!("{:.0} {}", threshold, app.currency)
        };
        spans.push(Span::styled(
            "  Cheap at or below: ",
            Style::default().fg(colors::SECONDARY),
        ));
        spans.push(Span::styled(text, Style::default().fg(colors::CHEAP)));
    }

    spans.push(Span::styled(
        format!("  {} date pairs", app.table.len()),
        Style::default().fg(colors::SECONDARY),
    ));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors::HEADER));
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_chart(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(format!(" Mean price ({}) ", app.currency))
        .borders(Borders::ALL);

    if app.table.is_empty() {
        let empty = Paragraph::new("No offers found for these dates")
            .style(Style::default().fg(colors::SECONDARY))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let count = visible_bar_count(area.width);
    let bars = build_bars(app.table.entries(), app.classes(), app.scroll_offset, count);
    let max = app
        .table
        .entries()
        .iter()
        .map(|entry| entry.mean_price.round().max(0.0) as u64)
        .max()
        .unwrap_or(0);

    let chart = BarChart::default()
        .block(block)
        .data(BarGroup::default().bars(&bars))
        .bar_width(BAR_WIDTH)
        .bar_gap(BAR_GAP)
        .max(max);

    frame.render_widget(chart, area);
}

/// Renders the help bar at the bottom
fn render_help_bar(frame: &mut Frame, area: Rect) {
    let help_line = Line::from(vec![
        Span::styled("\u{2190}/h \u{2192}/l", Style::default().fg(colors::HEADER)),
        Span::styled(" Scroll  ", Style::default().fg(colors::SECONDARY)),
        Span::styled("m", Style::default().fg(colors::HEADER)),
        Span::styled(" Mode  ", Style::default().fg(colors::SECONDARY)),
        Span::styled("?", Style::default().fg(colors::HEADER)),
        Span::styled(" Help  ", Style::default().fg(colors::SECONDARY)),
        Span::styled("q", Style::default().fg(colors::HEADER)),
        Span::styled(" Quit", Style::default().fg(colors::SECONDARY)),
    ]);

    frame.render_widget(Paragraph::new(vec![help_line]), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prices::PriceTable;
    use chrono::NaiveDate;
    use ratatui::{backend::TestBackend, Terminal};

    fn table(prices: &[f64]) -> PriceTable {
        let start = NaiveDate::from_ymd_opt(2023, 3, 15).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, price)| PriceEntry {
                departure: start + chrono::Duration::days(i as i64),
                arrival: NaiveDate::from_ymd_opt(2023, 7, 26).unwrap(),
                mean_price: *price,
            })
            .collect()
    }

    fn screen(app: &App, width: u16, height: u16) -> String {
        let backend = TestBackend::new(width, height);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| render(frame, app)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer.content().iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn test_bar_color_cycles_palette() {
        assert_eq!(bar_color(BarClass::Group(0)), GROUP_PALETTE[0]);
        assert_eq!(bar_color(BarClass::Group(GROUP_PALETTE.len())), GROUP_PALETTE[0]);
        assert_eq!(bar_color(BarClass::Group(GROUP_PALETTE.len() + 2)), GROUP_PALETTE[2]);
    }

    #[test]
    fn test_bar_color_distinguishes_cheap_bars() {
        assert_ne!(bar_color(BarClass::Below), bar_color(BarClass::Above));
    }

    #[test]
    fn test_visible_bar_count() {
        assert_eq!(visible_bar_count(0), 1);
        assert_eq!(visible_bar_count(14), 1);
        // 2 border columns + 3 bars of 11 + 2 gaps
        assert_eq!(visible_bar_count(37), 3);
        assert_eq!(visible_bar_count(36), 2);
    }

    #[test]
    fn test_build_bars_respects_offset_and_count() {
        let table = table(&[100.0, 200.0, 300.0, 400.0]);
        let classes = vec![BarClass::Above; 4];

        let bars = build_bars(table.entries(), &classes, 1, 2);
        assert_eq!(bars.len(), 2);

        let bars = build_bars(table.entries(), &classes, 3, 10);
        assert_eq!(bars.len(), 1);
    }

    #[test]
    fn test_bar_label_format() {
        let table = table(&[100.0]);
        assert_eq!(bar_label(&table.entries()[0]), "15/03-26/07");
    }

    #[test]
    fn test_render_shows_title_mode_and_labels() {
        let app = App::new(
            table(&[100.0, 500.0, 510.0, 520.0, 530.0]),
            5,
            ChartMode::LowestPrice,
            "SYD -> LON",
            "GBP",
        )
        .unwrap();

        let content = screen(&app, 100, 24);
        assert!(content.contains("SYD -> LON"));
        assert!(content.contains("Lowest price"));
        assert!(content.contains("Cheap at or below"));
        assert!(content.contains("15/03-26/07"));
        assert!(content.contains("Mean price (GBP)"));
    }

    #[test]
    fn test_render_grouped_mode_hides_threshold() {
        let app = App::new(table(&[100.0, 200.0, 300.0]), 3, ChartMode::Grouped, "t", "GBP")
            .unwrap();

        let content = screen(&app, 80, 20);
        assert!(content.contains("Grouped"));
        assert!(!content.contains("Cheap at or below"));
    }

    #[test]
    fn test_render_empty_table() {
        let app = App::new(PriceTable::default(), 3, ChartMode::LowestPrice, "t", "GBP").unwrap();

        let content = screen(&app, 80, 20);
        assert!(content.contains("No offers found"));
    }

    #[test]
    fn test_render_help_overlay() {
        let mut app = App::new(table(&[100.0, 200.0]), 2, ChartMode::LowestPrice, "t", "GBP")
            .unwrap();
        app.show_help = true;

        let content = screen(&app, 80, 24);
        assert!(content.contains("Keyboard Shortcuts"));
    }
}
