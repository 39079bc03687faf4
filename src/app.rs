//! Application state for the fare chart view
//!
//! Holds the aggregated price table being charted and handles keyboard input:
//! scrolling through bars, switching colouring mode, and quitting.

use crossterm::event::{KeyCode, KeyEvent};

use crate::prices::{classify, BarClass, ChartError, ChartMode, PriceTable};

/// Main application struct for the chart view
pub struct App {
    /// Aggregated prices, one bar per entry
    pub table: PriceTable,
    /// Number of departure dates in the sweep; sets the grouped run length
    pub departure_range_length: usize,
    /// Current colouring mode
    pub mode: ChartMode,
    /// Index of the first visible bar
    pub scroll_offset: usize,
    /// Chart heading, e.g. the route
    pub title: String,
    /// Currency of the prices
    pub currency: String,
    /// Flag to show help overlay
    pub show_help: bool,
    /// Flag indicating the application should quit
    pub should_quit: bool,
    classes: Vec<BarClass>,
}

impl App {
    /// Creates the chart state, failing if `mode` cannot colour this table
    pub fn new(
        table: PriceTable,
        departure_range_length: usize,
        mode: ChartMode,
        title: impl Into<String>,
        currency: impl Into<String>,
    ) -> Result<Self, ChartError> {
        let classes = classify(&table, departure_range_length, mode)?;
        Ok(Self {
            table,
            departure_range_length,
            mode,
            scroll_offset: 0,
            title: title.into(),
            currency: currency.into(),
            show_help: false,
            should_quit: false,
            classes,
        })
    }

    /// Highlight class of every bar, in table order
    pub fn classes(&self) -> &[BarClass] {
        &self.classes
    }

    /// Handles keyboard input
    pub fn handle_key(&mut self, key_event: KeyEvent) {
        // Help overlay intercepts all keys when shown
        if self.show_help {
            if matches!(
                key_event.code,
                KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')
            ) {
                self.show_help = false;
            }
            return;
        }

        match key_event.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Left | KeyCode::Char('h') => {
                self.scroll_offset = self.scroll_offset.saturating_sub(1);
            }
            KeyCode::Right | KeyCode::Char('l') => {
                if self.scroll_offset + 1 < self.table.len() {
                    self.scroll_offset += 1;
                }
            }
            KeyCode::Home => {
                self.scroll_offset = 0;
            }
            KeyCode::End => {
                self.scroll_offset = self.table.len().saturating_sub(1);
            }
            KeyCode::Char('m') => {
                self.toggle_mode();
            }
            KeyCode::Char('?') => {
                self.show_help = true;
            }
            _ => {}
        }
    }

    /// Switches colouring mode; stays put if the other mode is not possible
    pub fn toggle_mode(&mut self) {
        let next = self.mode.toggle();
        if let Ok(classes) = classify(&self.table, self.departure_range_length, next) {
            self.mode = next;
            self.classes = classes;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prices::PriceEntry;
    use chrono::NaiveDate;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn table(len: usize) -> PriceTable {
        let start = NaiveDate::from_ymd_opt(2023, 3, 15).unwrap();
        (0..len)
            .map(|i| PriceEntry {
                departure: start + chrono::Duration::days(i as i64),
                arrival: start + chrono::Duration::days(i as i64 + 1),
                mean_price: 100.0 + i as f64 * 50.0,
            })
            .collect()
    }

    fn chart_app(len: usize, range: usize) -> App {
        App::new(table(len), range, ChartMode::LowestPrice, "SYD -> LON", "GBP").unwrap()
    }

    #[test]
    fn test_new_rejects_impossible_grouping() {
        let result = App::new(table(3), 1, ChartMode::Grouped, "t", "GBP");
        assert!(matches!(result, Err(ChartError::RangeTooShort(1))));
    }

    #[test]
    fn test_quit_keys() {
        let mut app = chart_app(3, 3);
        app.handle_key(key(KeyCode::Char('q')));
        assert!(app.should_quit);

        let mut app = chart_app(2, 2);
        app.handle_key(key(KeyCode::Esc));
        assert!(app.should_quit);
    }

    #[test]
    fn test_scroll_stays_within_table() {
        let mut app = chart_app(3, 3);
        app.handle_key(key(KeyCode::Left));
        assert_eq!(app.scroll_offset, 0);

        app.handle_key(key(KeyCode::Right));
        app.handle_key(key(KeyCode::Char('l')));
        app.handle_key(key(KeyCode::Right));
        assert_eq!(app.scroll_offset, 2);

        app.handle_key(key(KeyCode::Char('h')));
        assert_eq!(app.scroll_offset, 1);

        app.handle_key(key(KeyCode::End));
        assert_eq!(app.scroll_offset, 2);
        app.handle_key(key(KeyCode::Home));
        assert_eq!(app.scroll_offset, 0);
    }

    #[test]
    fn test_toggle_mode_recomputes_classes() {
        let mut app = chart_app(4, 3);
        assert_eq!(app.mode, ChartMode::LowestPrice);

        app.handle_key(key(KeyCode::Char('m')));
        assert_eq!(app.mode, ChartMode::Grouped);
        assert_eq!(
            app.classes(),
            &[
                BarClass::Group(0),
                BarClass::Group(0),
                BarClass::Group(1),
                BarClass::Group(1)
            ]
        );

        app.handle_key(key(KeyCode::Char('m')));
        assert_eq!(app.mode, ChartMode::LowestPrice);
    }

    #[test]
    fn test_toggle_mode_ignored_when_grouping_impossible() {
        let mut app = chart_app(4, 1);
        app.toggle_mode();
        assert_eq!(app.mode, ChartMode::LowestPrice);
    }

    #[test]
    fn test_help_overlay_intercepts_keys() {
        let mut app = chart_app(3, 3);
        app.handle_key(key(KeyCode::Char('?')));
        assert!(app.show_help);

        app.handle_key(key(KeyCode::Right));
        assert_eq!(app.scroll_offset, 0);

        app.handle_key(key(KeyCode::Char('q')));
        assert!(!app.show_help);
        assert!(!app.should_quit);
    }
}
