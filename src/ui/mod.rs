//! UI rendering module for fareview
//!
//! This module contains the rendering logic for the terminal fare chart,
//! using the ratatui library for TUI components.

mod help_overlay;
pub mod price_chart;

pub use price_chart::render as render_price_chart;
