//! fareview - search flight offers and chart fares across travel dates
//!
//! Runs a single cached search, or sweeps a range of departure and return dates,
//! writes the flattened offers as CSV, and optionally shows a terminal bar chart
//! of mean prices per date pair.

use std::error::Error;
use std::io;
use std::panic;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_subscriber::EnvFilter;

use fareview::app::App;
use fareview::cache::OfferCache;
use fareview::cli::{Cli, Command, Config};
use fareview::data::{resolve_names, AirlineTable, AmadeusClient, FlattenMode, QueryKey};
use fareview::report::{table_path, write_table};
use fareview::secrets::EnvSecrets;
use fareview::sweep::{date_range, fetch_rows, sweep, sweep_prices};
use fareview::ui;

/// Sets up logging to stderr. `RUST_LOG` overrides the level chosen by flags.
fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "fareview=debug"
    } else if quiet {
        "error"
    } else {
        "fareview=info"
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Sets up a panic hook that restores the terminal before printing the panic message.
/// This ensures the terminal is usable even if the chart view panics.
fn setup_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));
}

/// Shows the fare chart until the user quits
fn show_chart(mut app: App) -> Result<(), Box<dyn Error>> {
    setup_panic_hook();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    loop {
        terminal.draw(|f| ui::render_price_chart(f, &app))?;

        // Poll for keyboard events with 100ms timeout
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    Ok(())
}

async fn run(config: Config) -> Result<(), Box<dyn Error>> {
    let airlines = AirlineTable::load(&config.airlines_path)?;
    info!(airlines = airlines.len(), "loaded airline reference table");

    let client = AmadeusClient::new(
        config.host,
        config.credentials.client_id.as_str(),
        config.credentials.client_secret.as_str(),
    );
    let cache = OfferCache::new(config.cache.clone(), client, config.currency.as_str());
    info!(cache_dir = %cache.manager().cache_dir().display(), "using response cache");

    match &config.command {
        Command::Search { query, summary } => {
            let key = QueryKey::new(
                &query.origin,
                &query.destination,
                query.departure,
                query.return_date,
                query.adults,
            )?;
            let mode = if *summary {
                FlattenMode::Summary
            } else {
                FlattenMode::Granular
            };

            let rows = resolve_names(&fetch_rows(&cache, &key, mode).await?, &airlines);
            let path = table_path(&config.output_dir, &key.file_stem(), "");
            write_table(&path, &rows)?;
            println!("Wrote {} rows to {}", rows.len(), path.display());
        }
        Command::Sweep {
            query,
            departure_days,
            return_days,
            chart,
        } => {
            let route = query.route();
            let departures = date_range(query.departure, *departure_days);
            let returns = date_range(query.return_date, *return_days);
            let stem = route
                .sweep_stem(&departures, &returns)
                .ok_or("sweep needs at least one departure and one return date")?;

            let rows = resolve_names(&sweep(&cache, &route, &departures, &returns).await?, &airlines);
            let rows_path = table_path(&config.output_dir, &stem, "");
            write_table(&rows_path, &rows)?;

            let prices = sweep_prices(&stem, &rows)?;
            let prices_path = table_path(&config.output_dir, &stem, "-prices");
            write_table(&prices_path, prices.entries())?;

            println!(
                "Wrote {} rows to {} and {} date pairs to {}",
                rows.len(),
                rows_path.display(),
                prices.len(),
                prices_path.display()
            );

            if let Some(mode) = chart.mode() {
                let title = format!(
                    "{} -> {}",
                    query.origin.to_ascii_uppercase(),
                    query.destination.to_ascii_uppercase()
                );
                let app = App::new(prices, *departure_days, mode, title, config.currency.as_str())?;
                show_chart(app)?;
            }
        }
    }

    Ok(())
}

/// Prints an error; messages already carry the text of their causes
fn report_error(err: &dyn Error) {
    eprintln!("Error: {}", err);
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    // Credentials are required before anything else can happen
    let config = match Config::from_cli(&cli, &EnvSecrets) {
        Ok(config) => config,
        Err(e) => {
            report_error(&e);
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(e.as_ref());
            ExitCode::FAILURE
        }
    }
}
