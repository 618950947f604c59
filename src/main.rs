// Main entry point
use clap::Parser;
use colored::Colorize;
use dex::application::query::{is_species_cached, species_key, watch_species};
use dex::domain::model::QueryEntry;
use dex::domain::traits::Persister;
use dex::infrastructure::config::{self, load_config};
use dex::infrastructure::logging::init_logging;
use dex::interfaces::cli::Cli;
use dex::presentation::theme::Theme;
use dex::presentation::view::render_page;
use dex::state::AppState;
use std::time::Duration;
use tracing::{info, warn};

const GC_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config()?;

    // Initialize logging
    if config.logging.enable {
        init_logging(&config.logging)?;
    }

    if cli.generate_config {
        config::generate_config_sample()?;
        return Ok(());
    }
    if cli.edit_config {
        if let Some(config_path) = config::get_config_path() {
            let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
            let config_path_clone = config_path.clone();
            // Run editor in blocking task
            tokio::task::spawn_blocking(move || {
                std::process::Command::new(editor)
                    .arg(&config_path_clone)
                    .status()
            })
            .await??;
        } else {
            eprintln!("{}", "Config file not found".red());
        }
        return Ok(());
    }

    let state = AppState::new(config)?;
    let outcome = state.restore();
    info!("Restore: {:?}", outcome);

    if cli.clear_cache {
        state.clear_cache()?;
        println!("Cache cleared");
        return Ok(());
    }
    if cli.status {
        print_status(&state);
        return Ok(());
    }

    if cli.no_color {
        colored::control::set_override(false);
    }
    let theme_name = cli.theme.as_deref().unwrap_or(state.config.theme.as_str());
    let theme = if cli.json {
        Theme::plain()
    } else {
        Theme::from_name(theme_name)
    };

    let gc = state.client.spawn_gc(GC_INTERVAL);
    let clear_screen = state.config.clear_screen;
    let on_frame = |entry: &QueryEntry| {
        if cli.json {
            // One document per run unless live.
            if entry.is_fetching && !cli.live {
                return;
            }
            match serde_json::to_string_pretty(entry) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("{}", format!("Failed to encode entry: {}", e).red()),
            }
            return;
        }
        if clear_screen {
            clear_terminal();
        }
        print!(
            "{}",
            render_page(entry, |id| is_species_cached(&state, id), &theme)
        );
    };

    tokio::select! {
        _ = watch_species(&state, cli.refetch, cli.live, on_frame) => {}
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => eprintln!("\nInterrupted, saving cache..."),
                Err(e) => eprintln!("Failed to listen for shutdown signal: {}", e),
            }
        }
    }

    gc.abort();
    if let Err(e) = state.client.flush() {
        warn!("Final cache flush failed: {}", e);
    }

    Ok(())
}

/// Clear the terminal screen
fn clear_terminal() {
    // ANSI escape sequence: clear screen and move cursor to top-left
    print!("\x1B[2J\x1B[1;1H");
    std::io::Write::flush(&mut std::io::stdout()).ok();
}

fn print_status(state: &AppState) {
    println!("{}", "dex Status".green().bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    match &state.storage_path {
        Some(path) => println!("Storage: {}", path.display()),
        None => println!("Storage: in memory (persistence disabled)"),
    }

    match state.persister.restore_client() {
        Ok(Some(snapshot)) => {
            let age = chrono::Utc::now().timestamp_millis() - snapshot.timestamp;
            println!(
                "Snapshot: {} queries, written {}s ago",
                snapshot.client_state.queries.len(),
                age / 1000
            );
        }
        Ok(None) => println!("Snapshot: none"),
        Err(e) => println!("Snapshot: unreadable ({})", e),
    }

    println!("Memory Cache: {} entries", state.client.len());
    if let Some(entry) = state.client.peek(&species_key()) {
        let fetched = entry
            .last_fetched_at()
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        println!("Species list: {:?}, last fetched {}", entry.status(), fetched);
    }

    let options = state.client.options();
    println!("Retention: {}s", options.gc_time.as_secs());
    match options.stale_time {
        Some(stale) => println!("Stale after: {}s", stale.as_secs()),
        None => println!("Stale after: never"),
    }
    println!("Endpoint: {}", state.config.endpoint);
    println!(
        "Config: {}",
        config::get_config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "Not found".to_string())
    );
}
