// File: ./src/bin/staysync.rs
use anyhow::Result;
use simplelog::{ColorChoice, LevelFilter, TermLogger, TerminalMode};
use staysync::config::Config;
use staysync::context::{AppContext, SharedContext, StandardContext};
use staysync::scheduler::run_scheduler;
use staysync::SyncEngine;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// How long in-flight automation hooks may delay exit.
const HOOK_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    // Handle help flag
    if args.len() > 1 && (args[1] == "--help" || args[1] == "-h" || args[1] == "help") {
        print_help();
        return Ok(());
    }

    init_logging();

    let ctx: SharedContext = Arc::new(StandardContext::new(
        env::var_os("STAYSYNC_HOME").map(PathBuf::from),
    ));
    let config = match Config::load(ctx.as_ref()) {
        Ok(config) => config,
        Err(e) if Config::is_missing_config_error(&e) => {
            let path = ctx.get_config_file_path()?;
            eprintln!("No configuration found. Create {} first.", path.display());
            eprintln!("Run 'staysync --help' for an example.");
            std::process::exit(1);
        }
        Err(e) => return Err(e),
    };
    if config.properties.is_empty() {
        log::warn!("No properties configured; passes will do nothing.");
    }

    let engine = Arc::new(SyncEngine::from_config(&config, ctx)?);

    // CLI Command: staysync once
    if args.len() > 1 && args[1] == "once" {
        let summary = engine.synchronize_all().await;
        println!("{}", serde_json::to_string_pretty(&summary)?);
        engine.drain_triggers(HOOK_DRAIN_TIMEOUT).await;
        return Ok(());
    }

    if args.len() > 1 {
        eprintln!("Unknown command '{}'. Run 'staysync --help'.", args[1]);
        std::process::exit(2);
    }

    run_scheduler(engine.clone(), config.sync_interval(), shutdown_signal()).await;
    engine.drain_triggers(HOOK_DRAIN_TIMEOUT).await;
    Ok(())
}

fn init_logging() {
    let level = env::var("STAYSYNC_LOG")
        .ok()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);
    // Another logger may already be installed; keep it.
    let _ = TermLogger::init(
        level,
        simplelog::Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );
}

/// Resolves on ctrl-c, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                log::warn!("Cannot listen for SIGTERM: {}", e);
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}

fn print_help() {
    println!(
        "staysync v{} - Reconciles rental calendar feeds into stable bookings",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("USAGE:");
    println!("    staysync                Run as a daemon, syncing every sync_interval_mins");
    println!("    staysync once           Run one pass and print the summary as JSON");
    println!("    staysync --help         Show this help message");
    println!();
    println!("ENVIRONMENT:");
    println!("    STAYSYNC_HOME           Use <dir>/config and <dir>/data instead of the");
    println!("                            platform directories");
    println!("    STAYSYNC_LOG            Log level (error, warn, info, debug, trace)");
    println!();
    println!("CONFIG (config.toml):");
    println!("    sync_interval_mins = 10");
    println!("    stability_window_secs = 300");
    println!();
    println!("    [automation]");
    println!("    ended_url = \"https://ops.example/hooks/ended\"");
    println!();
    println!("    [[properties]]");
    println!("    id = \"villa-1\"");
    println!("      [[properties.sources]]");
    println!("      label = \"Airbnb\"");
    println!("      url = \"https://www.airbnb.com/calendar/ical/123.ics\"");
}
