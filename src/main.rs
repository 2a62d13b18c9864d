//! CAN Data Acquisition - Main Entry Point
//!
//! Reads frames from the configured bus, decodes them with the signal
//! database and logs them to rotating files while the operator window is
//! open.

use anyhow::Context;
use canlog_rs::{
    backend::{open_source, AcquisitionBackend},
    config::{ensure_app_data_dir, AppConfig, AppState, Cli},
    error::{exit_codes, CanLogError},
    frontend::CanLogApp,
    schema::Schema,
    types::AcquisitionStats,
};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Diagnostic log file prefix inside the app data directory
const DIAGNOSTIC_LOG_FILE: &str = "canlog.log";

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_tracing();

    tracing::info!("Starting CAN Data Acquisition");

    match run(&cli) {
        Ok(stats) => {
            tracing::info!(
                "Acquisition finished: {} records written, {} frames skipped, {} rotations",
                stats.records_written,
                stats.decode_errors(),
                stats.rotations
            );
            ExitCode::from(exit_codes::SUCCESS)
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            let code = e
                .downcast_ref::<CanLogError>()
                .map(CanLogError::exit_code)
                .unwrap_or(exit_codes::GENERAL);
            ExitCode::from(code)
        }
    }
}

/// Install the stderr layer and, when the app data directory is usable, a
/// daily diagnostic file. The returned guard flushes the file on drop.
fn init_tracing() -> Option<WorkerGuard> {
    let (file_layer, guard) = match ensure_app_data_dir() {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir.join("logs"), DIAGNOSTIC_LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,canlog_rs=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}

fn run(cli: &Cli) -> anyhow::Result<AcquisitionStats> {
    let mut config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    config.apply_cli(cli);
    config.validate()?;

    let schema = Arc::new(
        Schema::load(&config.schema.path)
            .with_context(|| format!("loading schema {}", config.schema.path.display()))?,
    );
    tracing::info!(
        "Loaded {} messages from {}",
        schema.len(),
        config.schema.path.display()
    );

    if let Some(dir) = &cli.output_dir {
        if !dir.is_dir() {
            return Err(CanLogError::Config(format!(
                "Output directory does not exist: {}",
                dir.display()
            ))
            .into());
        }
    }

    let source = open_source(&config, &schema)?;
    let (backend, mut frontend) = AcquisitionBackend::new(&config, schema, source);
    let mut app_state = AppState::load_or_default();

    if let Some(dir) = &cli.output_dir {
        app_state.remember_output_dir(dir);
        if let Err(e) = app_state.save() {
            tracing::warn!("Failed to save app state: {}", e);
        }
        frontend.confirm_destination(dir);
    }

    let running = backend.spawn()?;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([800.0, 600.0])
            .with_min_inner_size([480.0, 320.0])
            .with_title("CAN Data Acquisition"),
        ..Default::default()
    };

    let display_max_lines = config.acquisition.display_max_lines;
    let ui_result = eframe::run_native(
        "CAN Data Acquisition",
        native_options,
        Box::new(move |cc| {
            Ok(Box::new(CanLogApp::new(
                cc,
                frontend,
                app_state,
                display_max_lines,
            )))
        }),
    );

    // The app (and with it every control sender) is gone by now, so the
    // loop has been told to stop one way or another
    tracing::info!("Shutting down...");
    let outcome = running.join();

    if let Err(e) = ui_result {
        tracing::error!("UI error: {}", e);
    }

    Ok(outcome?)
}
