//! # CanLog-RS: CAN Bus Data Acquisition
//!
//! Acquires frames from a CAN bus, decodes them against a signal database
//! and writes the decoded records to rotating log files. An operator can
//! pause, resume or stop acquisition from a small egui window.
//!
//! ## Architecture
//!
//! - **Backend**: Frame source, pause gate and acquisition loop on their own threads
//! - **Schema**: Signal database loading and frame decoding
//! - **Session**: Rotating log files with injectable storage
//! - **Frontend**: eframe/egui control surface and scrolling display
//! - **Communication**: Crossbeam channels for display messages and control intents
//!
//! ## Configuration
//!
//! The acquisition configuration is read from `canlog.toml`. Application
//! state (last output directory) is stored in the platform-appropriate data
//! directory under `dev.canlog.canlog-rs`:
//!
//! - **Linux**: `~/.local/share/dev.canlog.canlog-rs/`
//! - **macOS**: `~/Library/Application Support/dev.canlog.canlog-rs/`
//! - **Windows**: `%APPDATA%\dev.canlog.canlog-rs\`
//!
//! ## Example
//!
//! ```ignore
//! use canlog_rs::{
//!     backend::{open_source, AcquisitionBackend},
//!     config::{AppConfig, AppState},
//!     frontend::CanLogApp,
//!     schema::Schema,
//! };
//! use std::sync::Arc;
//!
//! let config = AppConfig::load_or_default("canlog.toml")?;
//! let schema = Arc::new(Schema::load(&config.schema.path)?);
//! let source = open_source(&config, &schema)?;
//! let (backend, frontend) = AcquisitionBackend::new(&config, schema, source);
//! let running = backend.spawn()?;
//!
//! eframe::run_native(
//!     "CAN Data Acquisition",
//!     eframe::NativeOptions::default(),
//!     Box::new(|cc| {
//!         Ok(Box::new(CanLogApp::new(
//!             cc,
//!             frontend,
//!             AppState::load_or_default(),
//!             config.acquisition.display_max_lines,
//!         )))
//!     }),
//! )?;
//!
//! let stats = running.join()?;
//! ```

pub mod app;
pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod frontend;
pub mod schema;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use app::CanLogApp;
pub use backend::{AcquisitionBackend, BackendMessage, FrameSource, FrontendReceiver};
pub use config::{AppConfig, AppState};
pub use error::{CanLogError, Result};
pub use schema::{Schema, SchemaDecoder};
pub use session::RotatingWriter;
pub use types::{AcquisitionStats, DecodedRecord, LoopState, RawFrame, SignalValue};
