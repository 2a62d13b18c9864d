//! Frontend module for egui UI
//!
//! The operator-facing side of the logger. It only signals intent to the
//! acquisition loop (pause, resume, confirmed stop, output directory) and
//! renders whatever the loop publishes on the display channel.
//!
//! # Main Types
//!
//! - [`CanLogApp`] - Main application state implementing [`eframe::App`]
//! - [`Topics`] - Display data folded from backend messages
//!
//! # Submodules
//!
//! - `toolbar` - Pause, Play and Stop buttons
//! - `status_bar` - State, counters and current file
//! - `log_view` - Scrolling record display
//! - `dialogs` - Stop confirmation and fatal error notice
//! - `startup` - Output directory picker

pub mod dialogs;
pub mod log_view;
pub mod startup;
pub mod state;
pub mod status_bar;
pub mod toolbar;
pub mod topics;

pub use log_view::{render_log_view, LogViewState};
pub use startup::{choose_destination, DirectoryPrompt, RfdPrompt};
pub use state::AppAction;
pub use status_bar::{render_status_bar, StatusBarContext};
pub use toolbar::{render_toolbar, ToolbarContext};
pub use topics::{LogBuffer, Topics};

use dialogs::{
    show_dialog, ErrorNoticeAction, ErrorNoticeDialog, ErrorNoticeState, StopConfirmAction,
    StopConfirmContext, StopConfirmDialog,
};

use crate::backend::{BackendMessage, FrontendReceiver};
use crate::config::AppState;
use std::time::Duration;

/// Repaint interval while the loop is alive and the display is idle
const IDLE_REPAINT: Duration = Duration::from_millis(100);

/// Main application state
pub struct CanLogApp {
    /// Channels to the acquisition loop
    frontend: FrontendReceiver,
    /// Display data
    topics: Topics,
    /// Persistent state (last output directory)
    app_state: AppState,
    /// Folder picker used for the startup question
    prompt: Box<dyn DirectoryPrompt>,
    log_view: LogViewState,

    stop_dialog_open: bool,
    error_dialog_open: bool,
    error_dialog_state: ErrorNoticeState,

    /// Close the window as soon as the loop reports shutdown
    close_on_shutdown: bool,
    /// The window may close without asking
    allow_close: bool,
    /// No directory was chosen; the resulting error is expected
    declined: bool,
}

impl CanLogApp {
    /// Create the app
    ///
    /// When `frontend` still awaits a destination the folder picker opens on
    /// the first frame.
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        frontend: FrontendReceiver,
        app_state: AppState,
        display_max_lines: usize,
    ) -> Self {
        Self::with_prompt(frontend, app_state, display_max_lines, Box::new(RfdPrompt))
    }

    /// Create the app with a custom directory prompt
    pub fn with_prompt(
        frontend: FrontendReceiver,
        app_state: AppState,
        display_max_lines: usize,
        prompt: Box<dyn DirectoryPrompt>,
    ) -> Self {
        Self {
            frontend,
            topics: Topics::new(display_max_lines),
            app_state,
            prompt,
            log_view: LogViewState::default(),
            stop_dialog_open: false,
            error_dialog_open: false,
            error_dialog_state: ErrorNoticeState::default(),
            close_on_shutdown: false,
            allow_close: false,
            declined: false,
        }
    }

    /// Display data, for hosts that embed the app
    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Answer the loop's directory request if it is still open
    fn resolve_destination(&mut self) {
        if !self.frontend.awaiting_destination() {
            return;
        }

        let last = self.app_state.last_output_dir().map(|p| p.to_path_buf());
        match choose_destination(self.prompt.as_mut(), last.as_deref()) {
            Some(dir) => {
                self.app_state.remember_output_dir(&dir);
                if let Err(e) = self.app_state.save() {
                    tracing::warn!("Failed to save app state: {}", e);
                }
                self.frontend.confirm_destination(dir);
            }
            None => {
                self.declined = true;
                self.close_on_shutdown = true;
                self.frontend.decline_destination();
            }
        }
    }

    /// Fold pending backend messages into `Topics`. Returns true if any arrived.
    fn process_backend_messages(&mut self, ctx: &egui::Context) -> bool {
        let messages = self.frontend.drain();
        let had_messages = !messages.is_empty();

        for msg in messages {
            match &msg {
                BackendMessage::Fatal(error) if !self.declined => {
                    self.error_dialog_state = ErrorNoticeState::with_message(error.clone());
                    self.error_dialog_open = true;
                    self.stop_dialog_open = false;
                    self.close_on_shutdown = false;
                }
                BackendMessage::Shutdown => {
                    self.stop_dialog_open = false;
                    if self.close_on_shutdown {
                        self.allow_close = true;
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                }
                _ => {}
            }
            self.topics.apply(msg);
        }

        had_messages
    }

    /// Handle an action from a panel or dialog
    fn handle_action(&mut self, ctx: &egui::Context, action: AppAction) {
        match action {
            AppAction::Pause => {
                tracing::info!("Pause requested");
                self.frontend.pause();
            }
            AppAction::Resume => {
                tracing::info!("Resume requested");
                self.frontend.resume();
            }
            AppAction::RequestStop => {
                self.stop_dialog_open = true;
            }
            AppAction::ConfirmStop => {
                tracing::info!("Stop confirmed");
                self.close_on_shutdown = true;
                self.frontend.stop();
            }
            AppAction::CancelStop => {
                tracing::debug!("Stop cancelled");
            }
            AppAction::Exit => {
                self.allow_close = true;
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        }
    }

    /// Treat a window close as a confirmed stop
    ///
    /// The close is held back until the loop has released the log file.
    fn intercept_close(&mut self, ctx: &egui::Context) {
        if !ctx.input(|i| i.viewport().close_requested()) {
            return;
        }
        if self.allow_close || self.topics.shutdown {
            return;
        }

        ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
        if !self.close_on_shutdown {
            self.stop_dialog_open = false;
            self.handle_action(ctx, AppAction::ConfirmStop);
        }
    }

    fn render_dialogs(&mut self, ctx: &egui::Context) {
        let stop_ctx = StopConfirmContext {
            records_written: self.topics.stats.records_written,
        };
        if let Some(action) = show_dialog::<StopConfirmDialog>(
            ctx,
            &mut self.stop_dialog_open,
            &mut (),
            stop_ctx,
        ) {
            let action = match action {
                StopConfirmAction::Confirm => AppAction::ConfirmStop,
                StopConfirmAction::Cancel => AppAction::CancelStop,
            };
            self.handle_action(ctx, action);
        }

        if let Some(action) = show_dialog::<ErrorNoticeDialog>(
            ctx,
            &mut self.error_dialog_open,
            &mut self.error_dialog_state,
            (),
        ) {
            match action {
                ErrorNoticeAction::Exit => self.handle_action(ctx, AppAction::Exit),
                ErrorNoticeAction::Dismiss => {}
            }
        }
    }
}

impl eframe::App for CanLogApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.resolve_destination();
        let had_messages = self.process_backend_messages(ctx);
        self.intercept_close(ctx);

        if had_messages {
            ctx.request_repaint();
        } else if !self.topics.shutdown {
            ctx.request_repaint_after(IDLE_REPAINT);
        }

        let mut actions = Vec::new();

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            actions.extend(render_toolbar(
                ui,
                &ToolbarContext {
                    topics: &self.topics,
                },
            ));
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            render_status_bar(
                ui,
                &StatusBarContext {
                    topics: &self.topics,
                },
            );
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            render_log_view(ui, &self.topics.log, &mut self.log_view);
        });

        for action in actions {
            self.handle_action(ctx, action);
        }

        self.render_dialogs(ctx);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        // A window torn down without confirmation still stops cleanly
        if self.frontend.awaiting_destination() {
            self.frontend.decline_destination();
        }
        if self.frontend.is_running() {
            tracing::info!("Window closed, stopping acquisition");
            self.frontend.stop();
        }
    }
}
