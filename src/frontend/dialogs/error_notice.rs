//! Fatal error notice
//!
//! Shown once when the acquisition loop ends because of a transport or
//! persistence failure.

use super::Dialog;
use egui::{Color32, Ui};

#[derive(Debug, Default)]
pub struct ErrorNoticeState {
    pub message: String,
}

impl ErrorNoticeState {
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorNoticeAction {
    /// Leave the window open to inspect the log
    Dismiss,
    /// Close the application
    Exit,
}

pub struct ErrorNoticeDialog;

impl Dialog for ErrorNoticeDialog {
    type State = ErrorNoticeState;
    type Action = ErrorNoticeAction;
    type Context<'a> = ();

    const TITLE: &'static str = "Acquisition Stopped";
    const WIDTH: f32 = 420.0;

    fn render(
        state: &mut ErrorNoticeState,
        _ctx: (),
        ui: &mut Ui,
    ) -> Option<ErrorNoticeAction> {
        ui.colored_label(Color32::RED, "Acquisition stopped because of an error:");
        ui.label(&state.message);
        ui.label(
            egui::RichText::new("Records written before the error are kept on disk.")
                .small()
                .weak(),
        );

        ui.separator();

        ui.horizontal(|ui| {
            if ui.button("Exit").clicked() {
                return Some(ErrorNoticeAction::Exit);
            }
            if ui.button("Dismiss").clicked() {
                return Some(ErrorNoticeAction::Dismiss);
            }
            None
        })
        .inner
    }
}
