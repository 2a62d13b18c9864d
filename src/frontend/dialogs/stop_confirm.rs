//! Stop confirmation dialog
//!
//! Shown when the operator presses Stop. Nothing reaches the acquisition
//! loop until Yes is pressed.

use super::Dialog;
use egui::Ui;

/// Action from the stop confirmation dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopConfirmAction {
    Confirm,
    Cancel,
}

/// What the dialog needs to know about the run
pub struct StopConfirmContext {
    pub records_written: u64,
}

pub struct StopConfirmDialog;

impl Dialog for StopConfirmDialog {
    type State = ();
    type Action = StopConfirmAction;
    type Context<'a> = StopConfirmContext;

    const TITLE: &'static str = "Confirm Stop";
    const WIDTH: f32 = 320.0;

    fn render(
        _state: &mut (),
        ctx: StopConfirmContext,
        ui: &mut Ui,
    ) -> Option<StopConfirmAction> {
        ui.label("Are you sure you want to stop?");
        ui.label(
            egui::RichText::new(format!(
                "{} records written so far. The current file will be closed.",
                ctx.records_written
            ))
            .small()
            .weak(),
        );
        ui.label(egui::RichText::new("The window will close afterwards.").small());

        ui.separator();

        ui.horizontal(|ui| {
            if ui.button("Yes").clicked() {
                return Some(StopConfirmAction::Confirm);
            }
            if ui.button("No").clicked() {
                return Some(StopConfirmAction::Cancel);
            }
            None
        })
        .inner
    }
}
