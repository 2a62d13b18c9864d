//! Toolbar panel: Pause, Play and Stop.
//!
//! Sits above the log view.

use egui::{Color32, RichText, Ui};

use crate::frontend::state::{AppAction, ControlAvailability};
use crate::frontend::topics::Topics;
use crate::types::LoopState;

/// Context needed to render the toolbar.
pub struct ToolbarContext<'a> {
    pub topics: &'a Topics,
}

/// Render the toolbar. Returns the actions to be applied by the app.
pub fn render_toolbar(ui: &mut Ui, ctx: &ToolbarContext<'_>) -> Vec<AppAction> {
    let mut actions = Vec::new();
    let topics = ctx.topics;
    let available = ControlAvailability::for_state(topics.state, topics.shutdown);

    ui.horizontal(|ui| {
        ui.spacing_mut().item_spacing.x = 4.0;

        if ui
            .add_enabled(available.pause, egui::Button::new("⏸ Pause"))
            .on_hover_text("Hold acquisition; queued frames are kept")
            .clicked()
        {
            actions.push(AppAction::Pause);
        }

        if ui
            .add_enabled(available.resume, egui::Button::new("▶ Play"))
            .on_hover_text("Resume acquisition")
            .clicked()
        {
            actions.push(AppAction::Resume);
        }

        let stop = egui::Button::new(RichText::new("⏹ Stop").color(Color32::WHITE))
            .fill(Color32::from_rgb(150, 50, 50));
        if ui
            .add_enabled(available.stop, stop)
            .on_hover_text("Stop acquisition and close the log")
            .clicked()
        {
            actions.push(AppAction::RequestStop);
        }

        if topics.shutdown && ui.button("Close").clicked() {
            actions.push(AppAction::Exit);
        }

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            let (color, text) = match topics.state {
                LoopState::Running => (Color32::GREEN, "Recording"),
                LoopState::Paused => (Color32::YELLOW, "Paused"),
                LoopState::Starting => (Color32::GRAY, "Waiting for directory"),
                LoopState::Stopping => (Color32::YELLOW, "Stopping..."),
                LoopState::Stopped => (Color32::GRAY, "Stopped"),
            };
            ui.colored_label(color, text);
        });
    });

    actions
}
