//! Status bar panel: bottom bar showing state, counts, file and error info.

use egui::{Color32, RichText, Ui};

use crate::frontend::topics::Topics;
use crate::types::LoopState;

/// Context needed to render the status bar.
pub struct StatusBarContext<'a> {
    pub topics: &'a Topics,
}

/// Render the status bar.
pub fn render_status_bar(ui: &mut Ui, ctx: &StatusBarContext<'_>) {
    let topics = ctx.topics;

    ui.horizontal(|ui| {
        ui.spacing_mut().item_spacing.x = 8.0;

        // === State dot ===
        let state_color = match topics.state {
            LoopState::Running => Color32::GREEN,
            LoopState::Paused | LoopState::Stopping => Color32::YELLOW,
            LoopState::Starting | LoopState::Stopped => Color32::GRAY,
        };
        let state_color = if topics.fatal_error.is_some() {
            Color32::RED
        } else {
            state_color
        };
        ui.colored_label(state_color, "●");
        ui.label(RichText::new(topics.state.to_string()).small());

        ui.separator();

        let stats = &topics.stats;
        ui.label(RichText::new(format!("Frames: {}", stats.frames_received)).small());

        ui.separator();

        ui.label(RichText::new(format!("Written: {}", stats.records_written)).small());

        ui.separator();

        // === Decode errors ===
        let errors = stats.decode_errors().max(topics.decode_errors_seen);
        let error_color = if errors > 0 {
            Color32::LIGHT_RED
        } else {
            Color32::GRAY
        };
        let label = ui.colored_label(
            error_color,
            RichText::new(format!("Skipped: {}", errors)).small(),
        );
        if errors > 0 {
            label.on_hover_text(format!(
                "Unknown identifier: {}\nMalformed payload: {}{}",
                stats.unknown_identifiers,
                stats.malformed_payloads,
                topics
                    .last_decode_error
                    .as_deref()
                    .map(|e| format!("\nLast: {}", e))
                    .unwrap_or_default()
            ));
        }

        if stats.dropped_messages > 0 {
            ui.separator();
            ui.colored_label(
                Color32::YELLOW,
                RichText::new(format!("Display dropped: {}", stats.dropped_messages)).small(),
            );
        }

        ui.separator();

        // === Current file ===
        let file = topics
            .current_file
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "-".to_string());
        let file_label = ui.label(RichText::new(format!("File: {}", file)).small());
        if let Some(path) = &topics.current_file {
            file_label.on_hover_text(path.display().to_string());
        }
        if stats.rotations > 0 {
            ui.label(RichText::new(format!("({} rotations)", stats.rotations)).small());
        }

        // === Error message (right-aligned) ===
        if let Some(error) = &topics.fatal_error {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.colored_label(Color32::RED, RichText::new(error).small());
            });
        }
    });
}
