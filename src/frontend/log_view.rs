//! Scrolling log display
//!
//! Only the visible rows are laid out, so the buffer can hold a few
//! thousand lines at full frame rate.

use egui::{Color32, RichText, ScrollArea, TextStyle, Ui};

use crate::frontend::topics::LogBuffer;

/// View options kept across frames
#[derive(Debug, Clone)]
pub struct LogViewState {
    /// Keep the newest line in view
    pub follow: bool,
    /// Hide decode error lines
    pub hide_errors: bool,
}

impl Default for LogViewState {
    fn default() -> Self {
        Self {
            follow: true,
            hide_errors: false,
        }
    }
}

/// Render the log buffer into the remaining space
pub fn render_log_view(ui: &mut Ui, log: &LogBuffer, state: &mut LogViewState) {
    ui.horizontal(|ui| {
        ui.checkbox(&mut state.follow, "Follow");
        ui.checkbox(&mut state.hide_errors, "Hide skipped frames");
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            ui.label(RichText::new(format!("{} lines", log.len())).small().weak());
        });
    });
    ui.separator();

    let rows: Vec<usize> = if state.hide_errors {
        log.iter()
            .enumerate()
            .filter(|(_, line)| !line.is_error)
            .map(|(i, _)| i)
            .collect()
    } else {
        (0..log.len()).collect()
    };

    let row_height = ui.text_style_height(&TextStyle::Monospace);
    ScrollArea::vertical()
        .auto_shrink([false, false])
        .stick_to_bottom(state.follow)
        .show_rows(ui, row_height, rows.len(), |ui, range| {
            for row in range {
                let Some(line) = rows.get(row).and_then(|&i| log.get(i)) else {
                    continue;
                };
                let text = RichText::new(&line.text).monospace();
                if line.is_error {
                    ui.label(text.color(Color32::LIGHT_RED));
                } else {
                    ui.label(text);
                }
            }
        });
}
