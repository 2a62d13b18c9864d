//! Modal dialogs
//!
//! Each dialog implements [`Dialog`]. [`show_dialog`] draws it centered over
//! a dimmed backdrop and closes it as soon as it returns an action.

use egui::{Align2, Color32, Context, Id, Order, Sense, Ui};

/// A modal dialog with typed state, action and render context
pub trait Dialog {
    type State: Default;
    type Action;
    type Context<'a>;

    const TITLE: &'static str;
    const WIDTH: f32;

    /// Draw the body. Returning an action closes the dialog.
    fn render(
        state: &mut Self::State,
        ctx: Self::Context<'_>,
        ui: &mut Ui,
    ) -> Option<Self::Action>;
}

/// Show a dialog while `is_open` is true
///
/// On an action, clears `is_open`, resets the state and returns the action.
pub fn show_dialog<D: Dialog>(
    ctx: &Context,
    is_open: &mut bool,
    state: &mut D::State,
    dialog_ctx: D::Context<'_>,
) -> Option<D::Action> {
    if !*is_open {
        return None;
    }

    // Swallows clicks meant for the main window
    let screen = ctx.screen_rect();
    egui::Area::new(Id::new("dialog_modal_backdrop"))
        .order(Order::Middle)
        .fixed_pos(screen.min)
        .show(ctx, |ui| {
            ui.allocate_rect(screen, Sense::click());
            ui.painter()
                .rect_filled(screen, 0.0, Color32::from_black_alpha(120));
        });

    let action = egui::Window::new(D::TITLE)
        .collapsible(false)
        .resizable(false)
        .default_width(D::WIDTH)
        .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
        .order(Order::Foreground)
        .show(ctx, |ui| D::render(state, dialog_ctx, ui))
        .and_then(|response| response.inner)
        .flatten();

    if action.is_some() {
        *is_open = false;
        *state = D::State::default();
    }
    action
}

pub mod error_notice;
pub mod stop_confirm;

pub use error_notice::{ErrorNoticeAction, ErrorNoticeDialog, ErrorNoticeState};
pub use stop_confirm::{StopConfirmAction, StopConfirmContext, StopConfirmDialog};
