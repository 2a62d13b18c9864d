//! Output directory selection at startup
//!
//! The acquisition loop asks once where logs should go. The answer comes
//! from a native folder picker; cancelling it ends the run before any file
//! is created.

use std::path::{Path, PathBuf};

/// Native prompts used while choosing the output directory
#[cfg_attr(test, mockall::automock)]
pub trait DirectoryPrompt {
    /// Tell the operator a directory is needed
    fn announce(&mut self);

    /// Show the folder picker, starting at `start` when given
    fn pick_folder(&mut self, start: Option<PathBuf>) -> Option<PathBuf>;

    /// Tell the operator nothing was chosen
    fn report_none(&mut self);
}

/// Prompts backed by the platform's native dialogs
#[derive(Debug, Default)]
pub struct RfdPrompt;

impl DirectoryPrompt for RfdPrompt {
    fn announce(&mut self) {
        let _ = rfd::MessageDialog::new()
            .set_level(rfd::MessageLevel::Info)
            .set_title("Select Directory")
            .set_description("Please select a directory for saving files")
            .set_buttons(rfd::MessageButtons::Ok)
            .show();
    }

    fn pick_folder(&mut self, start: Option<PathBuf>) -> Option<PathBuf> {
        let mut dialog = rfd::FileDialog::new().set_title("Select Directory");
        if let Some(start) = start {
            dialog = dialog.set_directory(start);
        }
        dialog.pick_folder()
    }

    fn report_none(&mut self) {
        let _ = rfd::MessageDialog::new()
            .set_level(rfd::MessageLevel::Warning)
            .set_title("No Directory")
            .set_description("No directory selected. Exiting.")
            .set_buttons(rfd::MessageButtons::Ok)
            .show();
    }
}

/// Ask for the output directory
///
/// Returns `None` when the picker was cancelled or returned something that
/// is not a directory.
pub fn choose_destination(prompt: &mut dyn DirectoryPrompt, last: Option<&Path>) -> Option<PathBuf> {
    prompt.announce();
    match prompt.pick_folder(last.map(Path::to_path_buf)) {
        Some(dir) if dir.is_dir() => {
            tracing::info!("Output directory selected: {}", dir.display());
            Some(dir)
        }
        Some(dir) => {
            tracing::warn!("Selected path is not a directory: {}", dir.display());
            prompt.report_none();
            None
        }
        None => {
            tracing::warn!("No output directory selected");
            prompt.report_none();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[test]
    fn test_choose_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let picked = dir.path().to_path_buf();

        let mut prompt = MockDirectoryPrompt::new();
        prompt.expect_announce().times(1).return_const(());
        prompt
            .expect_pick_folder()
            .with(eq(None::<PathBuf>))
            .times(1)
            .return_const(Some(picked.clone()));
        prompt.expect_report_none().never();

        assert_eq!(choose_destination(&mut prompt, None), Some(picked));
    }

    #[test]
    fn test_cancel_reports_none() {
        let mut prompt = MockDirectoryPrompt::new();
        prompt.expect_announce().times(1).return_const(());
        prompt.expect_pick_folder().times(1).return_const(None::<PathBuf>);
        prompt.expect_report_none().times(1).return_const(());

        assert_eq!(choose_destination(&mut prompt, None), None);
    }

    #[test]
    fn test_starts_at_last_directory() {
        let dir = tempfile::tempdir().unwrap();
        let last = dir.path().to_path_buf();

        let mut prompt = MockDirectoryPrompt::new();
        prompt.expect_announce().return_const(());
        prompt
            .expect_pick_folder()
            .with(eq(Some(last.clone())))
            .times(1)
            .return_const(Some(last.clone()));

        assert_eq!(choose_destination(&mut prompt, Some(&last)), Some(last));
    }

    #[test]
    fn test_rejects_missing_path() {
        let mut prompt = MockDirectoryPrompt::new();
        prompt.expect_announce().return_const(());
        prompt
            .expect_pick_folder()
            .return_const(Some(PathBuf::from("/definitely/not/here")));
        prompt.expect_report_none().times(1).return_const(());

        assert_eq!(choose_destination(&mut prompt, None), None);
    }
}
