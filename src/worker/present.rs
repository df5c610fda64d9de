use crate::ports::{NotificationSurface, WindowClients};
use crate::types::notification::{
    ClickAction, NotificationClick, NotificationDescriptor, NotificationId,
};

#[derive(Debug, thiserror::Error)]
pub enum PresentError {
    #[error("failed to show notification: {0}")]
    Show(String),
    #[error("failed to open app window at '{path}': {message}")]
    OpenWindow { path: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Dismissed,
    OpenedApp,
}

#[derive(Debug, Clone)]
pub struct NotificationPresenter<S, W> {
    surface: S,
    windows: W,
    app_root: String,
}

impl<S, W> NotificationPresenter<S, W>
where
    S: NotificationSurface,
    W: WindowClients,
{
    pub fn new(surface: S, windows: W, app_root: impl Into<String>) -> Self {
        Self {
            surface,
            windows,
            app_root: app_root.into(),
        }
    }

    /// Shows the descriptor once. Failures are reported, never retried.
    pub async fn present(
        &self,
        descriptor: &NotificationDescriptor,
    ) -> Result<NotificationId, PresentError> {
        self.surface
            .show(descriptor)
            .await
            .map_err(|err| PresentError::Show(err.to_string()))
    }

    /// Dismisses the notification first, whatever was clicked. Only the explore
    /// action goes on to bring up the app.
    pub async fn handle_click(
        &self,
        click: &NotificationClick,
    ) -> Result<ClickOutcome, PresentError> {
        self.surface.dismiss(&click.notification);

        match click.kind() {
            ClickAction::Explore => {
                self.windows
                    .focus_or_open(&self.app_root)
                    .await
                    .map_err(|err| PresentError::OpenWindow {
                        path: self.app_root.clone(),
                        message: err.to_string(),
                    })?;
                Ok(ClickOutcome::OpenedApp)
            }
            ClickAction::Close | ClickAction::Body | ClickAction::Other => {
                Ok(ClickOutcome::Dismissed)
            }
        }
    }
}
