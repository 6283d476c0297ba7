//! The warning surface: what a countdown UI binds to.
//!
//! The surface is passive. It renders whatever [`WarningView`] the runtime
//! publishes and forwards the user's two choices back through
//! [`SessionHandle`]. It never computes time itself.

use serde::Serialize;
use tokio::sync::watch;

use crate::{EngineError, SessionHandle};

/// What the warning UI should show right now.
///
/// `remaining_seconds` is always `0` while hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningView {
    visible: bool,
    remaining_seconds: u32,
}

impl WarningView {
    /// Nothing on screen.
    pub const fn hidden() -> Self {
        Self {
            visible: false,
            remaining_seconds: 0,
        }
    }

    /// Countdown visible with `remaining_seconds` left.
    pub const fn showing(remaining_seconds: u32) -> Self {
        Self {
            visible: true,
            remaining_seconds,
        }
    }

    /// Whether the warning is on screen.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Seconds left on the countdown (0 when hidden).
    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }
}

/// A renderer for [`WarningView`]s. Implemented by whatever draws the UI.
pub trait WarningSurface {
    /// Show `view`. Called once per change, in order.
    fn render(&mut self, view: WarningView);
}

/// A warning UI's connection to one tab's session runtime.
#[derive(Clone)]
pub struct WarningPrompt {
    view: watch::Receiver<WarningView>,
    handle: SessionHandle,
}

impl WarningPrompt {
    pub(crate) fn new(view: watch::Receiver<WarningView>, handle: SessionHandle) -> Self {
        Self { view, handle }
    }

    /// The view as of now.
    pub fn current(&self) -> WarningView {
        *self.view.borrow()
    }

    /// Waits for the view to change. `None` once the runtime has stopped.
    pub async fn changed(&mut self) -> Option<WarningView> {
        self.view.changed().await.ok()?;
        Some(*self.view.borrow_and_update())
    }

    /// The "Extend" control.
    pub async fn extend(&self) -> Result<(), EngineError> {
        self.handle.extend().await.map(|_| ())
    }

    /// The "Logout now" control.
    pub async fn logout_now(&self) -> Result<(), EngineError> {
        self.handle.logout_now().await.map(|_| ())
    }

    /// Renders every view change into `surface` until the runtime stops.
    pub async fn drive(mut self, surface: &mut impl WarningSurface) {
        surface.render(*self.view.borrow_and_update());
        while let Some(view) = self.changed().await {
            surface.render(view);
        }
    }
}
