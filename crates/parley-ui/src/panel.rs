//! Resizable side panel drag controller.
//!
//! Enforces the drag lifecycle:
//! - Idle -> Dragging (pointer down on a visible panel)
//! - Dragging -> Idle (pointer up anywhere, hide, or drop)
//!
//! Move/up listeners are attached only on the Idle -> Dragging edge and are
//! always detached when leaving Dragging.

use std::fmt;

use parley_core::config::UiConfig;
use tokio::sync::watch;

/// Global pointer listener registration, owned by the hosting surface.
pub trait DragListenerHost {
    fn attach(&mut self);
    fn detach(&mut self);
}

/// Width bounds and starting width of the panel, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelLimits {
    pub initial: u32,
    pub min: u32,
    pub max: u32,
}

impl Default for PanelLimits {
    fn default() -> Self {
        Self {
            initial: 350,
            min: 250,
            max: 500,
        }
    }
}

impl From<&UiConfig> for PanelLimits {
    fn from(ui: &UiConfig) -> Self {
        let (min, max) = if ui.sidebar_min_width <= ui.sidebar_max_width {
            (ui.sidebar_min_width, ui.sidebar_max_width)
        } else {
            (ui.sidebar_max_width, ui.sidebar_min_width)
        };
        Self {
            initial: ui.sidebar_width,
            min,
            max,
        }
    }
}

impl PanelLimits {
    pub fn clamp(&self, width: f64) -> u32 {
        let w = width.round().max(self.min as f64).min(self.max as f64);
        w as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PanelState {
    Idle,
    Dragging { start_x: f64, base_width: u32 },
}

impl fmt::Display for PanelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanelState::Idle => write!(f, "Idle"),
            PanelState::Dragging { .. } => write!(f, "Dragging"),
        }
    }
}

/// Tracks a pointer drag and publishes the resulting panel width.
pub struct PanelController<H: DragListenerHost> {
    host: H,
    limits: PanelLimits,
    state: PanelState,
    hidden: bool,
    width: watch::Sender<u32>,
}

impl<H: DragListenerHost> PanelController<H> {
    pub fn new(host: H, limits: PanelLimits) -> Self {
        let initial = limits.clamp(limits.initial as f64);
        let (width, _) = watch::channel(initial);
        Self {
            host,
            limits,
            state: PanelState::Idle,
            hidden: false,
            width,
        }
    }

    /// Start a drag at pointer `x`. Ignored when hidden or already dragging.
    pub fn pointer_down(&mut self, x: f64) -> bool {
        if self.hidden || self.state != PanelState::Idle {
            return false;
        }
        self.state = PanelState::Dragging {
            start_x: x,
            base_width: self.width(),
        };
        self.host.attach();
        tracing::debug!(x, width = self.width(), "Panel drag started");
        true
    }

    /// Follow the pointer. Returns the published width while dragging.
    pub fn pointer_move(&mut self, x: f64) -> Option<u32> {
        let PanelState::Dragging { start_x, base_width } = self.state else {
            return None;
        };
        let next = self.limits.clamp(base_width as f64 + (x - start_x));
        self.width.send_if_modified(|w| {
            let changed = *w != next;
            *w = next;
            changed
        });
        Some(next)
    }

    /// End the drag. Safe to call in any state.
    pub fn pointer_up(&mut self) {
        self.end_drag();
    }

    /// Show or hide the panel. Hiding ends any drag in progress.
    pub fn toggle_hidden(&mut self) -> bool {
        self.hidden = !self.hidden;
        if self.hidden {
            self.end_drag();
        }
        self.hidden
    }

    pub fn width(&self) -> u32 {
        *self.width.borrow()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    pub fn limits(&self) -> PanelLimits {
        self.limits
    }

    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.width.subscribe()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    fn end_drag(&mut self) {
        if let PanelState::Dragging { .. } = self.state {
            self.state = PanelState::Idle;
            self.host.detach();
            tracing::debug!(width = self.width(), "Panel drag ended");
        }
    }
}

impl<H: DragListenerHost> Drop for PanelController<H> {
    fn drop(&mut self) {
        self.end_drag();
    }
}
