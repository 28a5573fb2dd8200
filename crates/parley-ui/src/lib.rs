//! Presentation collaborators for Parley.
//!
//! - [`panel`]: drag controller for the resizable side panel
//! - [`transcript`]: plain-text rendering of messages, charts and tables

pub mod panel;
pub mod transcript;

pub use panel::{DragListenerHost, PanelController, PanelLimits, PanelState};
pub use transcript::{render_table, token_footer, TranscriptRenderer};
