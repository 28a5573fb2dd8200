//! Parley session engine.
//!
//! Owns the message log and turn sequencing ([`session`]), the attachment
//! slot ([`attachment`]) and the boundary to the remote answering service
//! ([`client`]).

pub mod attachment;
pub mod client;
pub mod error;
pub mod session;
pub mod turn;

pub use attachment::{AttachmentLoader, AttachmentSource, BytesSource, LoadOutcome, PathSource};
pub use client::{AnswerService, HttpAnswerService, MockAnswerService};
pub use error::{AttachmentError, ChatError, TransportError};
pub use session::{ChatSession, SessionOptions, TurnOutcome};
pub use turn::TurnState;
