//! Session State Machine
//!
//! Decides whether the user may see protected content.
//!
//! ```text
//!            initialize()
//! loading ──────────────────┬──> missing   (nothing stored)
//!                           ├──> locked    (no secret, lock marker, idle, invalid)
//!                           ├──> expired   (validator said expired)
//!                           └──> active    (validator said valid)
//!
//! confirm(valid)  : any ──> active
//! lock()          : any ──> locked (missing stays missing)
//! logout()        : any ──> missing
//! ```
//!
//! Only `active` with a confirmed in-memory secret is *ready*. Everything else
//! is the gate saying no.
//!
//! # Module Structure
//!
//! - [`controller`]: [`SessionController`], the only writer of session state
//! - [`transition`]: pure mapping from stored record + validator result to a state
//! - [`types`]: states, notices, confirm outcomes, listener trait

mod controller;
pub mod transition;
mod types;

pub use controller::{SessionController, SessionSettings, SessionSnapshot};
pub use transition::{locked_state, next_state, ValidatorResult};
pub use types::{
    ConfirmOutcome, Notice, NoticeAction, NoticeStyle, SessionListener, SessionState,
};
