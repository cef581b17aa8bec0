//! Field validation against an external reasoning service.
//!
//! This crate provides:
//! - [`ReasoningService`] — the service contract (structured verdict in
//!   bounded time, or an error)
//! - [`OpenAiService`] — the production chat-completions client
//! - [`FieldValidator`] — per-field validation that degrades every service
//!   failure into an unresolved verdict instead of propagating it

mod company;
pub mod service;
pub mod validator;

pub use service::{
    FieldKind, OpenAiService, ReasoningService, ServiceConfig, ServiceRequest, ServiceVerdict,
    ValidationContext,
};
pub use validator::FieldValidator;
