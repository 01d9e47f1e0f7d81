//! A spec-driven visual design review engine for live web pages.
//!
//! Given a URL and a declarative design specification, this crate drives a
//! headless browser, captures visual and structural context, runs a
//! configurable suite of compliance checks, annotates a screenshot with
//! numbered redlines, and emits structured issue reports with CSS
//! selectors, severity grades, and pillar-level scorecards. A second mode
//! compares a live page against a reference image and produces a
//! visual-diff artifact.
//!
//! ```text
//!                     review(url, specId, options)
//!                              │
//!            ┌─────────────────┴──────────────────┐
//!            ▼                                    ▼
//!      spec::SpecLoader                    capture::BrowserDriver
//!            │                                    │
//!            └───────────────┬────────────────────┘
//!                             ▼
//!                      checks:: evaluators  ──▶  ProtoIssue[]
//!                             │
//!                             ▼
//!                      selector::synthesize  ──▶  cssSelector
//!                             │
//!                   ┌─────────┴─────────┐
//!                   ▼                   ▼
//!             annotate::annotate   budget::Budgeter (compact mode only,
//!                   │              drops lowest-severity issues to fit)
//!                   ▼                   │
//!             session::SessionStore ◀───┘
//!
//!                  compare(url, referencePath, options)
//!                              │
//!            capture::BrowserDriver ──▶ compare::compare ──▶ annotate/session
//! ```
//!
//! The orchestrator ([`orchestrator`]) ties these together; most callers
//! only need [`orchestrator::review`] and [`orchestrator::compare`].

pub mod annotate;
pub mod budget;
pub mod capture;
pub mod checks;
pub mod compare;
pub mod config;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod selector;
pub mod session;
pub mod spec;

pub use error::{Error, Result};
pub use orchestrator::{CompareOptions, CompareResult, ReviewOptions, ReviewResult};
