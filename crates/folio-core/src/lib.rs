// Public fallible APIs in this crate share one concrete error contract (`FolioError`).
#![allow(
    clippy::missing_errors_doc,
    reason = "crate-wide fallible API uses one explicit error type; per-item boilerplate would duplicate contract"
)]

pub mod classify;
pub mod config;
pub mod error;
pub mod index;
pub mod render;
pub mod resolver;
pub mod route;
pub mod store;
pub mod text;

pub use classify::ContentClass;
pub use config::FolioConfig;
pub use error::{ErrorPayload, FolioError, Result};
pub use index::{BuildReport, SearchHit, SearchIndex, UpdateOutcome};
pub use resolver::{
    Page, PageIcon, PageMode, Resolution, ResolveError, ResolveFlags, Resolver,
};
pub use route::Route;
pub use store::{DocumentKind, DocumentStore};
