#![deny(unsafe_code)]

//! coursedesk core: catalog navigation, keyword search and the daemon runtime.
//!
//! A conversation moves down the academic hierarchy (institution, sub-unit,
//! year, term, course, chapter) or searches it by keyword. Every button a
//! client renders carries a compact action token; the [`Dispatcher`] decodes
//! it and drives the navigation or search engine against the conversation's
//! session. Opened documents are remembered per conversation and can be saved
//! as favorites. The [`Daemon`] hosts the dispatcher behind a message bus and a
//! local HTTP control plane.

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future, the return type for async
/// trait methods that require dynamic dispatch (`dyn Trait`).
///
/// Native `async fn` in traits produces opaque return types that are not
/// object-safe. [`catalog::CatalogStore`] is consumed as `Arc<dyn _>`, so its
/// methods return this alias instead.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// Read-only catalog model and store.
pub mod catalog;
/// Async daemon runtime and message bus.
pub mod daemon;
/// Command and token dispatch.
pub mod dispatch;
/// HTTP control plane for the CLI.
pub mod ipc;
/// Per-conversation favorites and view history.
pub mod library;
/// Message envelope types for the internal bus.
pub mod message;
/// Guided hierarchical navigation.
pub mod navigation;
/// Replies, views and domain errors.
pub mod outcome;
/// Keyword search with filters and pagination.
pub mod search;
/// Per-conversation sessions, favorites and history.
pub mod session;
/// Action token wire format.
pub mod token;

pub use catalog::{CatalogError, CatalogStore, InMemoryCatalog};
pub use daemon::{Daemon, DaemonError};
pub use dispatch::{Caller, Dispatcher, Input};
pub use library::LibraryEngine;
pub use navigation::NavigationEngine;
pub use outcome::Reply;
pub use search::SearchEngine;
pub use session::{NavigationSession, SearchSessionStore, SessionStore};
pub use token::{Action, EncodingError, SearchFilter, TokenCodec};
