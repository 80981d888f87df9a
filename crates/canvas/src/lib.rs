//! Client-side core of the task-graph canvas: a local working copy of a
//! project's graph with its edit/save lifecycle, and the backend it syncs with.

pub mod client;
pub mod editor;
pub mod sync;

pub use client::{ClientError, GraphBackend, HttpGraphClient};
pub use editor::{EditError, GraphEditor, NavigationDecision, RefreshOutcome, SyncState};
pub use sync::{SaveOutcome, open, refresh, save};
