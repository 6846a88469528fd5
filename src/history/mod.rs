mod mirror;
mod store;

pub use mirror::{ArchiveMirror, HistoryMirror, HttpMirror};
pub use store::{HistoryStore, HistorySummary};
