//! Loro backend for weaver-binding.
//!
//! `LoroTextSource` implements `CrdtText` over a `LoroDoc` text container,
//! so an `EditorBinding` can keep an editor model in sync with it.

mod diff;
mod source;

#[cfg(test)]
mod tests;

pub use source::LoroTextSource;

// Re-export Loro types that consumers need
pub use loro::{ExportMode, ImportStatus, LoroDoc, LoroText, VersionVector};
