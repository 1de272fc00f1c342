//! Binding configuration.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Options for an [`EditorBinding`](crate::EditorBinding).
///
/// Missing fields take their defaults, so a host can load a partial JSON or
/// TOML table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BindingOptions {
    /// Class of a remote peer's selection range.
    pub selection_class: SmolStr,
    /// Class of the caret marker at a remote peer's selection head.
    pub selection_head_class: SmolStr,
}

impl Default for BindingOptions {
    fn default() -> Self {
        Self {
            selection_class: SmolStr::new_static("loroRemoteSelection"),
            selection_head_class: SmolStr::new_static("loroRemoteSelectionHead"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let options: BindingOptions =
            serde_json::from_str(r#"{"selectionClass": "peerSel"}"#).unwrap();
        assert_eq!(options.selection_class, "peerSel");
        assert_eq!(options.selection_head_class, "loroRemoteSelectionHead");
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(BindingOptions::default()).unwrap();
        assert_eq!(json["selectionClass"], "loroRemoteSelection");
        assert_eq!(json["selectionHeadClass"], "loroRemoteSelectionHead");
    }
}
