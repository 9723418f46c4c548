//! # Vellum operations
//!
//! Every document mutation is an [`OpSpec`]: a serializable record carrying
//! the author, a timestamp and a tagged operation body. Specs are created
//! locally or received from a sync server, and applied to a [`Document`]
//! through [`OpSpec::execute`]. Execution either succeeds completely or
//! leaves the document untouched and returns `false`.

pub mod document;
pub mod events;
pub mod execute;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use document::{Cursor, Document, StyleDefinition};
pub use events::{DocumentEvent, EventNotifier, SubscriptionId};

/// A complete operation record as it travels over the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpSpec {
    pub memberid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(flatten)]
    pub body: OpBody,
}

impl OpSpec {
    pub fn new(memberid: impl Into<String>, body: OpBody) -> Self {
        Self {
            memberid: memberid.into(),
            timestamp: None,
            group: None,
            body,
        }
    }

    /// True if this operation changes document content rather than
    /// presence state (cursors, members).
    pub fn is_edit(&self) -> bool {
        self.body.is_edit()
    }

    pub fn optype(&self) -> &'static str {
        self.body.optype()
    }
}

/// Cursor selection shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionType {
    #[default]
    Range,
    Region,
}

/// Presence details attached to a member
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// The operation payload, tagged on the wire by `optype`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "optype", rename_all_fields = "camelCase")]
pub enum OpBody {
    AddCursor,
    RemoveCursor,
    MoveCursor {
        position: usize,
        #[serde(default)]
        length: i64,
        #[serde(default)]
        selection_type: SelectionType,
    },
    AddMember {
        set_properties: MemberProperties,
    },
    RemoveMember,
    InsertText {
        position: usize,
        text: String,
    },
    RemoveText {
        position: usize,
        length: usize,
    },
    SplitParagraph {
        position: usize,
        #[serde(default)]
        move_cursor: bool,
    },
    MergeParagraph {
        source_start_position: usize,
        destination_start_position: usize,
        #[serde(default)]
        move_cursor: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        paragraph_style_name: Option<String>,
    },
    SetParagraphStyle {
        position: usize,
        style_name: String,
    },
    AddStyle {
        style_name: String,
        style_family: String,
        #[serde(default)]
        is_automatic_style: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        set_properties: Option<serde_json::Value>,
    },
    RemoveStyle {
        style_name: String,
        style_family: String,
    },
    UpdateMetadata {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        set_properties: Option<BTreeMap<String, String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        removed_properties: Option<Vec<String>>,
    },
}

impl OpBody {
    pub fn optype(&self) -> &'static str {
        match self {
            OpBody::AddCursor => "AddCursor",
            OpBody::RemoveCursor => "RemoveCursor",
            OpBody::MoveCursor { .. } => "MoveCursor",
            OpBody::AddMember { .. } => "AddMember",
            OpBody::RemoveMember => "RemoveMember",
            OpBody::InsertText { .. } => "InsertText",
            OpBody::RemoveText { .. } => "RemoveText",
            OpBody::SplitParagraph { .. } => "SplitParagraph",
            OpBody::MergeParagraph { .. } => "MergeParagraph",
            OpBody::SetParagraphStyle { .. } => "SetParagraphStyle",
            OpBody::AddStyle { .. } => "AddStyle",
            OpBody::RemoveStyle { .. } => "RemoveStyle",
            OpBody::UpdateMetadata { .. } => "UpdateMetadata",
        }
    }

    pub fn is_edit(&self) -> bool {
        !matches!(
            self,
            OpBody::AddCursor
                | OpBody::RemoveCursor
                | OpBody::MoveCursor { .. }
                | OpBody::AddMember { .. }
                | OpBody::RemoveMember
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_json_shape_is_flat() {
        let spec = OpSpec {
            memberid: "alice".into(),
            timestamp: Some(1000),
            group: None,
            body: OpBody::InsertText {
                position: 4,
                text: "hi".into(),
            },
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["optype"], "InsertText");
        assert_eq!(json["memberid"], "alice");
        assert_eq!(json["position"], 4);
        assert_eq!(json["text"], "hi");
    }

    #[test]
    fn test_spec_round_trip() {
        let specs = vec![
            OpSpec::new("a", OpBody::AddCursor),
            OpSpec::new(
                "a",
                OpBody::MoveCursor {
                    position: 3,
                    length: -2,
                    selection_type: SelectionType::Range,
                },
            ),
            OpSpec::new(
                "b",
                OpBody::MergeParagraph {
                    source_start_position: 5,
                    destination_start_position: 2,
                    move_cursor: true,
                    paragraph_style_name: Some("Heading".into()),
                },
            ),
            OpSpec::new(
                "b",
                OpBody::UpdateMetadata {
                    set_properties: Some(
                        [("dc:title".to_string(), "Notes".to_string())].into(),
                    ),
                    removed_properties: None,
                },
            ),
        ];
        for spec in specs {
            let json = serde_json::to_string(&spec).unwrap();
            let back: OpSpec = serde_json::from_str(&json).unwrap();
            assert_eq!(back, spec);
        }
    }

    #[test]
    fn test_wire_defaults() {
        let spec: OpSpec = serde_json::from_str(
            r#"{"optype":"MoveCursor","memberid":"m","position":7}"#,
        )
        .unwrap();
        assert_eq!(
            spec.body,
            OpBody::MoveCursor {
                position: 7,
                length: 0,
                selection_type: SelectionType::Range,
            }
        );
    }

    #[test]
    fn test_is_edit_partition() {
        assert!(!OpBody::AddCursor.is_edit());
        assert!(!OpBody::RemoveMember.is_edit());
        assert!(OpBody::InsertText {
            position: 0,
            text: "x".into()
        }
        .is_edit());
        assert!(OpBody::SetParagraphStyle {
            position: 0,
            style_name: "P1".into()
        }
        .is_edit());
    }
}
