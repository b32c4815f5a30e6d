use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::ids::{NodeId, RecordId};

/// The set of artifacts present on disk determines the node's type; this is
/// purely derived, never stored independently (spec.md §3 invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeType {
    Document,
    Table,
    Hybrid,
}

impl NodeType {
    pub fn has_page(&self) -> bool {
        matches!(self, NodeType::Document | NodeType::Hybrid)
    }

    pub fn has_table(&self) -> bool {
        matches!(self, NodeType::Table | NodeType::Hybrid)
    }

    pub fn from_artifacts(has_index_md: bool, has_metadata_json: bool) -> Option<Self> {
        match (has_index_md, has_metadata_json) {
            (true, true) => Some(NodeType::Hybrid),
            (true, false) => Some(NodeType::Document),
            (false, true) => Some(NodeType::Table),
            (false, false) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub parent_id: NodeId,
    pub title: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Vec<Property>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub views: Option<Vec<View>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Text,
    Markdown,
    Number,
    Checkbox,
    Date,
    Select,
    MultiSelect,
    Url,
    Email,
    Phone,
    Relation,
    Rollup,
    Formula,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectOption {
    pub id: String,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_config: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollup_config: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula_config: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub title: String,
    pub version: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRecord {
    pub id: RecordId,
    pub data: serde_json::Map<String, JsonValue>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

pub const RESERVED_ASSET_NAMES: &[&str] = &["index.md", "metadata.json", "data.jsonl"];

pub fn is_reserved_asset_name(name: &str) -> bool {
    RESERVED_ASSET_NAMES.contains(&name) || name.ends_with(".blobs")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ViewLayout {
    Table,
    Board,
    Gallery,
    List,
    Calendar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Gt,
    Lt,
    Gte,
    Lte,
    IsEmpty,
    IsNotEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterCombinator {
    And,
    Or,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum FilterNode {
    Leaf {
        property: String,
        operator: FilterOperator,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<JsonValue>,
    },
    #[serde(rename = "AND")]
    And { children: Vec<FilterNode> },
    #[serde(rename = "OR")]
    Or { children: Vec<FilterNode> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortKey {
    pub property: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSpec {
    pub property: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hidden_values: Vec<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnVisibility {
    pub property: String,
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub id: String,
    pub name: String,
    pub layout: ViewLayout,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnVisibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_both_artifacts_when_deriving_node_type_then_hybrid() {
        assert_eq!(
            NodeType::from_artifacts(true, true),
            Some(NodeType::Hybrid)
        );
    }

    #[test]
    fn given_only_index_md_when_deriving_node_type_then_document() {
        assert_eq!(
            NodeType::from_artifacts(true, false),
            Some(NodeType::Document)
        );
    }

    #[test]
    fn given_only_metadata_json_when_deriving_node_type_then_table() {
        assert_eq!(NodeType::from_artifacts(false, true), Some(NodeType::Table));
    }

    #[test]
    fn given_neither_artifact_when_deriving_node_type_then_none() {
        assert_eq!(NodeType::from_artifacts(false, false), None);
    }

    #[test]
    fn given_reserved_names_when_checking_then_reserved() {
        assert!(is_reserved_asset_name("index.md"));
        assert!(is_reserved_asset_name("metadata.json"));
        assert!(is_reserved_asset_name("data.jsonl"));
        assert!(is_reserved_asset_name("archive.blobs"));
        assert!(!is_reserved_asset_name("photo.png"));
    }
}
