//! Road maps and their node trees

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Entity, Project};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
#[serde(rename_all = "camelCase")]
pub struct RoadMap {
    pub id: String,
    pub project_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[entity(relation)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Box<Project>>,
    #[entity(relation)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<Node>>,
}

/// A positioned node in a road map.
///
/// Nodes form a forest through `parentId`; a parent always belongs to the
/// same road map and the chain of parents never loops back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub road_map_id: String,
    pub title: String,
    pub description: Option<String>,
    pub position_x: f64,
    pub position_y: f64,
    pub position_z: f64,
    pub parent_id: Option<String>,

    #[entity(relation)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub road_map: Option<Box<RoadMap>>,
    #[entity(relation)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<Node>>,
    #[entity(relation)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Node>>,
    #[entity(relation)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_block: Option<Box<CodeSnippet>>,
}

/// Code attached to at most one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
#[serde(rename_all = "camelCase")]
pub struct CodeSnippet {
    pub id: String,
    pub content: String,
    pub node_id: String,

    #[entity(relation)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<Box<Node>>,
}
