use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Entity, RoadMap, User};

/// A user's project, holding its chat history and road maps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: String,
    pub system_prompt: Option<String>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[entity(relation)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Box<User>>,
    #[entity(relation)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_history: Option<Vec<ChatHistory>>,
    #[entity(relation)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub road_map: Option<Vec<RoadMap>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistory {
    pub id: String,
    pub project_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[entity(relation)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Box<Project>>,
    #[entity(relation)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
}

/// One prompt/response exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub chat_history_id: String,
    pub input: String,
    pub output: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[entity(relation)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_history: Option<Box<ChatHistory>>,
}
