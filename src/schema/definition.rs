//! Entity definitions for the roadmap schema.
//!
//! Models are listed parents-first so the generated DDL can be applied in order.

use super::{
    DefaultValue, FieldDef, FieldType, ModelDef, ReferentialAction, RelationDef, RelationKind,
};

fn id() -> FieldDef {
    FieldDef::new("id", "id", FieldType::String)
        .id()
        .default(DefaultValue::Uuid)
}

fn string(name: &'static str, column: &'static str) -> FieldDef {
    FieldDef::new(name, column, FieldType::String)
}

fn datetime(name: &'static str, column: &'static str) -> FieldDef {
    FieldDef::new(name, column, FieldType::DateTime)
}

fn float(name: &'static str, column: &'static str) -> FieldDef {
    FieldDef::new(name, column, FieldType::Float)
}

fn created_at() -> FieldDef {
    datetime("createdAt", "created_at").default(DefaultValue::Now)
}

fn updated_at() -> FieldDef {
    datetime("updatedAt", "updated_at")
        .default(DefaultValue::Now)
        .stamped()
}

fn relation(
    name: &'static str,
    target: &'static str,
    kind: RelationKind,
    local_field: &'static str,
    target_field: &'static str,
) -> RelationDef {
    RelationDef {
        name,
        target,
        kind,
        local_field,
        target_field,
        on_delete: ReferentialAction::Cascade,
        on_update: ReferentialAction::Cascade,
        scope: None,
    }
}

fn belongs_to(name: &'static str, target: &'static str, fk: &'static str) -> RelationDef {
    relation(name, target, RelationKind::ManyToOne, fk, "id")
}

fn has_many(name: &'static str, target: &'static str, fk: &'static str) -> RelationDef {
    relation(name, target, RelationKind::OneToMany, "id", fk)
}

pub(super) fn models() -> Vec<ModelDef> {
    vec![
        ModelDef {
            name: "User",
            table: "user",
            fields: vec![
                id(),
                string("name", "name"),
                string("email", "email").unique(),
                string("customPrompt", "custom_prompt").optional(),
                FieldDef::new("emailVerified", "email_verified", FieldType::Boolean)
                    .default(DefaultValue::Bool(false)),
                string("image", "image").optional(),
                created_at(),
                updated_at(),
            ],
            relations: vec![
                has_many("projects", "Project", "userId"),
                has_many("sessions", "Session", "userId"),
                has_many("accounts", "Account", "userId"),
            ],
        },
        ModelDef {
            name: "Session",
            table: "session",
            fields: vec![
                id(),
                datetime("expiresAt", "expires_at"),
                string("token", "token").unique(),
                created_at(),
                updated_at(),
                string("ipAddress", "ip_address").optional(),
                string("userAgent", "user_agent").optional(),
                string("userId", "user_id"),
            ],
            relations: vec![belongs_to("user", "User", "userId")],
        },
        ModelDef {
            name: "Account",
            table: "account",
            fields: vec![
                id(),
                string("accountId", "account_id"),
                string("providerId", "provider_id"),
                string("userId", "user_id"),
                string("accessToken", "access_token").optional(),
                string("refreshToken", "refresh_token").optional(),
                string("idToken", "id_token").optional(),
                datetime("accessTokenExpiresAt", "access_token_expires_at").optional(),
                datetime("refreshTokenExpiresAt", "refresh_token_expires_at").optional(),
                string("scope", "scope").optional(),
                string("password", "password").optional(),
                created_at(),
                updated_at(),
            ],
            relations: vec![belongs_to("user", "User", "userId")],
        },
        ModelDef {
            name: "Verification",
            table: "verification",
            fields: vec![
                id(),
                string("identifier", "identifier"),
                string("value", "value"),
                datetime("expiresAt", "expires_at"),
                created_at().optional(),
                updated_at().optional(),
            ],
            relations: vec![],
        },
        ModelDef {
            name: "Project",
            table: "project",
            fields: vec![
                id(),
                string("name", "name"),
                string("description", "description"),
                string("systemPrompt", "system_prompt").optional(),
                string("userId", "user_id"),
                created_at(),
                updated_at(),
            ],
            relations: vec![
                belongs_to("user", "User", "userId"),
                has_many("chatHistory", "ChatHistory", "projectId"),
                has_many("roadMap", "RoadMap", "projectId"),
            ],
        },
        ModelDef {
            name: "ChatHistory",
            table: "chat_history",
            fields: vec![
                id(),
                string("projectId", "project_id"),
                created_at(),
                updated_at(),
            ],
            relations: vec![
                belongs_to("project", "Project", "projectId"),
                has_many("messages", "Message", "chatHistoryId"),
            ],
        },
        ModelDef {
            name: "Message",
            table: "message",
            fields: vec![
                id(),
                string("chatHistoryId", "chat_history_id"),
                string("input", "input"),
                string("output", "output"),
                created_at(),
                updated_at(),
            ],
            relations: vec![belongs_to("chatHistory", "ChatHistory", "chatHistoryId")],
        },
        ModelDef {
            name: "RoadMap",
            table: "road_map",
            fields: vec![
                id(),
                string("projectId", "project_id"),
                created_at(),
                updated_at(),
            ],
            relations: vec![
                belongs_to("project", "Project", "projectId"),
                has_many("nodes", "Node", "roadMapId"),
            ],
        },
        ModelDef {
            name: "Node",
            table: "node",
            fields: vec![
                id(),
                string("roadMapId", "road_map_id"),
                string("title", "title"),
                string("description", "description").optional(),
                float("positionX", "position_x"),
                float("positionY", "position_y"),
                float("positionZ", "position_z"),
                string("parentId", "parent_id").optional(),
            ],
            relations: vec![
                belongs_to("roadMap", "RoadMap", "roadMapId"),
                RelationDef {
                    scope: Some("roadMapId"),
                    ..belongs_to("parent", "Node", "parentId")
                },
                has_many("children", "Node", "parentId"),
                relation(
                    "codeBlock",
                    "CodeSnippet",
                    RelationKind::OneToOneInverse,
                    "id",
                    "nodeId",
                ),
            ],
        },
        ModelDef {
            name: "CodeSnippet",
            table: "code_snippet",
            fields: vec![
                id(),
                string("content", "content"),
                string("nodeId", "node_id").unique(),
            ],
            relations: vec![relation(
                "node",
                "Node",
                RelationKind::OneToOneOwner,
                "nodeId",
                "id",
            )],
        },
        ModelDef {
            name: "Model",
            table: "model",
            fields: vec![
                id(),
                string("name", "name"),
                string("description", "description"),
                created_at(),
                updated_at(),
            ],
            relations: vec![],
        },
    ]
}
