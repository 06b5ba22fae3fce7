//! Shared fixtures: a fresh SQLite file per test with the schema pushed.

#![allow(dead_code)]

use roadmap_client::entities::{Node, Project, RoadMap, User};
use roadmap_client::{Client, CreateInput, DatabaseConfig, WhereUniqueInput};
use tempfile::TempDir;

pub struct TestDb {
    pub client: Client,
    // Keeps the database file alive for the duration of the test
    _dir: TempDir,
}

pub async fn setup() -> TestDb {
    setup_with(|config| config).await
}

pub async fn setup_with(adjust: impl FnOnce(DatabaseConfig) -> DatabaseConfig) -> TestDb {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite:{}", dir.path().join("test.db").display());
    let client = Client::connect(&adjust(DatabaseConfig::new(url)))
        .await
        .expect("connect");
    let result = client.push_schema().await;
    assert!(result.is_ok(), "schema push failed: {:?}", result.errors);
    TestDb { client, _dir: dir }
}

pub async fn user(client: &Client, email: &str) -> User {
    client
        .user()
        .create(CreateInput::new().set("name", email).set("email", email))
        .await
        .expect("create user")
}

pub async fn project(client: &Client, user: &User, name: &str) -> Project {
    client
        .project()
        .create(
            CreateInput::new()
                .set("name", name)
                .set("description", format!("{name} description"))
                .connect("user", WhereUniqueInput::id(user.id.as_str())),
        )
        .await
        .expect("create project")
}

pub async fn road_map(client: &Client, project: &Project) -> RoadMap {
    client
        .road_map()
        .create(CreateInput::new().set("projectId", project.id.as_str()))
        .await
        .expect("create road map")
}

/// A user, a project and an empty road map.
pub async fn seed_road_map(client: &Client) -> RoadMap {
    let owner = user(client, "owner@example.com").await;
    let project = project(client, &owner, "Roadmap").await;
    road_map(client, &project).await
}

pub async fn node(
    client: &Client,
    road_map: &RoadMap,
    title: &str,
    parent: Option<&Node>,
) -> Node {
    let mut data = CreateInput::new()
        .set("roadMapId", road_map.id.as_str())
        .set("title", title)
        .set("positionX", 0.0)
        .set("positionY", 0.0)
        .set("positionZ", 0.0);
    if let Some(parent) = parent {
        data = data.set("parentId", parent.id.as_str());
    }
    client.node().create(data).await.expect("create node")
}
