//! Integration tests for nested writes, includes, lazy loading, relation
//! filters, the node tree rules and cascading deletes.

mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use roadmap_client::entities::{CodeSnippet, Node, Project, User};
use roadmap_client::{
    CountArgs, CreateInput, FindManyArgs, FindUniqueArgs, IncludeArgs, OrderBy, OrmError,
    UpdateArgs, UpdateInput, UpdateManyArgs, Value, WhereInput, WhereUniqueInput,
};

use common::{node, project, road_map, seed_road_map, setup, user};

#[tokio::test]
async fn test_node_parent_and_children_round_trip() {
    let db = setup().await;
    let client = &db.client;

    client
        .user()
        .create(
            CreateInput::new()
                .set("id", "u1")
                .set("name", "Ada")
                .set("email", "a@b.com"),
        )
        .await
        .unwrap();
    client
        .project()
        .create(
            CreateInput::new()
                .set("id", "p1")
                .set("name", "Roadmap")
                .set("description", "d")
                .set("userId", "u1"),
        )
        .await
        .unwrap();
    client
        .road_map()
        .create(CreateInput::new().set("id", "r1").set("projectId", "p1"))
        .await
        .unwrap();
    let n1 = client
        .node()
        .create(
            CreateInput::new()
                .set("id", "n1")
                .set("roadMapId", "r1")
                .set("title", "Root")
                .set("positionX", 0.0)
                .set("positionY", 0.0)
                .set("positionZ", 0.0),
        )
        .await
        .unwrap();
    let n2 = client
        .node()
        .create(
            CreateInput::new()
                .set("id", "n2")
                .set("roadMapId", "r1")
                .set("parentId", "n1")
                .set("title", "Child")
                .set("positionX", 1.0)
                .set("positionY", 0.0)
                .set("positionZ", 0.0),
        )
        .await
        .unwrap();

    let root = client
        .node()
        .find_unique(
            FindUniqueArgs::new(WhereUniqueInput::id("n1"))
                .include("children", IncludeArgs::new())
                .include("parent", IncludeArgs::new()),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(root.children, Some(vec![n2.clone()]));
    assert_eq!(root.parent, None);

    let child = client
        .node()
        .find_unique(
            FindUniqueArgs::new(WhereUniqueInput::id("n2")).include("parent", IncludeArgs::new()),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(child.parent, Some(Box::new(n1)));
}

#[tokio::test]
async fn test_lazy_relation_loading() {
    let db = setup().await;
    let road_map = seed_road_map(&db.client).await;
    let root = node(&db.client, &road_map, "Root", None).await;
    let child = node(&db.client, &road_map, "Child", Some(&root)).await;

    let parent: Option<Node> = db
        .client
        .node()
        .related_one(&child, "parent")
        .await
        .unwrap();
    assert_eq!(parent, Some(root.clone()));

    let none: Option<Node> = db.client.node().related_one(&root, "parent").await.unwrap();
    assert_eq!(none, None);

    let children: Vec<Node> = db
        .client
        .node()
        .related_many(&root, "children", IncludeArgs::new())
        .await
        .unwrap();
    assert_eq!(children, vec![child]);

    let err = db
        .client
        .node()
        .related_many::<Node>(&root, "siblings", IncludeArgs::new())
        .await
        .unwrap_err();
    assert_matches!(err, OrmError::UnknownRelation { .. });
}

#[tokio::test]
async fn test_nested_create_on_list_and_one_to_one() {
    let db = setup().await;
    let owner = user(&db.client, "ada@example.com").await;

    let created = db
        .client
        .project()
        .create(
            CreateInput::new()
                .set("name", "Nested")
                .set("description", "d")
                .connect("user", WhereUniqueInput::id(owner.id.as_str()))
                .create("chatHistory", CreateInput::new())
                .create_many("roadMap", vec![CreateInput::new(), CreateInput::new()]),
        )
        .await
        .unwrap();

    let loaded: Project = db
        .client
        .project()
        .find_unique(
            FindUniqueArgs::new(WhereUniqueInput::id(created.id.as_str()))
                .include("chatHistory", IncludeArgs::new())
                .include("roadMap", IncludeArgs::new())
                .include("user", IncludeArgs::new()),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.chat_history.map(|h| h.len()), Some(1));
    assert_eq!(loaded.road_map.map(|r| r.len()), Some(2));
    assert_eq!(loaded.user.map(|u| u.email), Some("ada@example.com".to_string()));

    let road_map = db
        .client
        .road_map()
        .find_first(WhereInput::equals("projectId", created.id.as_str()))
        .await
        .unwrap()
        .unwrap();
    let with_code = db
        .client
        .node()
        .create(
            CreateInput::new()
                .set("title", "Code")
                .set("positionX", 0.0)
                .set("positionY", 0.0)
                .set("positionZ", 0.0)
                .connect("roadMap", WhereUniqueInput::id(road_map.id.as_str()))
                .create("codeBlock", CreateInput::new().set("content", "fn main() {}")),
        )
        .await
        .unwrap();

    let snippet: CodeSnippet = db
        .client
        .code_snippet()
        .find_unique_or_throw(WhereUniqueInput::new("nodeId", with_code.id.as_str()))
        .await
        .unwrap();
    assert_eq!(snippet.content, "fn main() {}");

    // a node holds at most one snippet
    let err = db
        .client
        .code_snippet()
        .create(
            CreateInput::new()
                .set("content", "again")
                .set("nodeId", with_code.id.as_str()),
        )
        .await
        .unwrap_err();
    assert_matches!(
        err,
        OrmError::UniqueConstraintViolation { ref fields, .. } if fields == &vec!["nodeId".to_string()]
    );
}

#[tokio::test]
async fn test_include_with_filter_order_and_nesting() {
    let db = setup().await;
    let road_map = seed_road_map(&db.client).await;
    let root = node(&db.client, &road_map, "a", None).await;
    for title in ["b", "c", "d"] {
        node(&db.client, &road_map, title, Some(&root)).await;
    }

    let loaded = db
        .client
        .road_map()
        .find_unique(
            FindUniqueArgs::new(WhereUniqueInput::id(road_map.id.as_str())).include(
                "nodes",
                IncludeArgs::new()
                    .filter(WhereInput::is_not("parent", None))
                    .order_by(OrderBy::desc("title"))
                    .take(2)
                    .include("parent", IncludeArgs::new()),
            ),
        )
        .await
        .unwrap()
        .unwrap();

    let nodes = loaded.nodes.unwrap();
    let titles: Vec<&str> = nodes.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["d", "c"]);
    assert!(
        nodes
            .iter()
            .all(|n| n.parent.as_ref().map(|p| p.id.as_str()) == Some(root.id.as_str()))
    );
}

#[tokio::test]
async fn test_include_batches_across_parents() {
    let db = setup().await;
    let owner = user(&db.client, "ada@example.com").await;
    let first = project(&db.client, &owner, "first").await;
    let second = project(&db.client, &owner, "second").await;
    let first_map = road_map(&db.client, &first).await;
    road_map(&db.client, &first).await;
    road_map(&db.client, &second).await;
    node(&db.client, &first_map, "only", None).await;

    let projects = db
        .client
        .project()
        .find_many(
            FindManyArgs::new()
                .order_by(OrderBy::asc("name"))
                .include(
                    "roadMap",
                    IncludeArgs::new().include("nodes", IncludeArgs::new()),
                ),
        )
        .await
        .unwrap();

    let counts: Vec<usize> = projects
        .iter()
        .map(|p| p.road_map.as_ref().map_or(0, Vec::len))
        .collect();
    assert_eq!(counts, vec![2, 1]);
    let node_total: usize = projects
        .iter()
        .flat_map(|p| p.road_map.iter().flatten())
        .map(|r| r.nodes.as_ref().map_or(0, Vec::len))
        .sum();
    assert_eq!(node_total, 1);
}

#[tokio::test]
async fn test_relation_filters() {
    let db = setup().await;
    let ada = user(&db.client, "ada@example.com").await;
    let grace = user(&db.client, "grace@example.com").await;
    user(&db.client, "alan@example.com").await;
    project(&db.client, &ada, "compiler").await;
    project(&db.client, &grace, "compiler").await;
    project(&db.client, &grace, "navy").await;

    let with_compiler: Vec<User> = db
        .client
        .user()
        .find_many(
            FindManyArgs::new()
                .filter(WhereInput::some(
                    "projects",
                    WhereInput::equals("name", "compiler"),
                ))
                .order_by(OrderBy::asc("email")),
        )
        .await
        .unwrap();
    let emails: Vec<&str> = with_compiler.iter().map(|u| u.email.as_str()).collect();
    assert_eq!(emails, vec!["ada@example.com", "grace@example.com"]);

    // vacuously true for the user without projects
    let only_compiler = db
        .client
        .user()
        .count(CountArgs::new().filter(WhereInput::every(
            "projects",
            WhereInput::equals("name", "compiler"),
        )))
        .await
        .unwrap();
    assert_eq!(only_compiler, 2);

    let without_projects = db
        .client
        .user()
        .count(WhereInput::none("projects", WhereInput::default()))
        .await
        .unwrap();
    assert_eq!(without_projects, 1);

    let grace_projects = db
        .client
        .project()
        .count(WhereInput::is(
            "user",
            Some(WhereInput::equals("email", "grace@example.com")),
        ))
        .await
        .unwrap();
    assert_eq!(grace_projects, 2);
}

#[tokio::test]
async fn test_node_cannot_become_its_own_ancestor() {
    let db = setup().await;
    let road_map = seed_road_map(&db.client).await;
    let root = node(&db.client, &road_map, "root", None).await;
    let child = node(&db.client, &road_map, "child", Some(&root)).await;
    let grandchild = node(&db.client, &road_map, "grandchild", Some(&child)).await;

    let cycle = db
        .client
        .node()
        .update(UpdateArgs::new(
            WhereUniqueInput::id(root.id.as_str()),
            UpdateInput::new().set("parentId", grandchild.id.as_str()),
        ))
        .await
        .unwrap_err();
    assert_matches!(cycle, OrmError::InvalidArgument(_));

    let own_parent = db
        .client
        .node()
        .update(UpdateArgs::new(
            WhereUniqueInput::id(child.id.as_str()),
            UpdateInput::new().connect("parent", WhereUniqueInput::id(child.id.as_str())),
        ))
        .await
        .unwrap_err();
    assert_matches!(own_parent, OrmError::InvalidArgument(_));

    let detached = db
        .client
        .node()
        .update(UpdateArgs::new(
            WhereUniqueInput::id(grandchild.id.as_str()),
            UpdateInput::new().disconnect("parent"),
        ))
        .await
        .unwrap();
    assert_eq!(detached.parent_id, None);
}

#[tokio::test]
async fn test_parent_must_share_road_map() {
    let db = setup().await;
    let owner = user(&db.client, "ada@example.com").await;
    let project = project(&db.client, &owner, "p").await;
    let first = road_map(&db.client, &project).await;
    let second = road_map(&db.client, &project).await;
    let foreign_parent = node(&db.client, &first, "elsewhere", None).await;

    let err = db
        .client
        .node()
        .create(
            CreateInput::new()
                .set("roadMapId", second.id.as_str())
                .set("parentId", foreign_parent.id.as_str())
                .set("title", "stray")
                .set("positionX", 0.0)
                .set("positionY", 0.0)
                .set("positionZ", 0.0),
        )
        .await
        .unwrap_err();
    assert_matches!(err, OrmError::InvalidArgument(_));
}

#[tokio::test]
async fn test_moving_node_keeps_tree_inside_road_map() {
    let db = setup().await;
    let owner = user(&db.client, "ada@example.com").await;
    let project = project(&db.client, &owner, "p").await;
    let first = road_map(&db.client, &project).await;
    let second = road_map(&db.client, &project).await;
    let root = node(&db.client, &first, "root", None).await;
    let child = node(&db.client, &first, "child", Some(&root)).await;
    let move_to_second = || UpdateInput::new().set("roadMapId", second.id.as_str());

    // the child would leave its parent behind
    let err = db
        .client
        .node()
        .update(UpdateArgs::new(
            WhereUniqueInput::id(child.id.as_str()),
            move_to_second(),
        ))
        .await
        .unwrap_err();
    assert_matches!(err, OrmError::InvalidArgument(_));

    // the root would leave its children behind
    let err = db
        .client
        .node()
        .update(UpdateArgs::new(
            WhereUniqueInput::id(root.id.as_str()),
            move_to_second(),
        ))
        .await
        .unwrap_err();
    assert_matches!(err, OrmError::InvalidArgument(_));

    let err = db
        .client
        .node()
        .update_many(UpdateManyArgs::new(
            WhereInput::equals("id", child.id.as_str()),
            move_to_second(),
        ))
        .await
        .unwrap_err();
    assert_matches!(err, OrmError::InvalidArgument(_));

    let unchanged = db
        .client
        .node()
        .find_unique_or_throw(WhereUniqueInput::id(child.id.as_str()))
        .await
        .unwrap();
    assert_eq!(unchanged.road_map_id, first.id);

    // detaching in the same update makes the move legal
    let moved = db
        .client
        .node()
        .update(UpdateArgs::new(
            WhereUniqueInput::id(child.id.as_str()),
            move_to_second().set("parentId", Value::Null),
        ))
        .await
        .unwrap();
    assert_eq!(moved.road_map_id, second.id);
    assert_eq!(moved.parent_id, None);

    let moved_root = db
        .client
        .node()
        .update(UpdateArgs::new(
            WhereUniqueInput::id(root.id.as_str()),
            move_to_second(),
        ))
        .await
        .unwrap();
    assert_eq!(moved_root.road_map_id, second.id);
}

#[tokio::test]
async fn test_foreign_key_and_relation_write_are_exclusive() {
    let db = setup().await;
    let owner = user(&db.client, "ada@example.com").await;
    let err = db
        .client
        .project()
        .create(
            CreateInput::new()
                .set("name", "p")
                .set("description", "d")
                .set("userId", owner.id.as_str())
                .connect("user", WhereUniqueInput::id(owner.id.as_str())),
        )
        .await
        .unwrap_err();
    assert_matches!(err, OrmError::InvalidArgument(_));
}

#[tokio::test]
async fn test_delete_cascades_through_children() {
    let db = setup().await;
    let owner = user(&db.client, "ada@example.com").await;
    let project = project(&db.client, &owner, "p").await;
    let map = road_map(&db.client, &project).await;
    let root = node(&db.client, &map, "root", None).await;
    node(&db.client, &map, "child", Some(&root)).await;
    db.client
        .code_snippet()
        .create(
            CreateInput::new()
                .set("content", "x")
                .set("nodeId", root.id.as_str()),
        )
        .await
        .unwrap();
    db.client
        .session()
        .create(
            CreateInput::new()
                .set("token", "t1")
                .set("expiresAt", Utc::now() + Duration::days(1))
                .set("userId", owner.id.as_str()),
        )
        .await
        .unwrap();
    db.client
        .chat_history()
        .create(
            CreateInput::new()
                .set("projectId", project.id.as_str())
                .create_many(
                    "messages",
                    vec![CreateInput::new().set("input", "hi").set("output", "hello")],
                ),
        )
        .await
        .unwrap();

    // deleting a parent node removes its subtree
    db.client
        .node()
        .delete(WhereUniqueInput::id(root.id.as_str()))
        .await
        .unwrap();
    assert_eq!(db.client.node().count(WhereInput::default()).await.unwrap(), 0);
    assert_eq!(
        db.client.code_snippet().count(WhereInput::default()).await.unwrap(),
        0
    );

    db.client
        .user()
        .delete(WhereUniqueInput::id(owner.id.as_str()))
        .await
        .unwrap();
    assert_eq!(db.client.project().count(WhereInput::default()).await.unwrap(), 0);
    assert_eq!(db.client.road_map().count(WhereInput::default()).await.unwrap(), 0);
    assert_eq!(
        db.client.chat_history().count(WhereInput::default()).await.unwrap(),
        0
    );
    assert_eq!(db.client.message().count(WhereInput::default()).await.unwrap(), 0);
    assert_eq!(db.client.session().count(WhereInput::default()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_include_unknown_relation() {
    let db = setup().await;
    let err = db
        .client
        .user()
        .find_many(FindManyArgs::new().include("friends", IncludeArgs::new()))
        .await
        .unwrap_err();
    assert_matches!(err, OrmError::UnknownRelation { ref relation, .. } if relation == "friends");
}
