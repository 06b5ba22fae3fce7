//! Integration tests for count, aggregate and groupBy.

mod common;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use roadmap_client::entities::RoadMap;
use roadmap_client::{
    AggregateArgs, AggregateFunction, AggregateSelection, Client, CountArgs, CreateInput,
    FindManyArgs, GroupByArgs, HavingInput, IntFilter, OrderBy, OrmError, StringFilter, Value,
    WhereInput,
};

use common::{project, road_map, setup, user};

/// Two road maps: the first holds nodes at x = 1, 2, 3, the second one at x = 10.
async fn seed(client: &Client) -> (RoadMap, RoadMap) {
    let owner = user(client, "ada@example.com").await;
    let project = project(client, &owner, "p").await;
    let first = road_map(client, &project).await;
    let second = road_map(client, &project).await;
    for (map, title, x) in [
        (&first, "a", 1.0),
        (&first, "b", 2.0),
        (&first, "c", 3.0),
        (&second, "d", 10.0),
    ] {
        client
            .node()
            .create(
                CreateInput::new()
                    .set("roadMapId", map.id.as_str())
                    .set("title", title)
                    .set("positionX", x)
                    .set("positionY", 0.0)
                    .set("positionZ", 0.0),
            )
            .await
            .unwrap();
    }
    (first, second)
}

#[tokio::test]
async fn test_count_with_filter_and_window() {
    let db = setup().await;
    let (first, _) = seed(&db.client).await;

    assert_eq!(db.client.node().count(CountArgs::new()).await.unwrap(), 4);
    assert_eq!(
        db.client
            .node()
            .count(WhereInput::equals("roadMapId", first.id.as_str()))
            .await
            .unwrap(),
        3
    );

    let mut windowed = CountArgs::new();
    windowed.take = Some(2);
    assert_eq!(db.client.node().count(windowed).await.unwrap(), 2);

    assert_eq!(db.client.model().count(CountArgs::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_aggregate_numeric_fields() {
    let db = setup().await;
    seed(&db.client).await;

    let result = db
        .client
        .node()
        .aggregate(AggregateArgs::new(
            AggregateSelection::new()
                .count_all()
                .count("description")
                .avg("positionX")
                .sum("positionX")
                .min("positionX")
                .max("title"),
        ))
        .await
        .unwrap();

    assert_eq!(result.count.get("_all"), Some(&4));
    assert_eq!(result.count.get("description"), Some(&0));
    assert_eq!(result.avg.get("positionX"), Some(&Value::Float(4.0)));
    assert_eq!(result.sum.get("positionX"), Some(&Value::Float(16.0)));
    assert_eq!(result.min.get("positionX"), Some(&Value::Float(1.0)));
    assert_eq!(
        result.max.get("title"),
        Some(&Value::String("d".to_string()))
    );
}

#[tokio::test]
async fn test_aggregate_over_window() {
    let db = setup().await;
    let (first, _) = seed(&db.client).await;

    let result = db
        .client
        .node()
        .aggregate(
            AggregateArgs::new(AggregateSelection::new().count_all().sum("positionX"))
                .filter(WhereInput::equals("roadMapId", first.id.as_str()))
                .order_by(OrderBy::desc("positionX"))
                .take(2),
        )
        .await
        .unwrap();
    assert_eq!(result.count.get("_all"), Some(&2));
    assert_eq!(result.sum.get("positionX"), Some(&Value::Float(5.0)));

    let nothing = db
        .client
        .node()
        .aggregate(
            AggregateArgs::new(AggregateSelection::new().count_all().avg("positionX"))
                .filter(WhereInput::equals("title", "missing")),
        )
        .await
        .unwrap();
    assert_eq!(nothing.count.get("_all"), Some(&0));
    assert_eq!(nothing.avg.get("positionX"), Some(&Value::Null));
}

#[tokio::test]
async fn test_aggregate_rejects_non_numeric_sum() {
    let db = setup().await;
    let err = db
        .client
        .node()
        .aggregate(AggregateArgs::new(AggregateSelection::new().sum("title")))
        .await
        .unwrap_err();
    assert_matches!(
        err,
        OrmError::UnsupportedAggregateField { ref field, aggregate: "_sum", .. } if field == "title"
    );
}

#[tokio::test]
async fn test_group_by_with_having_and_order() {
    let db = setup().await;
    let (first, second) = seed(&db.client).await;

    let groups = db
        .client
        .node()
        .group_by(
            GroupByArgs::new(["roadMapId"])
                .aggregate(
                    AggregateSelection::new()
                        .count_all()
                        .sum("positionX")
                        .max("positionX"),
                )
                .order_by(OrderBy::asc("roadMapId")),
        )
        .await
        .unwrap();
    assert_eq!(groups.len(), 2);
    let first_group = groups
        .iter()
        .find(|g| g.key("roadMapId") == Some(&Value::from(first.id.as_str())))
        .unwrap();
    assert_eq!(first_group.aggregates.count.get("_all"), Some(&3));
    assert_eq!(
        first_group.aggregates.sum.get("positionX"),
        Some(&Value::Float(6.0))
    );
    let second_group = groups
        .iter()
        .find(|g| g.key("roadMapId") == Some(&Value::from(second.id.as_str())))
        .unwrap();
    assert_eq!(
        second_group.aggregates.max.get("positionX"),
        Some(&Value::Float(10.0))
    );

    let busy = db
        .client
        .node()
        .group_by(
            GroupByArgs::new(["roadMapId"])
                .aggregate(AggregateSelection::new().count_all())
                .having(HavingInput::aggregate(
                    "roadMapId",
                    AggregateFunction::Count,
                    IntFilter::gt(1),
                )),
        )
        .await
        .unwrap();
    assert_eq!(busy.len(), 1);
    assert_eq!(
        busy[0].key("roadMapId"),
        Some(&Value::from(first.id.as_str()))
    );
}

#[tokio::test]
async fn test_group_by_multiple_keys_with_window() {
    let db = setup().await;
    seed(&db.client).await;

    let groups = db
        .client
        .node()
        .group_by(
            GroupByArgs::new(["roadMapId", "title"])
                .filter(WhereInput::field("title", StringFilter::not_equals("a")))
                .order_by(OrderBy::desc("title"))
                .skip(1)
                .take(1),
        )
        .await
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].key("title"), Some(&Value::from("c")));
}

#[tokio::test]
async fn test_group_by_validation_errors() {
    let db = setup().await;
    let nodes = db.client.node();

    assert_matches!(
        nodes.group_by(GroupByArgs::new(Vec::<String>::new())).await,
        Err(OrmError::EmptyGroupByKey { .. })
    );
    assert_matches!(
        nodes
            .group_by(GroupByArgs::new(["roadMapId"]).order_by(OrderBy::asc("title")))
            .await,
        Err(OrmError::OrderByNotInGroupBy { ref field, .. }) if field == "title"
    );
    assert_matches!(
        nodes
            .group_by(
                GroupByArgs::new(["roadMapId"])
                    .having(HavingInput::field("title", StringFilter::equals("a"))),
            )
            .await,
        Err(OrmError::HavingFieldNotInGroupBy { ref field, .. }) if field == "title"
    );
    assert_matches!(
        nodes
            .group_by(
                GroupByArgs::new(["title"]).aggregate(AggregateSelection::new().avg("title")),
            )
            .await,
        Err(OrmError::UnsupportedAggregateField { .. })
    );
    assert_matches!(
        nodes.group_by(GroupByArgs::new(["title"]).take(-1)).await,
        Err(OrmError::InvalidArgument(_))
    );
}

#[tokio::test]
async fn test_find_many_matches_count() {
    let db = setup().await;
    let (first, _) = seed(&db.client).await;
    let filter = WhereInput::or([
        WhereInput::equals("title", "d"),
        WhereInput::equals("roadMapId", first.id.as_str()),
    ]);
    let found = db
        .client
        .node()
        .find_many(FindManyArgs::new().filter(filter.clone()))
        .await
        .unwrap();
    let counted = db.client.node().count(filter).await.unwrap();
    assert_eq!(found.len() as u64, counted);
}
