//! Integration tests for batch and interactive transactions.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use roadmap_client::orm::{Action, Operation};
use roadmap_client::{
    CountArgs, CreateInput, FindManyArgs, IsolationLevel, OrmError, Projection,
    TransactionOptions, UpdateArgs, UpdateInput, WhereInput, WhereUniqueInput,
};

use common::{setup, setup_with, user};

fn create_user(email: &str) -> Operation {
    Operation::new(
        "User",
        Action::Create {
            data: CreateInput::new().set("name", email).set("email", email),
            projection: Projection::default(),
        },
    )
}

#[tokio::test]
async fn test_interactive_transaction_commits() {
    let db = setup().await;

    let created = db
        .client
        .transaction(TransactionOptions::new(), |tx| async move {
            let ada = tx
                .user()
                .create(
                    CreateInput::new()
                        .set("name", "Ada")
                        .set("email", "ada@example.com"),
                )
                .await?;
            tx.project()
                .create(
                    CreateInput::new()
                        .set("name", "p")
                        .set("description", "d")
                        .set("userId", ada.id.as_str()),
                )
                .await?;
            // reads inside the transaction see its own writes
            let count = tx.project().count(CountArgs::new()).await?;
            Ok((ada, count))
        })
        .await
        .unwrap();

    assert_eq!(created.1, 1);
    let stored = db
        .client
        .user()
        .find_unique(WhereUniqueInput::id(created.0.id.as_str()))
        .await
        .unwrap();
    assert_eq!(stored, Some(created.0));
}

#[tokio::test]
async fn test_interactive_transaction_rolls_back_on_error() {
    let db = setup().await;

    let err = db
        .client
        .transaction(TransactionOptions::new(), |tx| async move {
            tx.user()
                .create(
                    CreateInput::new()
                        .set("name", "Ada")
                        .set("email", "ada@example.com"),
                )
                .await?;
            Err::<(), _>(OrmError::InvalidArgument("abort".to_string()))
        })
        .await
        .unwrap_err();

    assert_matches!(err, OrmError::InvalidArgument(ref message) if message == "abort");
    assert_eq!(db.client.user().count(CountArgs::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_write_rolls_back_earlier_writes() {
    let db = setup().await;
    user(&db.client, "taken@example.com").await;

    let err = db
        .client
        .transaction(TransactionOptions::new(), |tx| async move {
            tx.user()
                .create(
                    CreateInput::new()
                        .set("name", "Fresh")
                        .set("email", "fresh@example.com"),
                )
                .await?;
            tx.user()
                .create(
                    CreateInput::new()
                        .set("name", "Dup")
                        .set("email", "taken@example.com"),
                )
                .await
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), "P2002");
    assert_eq!(db.client.user().count(CountArgs::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_interactive_transaction_timeout() {
    let db = setup().await;

    let err = db
        .client
        .transaction(
            TransactionOptions::new().timeout(Duration::from_millis(50)),
            |tx| async move {
                tx.user()
                    .create(
                        CreateInput::new()
                            .set("name", "Slow")
                            .set("email", "slow@example.com"),
                    )
                    .await?;
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(())
            },
        )
        .await
        .unwrap_err();

    assert_matches!(err, OrmError::TransactionTimeout { timeout_ms: 50 });
    assert_eq!(db.client.user().count(CountArgs::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_transaction_start_timeout() {
    let db = setup_with(|mut config| {
        config.max_connections = 1;
        config
    })
    .await;
    let held = db.client.pool().acquire().await.unwrap();

    let err = db
        .client
        .transaction(
            TransactionOptions::new().max_wait(Duration::from_millis(50)),
            |_tx| async move { Ok(()) },
        )
        .await
        .unwrap_err();
    assert_matches!(err, OrmError::TransactionStartTimeout { max_wait_ms: 50 });

    drop(held);
    let ok = db
        .client
        .transaction(TransactionOptions::new(), |_tx| async move { Ok(7) })
        .await
        .unwrap();
    assert_eq!(ok, 7);
}

#[tokio::test]
async fn test_unsupported_isolation_level() {
    let db = setup().await;
    let err = db
        .client
        .transaction(
            TransactionOptions::new().isolation_level(IsolationLevel::ReadCommitted),
            |_tx| async move { Ok(()) },
        )
        .await
        .unwrap_err();
    assert_matches!(
        err,
        OrmError::UnsupportedIsolationLevel(IsolationLevel::ReadCommitted)
    );

    db.client
        .transaction(
            TransactionOptions::new().isolation_level(IsolationLevel::Serializable),
            |_tx| async move { Ok(()) },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_transaction_client_is_closed_after_commit() {
    let db = setup().await;

    let leaked = db
        .client
        .transaction(TransactionOptions::new(), |tx| async move { Ok(tx) })
        .await
        .unwrap();

    assert_matches!(
        leaked.user().count(CountArgs::new()).await,
        Err(OrmError::TransactionClosed)
    );
}

#[tokio::test]
async fn test_nested_write_inside_transaction_uses_savepoint() {
    let db = setup().await;
    let owner = user(&db.client, "ada@example.com").await;

    // the inner update fails and rolls back its savepoint; the outer write survives
    let renamed = db
        .client
        .transaction(TransactionOptions::new(), |tx| {
            let id = owner.id.clone();
            async move {
                let failed = tx
                    .user()
                    .update(UpdateArgs::new(
                        WhereUniqueInput::id(id.as_str()),
                        UpdateInput::new()
                            .set("name", "Changed")
                            .create("projects", CreateInput::new().set("name", "no description")),
                    ))
                    .await;
                assert!(failed.is_err());
                tx.user()
                    .update(UpdateArgs::new(
                        WhereUniqueInput::id(id.as_str()),
                        UpdateInput::new().set("name", "Grace"),
                    ))
                    .await
            }
        })
        .await
        .unwrap();

    assert_eq!(renamed.name, "Grace");
    assert_eq!(db.client.project().count(CountArgs::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_batch_commits_all_operations() {
    let db = setup().await;

    let outputs = db
        .client
        .transaction_batch(vec![
            create_user("a@example.com"),
            create_user("b@example.com"),
            Operation::new("User", Action::Count(CountArgs::new())),
        ])
        .await
        .unwrap();

    assert_eq!(outputs.len(), 3);
    assert_eq!(outputs[2].count(), Some(2));
    let first = outputs[0].clone().into_record().unwrap();
    assert_eq!(first.get_str("email"), Some("a@example.com"));
}

#[tokio::test]
async fn test_batch_is_atomic() {
    let db = setup().await;

    let err = db
        .client
        .transaction_batch(vec![
            create_user("a@example.com"),
            create_user("a@example.com"),
        ])
        .await
        .unwrap_err();
    assert_matches!(err, OrmError::UniqueConstraintViolation { .. });

    let users = db
        .client
        .user()
        .find_many(FindManyArgs::new().filter(WhereInput::default()))
        .await
        .unwrap();
    assert!(users.is_empty());

    let err = db
        .client
        .transaction_batch(vec![
            create_user("c@example.com"),
            Operation::new("Widget", Action::Count(CountArgs::new())),
        ])
        .await
        .unwrap_err();
    assert_matches!(err, OrmError::UnknownEntity(ref name) if name == "Widget");
    assert_eq!(db.client.user().count(CountArgs::new()).await.unwrap(), 0);
}
