// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end sync runs against an in-memory board and an in-memory SQLite store.

mod common;

use boardsync_core::board::{BoardCall, InMemoryBoard};
use boardsync_core::models::{ColumnValue, EntityType, UserFields, correlation_status};
use boardsync_core::snapshot::SnapshotStore;
use boardsync_core::store::Store;
use boardsync_core::sync::{
    DeleteOutcome, Direction, FetchSource, ItemPullOutcome, Scope, SyncOptions,
};
use common::{PROJECTS_BOARD, TestContext, USERS_BOARD, item, project_item, user_item};

// ============================================================================
// Pull
// ============================================================================

#[tokio::test]
async fn test_first_pull_creates_records_and_rerun_is_idempotent() {
    let ctx = TestContext::new().await;
    ctx.board.set_items(
        USERS_BOARD,
        vec![
            user_item("1", "Jane", "Doe", "jane@example.com"),
            user_item("2", "John", "Smith", "john@example.com"),
        ],
    );

    let first = ctx.engine.pull(EntityType::User, &SyncOptions::default()).await.unwrap();
    assert_eq!(first.fetched, 2);
    assert_eq!(first.created, 2);
    assert_eq!(first.failed, 0);
    assert_eq!(ctx.store.count_correlations(EntityType::User).await.unwrap(), 2);

    let second = ctx.engine.pull(EntityType::User, &SyncOptions::default()).await.unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 2);
    assert_eq!(ctx.store.count_correlations(EntityType::User).await.unwrap(), 2);
    assert_eq!(ctx.store.list_active_users().await.unwrap().len(), 2);

    let local_id = ctx
        .store
        .get_local_id(EntityType::User, "1")
        .await
        .unwrap()
        .expect("item 1 should be correlated");
    let user = ctx.store.get_user(&local_id).await.unwrap().unwrap();
    assert_eq!(user.name, "Jane Doe");
    assert_eq!(user.email.as_deref(), Some("jane@example.com"));
}

#[tokio::test]
async fn test_pull_never_overwrites_with_blanks() {
    let ctx = TestContext::new().await;
    ctx.board.set_items(
        USERS_BOARD,
        vec![item(
            "1",
            "Jane Doe",
            &[
                ("text25", "Jane"),
                ("text1", "Doe"),
                ("email7", "jane@example.com"),
                ("text2", "Austin"),
                ("phone", "555-0100"),
            ],
        )],
    );
    ctx.engine.pull(EntityType::User, &SyncOptions::default()).await.unwrap();

    // City cleared and phone changed on the board
    ctx.board.set_items(
        USERS_BOARD,
        vec![item(
            "1",
            "Jane Doe",
            &[
                ("text25", "Jane"),
                ("text1", ""),
                ("email7", "jane@example.com"),
                ("text2", ""),
                ("phone", "555-0199"),
            ],
        )],
    );
    let report = ctx.engine.pull(EntityType::User, &SyncOptions::default()).await.unwrap();
    assert_eq!(report.updated, 1);

    let local_id = ctx.store.get_local_id(EntityType::User, "1").await.unwrap().unwrap();
    let user = ctx.store.get_user(&local_id).await.unwrap().unwrap();
    assert_eq!(user.metadata.0["city"], "Austin");
    assert_eq!(user.metadata.0["phone"], "555-0199");
    // A shorter name is still a non-blank value
    assert_eq!(user.name, "Jane");
}

#[tokio::test]
async fn test_pull_correlates_existing_user_by_email() {
    let ctx = TestContext::new().await;
    let existing = ctx
        .store
        .create_user(&UserFields {
            name: Some("Jane D".into()),
            email: Some("Jane@Example.com".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    ctx.board
        .set_items(USERS_BOARD, vec![user_item("1", "Jane", "Doe", "jane@example.com")]);

    let report = ctx.engine.pull(EntityType::User, &SyncOptions::default()).await.unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 1);

    let local_id = ctx.store.get_local_id(EntityType::User, "1").await.unwrap();
    assert_eq!(local_id.as_deref(), Some(existing.as_str()));
    assert_eq!(ctx.store.list_active_users().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_pull_skips_user_without_email_with_warning() {
    let ctx = TestContext::new().await;
    ctx.board.set_items(
        USERS_BOARD,
        vec![
            item("1", "No Email", &[("text25", "No"), ("text1", "Email")]),
            item("2", "", &[]),
        ],
    );

    let report = ctx.engine.pull(EntityType::User, &SyncOptions::default()).await.unwrap();
    assert_eq!(report.skipped, 2);
    assert_eq!(report.created, 0);
    assert_eq!(ctx.store.count_correlations(EntityType::User).await.unwrap(), 0);

    let audit = ctx.store.list_audit(Some(EntityType::User), 10).await.unwrap();
    let warning = audit
        .iter()
        .find(|a| a.external_id == "1")
        .expect("warning should be audited");
    assert_eq!(warning.status, "warning");
    assert_eq!(warning.operation, "skip");
    assert_eq!(warning.error_message.as_deref(), Some("Empty email address"));
}

#[tokio::test]
async fn test_pull_pages_without_duplicates() {
    let ctx = TestContext::with_board(InMemoryBoard::new().with_page_size(2)).await;
    ctx.board.set_items(
        USERS_BOARD,
        vec![
            user_item("1", "A", "One", "a@example.com"),
            user_item("2", "B", "Two", "b@example.com"),
            user_item("3", "C", "Three", "c@example.com"),
            // Same item served again on a later page
            user_item("1", "A", "One", "a@example.com"),
            user_item("5", "E", "Five", "e@example.com"),
        ],
    );

    let report = ctx.engine.pull(EntityType::User, &SyncOptions::default()).await.unwrap();
    assert_eq!(report.fetched, 4);
    assert_eq!(report.created, 4);
    assert_eq!(ctx.store.count_correlations(EntityType::User).await.unwrap(), 4);

    let opts = SyncOptions {
        max_pages: Some(1),
        ..SyncOptions::default()
    };
    let report = ctx.engine.pull(EntityType::User, &opts).await.unwrap();
    assert_eq!(report.fetched, 2);
}

#[tokio::test]
async fn test_pull_respects_limit() {
    let ctx = TestContext::new().await;
    ctx.board.set_items(
        USERS_BOARD,
        (1..=5)
            .map(|i| user_item(&i.to_string(), "User", &i.to_string(), &format!("u{}@example.com", i)))
            .collect(),
    );

    let report = ctx.engine.pull(EntityType::User, &SyncOptions::limited(3)).await.unwrap();
    assert_eq!(report.fetched, 3);
    assert_eq!(ctx.store.count_correlations(EntityType::User).await.unwrap(), 3);
}

#[tokio::test]
async fn test_pull_project_builds_customer_property_and_note() {
    let ctx = TestContext::new().await;
    ctx.board.set_items(
        PROJECTS_BOARD,
        vec![
            project_item("10", "Roof Replacement", "Alice Brown", "alice@example.com"),
            project_item("11", "Gutters", "Bob Green", ""),
        ],
    );

    let report = ctx.engine.pull(EntityType::Project, &SyncOptions::default()).await.unwrap();
    assert_eq!(report.created, 2);

    let project_id = ctx.store.get_local_id(EntityType::Project, "10").await.unwrap().unwrap();
    let project = ctx.store.get_project(&project_id).await.unwrap().unwrap();
    assert_eq!(project.name, "Roof Replacement");
    assert_eq!(project.status, "active");
    assert_eq!(project.estimated_value, Some(12500.0));

    let customer = ctx
        .store
        .get_customer(project.customer_id.as_deref().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(customer.email.as_deref(), Some("alice@example.com"));

    let property = ctx
        .store
        .get_property(project.property_id.as_deref().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(property.city.as_deref(), Some("Springfield"));
    assert_eq!(property.zip.as_deref(), Some("62704"));

    let notes = ctx.store.list_project_notes(&project_id).await.unwrap();
    assert_eq!(notes, vec!["Gate code 1234".to_string()]);

    // Missing email gets a placeholder that push never sends back
    let other_id = ctx.store.get_local_id(EntityType::Project, "11").await.unwrap().unwrap();
    let other = ctx.store.get_project(&other_id).await.unwrap().unwrap();
    let other_customer = ctx
        .store
        .get_customer(other.customer_id.as_deref().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(
        other_customer
            .email
            .as_deref()
            .unwrap()
            .ends_with("@placeholder.example")
    );
}

#[tokio::test]
async fn test_pull_failure_is_audited_and_loop_continues() {
    let ctx = TestContext::new().await;
    // Correlation pointing at a project row that does not exist
    ctx.store
        .add_correlation(EntityType::Project, "missing-project", "10")
        .await
        .unwrap();
    ctx.board.set_items(
        PROJECTS_BOARD,
        vec![
            project_item("10", "Orphan", "Alice Brown", "alice@example.com"),
            project_item("11", "Gutters", "Bob Green", "bob@example.com"),
        ],
    );

    let report = ctx.engine.pull(EntityType::Project, &SyncOptions::default()).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.created, 1);

    let audit = ctx.store.list_audit(Some(EntityType::Project), 10).await.unwrap();
    let failure = audit.iter().find(|a| a.external_id == "10").unwrap();
    assert_eq!(failure.status, "error");
    assert_eq!(failure.operation, "update");
    assert!(failure.error_message.is_some());
}

// ============================================================================
// Single item
// ============================================================================

#[tokio::test]
async fn test_pull_item_syncs_one_item_without_board_fetch() {
    let ctx = TestContext::new().await;
    let mut jane = user_item("7", "Jane", "Doe", "jane@example.com");
    jane.column_values.push(ColumnValue::text("zz_board_only", "x"));
    ctx.board.set_items(
        USERS_BOARD,
        vec![jane, user_item("8", "Mark", "Ray", "mark@example.com")],
    );

    let outcome = ctx.engine.pull_item(USERS_BOARD, "7").await.unwrap();
    let ItemPullOutcome::Pulled(report) = outcome else {
        panic!("expected a pulled item, got {:?}", outcome);
    };
    assert_eq!(report.fetched, 1);
    assert_eq!(report.created, 1);
    assert_eq!(ctx.board.fetch_count(), 0);
    assert_eq!(ctx.store.count_correlations(EntityType::User).await.unwrap(), 1);

    // Unmapped columns are dropped, as a full pull never requests them
    let local_id = ctx.store.get_local_id(EntityType::User, "7").await.unwrap().unwrap();
    let user = ctx.store.get_user(&local_id).await.unwrap().unwrap();
    assert_eq!(user.name, "Jane Doe");
    assert!(user.metadata.0.get("zz_board_only").is_none());

    let again = ctx.engine.pull_item(USERS_BOARD, "7").await.unwrap();
    assert!(matches!(again, ItemPullOutcome::Pulled(ref r) if r.updated == 1));
}

#[tokio::test]
async fn test_pull_item_ignores_unknown_board_and_missing_item() {
    let ctx = TestContext::new().await;
    assert!(matches!(
        ctx.engine.pull_item("999", "1").await.unwrap(),
        ItemPullOutcome::UnknownBoard
    ));
    assert!(matches!(
        ctx.engine.pull_item(PROJECTS_BOARD, "404").await.unwrap(),
        ItemPullOutcome::NotFound
    ));
    assert_eq!(ctx.store.count_correlations(EntityType::Project).await.unwrap(), 0);
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_board_delete_soft_deletes_local_record() {
    let ctx = TestContext::new().await;
    ctx.board
        .set_items(USERS_BOARD, vec![user_item("1", "Jane", "Doe", "jane@example.com")]);
    ctx.engine.pull(EntityType::User, &SyncOptions::default()).await.unwrap();
    let local_id = ctx.store.get_local_id(EntityType::User, "1").await.unwrap().unwrap();

    let outcome = ctx.engine.handle_delete(USERS_BOARD, "1").await.unwrap();
    assert_eq!(
        outcome,
        DeleteOutcome::Deactivated {
            entity_type: EntityType::User,
            local_id: local_id.clone(),
        }
    );

    let user = ctx.store.get_user(&local_id).await.unwrap().unwrap();
    assert!(!user.is_active);
    let correlation = ctx
        .store
        .get_correlation(EntityType::User, "1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(correlation.sync_status, correlation_status::DELETED);
    assert!(ctx.store.list_active_users().await.unwrap().is_empty());

    let audit = ctx.store.list_audit(Some(EntityType::User), 1).await.unwrap();
    assert_eq!(audit[0].operation, "delete");
}

#[tokio::test]
async fn test_delete_of_unknown_board_or_item_is_ignored() {
    let ctx = TestContext::new().await;
    assert_eq!(
        ctx.engine.handle_delete("999", "1").await.unwrap(),
        DeleteOutcome::UnknownBoard
    );
    assert_eq!(
        ctx.engine.handle_delete(PROJECTS_BOARD, "42").await.unwrap(),
        DeleteOutcome::NotCorrelated
    );
}

// ============================================================================
// Push
// ============================================================================

#[tokio::test]
async fn test_push_creates_then_updates_board_items() {
    let ctx = TestContext::new().await;
    let user_id = ctx
        .store
        .create_user(&UserFields {
            name: Some("Mary Lee".into()),
            email: Some("mary@example.com".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    let report = ctx.engine.push(EntityType::User, &SyncOptions::default()).await.unwrap();
    assert_eq!(report.created, 1);

    let external_id = ctx
        .store
        .get_external_id(EntityType::User, &user_id)
        .await
        .unwrap()
        .expect("pushed user should be correlated");
    let calls = ctx.board.calls();
    assert!(matches!(
        &calls[0],
        BoardCall::CreateItem { board_id, name, .. } if board_id == USERS_BOARD && name == "Mary Lee"
    ));

    let report = ctx.engine.push(EntityType::User, &SyncOptions::default()).await.unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 1);

    let updates: Vec<_> = ctx
        .board
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            BoardCall::ChangeColumnValue {
                item_id, column_id, ..
            } => Some((item_id, column_id)),
            _ => None,
        })
        .collect();
    assert!(updates.iter().all(|(item_id, _)| item_id == &external_id));
    assert!(updates.iter().any(|(_, column)| column == "email7"));
    assert!(updates.iter().any(|(_, column)| column == "text25"));
}

#[tokio::test]
async fn test_push_names_nameless_records() {
    let ctx = TestContext::new().await;
    // What a pull stores for a board user with only an email
    ctx.store
        .create_user(&UserFields {
            email: Some("solo@example.com".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    let report = ctx.engine.push(EntityType::User, &SyncOptions::default()).await.unwrap();
    assert_eq!(report.created, 1);

    let names: Vec<_> = ctx
        .board
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            BoardCall::CreateItem { name, .. } => Some(name),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["solo@example.com".to_string()]);
}

#[tokio::test]
async fn test_push_failure_is_audited_and_loop_continues() {
    let ctx = TestContext::new().await;
    let mut with_city = UserFields {
        name: Some("Ann Able".into()),
        email: Some("ann@example.com".into()),
        ..Default::default()
    };
    with_city.metadata.insert("city".into(), "Austin".into());
    ctx.store.create_user(&with_city).await.unwrap();
    ctx.store
        .create_user(&UserFields {
            name: Some("Ben Baker".into()),
            email: Some("ben@example.com".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    ctx.board.fail_column("text2");

    let report = ctx.engine.push(EntityType::User, &SyncOptions::default()).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.created, 1);

    let audit = ctx.store.list_audit(Some(EntityType::User), 10).await.unwrap();
    let failure = audit.iter().find(|a| a.status == "error").unwrap();
    assert_eq!(failure.external_id, "unknown");
    assert_eq!(failure.operation, "create");
}

#[tokio::test]
async fn test_pushed_project_does_not_leak_placeholder_email() {
    let ctx = TestContext::new().await;
    ctx.board
        .set_items(PROJECTS_BOARD, vec![project_item("10", "Gutters", "Bob Green", "")]);
    ctx.engine.pull(EntityType::Project, &SyncOptions::default()).await.unwrap();

    let report = ctx.engine.push(EntityType::Project, &SyncOptions::default()).await.unwrap();
    assert_eq!(report.updated, 1);

    for call in ctx.board.calls() {
        if let BoardCall::ChangeColumnValue { column_id, .. } = call {
            assert_ne!(column_id, "email4__1");
        }
    }
}

// ============================================================================
// Run and snapshots
// ============================================================================

#[tokio::test]
async fn test_bidirectional_run_pulls_before_pushing() {
    let ctx = TestContext::new().await;
    ctx.board
        .set_items(USERS_BOARD, vec![user_item("1", "Jane", "Doe", "jane@example.com")]);

    let reports = ctx
        .engine
        .run(Direction::Both, Scope::All, &SyncOptions::default())
        .await
        .unwrap();
    let order: Vec<_> = reports.iter().map(|r| (r.entity_type, r.direction)).collect();
    assert_eq!(
        order,
        vec![
            (EntityType::User, Direction::BoardToStore),
            (EntityType::Project, Direction::BoardToStore),
            (EntityType::User, Direction::StoreToBoard),
            (EntityType::Project, Direction::StoreToBoard),
        ]
    );
    // The pulled user is already correlated, so push updates it in place
    assert_eq!(reports[0].created, 1);
    assert_eq!(reports[2].updated, 1);
    assert_eq!(reports[2].created, 0);
}

#[tokio::test]
async fn test_snapshot_replay_skips_api() {
    let temp = tempfile::TempDir::new().unwrap();
    let mut ctx = TestContext::new().await;
    ctx.engine = ctx
        .engine
        .clone()
        .with_snapshots(SnapshotStore::new(temp.path()), true);
    ctx.board.set_items(
        USERS_BOARD,
        vec![
            user_item("1", "Jane", "Doe", "jane@example.com"),
            user_item("2", "John", "Smith", "john@example.com"),
        ],
    );

    ctx.engine.pull(EntityType::User, &SyncOptions::default()).await.unwrap();
    assert_eq!(ctx.board.fetch_count(), 1);
    let saved = SnapshotStore::new(temp.path()).list(Some(USERS_BOARD)).await.unwrap();
    assert_eq!(saved.len(), 1);

    ctx.board.set_items(USERS_BOARD, Vec::new());
    let opts = SyncOptions {
        source: FetchSource::Snapshot { file: None },
        ..SyncOptions::default()
    };
    let report = ctx.engine.pull(EntityType::User, &opts).await.unwrap();
    assert_eq!(report.fetched, 2);
    assert_eq!(report.updated, 2);
    assert_eq!(ctx.board.fetch_count(), 1);
}

#[tokio::test]
async fn test_snapshot_source_falls_back_to_api() {
    let temp = tempfile::TempDir::new().unwrap();
    let mut ctx = TestContext::new().await;
    ctx.engine = ctx
        .engine
        .clone()
        .with_snapshots(SnapshotStore::new(temp.path()), false);
    ctx.board
        .set_items(USERS_BOARD, vec![user_item("1", "Jane", "Doe", "jane@example.com")]);

    let opts = SyncOptions {
        source: FetchSource::Snapshot { file: None },
        ..SyncOptions::default()
    };
    let report = ctx.engine.pull(EntityType::User, &opts).await.unwrap();
    assert_eq!(report.fetched, 1);
    assert_eq!(ctx.board.fetch_count(), 1);
    assert!(SnapshotStore::new(temp.path()).list(None).await.unwrap().is_empty());
}
