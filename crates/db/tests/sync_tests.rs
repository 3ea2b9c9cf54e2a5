//! Association-synchronizer tests: reconciliation, create-or-get,
//! detach idempotence and cascade behavior against a real schema.

use db::{
    models::{
        keyword::{CreateKeyword, Keyword},
        task::{CreateTask, Task},
        user::{CreateUser, User},
    },
    sync::{self, KeywordSelection, SyncError, SyncMode},
};
use sqlx::SqlitePool;
use uuid::Uuid;

async fn create_test_task(pool: &SqlitePool, title: &str) -> Result<Task, Box<dyn std::error::Error>> {
    let task = Task::create_with_relations(
        pool,
        &CreateTask {
            title: title.to_string(),
            description: None,
            is_done: None,
            due_date: None,
            priority: None,
            creator_id: None,
            assignees: None,
            keywords: None,
        },
        Uuid::new_v4(),
        None,
    )
    .await?;
    Ok(task.task)
}

async fn create_test_keyword(
    pool: &SqlitePool,
    name: &str,
) -> Result<Keyword, Box<dyn std::error::Error>> {
    let keyword = Keyword::create(
        pool,
        &CreateKeyword {
            name: name.to_string(),
        },
        Uuid::new_v4(),
    )
    .await?;
    Ok(keyword)
}

async fn create_test_user(
    pool: &SqlitePool,
    email: &str,
) -> Result<User, Box<dyn std::error::Error>> {
    let user = User::create(
        pool,
        &CreateUser {
            name: "Test User".to_string(),
            email: email.to_string(),
            password_hash: "irrelevant".to_string(),
        },
        Uuid::new_v4(),
    )
    .await?;
    Ok(user)
}

fn by_id(selection_ids: Vec<Uuid>) -> KeywordSelection {
    KeywordSelection {
        keyword_ids: selection_ids,
        names: Vec::new(),
    }
}

fn by_name(names: &[&str]) -> KeywordSelection {
    KeywordSelection {
        keyword_ids: Vec::new(),
        names: names.iter().map(|n| n.to_string()).collect(),
    }
}

fn ids(keywords: &[Keyword]) -> Vec<Uuid> {
    keywords.iter().map(|k| k.id).collect()
}

async fn link_count(pool: &SqlitePool, task_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM task_keywords WHERE task_id = $1")
        .bind(task_id)
        .fetch_one(pool)
        .await
}

#[sqlx::test]
async fn sync_replaces_link_set_exactly(pool: SqlitePool) -> Result<(), Box<dyn std::error::Error>> {
    let task = create_test_task(&pool, "Sync target").await?;
    let a = create_test_keyword(&pool, "a").await?;
    let b = create_test_keyword(&pool, "b").await?;
    let c = create_test_keyword(&pool, "c").await?;

    sync::reconcile_keywords(&pool, task.id, &by_id(vec![a.id, b.id]), SyncMode::Sync).await?;
    let result =
        sync::reconcile_keywords(&pool, task.id, &by_id(vec![b.id, c.id]), SyncMode::Sync).await?;

    let mut got = ids(&result);
    got.sort();
    let mut want = vec![b.id, c.id];
    want.sort();
    assert_eq!(got, want);
    Ok(())
}

#[sqlx::test]
async fn attach_is_monotonic(pool: SqlitePool) -> Result<(), Box<dyn std::error::Error>> {
    let task = create_test_task(&pool, "Attach target").await?;
    let a = create_test_keyword(&pool, "a").await?;
    let b = create_test_keyword(&pool, "b").await?;

    sync::reconcile_keywords(&pool, task.id, &by_id(vec![a.id]), SyncMode::Attach).await?;
    let result =
        sync::reconcile_keywords(&pool, task.id, &by_id(vec![b.id]), SyncMode::Attach).await?;

    assert_eq!(ids(&result), vec![a.id, b.id]);
    Ok(())
}

#[sqlx::test]
async fn empty_sync_clears_all_links(pool: SqlitePool) -> Result<(), Box<dyn std::error::Error>> {
    let task = create_test_task(&pool, "Clear me").await?;
    let a = create_test_keyword(&pool, "a").await?;

    sync::reconcile_keywords(&pool, task.id, &by_id(vec![a.id]), SyncMode::Attach).await?;
    let result =
        sync::reconcile_keywords(&pool, task.id, &KeywordSelection::default(), SyncMode::Sync)
            .await?;

    assert!(result.is_empty());
    assert_eq!(link_count(&pool, task.id).await?, 0);
    Ok(())
}

#[sqlx::test]
async fn empty_attach_is_a_noop(pool: SqlitePool) -> Result<(), Box<dyn std::error::Error>> {
    let task = create_test_task(&pool, "Untouched").await?;
    let a = create_test_keyword(&pool, "a").await?;

    sync::reconcile_keywords(&pool, task.id, &by_id(vec![a.id]), SyncMode::Attach).await?;
    let result =
        sync::reconcile_keywords(&pool, task.id, &KeywordSelection::default(), SyncMode::Attach)
            .await?;

    assert_eq!(ids(&result), vec![a.id]);
    Ok(())
}

#[sqlx::test]
async fn attach_by_name_reuses_existing_keyword(
    pool: SqlitePool,
) -> Result<(), Box<dyn std::error::Error>> {
    let task = create_test_task(&pool, "Named").await?;
    let existing = create_test_keyword(&pool, "urgent").await?;

    let result =
        sync::reconcile_keywords(&pool, task.id, &by_name(&["urgent"]), SyncMode::Attach).await?;

    assert_eq!(ids(&result), vec![existing.id]);
    assert_eq!(Keyword::find_all(&pool).await?.len(), 1);
    Ok(())
}

#[sqlx::test]
async fn attach_by_name_creates_missing_keyword(
    pool: SqlitePool,
) -> Result<(), Box<dyn std::error::Error>> {
    let task = create_test_task(&pool, "Named").await?;

    let result =
        sync::reconcile_keywords(&pool, task.id, &by_name(&["fresh"]), SyncMode::Attach).await?;

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].name, "fresh");

    // second reconciliation resolves to the same record
    let again =
        sync::reconcile_keywords(&pool, task.id, &by_name(&["fresh"]), SyncMode::Attach).await?;
    assert_eq!(ids(&again), ids(&result));
    assert_eq!(Keyword::find_all(&pool).await?.len(), 1);
    Ok(())
}

#[sqlx::test]
async fn concurrent_attach_by_name_creates_one_keyword(
    pool: SqlitePool,
) -> Result<(), Box<dyn std::error::Error>> {
    let first = create_test_task(&pool, "First").await?;
    let second = create_test_task(&pool, "Second").await?;

    let first_selection = by_name(&["shared"]);
    let second_selection = by_name(&["shared"]);
    let (a, b) = tokio::join!(
        sync::reconcile_keywords(&pool, first.id, &first_selection, SyncMode::Attach),
        sync::reconcile_keywords(&pool, second.id, &second_selection, SyncMode::Attach),
    );
    let (a, b) = (a?, b?);

    // both callers resolve to the same record
    assert_eq!(ids(&a), ids(&b));
    assert_eq!(Keyword::find_all(&pool).await?.len(), 1);
    Ok(())
}

#[sqlx::test]
async fn redundant_id_and_name_collapse_to_one_member(
    pool: SqlitePool,
) -> Result<(), Box<dyn std::error::Error>> {
    let task = create_test_task(&pool, "Dedup").await?;
    let keyword = create_test_keyword(&pool, "both").await?;

    let selection = KeywordSelection {
        keyword_ids: vec![keyword.id, keyword.id],
        names: vec!["both".to_string()],
    };
    let result = sync::reconcile_keywords(&pool, task.id, &selection, SyncMode::Sync).await?;

    assert_eq!(ids(&result), vec![keyword.id]);
    assert_eq!(link_count(&pool, task.id).await?, 1);
    Ok(())
}

#[sqlx::test]
async fn unknown_keyword_id_rolls_back_everything(
    pool: SqlitePool,
) -> Result<(), Box<dyn std::error::Error>> {
    let task = create_test_task(&pool, "Rollback").await?;
    let a = create_test_keyword(&pool, "a").await?;
    let b = create_test_keyword(&pool, "b").await?;
    sync::reconcile_keywords(&pool, task.id, &by_id(vec![a.id]), SyncMode::Sync).await?;

    let bogus = Uuid::new_v4();
    let err = sync::reconcile_keywords(&pool, task.id, &by_id(vec![b.id, bogus]), SyncMode::Sync)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::KeywordNotFound(id) if id == bogus));

    // prior link set must be untouched
    let current = sync::keywords_for_task(&pool, task.id).await?;
    assert_eq!(ids(&current), vec![a.id]);
    Ok(())
}

#[sqlx::test]
async fn detach_is_idempotent(pool: SqlitePool) -> Result<(), Box<dyn std::error::Error>> {
    let task = create_test_task(&pool, "Detach").await?;
    let keyword = create_test_keyword(&pool, "gone").await?;
    sync::reconcile_keywords(&pool, task.id, &by_id(vec![keyword.id]), SyncMode::Attach).await?;

    assert!(sync::detach_keyword(&pool, task.id, keyword.id).await?);
    assert!(!sync::detach_keyword(&pool, task.id, keyword.id).await?);
    assert_eq!(link_count(&pool, task.id).await?, 0);
    Ok(())
}

#[sqlx::test]
async fn soft_deleting_a_task_clears_links_but_keeps_keywords(
    pool: SqlitePool,
) -> Result<(), Box<dyn std::error::Error>> {
    let task = create_test_task(&pool, "Doomed").await?;
    let keyword = create_test_keyword(&pool, "survivor").await?;
    sync::reconcile_keywords(&pool, task.id, &by_id(vec![keyword.id]), SyncMode::Attach).await?;

    Task::soft_delete(&pool, task.id).await?;

    assert!(Task::find_by_id(&pool, task.id).await?.is_none());
    assert_eq!(link_count(&pool, task.id).await?, 0);
    assert!(Keyword::find_by_id(&pool, keyword.id).await?.is_some());
    Ok(())
}

#[sqlx::test]
async fn deleting_a_keyword_cascades_links_but_keeps_tasks(
    pool: SqlitePool,
) -> Result<(), Box<dyn std::error::Error>> {
    let task = create_test_task(&pool, "Keeper").await?;
    let keyword = create_test_keyword(&pool, "doomed").await?;
    sync::reconcile_keywords(&pool, task.id, &by_id(vec![keyword.id]), SyncMode::Attach).await?;

    Keyword::delete(&pool, keyword.id).await?;

    assert_eq!(link_count(&pool, task.id).await?, 0);
    assert!(Task::find_by_id(&pool, task.id).await?.is_some());
    Ok(())
}

#[sqlx::test]
async fn assignee_sync_replaces_and_validates(
    pool: SqlitePool,
) -> Result<(), Box<dyn std::error::Error>> {
    let task = create_test_task(&pool, "Assigned").await?;
    let alice = create_test_user(&pool, "alice@example.com").await?;
    let bob = create_test_user(&pool, "bob@example.com").await?;

    sync::reconcile_assignees(&pool, task.id, &[alice.id], SyncMode::Sync).await?;
    let result = sync::reconcile_assignees(&pool, task.id, &[bob.id], SyncMode::Sync).await?;
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].user.id, bob.id);

    let bogus = Uuid::new_v4();
    let err = sync::reconcile_assignees(&pool, task.id, &[bogus], SyncMode::Sync)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::UserNotFound(id) if id == bogus));

    // failed reconciliation leaves the previous assignment in place
    let current = sync::assignees_for_task(&pool, task.id).await?;
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].user.id, bob.id);
    Ok(())
}

#[sqlx::test]
async fn toggle_flips_is_done(pool: SqlitePool) -> Result<(), Box<dyn std::error::Error>> {
    let task = create_test_task(&pool, "Flip").await?;
    assert!(!task.is_done);

    let toggled = Task::toggle_done(&pool, task.id).await?;
    assert!(toggled.is_done);

    let toggled = Task::toggle_done(&pool, task.id).await?;
    assert!(!toggled.is_done);
    Ok(())
}
