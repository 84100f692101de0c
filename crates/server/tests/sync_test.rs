mod common;

use common::{channel, guild, FakeDirectory, FlakyWriter};
use herald_server::db;
use herald_server::directory::DirectoryError;
use herald_server::error::AppError;
use herald_server::models::ChannelQuery;
use herald_server::reconcile::{SyncScope, Synchronizer};
use herald_shared::constants::*;
use std::sync::Arc;

fn synchronizer(pool: &sqlx::SqlitePool, directory: Arc<FakeDirectory>, chunk_size: usize) -> Synchronizer {
    Synchronizer::new(pool.clone(), directory, common::sync_options(chunk_size))
}

fn text_channels(guild_id: &str, prefix: &str, count: usize) -> Vec<herald_server::directory::DirectoryChannel> {
    (0..count)
        .map(|i| {
            channel(
                &format!("{}{:04}", prefix, i),
                &format!("channel-{}", i),
                guild_id,
                CHANNEL_TYPE_TEXT,
            )
        })
        .collect()
}

async fn all_channels(pool: &sqlx::SqlitePool) -> Vec<herald_server::models::Channel> {
    db::channels::find(
        pool,
        &ChannelQuery {
            guild_id: None,
            active: None,
            channel_type: None,
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn first_sync_creates_everything() {
    let pool = common::setup_test_db().await;
    let directory = FakeDirectory::new();
    directory.add_guild(
        guild("10", "Alpha", 1500),
        vec![
            channel("101", "general", "10", CHANNEL_TYPE_TEXT),
            channel("102", "announcements", "10", CHANNEL_TYPE_NEWS),
            channel("103", "Lounge", "10", CHANNEL_TYPE_VOICE),
            channel("104", "Text Channels", "10", CHANNEL_TYPE_CATEGORY),
        ],
    );
    directory.add_guild(guild("20", "Beta", 3), vec![channel("201", "chat", "20", CHANNEL_TYPE_TEXT)]);

    let summary = synchronizer(&pool, directory, 100).run(SyncScope::All).await.unwrap();

    assert_eq!(summary.created, 2);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.upserted, 3);
    assert_eq!(summary.matched, 0);
    assert_eq!(summary.progress, 3);
    assert_eq!(summary.batches, 2);
    assert!(summary.errors.is_empty());

    let stored = db::guilds::find_one(&pool, "10").await.unwrap().unwrap();
    assert_eq!(stored.member_count, 1500);
    assert_eq!(stored.summary(), "Alpha - 1,500 members");

    let linked: Vec<String> = db::guilds::channels(&pool, "10")
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.channel_id)
        .collect();
    assert_eq!(linked, vec!["101", "102"]);
    assert_eq!(all_channels(&pool).await.len(), 3);
}

#[tokio::test]
async fn resync_is_idempotent() {
    let pool = common::setup_test_db().await;
    let directory = FakeDirectory::new();
    directory.add_guild(guild("10", "Alpha", 5), text_channels("10", "1", 7));
    let sync = synchronizer(&pool, directory, 100);

    sync.run(SyncScope::All).await.unwrap();
    let summary = sync.run(SyncScope::All).await.unwrap();

    assert_eq!(summary.created, 0);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.matched, 7);
    assert_eq!(summary.modified, 0);
    assert_eq!(summary.upserted, 0);
    assert_eq!(all_channels(&pool).await.len(), 7);
    assert_eq!(db::guilds::channels(&pool, "10").await.unwrap().len(), 7);
}

#[tokio::test]
async fn one_failing_guild_does_not_stop_the_rest() {
    let pool = common::setup_test_db().await;
    let directory = FakeDirectory::new();
    directory.add_guild(guild("10", "Alpha", 5), text_channels("10", "1", 2));
    directory.add_guild(guild("20", "Broken", 5), text_channels("20", "2", 2));
    directory.add_guild(guild("30", "Gamma", 5), text_channels("30", "3", 2));
    directory.fail_guild("20");

    let summary = synchronizer(&pool, directory, 100).run(SyncScope::All).await.unwrap();

    assert_eq!(summary.created, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].guild_id, "20");
    assert_eq!(summary.errors[0].guild_name, "Broken");
    assert!(summary.errors[0].message.contains("Missing Access"));
    assert!(db::guilds::find_one(&pool, "20").await.unwrap().is_none());
    assert!(db::guilds::find_one(&pool, "30").await.unwrap().is_some());
}

#[tokio::test]
async fn guild_detail_failures_stay_with_their_guild() {
    let pool = common::setup_test_db().await;
    let directory = FakeDirectory::new();
    directory.add_guild(guild("10", "Alpha", 5), text_channels("10", "1", 2));
    directory.add_guild(guild("20", "Gone", 5), text_channels("20", "2", 2));
    directory.add_guild(guild("30", "Locked", 5), text_channels("30", "3", 2));
    directory.add_guild(guild("40", "Delta", 5), text_channels("40", "4", 2));
    directory.fail_guild_details("20", DirectoryError::NotFound("Discord guild".into()));
    directory.fail_guild_details("30", DirectoryError::Platform("Missing Access".into()));

    let summary = synchronizer(&pool, directory, 100).run(SyncScope::All).await.unwrap();

    assert_eq!(summary.created, 2);
    assert_eq!(summary.failed, 2);
    let failed: Vec<(&str, &str)> = summary
        .errors
        .iter()
        .map(|e| (e.guild_id.as_str(), e.guild_name.as_str()))
        .collect();
    assert_eq!(failed, vec![("20", "Gone"), ("30", "Locked")]);
    assert!(summary.errors[0].message.contains("not found"));
    assert!(summary.errors[1].message.contains("Missing Access"));
    assert!(db::guilds::find_one(&pool, "20").await.unwrap().is_none());
    assert!(db::guilds::find_one(&pool, "30").await.unwrap().is_none());
    assert!(db::guilds::find_one(&pool, "40").await.unwrap().is_some());
    assert_eq!(all_channels(&pool).await.len(), 4);
}

#[tokio::test]
async fn failed_chunk_writes_are_retried() {
    let pool = common::setup_test_db().await;
    let directory = FakeDirectory::new();
    directory.add_guild(guild("10", "Alpha", 5), text_channels("10", "1", 5));
    let writer = FlakyWriter::new(pool.clone(), 2);

    let summary = synchronizer(&pool, directory, 100)
        .with_writer(writer.clone())
        .run(SyncScope::All)
        .await
        .unwrap();

    assert_eq!(writer.calls(), 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.batches, 1);
    assert_eq!(summary.upserted, 5);
    assert_eq!(db::guilds::channels(&pool, "10").await.unwrap().len(), 5);
}

#[tokio::test]
async fn chunk_write_gives_up_after_ceiling() {
    let pool = common::setup_test_db().await;
    let directory = FakeDirectory::new();
    directory.add_guild(guild("10", "Alpha", 5), text_channels("10", "1", 5));
    let writer = FlakyWriter::new(pool.clone(), 3);

    let summary = synchronizer(&pool, directory, 100)
        .with_writer(writer.clone())
        .run(SyncScope::All)
        .await
        .unwrap();

    assert_eq!(writer.calls(), 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.upserted, 0);
    assert!(db::guilds::find_one(&pool, "10").await.unwrap().is_none());
    assert!(all_channels(&pool).await.is_empty());
}

#[tokio::test]
async fn large_guild_is_written_in_chunks() {
    let pool = common::setup_test_db().await;
    let directory = FakeDirectory::new();
    let channels = text_channels("10", "5", 250);
    directory.add_guild(guild("10", "Huge", 50_000), channels[..40].to_vec());
    let sync = synchronizer(&pool, directory.clone(), 100);
    sync.run(SyncScope::All).await.unwrap();

    directory.add_guild(guild("10", "Huge", 50_000), channels);
    let summary = sync.run(SyncScope::All).await.unwrap();

    assert_eq!(summary.batches, 3);
    assert_eq!(summary.progress, 250);
    assert_eq!(summary.matched, 40);
    assert_eq!(summary.upserted, 210);
    assert_eq!(summary.matched + summary.upserted, 250);
    assert_eq!(db::guilds::channels(&pool, "10").await.unwrap().len(), 250);
}

#[tokio::test]
async fn transient_fetch_failures_are_retried() {
    let pool = common::setup_test_db().await;
    let directory = FakeDirectory::new();
    directory.add_guild(guild("10", "Alpha", 5), text_channels("10", "1", 3));
    directory.fail_channel_fetches(2);

    let summary = synchronizer(&pool, directory, 100).run(SyncScope::All).await.unwrap();

    assert_eq!(summary.failed, 0);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.upserted, 3);
}

#[tokio::test]
async fn retries_give_up_after_ceiling() {
    let pool = common::setup_test_db().await;
    let directory = FakeDirectory::new();
    directory.add_guild(guild("10", "Alpha", 5), text_channels("10", "1", 3));
    directory.fail_channel_fetches(3);

    let summary = synchronizer(&pool, directory, 100).run(SyncScope::All).await.unwrap();

    assert_eq!(summary.failed, 1);
    assert!(summary.errors[0].message.contains("rate limited"));
}

#[tokio::test]
async fn unreachable_platform_fails_the_run() {
    let pool = common::setup_test_db().await;
    let directory = FakeDirectory::new();
    directory.set_down(true);

    let err = synchronizer(&pool, directory, 100).run(SyncScope::All).await.unwrap_err();
    assert!(matches!(err, AppError::ExternalService(_)));
}

#[tokio::test]
async fn scoped_sync_of_unknown_guild_is_not_found() {
    let pool = common::setup_test_db().await;
    let directory = FakeDirectory::new();
    directory.add_guild(guild("10", "Alpha", 5), vec![]);

    let err = synchronizer(&pool, directory, 100)
        .run(SyncScope::Guild("99".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn scoped_sync_touches_one_guild() {
    let pool = common::setup_test_db().await;
    let directory = FakeDirectory::new();
    directory.add_guild(guild("10", "Alpha", 5), text_channels("10", "1", 2));
    directory.add_guild(guild("20", "Beta", 5), text_channels("20", "2", 2));

    let summary = synchronizer(&pool, directory, 100)
        .run(SyncScope::Guild("20".into()))
        .await
        .unwrap();

    assert_eq!(summary.created, 1);
    assert!(db::guilds::find_one(&pool, "10").await.unwrap().is_none());
    assert_eq!(all_channels(&pool).await.len(), 2);
}

#[tokio::test]
async fn invalid_channels_are_dropped_and_counted() {
    let pool = common::setup_test_db().await;
    let directory = FakeDirectory::new();
    directory.add_guild(
        guild("10", "Alpha", 5),
        vec![
            channel("101", "general", "10", CHANNEL_TYPE_TEXT),
            channel("abc", "bad-id", "10", CHANNEL_TYPE_TEXT),
            channel("103", "  ", "10", CHANNEL_TYPE_TEXT),
        ],
    );

    let summary = synchronizer(&pool, directory, 100).run(SyncScope::All).await.unwrap();

    assert_eq!(summary.invalid, 2);
    assert_eq!(summary.upserted, 1);
    assert_eq!(summary.created, 1);
}

#[tokio::test]
async fn duplicate_channel_names_are_write_errors() {
    let pool = common::setup_test_db().await;
    let directory = FakeDirectory::new();
    directory.add_guild(
        guild("10", "Alpha", 5),
        vec![
            channel("101", "general", "10", CHANNEL_TYPE_TEXT),
            channel("102", "general", "10", CHANNEL_TYPE_TEXT),
            channel("103", "random", "10", CHANNEL_TYPE_TEXT),
        ],
    );

    let summary = synchronizer(&pool, directory, 100).run(SyncScope::All).await.unwrap();

    assert_eq!(summary.write_errors, 1);
    assert_eq!(summary.upserted, 2);
    assert_eq!(summary.failed, 0);
    let linked: Vec<String> = db::guilds::channels(&pool, "10")
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.channel_id)
        .collect();
    assert_eq!(linked, vec!["101", "103"]);
}

#[tokio::test]
async fn renamed_guild_refreshes_channel_labels() {
    let pool = common::setup_test_db().await;
    let directory = FakeDirectory::new();
    directory.add_guild(guild("10", "Old Name", 5), text_channels("10", "1", 2));
    let sync = synchronizer(&pool, directory.clone(), 100);
    sync.run(SyncScope::All).await.unwrap();

    directory.add_guild(guild("10", "New Name", 5), text_channels("10", "1", 2));
    let summary = sync.run(SyncScope::All).await.unwrap();

    assert_eq!(summary.updated, 1);
    assert_eq!(summary.modified, 2);
    for channel in all_channels(&pool).await {
        assert_eq!(channel.guild_name, "New Name");
        assert_eq!(channel.display_name(), format!("New Name > {}", channel.name));
    }
    assert_eq!(db::guilds::find_one(&pool, "10").await.unwrap().unwrap().name, "New Name");
}

#[tokio::test]
async fn resync_reactivates_guild_but_keeps_channel_flags() {
    let pool = common::setup_test_db().await;
    let directory = FakeDirectory::new();
    directory.add_guild(guild("10", "Alpha", 5), text_channels("10", "1", 1));
    let sync = synchronizer(&pool, directory, 100);
    sync.run(SyncScope::All).await.unwrap();

    db::guilds::update_status(&pool, "10", false).await.unwrap();
    db::channels::update_status(&pool, "10000", false).await.unwrap();
    sync.run(SyncScope::All).await.unwrap();

    assert!(db::guilds::find_one(&pool, "10").await.unwrap().unwrap().is_active);
    assert!(!db::channels::find_one(&pool, "10000").await.unwrap().unwrap().is_active);
}
