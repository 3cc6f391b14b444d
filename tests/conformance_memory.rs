use std::sync::Arc;

use dog_blobfs::{
    BlobFsDriver, BlobFsError, DriverConfig, MemoryClient, WalkOptions, MIN_CHUNK_SIZE,
};

const CHUNK: usize = MIN_CHUNK_SIZE;

/// Test factory functions
fn test_config() -> DriverConfig {
    DriverConfig::new("test_id", "test_secret", "test-region", "test-bucket")
        .with_chunk_size(CHUNK)
}

fn fixture() -> (BlobFsDriver, Arc<MemoryClient>) {
    fixture_with(MemoryClient::new())
}

fn fixture_with(client: MemoryClient) -> (BlobFsDriver, Arc<MemoryClient>) {
    let client = Arc::new(client);
    let driver = BlobFsDriver::with_client(client.clone(), test_config()).unwrap();
    (driver, client)
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// A1. Write Then Read Returns Identical Bytes
#[tokio::test]
async fn test_round_trip_single_shot() {
    let (driver, client) = fixture();

    // Act: write content smaller than one chunk and commit
    let mut writer = driver.writer("/docs/note.txt", false).await.unwrap();
    writer.write(b"small content").await.unwrap();
    writer.commit().await.unwrap();

    // Assert: identical bytes, and no incremental upload session was ever
    // opened for sub-chunk content
    assert_eq!(driver.get_content("/docs/note.txt").await.unwrap(), b"small content");
    assert_eq!(client.open_upload_count(), 0);
    assert_eq!(client.completed_part_count("docs/note.txt"), None);
}

/// A2. Chunking Law: ceil(N / C) Parts Through The Upload Path
#[tokio::test]
async fn test_round_trip_chunked() {
    let (driver, client) = fixture();
    let content = pattern(2 * CHUNK + CHUNK / 2);

    // Act: one oversized write must flush two full parts immediately
    let mut writer = driver.writer("/videos/take-1.bin", false).await.unwrap();
    writer.write(&content).await.unwrap();
    assert_eq!(writer.size(), content.len() as u64);
    writer.commit().await.unwrap();

    // Assert: 2.5 chunks commit as 3 parts and read back verbatim
    assert_eq!(client.completed_part_count("videos/take-1.bin"), Some(3));
    assert_eq!(driver.get_content("/videos/take-1.bin").await.unwrap(), content);
    assert_eq!(client.open_upload_count(), 0);
}

/// A3. Exact Chunk Multiples Skip The Short Final Part
#[tokio::test]
async fn test_exact_chunk_multiple() {
    let (driver, client) = fixture();
    let content = pattern(2 * CHUNK);

    let mut writer = driver.writer("/videos/take-2.bin", false).await.unwrap();
    writer.write(&content[..CHUNK]).await.unwrap();
    writer.write(&content[CHUNK..]).await.unwrap();
    writer.commit().await.unwrap();

    assert_eq!(client.completed_part_count("videos/take-2.bin"), Some(2));
    assert_eq!(driver.get_content("/videos/take-2.bin").await.unwrap(), content);
}

/// A4. Committing Zero Bytes Produces A Zero-Length Object
#[tokio::test]
async fn test_zero_byte_commit() {
    let (driver, client) = fixture();

    let mut writer = driver.writer("/empty.marker", false).await.unwrap();
    writer.commit().await.unwrap();

    assert_eq!(driver.get_content("/empty.marker").await.unwrap(), Vec::<u8>::new());
    assert_eq!(driver.stat("/empty.marker").await.unwrap().size, 0);
    assert_eq!(client.open_upload_count(), 0);
}

/// A5. Writer Rejects Use After Commit
#[tokio::test]
async fn test_writer_rejects_use_after_commit() {
    let (driver, _client) = fixture();

    let mut writer = driver.writer("/docs/note.txt", false).await.unwrap();
    writer.write(b"content").await.unwrap();
    writer.commit().await.unwrap();

    assert!(matches!(
        writer.write(b"more").await,
        Err(BlobFsError::InvalidState { .. })
    ));
    assert!(matches!(
        writer.commit().await,
        Err(BlobFsError::InvalidState { .. })
    ));
}

/// A6. Size Reports Buffered Plus Flushed Bytes In Every State
#[tokio::test]
async fn test_writer_size_accounting() {
    let (driver, _client) = fixture();

    let mut writer = driver.writer("/videos/take-3.bin", false).await.unwrap();
    writer.write(&pattern(CHUNK + 10)).await.unwrap();
    assert_eq!(writer.size(), (CHUNK + 10) as u64);

    writer.commit().await.unwrap();
    assert_eq!(writer.size(), (CHUNK + 10) as u64);
}

/// B1. Cancel Aborts The Backend Session And Leaves No Object
#[tokio::test]
async fn test_cancel_aborts() {
    let (driver, client) = fixture();

    // Arrange: enough bytes to open a session
    let mut writer = driver.writer("/videos/dropped.bin", false).await.unwrap();
    writer.write(&pattern(CHUNK + 1)).await.unwrap();
    assert_eq!(client.open_upload_count(), 1);

    // Act
    writer.cancel().await.unwrap();

    // Assert: commit now fails, nothing is visible, nothing leaked
    assert!(matches!(
        writer.commit().await,
        Err(BlobFsError::InvalidState { .. })
    ));
    assert!(matches!(
        driver.stat("/videos/dropped.bin").await,
        Err(BlobFsError::NotFound { .. })
    ));
    assert_eq!(client.open_upload_count(), 0);
}

/// B2. Cancel Before Any Flush Is A Local-Only Operation
#[tokio::test]
async fn test_cancel_without_session() {
    let (driver, client) = fixture();

    let mut writer = driver.writer("/docs/draft.txt", false).await.unwrap();
    writer.write(b"buffered only").await.unwrap();
    writer.cancel().await.unwrap();
    // Cancelling twice is a no-op.
    writer.cancel().await.unwrap();

    assert_eq!(client.object_count(), 0);
    assert_eq!(client.open_upload_count(), 0);
}

/// C1. Append Over Any Existing Object Is Rejected Unmodified
#[tokio::test]
async fn test_append_rejection() {
    let (driver, _client) = fixture();
    driver.put_content("/logs/app.log", &b"original"[..]).await.unwrap();

    let result = driver.writer("/logs/app.log", true).await;

    assert!(matches!(result, Err(BlobFsError::Unsupported { .. })));
    assert_eq!(driver.get_content("/logs/app.log").await.unwrap(), b"original");
}

/// C2. Append Rejection Applies To Zero-Length Objects Too
#[tokio::test]
async fn test_append_rejects_empty_existing_object() {
    let (driver, _client) = fixture();
    driver.put_content("/logs/empty.log", &b""[..]).await.unwrap();

    assert!(matches!(
        driver.writer("/logs/empty.log", true).await,
        Err(BlobFsError::Unsupported { .. })
    ));
}

/// C3. Append To A Missing Path Is A Fresh Write
#[tokio::test]
async fn test_append_to_missing_path() {
    let (driver, _client) = fixture();

    let mut writer = driver.writer("/logs/new.log", true).await.unwrap();
    writer.write(b"first line").await.unwrap();
    writer.commit().await.unwrap();

    assert_eq!(driver.get_content("/logs/new.log").await.unwrap(), b"first line");
}

/// D1. Deleting A Missing Path Succeeds, Twice
#[tokio::test]
async fn test_idempotent_delete() {
    let (driver, _client) = fixture();

    driver.delete("/nothing/here").await.unwrap();
    driver.delete("/nothing/here").await.unwrap();
}

/// D2. Deleting An Object Removes Exactly That Object
#[tokio::test]
async fn test_delete_object() {
    let (driver, _client) = fixture();
    driver.put_content("/a/b", &b"object"[..]).await.unwrap();
    driver.put_content("/a/bc", &b"sibling"[..]).await.unwrap();

    driver.delete("/a/b").await.unwrap();

    assert!(matches!(
        driver.stat("/a/b").await,
        Err(BlobFsError::NotFound { .. })
    ));
    assert_eq!(driver.get_content("/a/bc").await.unwrap(), b"sibling");
}

/// D3. Recursive Delete Sweeps Every Page Of The Subtree
#[tokio::test]
async fn test_recursive_delete() {
    let (driver, client) = fixture_with(MemoryClient::new().with_page_limit(3));
    for i in 0..10 {
        driver
            .put_content(&format!("/tree/node-{i:02}"), &b"x"[..])
            .await
            .unwrap();
    }
    // A sibling sharing the name prefix must survive a directory delete.
    driver.put_content("/tree-keep", &b"keep"[..]).await.unwrap();

    driver.delete("/tree").await.unwrap();

    assert_eq!(client.object_count(), 1);
    assert!(client.contains_key("tree-keep"));
}

/// D4. Partial Batch Failures Name The Keys That Survived
#[tokio::test]
async fn test_partial_batch_failure() {
    let (driver, client) = fixture();
    driver.put_content("/batch/ok-1", &b"x"[..]).await.unwrap();
    driver.put_content("/batch/stuck", &b"x"[..]).await.unwrap();
    driver.put_content("/batch/ok-2", &b"x"[..]).await.unwrap();
    client.fail_batch_delete_of("batch/stuck");

    let err = driver.delete("/batch").await.unwrap_err();

    match err {
        BlobFsError::PartialBatch { failed } => {
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].key, "batch/stuck");
        }
        other => panic!("expected PartialBatch, got {other:?}"),
    }
}

/// E1. Directory Emulation From Plain Keys
#[tokio::test]
async fn test_directory_emulation() {
    let (driver, _client) = fixture();
    driver.put_content("/a/b/c", &b"1"[..]).await.unwrap();
    driver.put_content("/a/b/d", &b"2"[..]).await.unwrap();

    let mut children: Vec<String> = driver
        .list("/a/b")
        .await
        .unwrap()
        .iter()
        .map(|e| e.name().to_string())
        .collect();
    children.sort();
    assert_eq!(children, vec!["c", "d"]);

    let parents = driver.list("/a").await.unwrap();
    assert_eq!(parents.len(), 1);
    assert_eq!(parents[0].path, "/a/b");
    assert!(parents[0].is_dir);
}

/// E2. Listing Follows Markers Until Exhaustion With No Duplicates
#[tokio::test]
async fn test_listing_completeness() {
    let (driver, _client) = fixture_with(MemoryClient::new().with_page_limit(3));
    for i in 0..10 {
        driver
            .put_content(&format!("/pages/key-{i:02}"), &b"x"[..])
            .await
            .unwrap();
    }

    let mut paths: Vec<String> = driver
        .list("/pages")
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.path)
        .collect();
    paths.sort();

    let expected: Vec<String> = (0..10).map(|i| format!("/pages/key-{i:02}")).collect();
    assert_eq!(paths, expected);
}

/// E3. An Empty Prefix Lists As Empty, Not As An Error
#[tokio::test]
async fn test_empty_root_list() {
    let (driver, _client) = fixture();

    assert!(driver.list("/").await.unwrap().is_empty());
}

/// E4. Stat Reports Files, Synthetic Directories, And Absence
#[tokio::test]
async fn test_stat_semantics() {
    let (driver, _client) = fixture();
    driver.put_content("/a/b/c", &b"content"[..]).await.unwrap();

    let file = driver.stat("/a/b/c").await.unwrap();
    assert!(!file.is_dir);
    assert_eq!(file.size, 7);
    assert!(file.mod_time.is_some());

    let dir = driver.stat("/a/b").await.unwrap();
    assert!(dir.is_dir);
    assert_eq!(dir.size, 0);

    assert!(matches!(
        driver.stat("/a/missing").await,
        Err(BlobFsError::NotFound { .. })
    ));
}

/// E5. An Object That Also Has Children Reports As The Object
#[tokio::test]
async fn test_object_wins_over_directory() {
    let (driver, _client) = fixture();
    driver.put_content("/a/b", &b"object"[..]).await.unwrap();
    driver.put_content("/a/b/c", &b"child"[..]).await.unwrap();

    let info = driver.stat("/a/b").await.unwrap();
    assert!(!info.is_dir);
    assert_eq!(info.size, 6);

    // The children stay listable regardless.
    let children = driver.list("/a/b").await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].path, "/a/b/c");
}

/// E6. The Directory Marker Itself Never Lists As A Child
#[tokio::test]
async fn test_list_excludes_directory_marker() {
    let (driver, client) = fixture();
    client.insert("a/", b"".as_slice());
    client.insert("a/x", b"data".as_slice());

    let entries = driver.list("/a").await.unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, "/a/x");
}

/// F1. Walk Visits Every Object Across Pages, Skipping Markers
#[tokio::test]
async fn test_walk_visits_all_objects() {
    let (driver, client) = fixture_with(MemoryClient::new().with_page_limit(2));
    driver.put_content("/w/a", &b"1"[..]).await.unwrap();
    driver.put_content("/w/d1/b", &b"2"[..]).await.unwrap();
    driver.put_content("/w/d1/d2/c", &b"3"[..]).await.unwrap();
    driver.put_content("/w/z", &b"4"[..]).await.unwrap();
    client.insert("w/d1/", b"".as_slice());

    let mut visited = Vec::new();
    driver
        .walk("/w", WalkOptions::new(), |info| {
            visited.push(info.path.clone());
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(visited, vec!["/w/a", "/w/d1/b", "/w/d1/d2/c", "/w/z"]);
}

/// F2. The First Visitor Error Aborts The Walk
#[tokio::test]
async fn test_walk_aborts_on_visitor_error() {
    let (driver, _client) = fixture();
    driver.put_content("/w/a", &b"1"[..]).await.unwrap();
    driver.put_content("/w/b", &b"2"[..]).await.unwrap();

    let mut visits = 0;
    let result = driver
        .walk("/w", WalkOptions::new(), |_info| {
            visits += 1;
            Err(BlobFsError::Cancelled)
        })
        .await;

    assert!(matches!(result, Err(BlobFsError::Cancelled)));
    assert_eq!(visits, 1);
}

/// F3. Walk Resumes Strictly After The Seeded Path
#[tokio::test]
async fn test_walk_resumes_from_start_after() {
    let (driver, _client) = fixture();
    driver.put_content("/w/a", &b"1"[..]).await.unwrap();
    driver.put_content("/w/b", &b"2"[..]).await.unwrap();
    driver.put_content("/w/c", &b"3"[..]).await.unwrap();

    let mut visited = Vec::new();
    driver
        .walk("/w", WalkOptions::new().with_start_after("/w/a"), |info| {
            visited.push(info.path.clone());
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(visited, vec!["/w/b", "/w/c"]);
}

/// G1. Move Replaces The Source With The Destination
#[tokio::test]
async fn test_move_replaces_source() {
    let (driver, _client) = fixture();
    driver.put_content("/from/file", &b"payload"[..]).await.unwrap();

    driver.rename("/from/file", "/to/file").await.unwrap();

    assert_eq!(driver.get_content("/to/file").await.unwrap(), b"payload");
    assert!(matches!(
        driver.stat("/from/file").await,
        Err(BlobFsError::NotFound { .. })
    ));
}

/// G2. A Failed Copy Introduces No Partial State
#[tokio::test]
async fn test_move_copy_failure_leaves_source() {
    let (driver, client) = fixture();
    driver.put_content("/from/file", &b"payload"[..]).await.unwrap();
    client.fail_next_copy();

    let result = driver.rename("/from/file", "/to/file").await;

    assert!(result.is_err());
    assert_eq!(driver.get_content("/from/file").await.unwrap(), b"payload");
    assert!(matches!(
        driver.stat("/to/file").await,
        Err(BlobFsError::NotFound { .. })
    ));
}

/// G3. A Failed Source Delete Rolls The Copy Back
#[tokio::test]
async fn test_move_delete_failure_rolls_back() {
    let (driver, client) = fixture();
    driver.put_content("/from/file", &b"payload"[..]).await.unwrap();
    client.fail_delete_of("from/file");

    let result = driver.rename("/from/file", "/to/file").await;

    // The original delete failure surfaces, and at most one live copy
    // remains after rollback.
    assert!(result.is_err());
    assert_eq!(driver.get_content("/from/file").await.unwrap(), b"payload");
    assert!(matches!(
        driver.stat("/to/file").await,
        Err(BlobFsError::NotFound { .. })
    ));
}

/// H1. Every Key Lives Under The Configured Root Directory
#[tokio::test]
async fn test_root_directory_prefixes_keys() {
    let client = Arc::new(MemoryClient::new());
    let config = test_config().with_root_directory("/registry");
    let driver = BlobFsDriver::with_client(client.clone(), config).unwrap();

    driver.put_content("/a.txt", &b"rooted"[..]).await.unwrap();

    assert!(client.contains_key("registry/a.txt"));
    assert_eq!(driver.get_content("/a.txt").await.unwrap(), b"rooted");

    let entries = driver.list("/").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, "/a.txt");
}

/// H2. Redirects Use The Backend's Presigning When Available
#[tokio::test]
async fn test_redirect_url() {
    let (driver, _client) = fixture();
    driver.put_content("/public/file", &b"x"[..]).await.unwrap();

    let url = driver
        .redirect_url("/public/file", std::time::Duration::from_secs(3600))
        .await
        .unwrap();

    assert_eq!(url.as_deref(), Some("memory://public/file?expires=3600"));
}

/// H3. Configuration Problems Fail Before Any Network Activity
#[tokio::test]
async fn test_invalid_config_rejected_at_construction() {
    let client = MemoryClient::new();
    let config = test_config().with_chunk_size(1024);

    assert!(matches!(
        BlobFsDriver::new(client, config),
        Err(BlobFsError::InvalidConfig { .. })
    ));
}

/// H4. Ranged Reads Start At The Requested Offset
#[tokio::test]
async fn test_reader_with_offset() {
    use futures_util::StreamExt;

    let (driver, _client) = fixture();
    driver.put_content("/docs/letter", &b"hello world"[..]).await.unwrap();

    let mut stream = driver.reader("/docs/letter", 6).await.unwrap();
    let mut content = Vec::new();
    while let Some(chunk) = stream.next().await {
        content.extend_from_slice(&chunk.unwrap());
    }

    assert_eq!(content, b"world");
}
