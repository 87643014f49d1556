mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio_test::{assert_err, assert_ok};

use common::{odds, page, FailingStore, FakeSource, Reply};
use sofascore_ingestion::{
    BlobStore, DataKind, EventCrawler, GapFillSummary, IdLogTracker, IngestionError,
    IngestionTarget, MemoryBlobStore, OddsGapFiller, Pending, SourceError,
};

fn nba() -> IngestionTarget {
    IngestionTarget::new("Basketball", "NBA", "2024/2025")
}

fn ids(v: &[u64]) -> BTreeSet<u64> {
    v.iter().copied().collect()
}

async fn seed_logs(store: &Arc<MemoryBlobStore>, events: &[u64], odds_ids: &[u64]) {
    let tracker = IdLogTracker::new(store.clone());
    tracker
        .merge_and_persist(&nba(), DataKind::Events, &ids(events))
        .await
        .unwrap();
    if !odds_ids.is_empty() {
        tracker
            .merge_and_persist(&nba(), DataKind::Odds, &ids(odds_ids))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn crawl_writes_one_blob_per_page_and_logs_every_id() {
    let source = Arc::new(
        FakeSource::new()
            .with_page(0, page(&[10, 11], true))
            .with_page(1, page(&[12, 11], true))
            .with_page(2, page(&[13], false)),
    );
    let store = Arc::new(MemoryBlobStore::new());
    let crawler = EventCrawler::new(source.clone(), store.clone());

    let summary = assert_ok!(crawler.crawl(&nba(), 0).await);
    assert_eq!(summary.pages_written, 3);
    assert_eq!(summary.events_seen, 4);
    assert_eq!(source.pages_fetched(), vec![0, 1, 2]);

    let pages = store
        .list("raw/sofascore/basketball/nba/events/2024-2025/")
        .await
        .unwrap();
    assert_eq!(pages.len(), 3);

    let raw = store.load(&nba().page_path(1)).await.unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(doc["events"][0]["id"], 12);

    let tracker = IdLogTracker::new(store.clone());
    let logged = tracker.load(&nba(), DataKind::Events).await.unwrap();
    assert_eq!(logged, ids(&[10, 11, 12, 13]));

    // identical remote data, identical id log
    let before = store.load(&nba().id_log_path(DataKind::Events)).await.unwrap();
    assert_ok!(crawler.crawl(&nba(), 0).await);
    let after = store.load(&nba().id_log_path(DataKind::Events)).await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn crawl_resumed_at_n_never_touches_earlier_pages() {
    let source = Arc::new(
        FakeSource::new()
            .with_page(0, page(&[1], true))
            .with_page(1, page(&[2], true))
            .with_page(2, page(&[3], true))
            .with_page(3, page(&[4], false)),
    );
    let store = Arc::new(MemoryBlobStore::new());
    let crawler = EventCrawler::new(source.clone(), store.clone());

    let summary = assert_ok!(crawler.crawl(&nba(), 2).await);
    assert_eq!(summary.start_page, 2);
    assert_eq!(source.pages_fetched(), vec![2, 3]);
    assert!(store.load(&nba().page_path(0)).await.is_err());
    assert!(store.load(&nba().page_path(1)).await.is_err());

    let logged = IdLogTracker::new(store.clone())
        .load(&nba(), DataKind::Events)
        .await
        .unwrap();
    assert_eq!(logged, ids(&[3, 4]));
}

#[tokio::test]
async fn rate_limit_stops_the_crawl_without_logging_ids() {
    let source = Arc::new(
        FakeSource::new()
            .with_page(0, page(&[1, 2], true))
            .with_page(1, Reply::RateLimited)
            .with_page(2, page(&[3], false)),
    );
    let store = Arc::new(MemoryBlobStore::new());
    let crawler = EventCrawler::new(source.clone(), store.clone());

    let err = assert_err!(crawler.crawl(&nba(), 0).await);
    assert!(err.is_rate_limited());
    assert_eq!(source.pages_fetched(), vec![0, 1]);

    // page 0 stays written, the id log is never created
    assert_ok!(store.load(&nba().page_path(0)).await);
    assert!(store
        .load(&nba().id_log_path(DataKind::Events))
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn page_write_failure_leaves_events_log_untouched() {
    let source = Arc::new(
        FakeSource::new()
            .with_page(0, page(&[1, 2], true))
            .with_page(1, page(&[3], true))
            .with_page(2, page(&[4], false)),
    );
    let memory = Arc::new(MemoryBlobStore::new());
    let store = Arc::new(FailingStore::new(memory.clone(), "/1.json"));
    let crawler = EventCrawler::new(source.clone(), store);

    let err = assert_err!(crawler.crawl(&nba(), 0).await);
    match err {
        IngestionError::StorageWrite { ref path, .. } => assert_eq!(*path, nba().page_path(1)),
        other => panic!("expected a storage write failure, got {:?}", other),
    }
    assert_eq!(source.pages_fetched(), vec![0, 1]);

    assert_ok!(memory.load(&nba().page_path(0)).await);
    assert!(memory
        .load(&nba().id_log_path(DataKind::Events))
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn unknown_season_fails_before_fetching() {
    let source = Arc::new(FakeSource::new().with_page(0, page(&[1], false)));
    let store = Arc::new(MemoryBlobStore::new());
    let crawler = EventCrawler::new(source.clone(), store.clone());

    let target = IngestionTarget::new("Basketball", "NBA", "1999/2000");
    let err = assert_err!(crawler.crawl(&target, 0).await);
    assert!(matches!(
        err,
        IngestionError::Source(SourceError::Configuration(_))
    ));
    assert!(source.pages_fetched().is_empty());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn start_page_is_resolved_numerically() {
    let source = Arc::new(FakeSource::new());
    let store = Arc::new(MemoryBlobStore::new());
    let crawler = EventCrawler::new(source.clone(), store.clone());

    let (target, start) = crawler.resolve_start_page("Basketball", "NBA").await.unwrap();
    assert_eq!(target.season, "2024/2025");
    assert_eq!(start, 0);

    for p in 0..=10 {
        store.store(&nba().page_path(p), b"{}", true).await.unwrap();
    }
    // lexicographically "9.json" sorts last; the resolver must still pick 10
    let (_, start) = crawler.resolve_start_page("Basketball", "NBA").await.unwrap();
    assert_eq!(start, 11);
}

#[tokio::test]
async fn latest_events_with_nothing_new_is_a_quiet_success() {
    let source = Arc::new(FakeSource::new().with_page(0, page(&[1, 2], false)));
    let store = Arc::new(MemoryBlobStore::new());
    let crawler = EventCrawler::new(source.clone(), store.clone());

    let first = assert_ok!(crawler.ingest_latest_events("Basketball", "NBA").await);
    assert_eq!(first.pages_written, 1);

    // page 1 does not exist yet
    let second = assert_ok!(crawler.ingest_latest_events("Basketball", "NBA").await);
    assert_eq!(second.start_page, 1);
    assert_eq!(second.pages_written, 0);
    assert!(second.to_string().starts_with("No new event pages"));

    source.set_page(1, page(&[3], false));
    let third = assert_ok!(crawler.ingest_latest_events("Basketball", "NBA").await);
    assert_eq!(third.pages_written, 1);
    assert_eq!(source.pages_fetched(), vec![0, 1, 1]);

    let logged = IdLogTracker::new(store.clone())
        .load(&nba(), DataKind::Events)
        .await
        .unwrap();
    assert_eq!(logged, ids(&[1, 2, 3]));
}

#[tokio::test]
async fn not_found_mid_crawl_is_terminal() {
    let source = Arc::new(FakeSource::new().with_page(0, page(&[1], true)));
    let store = Arc::new(MemoryBlobStore::new());
    let crawler = EventCrawler::new(source.clone(), store.clone());

    let err = assert_err!(crawler.crawl(&nba(), 0).await);
    assert!(matches!(err, IngestionError::Source(SourceError::NotFound { .. })));
}

#[tokio::test]
async fn missing_odds_log_reads_as_empty() {
    let store = Arc::new(MemoryBlobStore::new());
    seed_logs(&store, &[1, 2], &[]).await;
    let tracker = IdLogTracker::new(store.clone());

    assert!(tracker.load(&nba(), DataKind::Odds).await.unwrap().is_empty());
    assert_eq!(tracker.missing(&nba()).await.unwrap(), Pending::Pending(ids(&[1, 2])));
}

#[tokio::test]
async fn gap_fill_processes_only_the_difference() {
    let source = Arc::new(FakeSource::new().with_odds(3, Reply::NotFound));
    let store = Arc::new(MemoryBlobStore::new());
    seed_logs(&store, &[1, 2, 3], &[1, 2]).await;

    let filler = OddsGapFiller::new(source.clone(), store.clone());
    let summary = assert_ok!(filler.fill_odds(&nba()).await);

    assert_eq!(source.odds_fetched(), vec![3]);
    assert_eq!(summary.ingested(), 0);
    assert_eq!(summary.not_found(), 1);

    let logged = IdLogTracker::new(store.clone())
        .load(&nba(), DataKind::Odds)
        .await
        .unwrap();
    assert_eq!(logged, ids(&[1, 2]));
}

#[tokio::test]
async fn second_gap_fill_finds_nothing_to_do() {
    let source = Arc::new(
        FakeSource::new()
            .with_odds(1, odds(1))
            .with_odds(2, odds(2)),
    );
    let store = Arc::new(MemoryBlobStore::new());
    seed_logs(&store, &[1, 2], &[]).await;
    let filler = OddsGapFiller::new(source.clone(), store.clone());

    let first = assert_ok!(filler.fill_odds(&nba()).await);
    assert_eq!(first.ingested(), 2);
    assert_eq!(first.to_string(), "Odds ingested for NBA - 2024/2025 from 2 events");
    let doc = store.load(&nba().odds_path(2)).await.unwrap();
    assert!(String::from_utf8(doc).unwrap().contains("\"eventId\":2"));

    let second = assert_ok!(filler.fill_odds(&nba()).await);
    assert!(matches!(second, GapFillSummary::NothingPending { .. }));
    assert_eq!(second.to_string(), "No new odds to collect for NBA - 2024/2025");
    assert_eq!(source.odds_fetched(), vec![1, 2]);
}

#[tokio::test]
async fn unexpected_odds_error_aborts_without_logging() {
    let source = Arc::new(
        FakeSource::new()
            .with_odds(1, odds(1))
            .with_odds(2, Reply::Broken)
            .with_odds(3, odds(3)),
    );
    let store = Arc::new(MemoryBlobStore::new());
    seed_logs(&store, &[1, 2, 3], &[]).await;
    let filler = OddsGapFiller::new(source.clone(), store.clone());

    let err = assert_err!(filler.fill_odds(&nba()).await);
    assert!(matches!(err, IngestionError::Source(SourceError::Other(_))));
    assert_eq!(source.odds_fetched(), vec![1, 2]);

    // odds for 1 were written but not logged, so the next run retries them
    assert_ok!(store.load(&nba().odds_path(1)).await);
    let tracker = IdLogTracker::new(store.clone());
    assert!(tracker.load(&nba(), DataKind::Odds).await.unwrap().is_empty());
    assert_eq!(
        tracker.missing(&nba()).await.unwrap(),
        Pending::Pending(ids(&[1, 2, 3]))
    );
}

#[tokio::test]
async fn rate_limited_odds_fetch_is_terminal() {
    let source = Arc::new(FakeSource::new().with_odds(5, Reply::RateLimited));
    let store = Arc::new(MemoryBlobStore::new());
    seed_logs(&store, &[5], &[]).await;

    let filler = OddsGapFiller::new(source.clone(), store.clone());
    let err = assert_err!(filler.fill_odds(&nba()).await);
    assert!(err.is_rate_limited());
}

#[tokio::test]
async fn odds_write_failure_aborts_without_logging() {
    let source = Arc::new(
        FakeSource::new()
            .with_odds(1, odds(1))
            .with_odds(2, odds(2))
            .with_odds(3, odds(3)),
    );
    let memory = Arc::new(MemoryBlobStore::new());
    seed_logs(&memory, &[1, 2, 3], &[]).await;
    let failing = nba().odds_path(2);
    let store = Arc::new(FailingStore::new(memory.clone(), failing.clone()));

    let filler = OddsGapFiller::new(source.clone(), store);
    let err = assert_err!(filler.fill_odds(&nba()).await);
    assert!(matches!(err, IngestionError::StorageWrite { ref path, .. } if *path == failing));
    assert_eq!(source.odds_fetched(), vec![1, 2]);

    assert_ok!(memory.load(&nba().odds_path(1)).await);
    assert!(memory
        .load(&nba().id_log_path(DataKind::Odds))
        .await
        .unwrap_err()
        .is_not_found());
    assert_eq!(
        IdLogTracker::new(memory.clone()).missing(&nba()).await.unwrap(),
        Pending::Pending(ids(&[1, 2, 3]))
    );
}
