//! Incremental sync engine
//!
//! Each category sync runs the same pipeline: make sure the table exists,
//! fetch everything the API currently offers, flatten, keep only rows newer
//! than the stored watermark, and append them as one batch. Liked songs then
//! feed the dependent artist and album syncs.
//!
//! Nothing is written before fetching and flattening complete, and the append
//! is transactional, so a failed sync leaves the watermark where it was.

mod guard;

pub use guard::SyncGuard;

use serde::Serialize;

use crate::db::CategoryStore;
use crate::error::Result;
use crate::flatten::{flatten_albums, flatten_artists, flatten_liked, flatten_recent};
use crate::models::{
    AlbumArtistRow, AlbumRow, ArtistRow, Category, LikedTrackRow, RecentTrackRow, Record,
    SavedTrack, TimestampedRecord,
};
use crate::spotify::{MusicApi, MAX_IDS_PER_REQUEST, MAX_PAGE_SIZE};
use crate::util::distinct_in_order;

/// Page size used for the liked and recent listings
pub const PAGE_SIZE: u32 = MAX_PAGE_SIZE;

/// Outcome of one category sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryReport {
    pub category: Category,
    /// Upstream records received
    pub fetched: usize,
    /// Rows produced by flattening
    pub flattened: usize,
    /// Rows written
    pub appended: usize,
    /// Watermark the rows were filtered against; `None` for an empty table
    /// and for categories without timestamps
    pub watermark: Option<i64>,
}

impl CategoryReport {
    const fn new(category: Category) -> Self {
        Self {
            category,
            fetched: 0,
            flattened: 0,
            appended: 0,
            watermark: None,
        }
    }
}

/// Per-category outcomes of a sync run, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub categories: Vec<CategoryReport>,
}

impl SyncReport {
    pub fn get(&self, category: Category) -> Option<&CategoryReport> {
        self.categories
            .iter()
            .find(|report| report.category == category)
    }

    pub fn total_appended(&self) -> usize {
        self.categories.iter().map(|report| report.appended).sum()
    }

    fn push(&mut self, report: CategoryReport) {
        self.categories.push(report);
    }

    fn extend(&mut self, other: Self) {
        self.categories.extend(other.categories);
    }
}

/// Rows strictly newer than `watermark`, in input order.
///
/// Without a watermark every row survives. Rows sharing a timestamp are all
/// kept.
pub fn filter_newer<R: TimestampedRecord + Clone>(rows: &[R], watermark: Option<i64>) -> Vec<R> {
    match watermark {
        None => rows.to_vec(),
        Some(watermark) => rows
            .iter()
            .filter(|row| row.timestamp() > watermark)
            .cloned()
            .collect(),
    }
}

/// Sync engine for one user's store
pub struct SyncEngine<'a, S, A> {
    user: String,
    store: S,
    api: &'a A,
}

impl<'a, S: CategoryStore, A: MusicApi> SyncEngine<'a, S, A> {
    pub fn new(user: impl Into<String>, store: S, api: &'a A) -> Self {
        Self {
            user: user.into(),
            store,
            api,
        }
    }

    /// Liked songs (with their artists and albums), then recents
    pub async fn sync_all(&self) -> Result<SyncReport> {
        let mut report = self.sync_liked().await?;
        report.push(self.sync_recent().await?);
        Ok(report)
    }

    pub async fn sync_liked(&self) -> Result<SyncReport> {
        let _guard = SyncGuard::acquire(&self.user, Category::Liked)?;
        self.store.create_if_missing::<LikedTrackRow>()?;

        let items = self.fetch_all_liked().await?;
        let rows = flatten_liked(&items)?;
        let (appended, watermark) = self.append_newer(&rows)?;

        let mut report = SyncReport::default();
        report.push(CategoryReport {
            category: Category::Liked,
            fetched: items.len(),
            flattened: rows.len(),
            appended,
            watermark,
        });
        tracing::info!(
            "Synced liked songs for {}: {} fetched, {} new rows",
            self.user,
            items.len(),
            appended
        );

        // Every flattened row contributes ids, not only the ones just appended
        let artist_ids = distinct_in_order(rows.iter().map(|row| row.artist_id.as_str()));
        let album_ids = distinct_in_order(rows.iter().map(|row| row.album_id.as_str()));

        report.push(self.sync_artists(&artist_ids).await?);
        report.extend(self.sync_albums(&album_ids).await?);
        Ok(report)
    }

    pub async fn sync_recent(&self) -> Result<CategoryReport> {
        let _guard = SyncGuard::acquire(&self.user, Category::Recent)?;
        self.store.create_if_missing::<RecentTrackRow>()?;

        let page = self.api.fetch_recent_page(PAGE_SIZE).await?;
        let rows = flatten_recent(&page.items)?;
        let (appended, watermark) = self.append_newer(&rows)?;

        tracing::info!(
            "Synced recents for {}: {} fetched, {} new rows",
            self.user,
            page.items.len(),
            appended
        );
        Ok(CategoryReport {
            category: Category::Recent,
            fetched: page.items.len(),
            flattened: rows.len(),
            appended,
            watermark,
        })
    }

    /// Fetch and store artists that are not stored yet
    pub async fn sync_artists(&self, ids: &[String]) -> Result<CategoryReport> {
        let _guard = SyncGuard::acquire(&self.user, Category::Artist)?;
        self.store.create_if_missing::<ArtistRow>()?;

        let missing = self.unknown_ids::<ArtistRow>(ids)?;
        let mut artists = Vec::new();
        for chunk in missing.chunks(MAX_IDS_PER_REQUEST) {
            artists.extend(self.api.fetch_artists(chunk).await?);
        }

        let rows = flatten_artists(&artists);
        let appended = self.store.append(&rows)?;

        tracing::info!(
            "Synced artists for {}: {} requested, {} new, {} rows",
            self.user,
            ids.len(),
            missing.len(),
            appended
        );
        Ok(CategoryReport {
            fetched: artists.len(),
            flattened: rows.len(),
            appended,
            ..CategoryReport::new(Category::Artist)
        })
    }

    /// Fetch and store albums (and their artist links) that are not stored yet
    pub async fn sync_albums(&self, ids: &[String]) -> Result<SyncReport> {
        let _album_guard = SyncGuard::acquire(&self.user, Category::Album)?;
        let _link_guard = SyncGuard::acquire(&self.user, Category::AlbumArtist)?;
        self.store.create_if_missing::<AlbumRow>()?;
        self.store.create_if_missing::<AlbumArtistRow>()?;

        let missing = self.unknown_ids::<AlbumRow>(ids)?;
        let mut albums = Vec::new();
        for chunk in missing.chunks(MAX_IDS_PER_REQUEST) {
            albums.extend(self.api.fetch_albums(chunk).await?);
        }

        let (album_rows, link_rows) = flatten_albums(&albums);
        // Links first: if the album append fails the ids stay unknown and the
        // next sync retries both
        let links_appended = self.store.append(&link_rows)?;
        let albums_appended = self.store.append(&album_rows)?;

        tracing::info!(
            "Synced albums for {}: {} requested, {} new, {} rows",
            self.user,
            ids.len(),
            missing.len(),
            albums_appended
        );

        let mut report = SyncReport::default();
        report.push(CategoryReport {
            fetched: albums.len(),
            flattened: album_rows.len(),
            appended: albums_appended,
            ..CategoryReport::new(Category::Album)
        });
        report.push(CategoryReport {
            fetched: albums.len(),
            flattened: link_rows.len(),
            appended: links_appended,
            ..CategoryReport::new(Category::AlbumArtist)
        });
        Ok(report)
    }

    async fn fetch_all_liked(&self) -> Result<Vec<SavedTrack>> {
        let mut items = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.api.fetch_liked_page(offset, PAGE_SIZE).await?;
            let received = page.items.len();
            tracing::debug!("Fetched {} liked tracks at offset {}", received, offset);
            items.extend(page.items);

            if page.next.is_none() {
                break;
            }
            if received == 0 {
                tracing::warn!(
                    "Empty liked page at offset {} still links a next page",
                    offset
                );
                break;
            }
            offset += PAGE_SIZE;
        }

        Ok(items)
    }

    fn append_newer<R: TimestampedRecord + Clone>(
        &self,
        rows: &[R],
    ) -> Result<(usize, Option<i64>)> {
        let watermark = self.store.max_timestamp::<R>()?;
        tracing::debug!(
            "{} watermark for {}: {:?}",
            R::table(),
            self.user,
            watermark
        );

        let fresh = filter_newer(rows, watermark);
        let appended = self.store.append(&fresh)?;
        Ok((appended, watermark))
    }

    /// Requested ids, de-duplicated, minus the ones already stored
    fn unknown_ids<R: Record>(&self, ids: &[String]) -> Result<Vec<String>> {
        let known = self.store.distinct_keys::<R>()?;
        Ok(distinct_in_order(ids.iter().map(String::as_str))
            .into_iter()
            .filter(|id| !known.contains(id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::{Database, SqliteCategoryStore};
    use crate::error::Error;
    use crate::flatten::fixtures::{album, artist, play, saved_track};
    use crate::models::{Album, Artist, Paging, PlayHistory};

    static USER_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn unique_user() -> String {
        format!("user-{}", USER_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// `2024-01-01` plus `seconds`
    fn at(seconds: u32) -> String {
        format!(
            "2024-01-01T{:02}:{:02}:{:02}Z",
            seconds / 3600,
            seconds / 60 % 60,
            seconds % 60
        )
    }

    #[derive(Default)]
    struct FakeApi {
        liked: Mutex<Vec<SavedTrack>>,
        recent: Mutex<Vec<PlayHistory>>,
        fail_liked: bool,
        liked_calls: Mutex<Vec<(u32, u32)>>,
        album_calls: Mutex<Vec<Vec<String>>>,
        artist_calls: Mutex<Vec<Vec<String>>>,
    }

    impl FakeApi {
        fn with_liked(liked: Vec<SavedTrack>) -> Self {
            Self {
                liked: Mutex::new(liked),
                ..Self::default()
            }
        }

        fn set_liked(&self, liked: Vec<SavedTrack>) {
            *self.liked.lock().unwrap() = liked;
        }

        fn artist_batch_sizes(&self) -> Vec<usize> {
            self.artist_calls
                .lock()
                .unwrap()
                .iter()
                .map(Vec::len)
                .collect()
        }

        fn album_batch_sizes(&self) -> Vec<usize> {
            self.album_calls
                .lock()
                .unwrap()
                .iter()
                .map(Vec::len)
                .collect()
        }
    }

    impl MusicApi for FakeApi {
        async fn fetch_liked_page(&self, offset: u32, limit: u32) -> Result<Paging<SavedTrack>> {
            self.liked_calls.lock().unwrap().push((offset, limit));
            if self.fail_liked {
                return Err(Error::Upstream("The access token expired (401)".into()));
            }

            let liked = self.liked.lock().unwrap();
            let start = (offset as usize).min(liked.len());
            let end = (start + limit as usize).min(liked.len());
            Ok(Paging {
                items: liked[start..end].to_vec(),
                next: (end < liked.len()).then(|| format!("/me/tracks?offset={end}")),
                total: Some(u32::try_from(liked.len()).unwrap()),
                limit: Some(limit),
                offset: Some(offset),
            })
        }

        async fn fetch_recent_page(&self, limit: u32) -> Result<Paging<PlayHistory>> {
            let recent = self.recent.lock().unwrap();
            Ok(Paging {
                items: recent.iter().take(limit as usize).cloned().collect(),
                next: None,
                total: None,
                limit: Some(limit),
                offset: None,
            })
        }

        async fn fetch_albums(&self, ids: &[String]) -> Result<Vec<Album>> {
            assert!(ids.len() <= MAX_IDS_PER_REQUEST);
            self.album_calls.lock().unwrap().push(ids.to_vec());
            Ok(ids
                .iter()
                .map(|id| album(id, &[], &["album-artist"]))
                .collect())
        }

        async fn fetch_artists(&self, ids: &[String]) -> Result<Vec<Artist>> {
            assert!(ids.len() <= MAX_IDS_PER_REQUEST);
            self.artist_calls.lock().unwrap().push(ids.to_vec());
            Ok(ids.iter().map(|id| artist(id, &["rock"])).collect())
        }
    }

    fn engine<'a>(
        db: &'a Database,
        api: &'a FakeApi,
    ) -> SyncEngine<'a, SqliteCategoryStore<'a>, FakeApi> {
        SyncEngine::new(
            unique_user(),
            SqliteCategoryStore::new(db.connection()),
            api,
        )
    }

    fn liked_count(db: &Database) -> usize {
        SqliteCategoryStore::new(db.connection())
            .count::<LikedTrackRow>()
            .unwrap()
    }

    fn appended(report: &SyncReport, category: Category) -> usize {
        report.get(category).map_or(0, |report| report.appended)
    }

    #[test]
    fn filter_newer_is_strict_and_keeps_ties() {
        let row = |track_id: &str, played_at: i64| RecentTrackRow {
            track_id: track_id.to_string(),
            track_name: String::new(),
            played_at,
        };
        let rows = vec![row("a", 10), row("b", 20), row("c", 20), row("d", 5)];

        assert_eq!(filter_newer(&rows, None), rows);
        assert_eq!(
            filter_newer(&rows, Some(10)),
            vec![row("b", 20), row("c", 20)]
        );
        assert!(filter_newer(&rows, Some(20)).is_empty());
    }

    #[tokio::test]
    async fn second_sync_with_same_data_appends_nothing() {
        let db = Database::open_in_memory().unwrap();
        let api = FakeApi::with_liked(vec![
            saved_track("t3", &at(30), &["a1"]),
            saved_track("t2", &at(20), &["a1", "a2"]),
            saved_track("t1", &at(10), &["a1"]),
        ]);
        let engine = engine(&db, &api);
        let store = SqliteCategoryStore::new(db.connection());
        let t3 = crate::models::parse_timestamp(&at(30)).unwrap();

        let first = engine.sync_liked().await.unwrap();
        assert_eq!(appended(&first, Category::Liked), 4);
        assert_eq!(store.max_timestamp::<LikedTrackRow>().unwrap(), Some(t3));

        let second = engine.sync_liked().await.unwrap();
        assert_eq!(appended(&second, Category::Liked), 0);
        assert_eq!(second.get(Category::Liked).unwrap().watermark, Some(t3));
        assert_eq!(second.total_appended(), 0);
        assert_eq!(store.max_timestamp::<LikedTrackRow>().unwrap(), Some(t3));
        assert_eq!(liked_count(&db), 4);
    }

    #[tokio::test]
    async fn only_rows_strictly_newer_than_watermark_are_appended() {
        let db = Database::open_in_memory().unwrap();
        let api = FakeApi::with_liked(vec![saved_track("t1", &at(100), &["a1"])]);
        let engine = engine(&db, &api);
        engine.sync_liked().await.unwrap();

        api.set_liked(vec![
            saved_track("t3", &at(101), &["a1"]),
            saved_track("t4", &at(101), &["a1"]),
            saved_track("t2", &at(100), &["a1"]),
            saved_track("t1", &at(100), &["a1"]),
        ]);
        let report = engine.sync_liked().await.unwrap();

        let liked = report.get(Category::Liked).unwrap();
        assert_eq!(
            liked.watermark,
            Some(crate::models::parse_timestamp(&at(100)).unwrap())
        );
        assert_eq!(liked.appended, 2);

        let stored = SqliteCategoryStore::new(db.connection())
            .select_page::<LikedTrackRow>(0, 10)
            .unwrap()
            .into_iter()
            .map(|row| row.track_id)
            .collect::<Vec<_>>();
        assert_eq!(stored, vec!["t1", "t3", "t4"]);
    }

    #[tokio::test]
    async fn two_syncs_end_to_end() {
        let db = Database::open_in_memory().unwrap();
        let api = FakeApi::with_liked(vec![
            saved_track("t2", &at(2), &["a1"]),
            saved_track("t1", &at(1), &["a1", "a2"]),
        ]);
        let engine = engine(&db, &api);

        let first = engine.sync_liked().await.unwrap();
        assert_eq!(appended(&first, Category::Liked), 3);
        assert_eq!(first.get(Category::Liked).unwrap().watermark, None);

        api.set_liked(vec![
            saved_track("t3", &at(3), &["a3"]),
            saved_track("t2", &at(2), &["a1"]),
            saved_track("t1", &at(1), &["a1", "a2"]),
        ]);
        let second = engine.sync_liked().await.unwrap();

        assert_eq!(appended(&second, Category::Liked), 1);
        assert_eq!(liked_count(&db), 4);

        let store = SqliteCategoryStore::new(db.connection());
        assert_eq!(
            store.max_timestamp::<LikedTrackRow>().unwrap(),
            Some(crate::models::parse_timestamp(&at(3)).unwrap())
        );
        // a1 and a2 were stored by the first sync; only a3 is new
        assert_eq!(api.artist_batch_sizes(), vec![2, 1]);
        assert_eq!(store.count::<ArtistRow>().unwrap(), 3);
    }

    #[tokio::test]
    async fn pagination_fetches_every_page() {
        let db = Database::open_in_memory().unwrap();
        let liked = (0..120)
            .map(|index| saved_track(&format!("t{index}"), &at(1_000 - index), &["a1"]))
            .collect();
        let api = FakeApi::with_liked(liked);

        let report = engine(&db, &api).sync_liked().await.unwrap();

        assert_eq!(
            *api.liked_calls.lock().unwrap(),
            vec![(0, 50), (50, 50), (100, 50)]
        );
        let liked = report.get(Category::Liked).unwrap();
        assert_eq!(liked.fetched, 120);
        assert_eq!(liked.flattened, 120);
        assert_eq!(liked.appended, 120);
    }

    #[tokio::test]
    async fn dependent_fetches_are_batched_by_twenty() {
        let db = Database::open_in_memory().unwrap();
        let liked = (0..25)
            .map(|index| {
                let artist = format!("a{index}");
                saved_track(&format!("t{index}"), &at(index), &[artist.as_str()])
            })
            .collect();
        let api = FakeApi::with_liked(liked);

        let report = engine(&db, &api).sync_liked().await.unwrap();

        assert_eq!(api.artist_batch_sizes(), vec![20, 5]);
        assert_eq!(api.album_batch_sizes(), vec![20, 5]);
        assert_eq!(appended(&report, Category::Artist), 25);
        assert_eq!(appended(&report, Category::Album), 25);
        assert_eq!(appended(&report, Category::AlbumArtist), 25);
    }

    #[tokio::test]
    async fn stored_dependents_are_not_refetched() {
        let db = Database::open_in_memory().unwrap();
        let api = FakeApi::with_liked(vec![saved_track("t1", &at(1), &["a1"])]);
        let engine = engine(&db, &api);

        engine.sync_liked().await.unwrap();
        engine.sync_liked().await.unwrap();

        assert_eq!(api.artist_batch_sizes(), vec![1]);
        assert_eq!(api.album_batch_sizes(), vec![1]);
    }

    #[tokio::test]
    async fn already_known_tracks_still_contribute_dependent_ids() {
        let db = Database::open_in_memory().unwrap();
        let api = FakeApi::with_liked(vec![saved_track("t1", &at(1), &["a1", "a2"])]);
        let engine = engine(&db, &api);
        engine.sync_liked().await.unwrap();

        // Lose the artist metadata; the liked rows stay behind the watermark
        db.connection().execute("DELETE FROM artist", ()).unwrap();
        let report = engine.sync_liked().await.unwrap();

        assert_eq!(appended(&report, Category::Liked), 0);
        assert_eq!(api.artist_batch_sizes(), vec![2, 2]);
        assert_eq!(appended(&report, Category::Artist), 2);
    }

    #[tokio::test]
    async fn upstream_failure_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let api = FakeApi {
            fail_liked: true,
            ..FakeApi::default()
        };

        let error = engine(&db, &api).sync_liked().await.unwrap_err();

        assert!(error.is_upstream());
        assert_eq!(liked_count(&db), 0);
        assert!(api.artist_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_keeps_watermark_and_skips_dependents() {
        let db = Database::open_in_memory().unwrap();
        let api = FakeApi::with_liked(vec![saved_track("t1", &at(1), &["a1"])]);
        let engine = engine(&db, &api);
        engine.sync_liked().await.unwrap();

        db.connection()
            .execute(
                "CREATE TRIGGER fail_on_poison BEFORE INSERT ON liked_songs
                 WHEN NEW.track_id = 'poison'
                 BEGIN
                     SELECT RAISE(ABORT, 'simulated storage failure');
                 END",
                (),
            )
            .unwrap();
        api.set_liked(vec![
            saved_track("t3", &at(3), &["a3"]),
            saved_track("poison", &at(2), &["a2"]),
            saved_track("t1", &at(1), &["a1"]),
        ]);

        let error = engine.sync_liked().await.unwrap_err();

        assert!(error.is_storage());
        assert_eq!(liked_count(&db), 1);
        assert_eq!(
            SqliteCategoryStore::new(db.connection())
                .max_timestamp::<LikedTrackRow>()
                .unwrap(),
            Some(crate::models::parse_timestamp(&at(1)).unwrap())
        );
        assert_eq!(api.artist_batch_sizes(), vec![1]);
    }

    #[tokio::test]
    async fn recents_sync_incrementally() {
        let db = Database::open_in_memory().unwrap();
        let api = FakeApi::default();
        *api.recent.lock().unwrap() = vec![play("t1", &at(5)), play("t1", &at(1))];
        let engine = engine(&db, &api);

        let first = engine.sync_recent().await.unwrap();
        assert_eq!(first.appended, 2);

        *api.recent.lock().unwrap() = vec![play("t2", &at(9)), play("t1", &at(5))];
        let second = engine.sync_recent().await.unwrap();

        assert_eq!(second.fetched, 2);
        assert_eq!(second.appended, 1);
        assert!(api.artist_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_sync_of_same_category_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let api = FakeApi::with_liked(vec![saved_track("t1", &at(1), &["a1"])]);
        let user = unique_user();
        let engine = SyncEngine::new(
            user.clone(),
            SqliteCategoryStore::new(db.connection()),
            &api,
        );

        let held = SyncGuard::acquire(&user, Category::Liked).unwrap();
        let error = engine.sync_liked().await.unwrap_err();
        assert!(matches!(error, Error::SyncInProgress(_)));
        assert!(api.liked_calls.lock().unwrap().is_empty());

        drop(held);
        assert!(engine.sync_liked().await.is_ok());
    }

    #[tokio::test]
    async fn sync_all_reports_every_category() {
        let db = Database::open_in_memory().unwrap();
        let api = FakeApi::with_liked(vec![saved_track("t1", &at(1), &["a1", "a2"])]);
        *api.recent.lock().unwrap() = vec![play("t1", &at(2))];

        let report = engine(&db, &api).sync_all().await.unwrap();

        let order = report
            .categories
            .iter()
            .map(|report| report.category)
            .collect::<Vec<_>>();
        assert_eq!(
            order,
            vec![
                Category::Liked,
                Category::Artist,
                Category::Album,
                Category::AlbumArtist,
                Category::Recent,
            ]
        );
        assert_eq!(appended(&report, Category::Liked), 2);
        assert_eq!(appended(&report, Category::Artist), 2);
        assert_eq!(appended(&report, Category::Album), 1);
        assert_eq!(appended(&report, Category::AlbumArtist), 1);
        assert_eq!(appended(&report, Category::Recent), 1);
    }
}
