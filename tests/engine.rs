//! Folio Integration Tests
//!
//! Opens a folio over a temporary blog directory and checks startup
//! reconciliation, live dispatch, lookups and cache coherence.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use filetime::FileTime;
use folio::core::{Applied, Folio, FolioSettings};
use folio::domain::{ChangeEvent, ChangeKind};
use folio::{PlainTextRenderer, Renderer};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

struct Blog {
    _temp: TempDir,
    settings: FolioSettings,
}

impl Blog {
    fn new(posts_per_page: usize) -> Self {
        let temp = TempDir::new().unwrap();
        let settings = FolioSettings {
            posts_per_page,
            ..FolioSettings::for_blog_dir(temp.path())
        };
        std::fs::create_dir_all(&settings.posts_dir).unwrap();

        Self {
            _temp: temp,
            settings,
        }
    }

    /// Write a post with a declared date and a pinned mtime (epoch seconds)
    fn write_post(&self, id: &str, date: &str, body: &str, mtime: i64) -> PathBuf {
        let path = self.post_path(id);
        std::fs::write(&path, format!("title: {}\ndate: {}\n\n{}", id, date, body)).unwrap();
        filetime::set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
        path
    }

    fn post_path(&self, id: &str) -> PathBuf {
        self.settings.posts_dir.join(format!("{}.markdown", id))
    }

    fn artifacts(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.settings.cache_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    async fn open(&self) -> Folio {
        Folio::open(self.settings.clone(), Arc::new(PlainTextRenderer::new()))
            .await
            .unwrap()
    }
}

/// Plain-text renderer that can be switched into failing
#[derive(Default)]
struct FlakyRenderer {
    failing: AtomicBool,
}

#[async_trait]
impl Renderer for FlakyRenderer {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn render(&self, body: &str) -> anyhow::Result<String> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("renderer offline");
        }
        PlainTextRenderer::new().render(body).await
    }
}

fn cache_dir(blog: &Blog) -> &Path {
    &blog.settings.cache_dir
}

#[tokio::test]
async fn test_initial_load_orders_by_declared_date() {
    let blog = Blog::new(5);
    blog.write_post("a", "2024-01-01", "First", 1_700_000_000);
    blog.write_post("b", "2024-01-02", "Second", 1_600_000_000);

    let folio = blog.open().await;
    assert_eq!(folio.ids(), vec!["b", "a"]);
    assert_eq!(folio.item_count(), 2);
    assert_eq!(
        blog.artifacts(),
        vec![
            "20240101000000.1700000000000.a.json",
            "20240102000000.1600000000000.b.json",
        ]
    );
}

#[tokio::test]
async fn test_deleted_source_is_removed_on_next_sync() {
    let blog = Blog::new(5);
    blog.write_post("a", "2024-01-01", "First", 1_700_000_000);
    blog.write_post("b", "2024-01-02", "Second", 1_700_000_000);
    let folio = blog.open().await;

    std::fs::remove_file(blog.post_path("b")).unwrap();
    let report = folio.synchronize().await.unwrap();

    assert_eq!(report.removed, 1);
    assert_eq!(folio.ids(), vec!["a"]);
    assert!(folio.fetch_item("b").await.unwrap_err().is_not_found());
    assert_eq!(blog.artifacts(), vec!["20240101000000.1700000000000.a.json"]);
}

#[tokio::test]
async fn test_synchronize_is_idempotent() {
    let blog = Blog::new(5);
    blog.write_post("a", "2024-01-01", "First", 1_700_000_000);
    blog.write_post("b", "2024-01-02", "Second", 1_700_000_000);

    let folio = blog.open().await;
    let before = blog.artifacts();

    let report = folio.synchronize().await.unwrap();
    assert!(report.is_clean());
    assert_eq!(blog.artifacts(), before);
}

#[tokio::test]
async fn test_reload_from_artifacts_round_trips() {
    let blog = Blog::new(5);
    for (n, day) in ["03", "01", "07", "05"].iter().enumerate() {
        blog.write_post(
            &format!("post-{}", n),
            &format!("2024-02-{}", day),
            "Body",
            1_700_000_000,
        );
    }

    let fresh = blog.open().await;
    let reloaded = blog.open().await;

    assert_eq!(reloaded.ids(), fresh.ids());
    assert_eq!(reloaded.ids(), vec!["post-2", "post-3", "post-0", "post-1"]);
    let report = assert_ok!(reloaded.synchronize().await);
    assert!(report.is_clean());
}

#[tokio::test]
async fn test_modified_source_is_rerendered() {
    let blog = Blog::new(5);
    blog.write_post("a", "2024-01-01", "Old body", 1_700_000_000);
    let folio = blog.open().await;

    // Populate both lookup caches
    assert_eq!(folio.fetch_item("a").await.unwrap().content, "<p>Old body</p>");
    assert_eq!(folio.fetch_page(1).await.unwrap().items[0].content, "<p>Old body</p>");

    blog.write_post("a", "2024-01-01", "New body", 1_700_000_100);
    let report = folio.synchronize().await.unwrap();
    assert_eq!(report.modified, 1);

    assert_eq!(folio.fetch_item("a").await.unwrap().content, "<p>New body</p>");
    assert_eq!(folio.fetch_page(1).await.unwrap().items[0].content, "<p>New body</p>");
    assert_eq!(blog.artifacts(), vec!["20240101000000.1700000100000.a.json"]);
}

#[tokio::test]
async fn test_live_events_update_pages() {
    let blog = Blog::new(2);
    blog.write_post("a", "2024-01-01", "A", 1_700_000_000);
    blog.write_post("b", "2024-01-02", "B", 1_700_000_000);
    let folio = blog.open().await;

    let page = folio.fetch_page(1).await.unwrap();
    assert_eq!(page.page_count, 1);

    let path = blog.write_post("c", "2024-01-03", "C", 1_700_000_000);
    let applied = folio.dispatch(ChangeEvent::new(&path, ChangeKind::Create)).await;
    assert_eq!(applied, Applied::Inserted { id: "c".to_string(), pos: 0 });

    let page = folio.fetch_page(1).await.unwrap();
    let ids: Vec<&str> = page.items.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["c", "b"]);
    assert_eq!(page.page_count, 2);

    std::fs::rename(&path, blog.post_path("d")).unwrap();
    folio.dispatch(ChangeEvent::new(&path, ChangeKind::MovedFrom)).await;
    folio
        .dispatch(ChangeEvent::new(blog.post_path("d"), ChangeKind::MovedTo))
        .await;

    assert_eq!(folio.ids(), vec!["d", "b", "a"]);
    assert!(folio.fetch_item("c").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_paging_edges() {
    let blog = Blog::new(3);
    for day in 1..=7 {
        blog.write_post(
            &format!("p{}", day),
            &format!("2024-03-{:02}", day),
            "Body",
            1_700_000_000,
        );
    }
    let folio = blog.open().await;
    assert_eq!(folio.page_count(), 3);

    let first = folio.fetch_page(1).await.unwrap();
    let ids: Vec<&str> = first.items.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["p7", "p6", "p5"]);

    let last = folio.fetch_page(3).await.unwrap();
    assert_eq!(last.items.len(), 1);
    assert_eq!(last.items[0].id, "p1");

    let zero = folio.fetch_page(0).await.unwrap();
    assert_eq!(zero.page, 1);
    assert_eq!(zero.items.len(), 3);

    let past_end = folio.fetch_page(9).await.unwrap();
    assert!(past_end.items.is_empty());
    assert_eq!(past_end.page_count, 3);
}

#[tokio::test]
async fn test_missing_item_is_not_found() {
    let blog = Blog::new(5);
    let folio = blog.open().await;

    let err = assert_err!(folio.fetch_item("missing").await);
    assert!(err.is_not_found());
    assert_eq!(folio.page_count(), 0);
    assert!(folio.fetch_page(1).await.unwrap().items.is_empty());
}

#[tokio::test]
async fn test_load_cleans_up_artifacts() {
    let blog = Blog::new(5);
    std::fs::create_dir_all(cache_dir(&blog)).unwrap();
    let artifact = r#"{"id":"a","attributes":{},"content":"<p>x</p>","preview":"<p>x</p>"}"#;
    std::fs::write(cache_dir(&blog).join("20240101000000.1.a.json"), artifact).unwrap();
    std::fs::write(cache_dir(&blog).join("20240105000000.2.a.json"), artifact).unwrap();
    std::fs::write(cache_dir(&blog).join("not-an-artifact.json"), "{}").unwrap();

    let folio = Folio::load(blog.settings.clone(), Arc::new(PlainTextRenderer::new()))
        .await
        .unwrap();

    assert_eq!(folio.ids(), vec!["a"]);
    assert_eq!(
        folio.metadata("a").unwrap().cache_key,
        "20240105000000.2.a.json"
    );
    assert_eq!(
        blog.artifacts(),
        vec!["20240105000000.2.a.json", "not-an-artifact.json"]
    );
}

#[tokio::test]
async fn test_missing_date_falls_back_to_mtime() {
    let blog = Blog::new(5);
    let path = blog.post_path("undated");
    std::fs::write(&path, "title: Undated\n\nBody").unwrap();
    // 2023-11-14T22:13:20Z
    filetime::set_file_mtime(&path, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();

    let folio = blog.open().await;
    assert_eq!(
        folio.metadata("undated").unwrap().cache_key,
        "20231114221320.1700000000000.undated.json"
    );
}

#[tokio::test]
async fn test_instances_are_independent() {
    let first = Blog::new(5);
    let second = Blog::new(5);
    first.write_post("only-here", "2024-01-01", "Body", 1_700_000_000);

    let a = first.open().await;
    let b = second.open().await;

    assert_eq!(a.item_count(), 1);
    assert_eq!(b.item_count(), 0);
}

#[tokio::test]
async fn test_failed_rerender_keeps_previous_state() {
    let blog = Blog::new(5);
    let path = blog.write_post("a", "2024-01-01", "Old body", 1_700_000_000);
    let renderer = Arc::new(FlakyRenderer::default());
    let folio = Folio::open(blog.settings.clone(), renderer.clone()).await.unwrap();

    let before = folio.metadata("a").unwrap();
    let artifacts = blog.artifacts();
    assert_eq!(folio.fetch_item("a").await.unwrap().content, "<p>Old body</p>");

    renderer.failing.store(true, Ordering::SeqCst);
    blog.write_post("a", "2024-01-01", "New body", 1_700_000_100);
    let applied = folio.dispatch(ChangeEvent::new(&path, ChangeKind::Modify)).await;

    assert_eq!(applied, Applied::Skipped);
    assert_eq!(folio.metadata("a"), Some(before));
    assert_eq!(blog.artifacts(), artifacts);
    assert_eq!(folio.fetch_item("a").await.unwrap().content, "<p>Old body</p>");
    assert_eq!(folio.fetch_page(1).await.unwrap().items[0].content, "<p>Old body</p>");

    // The stale mtime is picked up again once rendering recovers
    renderer.failing.store(false, Ordering::SeqCst);
    let report = folio.synchronize().await.unwrap();
    assert_eq!(report.modified, 1);
    assert_eq!(folio.fetch_item("a").await.unwrap().content, "<p>New body</p>");
}
