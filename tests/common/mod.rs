#![allow(dead_code)]

use async_trait::async_trait;
use skillet::changes::{Change, ChangesRequest, ChangesResponse, ChangesSource};
use skillet::content::ContentFetcher;
use skillet::index::Shard;
use skillet::language::LanguageIdentify;
use skillet::mapping::MappingDescription;
use skillet::{ControllerConfig, IndexController, Result, SkilletError, WorkerConfig};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Scripted change feed: responses are served in push order, then the feed
/// reports no new changes (same cursor back).
pub struct FakeFeed {
    queue: Mutex<VecDeque<ChangesResponse>>,
    calls: AtomicUsize,
    fail: AtomicBool,
    gate: Option<Arc<tokio::sync::Semaphore>>,
}

impl FakeFeed {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeFeed {
            queue: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            gate: None,
        })
    }

    /// A feed whose calls block until the semaphore hands out a permit.
    pub fn gated(gate: Arc<tokio::sync::Semaphore>) -> Arc<Self> {
        Arc::new(FakeFeed {
            queue: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            gate: Some(gate),
        })
    }

    pub fn push_response(&self, results: Vec<Change>, last_seq: &str) {
        self.queue.lock().unwrap().push_back(ChangesResponse {
            results,
            last_seq: last_seq.to_string(),
        });
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangesSource for FakeFeed {
    async fn changes(&self, _instance: &str, request: &ChangesRequest) -> Result<ChangesResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(SkilletError::Feed("simulated feed outage".to_string()));
        }
        match self.queue.lock().unwrap().pop_front() {
            Some(response) => Ok(response),
            None => Ok(ChangesResponse {
                results: Vec::new(),
                last_seq: request.since.clone(),
            }),
        }
    }
}

/// Extractor fake: bodies registered per document id, fetches counted.
pub struct FakeContent {
    bodies: Mutex<HashMap<String, String>>,
    fetches: AtomicUsize,
}

impl FakeContent {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeContent {
            bodies: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn set_body(&self, doc_id: &str, body: &str) {
        self.bodies
            .lock()
            .unwrap()
            .insert(doc_id.to_string(), body.to_string());
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentFetcher for FakeContent {
    async fn fetch(&self, _instance: &str, doc_id: &str) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .bodies
            .lock()
            .unwrap()
            .get(doc_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Substring-rule identifier: first matching rule wins, `en` otherwise.
pub struct FakeLang {
    rules: Vec<(String, String)>,
}

impl FakeLang {
    pub fn new(rules: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(FakeLang {
            rules: rules
                .iter()
                .map(|(needle, lang)| (needle.to_string(), lang.to_string()))
                .collect(),
        })
    }
}

impl LanguageIdentify for FakeLang {
    fn guess(&self, text: &str, targets: &[String]) -> String {
        for (needle, lang) in &self.rules {
            if text.contains(needle.as_str()) && targets.iter().any(|t| t == lang) {
                return lang.clone();
            }
        }
        "en".to_string()
    }
}

pub struct TestBed {
    pub dir: TempDir,
    pub controller: Arc<IndexController>,
    pub feed: Arc<FakeFeed>,
    pub content: Arc<FakeContent>,
}

impl TestBed {
    pub fn root(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    /// Write an instance's config.yml before the controller first sees it.
    pub fn write_config(&self, instance: &str, yaml: &str) {
        let dir = self.root().join(instance);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.yml"), yaml).unwrap();
    }

    pub fn shard_dir(&self, instance: &str, lang: &str, doc_type: &str) -> PathBuf {
        self.root().join(instance).join(lang).join(doc_type)
    }

    /// Reopen a shard read-only for assertions.
    pub fn shard(&self, instance: &str, lang: &str, doc_type: &str) -> Shard {
        let dir = self.shard_dir(instance, lang, doc_type);
        assert!(
            dir.join("meta.json").exists(),
            "shard {} does not exist",
            dir.display()
        );
        let description =
            MappingDescription::from_json(&serde_json::json!({"name": "textField"})).unwrap();
        let (shard, created) = Shard::open_or_create(&dir, &description, lang, false).unwrap();
        assert!(!created);
        shard
    }
}

/// Standard fixture: a photos docType and a files docType, a scripted feed,
/// a fake extractor, and a substring language identifier that routes
/// "Bonjour" text to fr. The read side points at a closed port.
pub fn testbed_with(feed: Arc<FakeFeed>, worker: WorkerConfig) -> TestBed {
    let dir = TempDir::new().unwrap();

    let mapping_dir = dir.path().join("mappings");
    std::fs::create_dir_all(&mapping_dir).unwrap();
    std::fs::write(
        mapping_dir.join("photos.json"),
        r#"{"name": "textField"}"#,
    )
    .unwrap();
    std::fs::write(
        mapping_dir.join("files.json"),
        r#"{"name": "textField", "md5sum": "storeField"}"#,
    )
    .unwrap();

    let mut config = ControllerConfig::new(
        dir.path().join("data"),
        mapping_dir,
        "http://127.0.0.1:9".to_string(),
    );
    config.worker = worker;

    let content = FakeContent::new();
    let lang_id = FakeLang::new(&[("Bonjour", "fr"), ("bonjour", "fr")]);
    let controller =
        IndexController::new(config, feed.clone(), content.clone(), lang_id);

    TestBed {
        dir,
        controller,
        feed,
        content,
    }
}

pub fn testbed() -> TestBed {
    testbed_with(FakeFeed::new(), WorkerConfig::default())
}

pub fn change(id: &str, doc: serde_json::Value) -> Change {
    Change {
        id: id.to_string(),
        deleted: false,
        doc: doc.as_object().cloned().unwrap_or_default(),
    }
}

/// Poll until `probe` holds or the timeout elapses.
pub async fn wait_until(probe: impl Fn() -> bool) {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while std::time::Instant::now() < deadline {
        if probe() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within timeout");
}

#[allow(dead_code)]
pub fn shard_exists(dir: &Path) -> bool {
    dir.join("meta.json").exists()
}
