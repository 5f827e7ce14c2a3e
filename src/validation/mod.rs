//! Background diagnostics for open documents.
//!
//! Edits are debounced per document; the last edit in a burst is checked
//! with evi and the results land in a [`DiagnosticCollection`]. A missing or
//! unrunnable executable is reported once, then validation pauses until the
//! executable setting changes.

pub mod debounce;
pub mod events;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lsp_types::Diagnostic;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::document::Document;
use crate::lint::ToolSettings;
use crate::lsp::{EviService, LanguageService};

pub use debounce::{DebounceState, Debouncer, DEFAULT_DEBOUNCE};
pub use events::ValidationEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationSettings {
    pub enabled: bool,
    pub debounce: Duration,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Current diagnostics per file.
#[derive(Debug, Default)]
pub struct DiagnosticCollection {
    entries: HashMap<PathBuf, Vec<Diagnostic>>,
}

impl DiagnosticCollection {
    pub fn set(&mut self, file: PathBuf, diagnostics: Vec<Diagnostic>) {
        if diagnostics.is_empty() {
            self.entries.remove(&file);
        } else {
            self.entries.insert(file, diagnostics);
        }
    }

    pub fn get(&self, file: &Path) -> &[Diagnostic] {
        self.entries.get(file).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn delete(&mut self, file: &Path) {
        self.entries.remove(file);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.entries.keys().map(PathBuf::as_path)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct State {
    settings: ValidationSettings,
    paused: bool,
    documents: HashMap<PathBuf, Document>,
    /// Files each document's last successful check reported into.
    published: HashMap<PathBuf, Vec<PathBuf>>,
    collection: DiagnosticCollection,
}

impl State {
    /// Whether `file` is open itself or is still reported into by some
    /// document's last check.
    fn claimed(&self, file: &Path) -> bool {
        self.documents.contains_key(file)
            || self.published.values().any(|files| files.iter().any(|f| f == file))
    }
}

struct Inner {
    service: Arc<EviService>,
    state: Mutex<State>,
    debouncer: Debouncer<PathBuf>,
    event_tx: broadcast::Sender<ValidationEvent>,
}

/// Validation provider. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Validator {
    inner: Arc<Inner>,
}

impl Validator {
    /// The debounce delay is fixed here; `reload` does not change it.
    pub fn new(service: Arc<EviService>, settings: ValidationSettings) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                service,
                state: Mutex::new(State {
                    settings,
                    paused: false,
                    documents: HashMap::new(),
                    published: HashMap::new(),
                    collection: DiagnosticCollection::default(),
                }),
                debouncer: Debouncer::new(settings.debounce),
                event_tx,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ValidationEvent> {
        self.inner.event_tx.subscribe()
    }

    pub async fn did_open(&self, document: Document) {
        self.trigger(document).await;
    }

    pub async fn did_change(&self, document: Document) {
        self.trigger(document).await;
    }

    /// Forget `path`: drop pending work and its diagnostics. A check already
    /// running for it finishes but does not publish.
    ///
    /// Other files its last check reported into keep their entries while
    /// they are open or another document still reports into them.
    pub async fn did_close(&self, path: &Path) {
        self.inner.debouncer.cancel(&path.to_path_buf());
        let mut state = self.inner.state.lock().await;
        if state.documents.remove(path).is_none() {
            return;
        }
        let reported = state.published.remove(path).unwrap_or_default();
        let mut files = vec![path.to_path_buf()];
        files.extend(
            reported
                .into_iter()
                .filter(|f| f != path && !state.claimed(f)),
        );
        for file in &files {
            state.collection.delete(file);
        }
        debug!(document = %path.display(), "closed, diagnostics removed");
        let _ = self.inner.event_tx.send(ValidationEvent::Cleared { files });
    }

    /// Apply new settings and re-check every open document.
    ///
    /// A pause is lifted only when the executable changed.
    pub async fn reload(&self, settings: ValidationSettings, tool_settings: ToolSettings) {
        let bridge = self.inner.service.bridge();
        let executable_changed = bridge.settings().await.executable != tool_settings.executable;
        bridge.reconfigure(tool_settings).await;

        let documents: Vec<Document> = {
            let mut state = self.inner.state.lock().await;
            state.settings = settings;
            if state.paused && executable_changed {
                state.paused = false;
                info!("executable changed, validation resumed");
                let _ = self.inner.event_tx.send(ValidationEvent::Resumed);
            }
            let files: Vec<PathBuf> = state.collection.files().map(Path::to_path_buf).collect();
            state.collection.clear();
            state.published.clear();
            if !files.is_empty() {
                let _ = self.inner.event_tx.send(ValidationEvent::Cleared { files });
            }
            state.documents.values().cloned().collect()
        };

        for document in documents {
            self.trigger(document).await;
        }
    }

    pub async fn diagnostics(&self, file: &Path) -> Vec<Diagnostic> {
        self.inner.state.lock().await.collection.get(file).to_vec()
    }

    pub async fn is_paused(&self) -> bool {
        self.inner.state.lock().await.paused
    }

    pub fn state(&self, path: &Path) -> DebounceState {
        self.inner.debouncer.state(&path.to_path_buf())
    }

    async fn trigger(&self, document: Document) {
        if !document.is_evi() {
            return;
        }
        {
            let mut state = self.inner.state.lock().await;
            state
                .documents
                .insert(document.path.clone(), document.clone());
            if state.paused || !state.settings.enabled {
                return;
            }
        }

        let inner = self.inner.clone();
        self.inner
            .debouncer
            .trigger(document.path.clone(), move || async move {
                inner.validate(document).await;
            });
    }
}

impl Inner {
    async fn validate(&self, document: Document) {
        let result = self.service.diagnostics(&document).await;

        let mut state = self.state.lock().await;
        if !state.documents.contains_key(&document.path) {
            debug!(document = %document.path.display(), "closed while checking, dropped");
            return;
        }

        let groups = match result {
            Ok(groups) => groups,
            Err(e) if e.pauses_validation() => {
                if !state.paused {
                    state.paused = true;
                    warn!("validation paused: {e}");
                    let _ = self.event_tx.send(ValidationEvent::ShowMessage {
                        message: format!(
                            "Cannot validate Evi files: {e}. Set `executable` in the bridge configuration."
                        ),
                        open_settings: true,
                    });
                    let _ = self.event_tx.send(ValidationEvent::Paused);
                }
                return;
            }
            Err(e) => {
                warn!(document = %document.path.display(), "validation failed: {e}");
                return;
            }
        };

        let previous = state
            .published
            .remove(&document.path)
            .unwrap_or_default();
        let mut files = groups;
        if !files.iter().any(|(f, _)| *f == document.path) {
            files.push((document.path.clone(), Vec::new()));
        }
        // Files this document stopped reporting into are blanked, unless
        // they belong to someone else.
        for file in previous {
            if !files.iter().any(|(f, _)| *f == file) && !state.claimed(&file) {
                files.push((file, Vec::new()));
            }
        }

        for (file, diagnostics) in &files {
            state.collection.set(file.clone(), diagnostics.clone());
        }
        state.published.insert(
            document.path.clone(),
            files.iter().map(|(f, _)| f.clone()).collect(),
        );

        debug!(
            document = %document.path.display(),
            files = files.len(),
            "diagnostics published"
        );
        let _ = self.event_tx.send(ValidationEvent::Published {
            document: document.path,
            files,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::{
        LintBridge, LintError, ToolCommand, ToolExecutor, ToolOutput, DEFAULT_GATE_WAIT,
    };
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use tokio::time::sleep;

    /// Replies to get-diagnostics with one error per line of the snapshot
    /// that contains `bad`, or fails as if evi were missing. A line that
    /// contains `include` reports its error into `/src/lib.evi` instead.
    #[derive(Default)]
    struct FakeEvi {
        missing: bool,
        texts: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl ToolExecutor for FakeEvi {
        async fn execute(&self, command: &ToolCommand) -> Result<ToolOutput, LintError> {
            if self.missing {
                return Err(LintError::ToolNotFound(Some(command.program.clone())));
            }
            let snapshot = &command.args[0];
            let text = std::fs::read_to_string(snapshot)?;
            self.texts.lock().unwrap().push(text.clone());
            let entries: Vec<String> = text
                .lines()
                .enumerate()
                .filter(|(_, l)| l.contains("bad") || l.contains("include"))
                .map(|(i, l)| {
                    let file = if l.contains("include") {
                        LIB
                    } else {
                        snapshot.as_str()
                    };
                    format!(
                        r#"{{ "file": "{file}", "line": "{}", "column": "0", "length": "3", "message": "bad", "type": "error", "related": [] }}"#,
                        i + 1
                    )
                })
                .collect();
            Ok(ToolOutput {
                stdout: format!("[{}]", entries.join(",")),
                stderr: String::new(),
            })
        }
    }

    const LIB: &str = "/src/lib.evi";

    fn tools() -> ToolSettings {
        ToolSettings {
            executable: Some("/usr/bin/evi".into()),
            ..Default::default()
        }
    }

    fn validator(evi: FakeEvi) -> (Validator, Arc<FakeEvi>) {
        let evi = Arc::new(evi);
        let bridge = LintBridge::with_executor(tools(), DEFAULT_GATE_WAIT, evi.clone());
        let service = Arc::new(EviService::new(Arc::new(bridge)));
        (Validator::new(service, ValidationSettings::default()), evi)
    }

    fn doc(text: &str) -> Document {
        Document::new("/src/main.evi", text)
    }

    async fn settle() {
        sleep(Duration::from_millis(300)).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_validate_last_text_once() {
        let (v, evi) = validator(FakeEvi::default());
        for i in 0..10 {
            v.did_change(doc(&format!("edit {i}\nbad"))).await;
            sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(v.state(Path::new("/src/main.evi")), DebounceState::Scheduled);
        settle().await;

        assert_eq!(*evi.texts.lock().unwrap(), vec!["edit 9\nbad".to_string()]);
        let diags = v.diagnostics(Path::new("/src/main.evi")).await;
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].range.start.line, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn publish_replaces_previous_results() {
        let (v, _) = validator(FakeEvi::default());
        let mut events = v.subscribe();

        v.did_open(doc("bad\nbad")).await;
        settle().await;
        assert_eq!(v.diagnostics(Path::new("/src/main.evi")).await.len(), 2);

        v.did_change(doc("fine")).await;
        settle().await;
        assert!(v.diagnostics(Path::new("/src/main.evi")).await.is_empty());

        let mut published = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let ValidationEvent::Published { files, .. } = event {
                published.push(files);
            }
        }
        assert_eq!(published.len(), 2);
        assert_eq!(published[1][0].0, PathBuf::from("/src/main.evi"));
        assert!(published[1][0].1.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn close_cancels_pending_and_clears() {
        let (v, evi) = validator(FakeEvi::default());
        v.did_open(doc("bad")).await;
        settle().await;
        assert_eq!(v.diagnostics(Path::new("/src/main.evi")).await.len(), 1);

        v.did_change(doc("bad\nbad")).await;
        v.did_close(Path::new("/src/main.evi")).await;
        assert_eq!(v.state(Path::new("/src/main.evi")), DebounceState::Idle);
        settle().await;

        assert!(v.diagnostics(Path::new("/src/main.evi")).await.is_empty());
        assert_eq!(evi.texts.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn closing_a_document_keeps_other_open_files() {
        let (v, _) = validator(FakeEvi::default());
        v.did_open(Document::new(LIB, "bad")).await;
        v.did_open(doc("include")).await;
        settle().await;
        assert_eq!(v.diagnostics(Path::new(LIB)).await.len(), 1);

        let mut events = v.subscribe();
        v.did_close(Path::new("/src/main.evi")).await;
        assert_eq!(v.diagnostics(Path::new(LIB)).await.len(), 1);
        match events.try_recv() {
            Ok(ValidationEvent::Cleared { files }) => {
                assert_eq!(files, vec![PathBuf::from("/src/main.evi")]);
            }
            other => panic!("expected Cleared, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn closing_the_only_reporter_clears_included_file() {
        let (v, _) = validator(FakeEvi::default());
        v.did_open(doc("include")).await;
        settle().await;
        assert_eq!(v.diagnostics(Path::new(LIB)).await.len(), 1);

        v.did_close(Path::new("/src/main.evi")).await;
        assert!(v.diagnostics(Path::new(LIB)).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_an_include_does_not_blank_an_open_file() {
        let (v, _) = validator(FakeEvi::default());
        v.did_open(doc("include")).await;
        settle().await;
        v.did_open(Document::new(LIB, "bad\nbad")).await;
        settle().await;
        assert_eq!(v.diagnostics(Path::new(LIB)).await.len(), 2);

        v.did_change(doc("fine")).await;
        settle().await;
        assert_eq!(v.diagnostics(Path::new(LIB)).await.len(), 2);
        assert!(v.diagnostics(Path::new("/src/main.evi")).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn non_evi_documents_are_ignored() {
        let (v, evi) = validator(FakeEvi::default());
        v.did_open(doc("bad").with_language("plaintext")).await;
        settle().await;
        assert!(evi.texts.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_tool_pauses_once_until_executable_changes() {
        let (v, _) = validator(FakeEvi {
            missing: true,
            ..Default::default()
        });
        let mut events = v.subscribe();

        v.did_open(doc("bad")).await;
        settle().await;
        assert!(v.is_paused().await);

        // Paused: further edits are not even scheduled.
        v.did_change(doc("bad bad")).await;
        assert_eq!(v.state(Path::new("/src/main.evi")), DebounceState::Idle);

        let mut messages = 0;
        while let Ok(event) = events.try_recv() {
            if let ValidationEvent::ShowMessage { open_settings, .. } = event {
                assert!(open_settings);
                messages += 1;
            }
        }
        assert_eq!(messages, 1);

        // Same executable: still paused.
        v.reload(ValidationSettings::default(), tools()).await;
        assert!(v.is_paused().await);

        // New executable: resumes and re-checks open documents.
        let moved = ToolSettings {
            executable: Some("/opt/evi/bin/evi".into()),
            ..Default::default()
        };
        v.reload(ValidationSettings::default(), moved).await;
        assert!(!v.is_paused().await);
        assert_eq!(v.state(Path::new("/src/main.evi")), DebounceState::Scheduled);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_validation_does_nothing() {
        let (v, evi) = validator(FakeEvi::default());
        v.reload(
            ValidationSettings {
                enabled: false,
                ..Default::default()
            },
            tools(),
        )
        .await;
        v.did_open(doc("bad")).await;
        settle().await;
        assert!(evi.texts.lock().unwrap().is_empty());
    }

    #[test]
    fn collection_basics() {
        let mut c = DiagnosticCollection::default();
        let d = Diagnostic {
            message: "m".into(),
            ..Default::default()
        };
        c.set("/a".into(), vec![d.clone()]);
        c.set("/b".into(), vec![d]);
        assert_eq!(c.get(Path::new("/a")).len(), 1);
        c.delete(Path::new("/a"));
        assert!(c.get(Path::new("/a")).is_empty());
        c.set("/b".into(), vec![]);
        assert!(c.is_empty());
        c.clear();
        assert!(c.files().next().is_none());
    }
}
