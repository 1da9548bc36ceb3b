//! Shared helpers for integration tests: a tiny PDF writer, a scripted
//! chat model that records every request, and processor construction.

#![allow(dead_code)]

use async_trait::async_trait;
use lease_compare::{
    ChatModel, ChatRequest, DocumentProcessor, ModelError, PipelineObserver, ProcessorConfig,
    Stage,
};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

// ── PDF fixtures ─────────────────────────────────────────────────────────────

/// Build a valid PDF with one page per entry in `pages`, each showing its
/// text in Helvetica. An empty slice produces a zero-page document.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let n = pages.len();
    // Object layout: 1 catalog, 2 pages, 3 font, then (page, content) pairs.
    let mut objects: Vec<String> = Vec::new();
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 4 + 2 * i)).collect();
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        n
    ));
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());
    for (i, text) in pages.iter().enumerate() {
        let content_id = 5 + 2 * i;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {content_id} 0 R >>"
        ));
        let stream = format!("BT /F1 18 Tf 72 720 Td ({}) Tj ET", escape_pdf(text));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for off in offsets {
        out.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        )
        .as_bytes(),
    );
    out
}

fn escape_pdf(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

/// Skip this test when no pdfium library can be bound.
#[macro_export]
macro_rules! pdfium_or_skip {
    () => {
        if let Err(e) = lease_compare::pipeline::render::pdfium_available(None) {
            println!("SKIP: pdfium not available ({e})");
            return;
        }
    };
}

// ── Scripted model ───────────────────────────────────────────────────────────

/// Replays canned replies in order and records every request it receives.
/// Once the script runs out every call fails with a transport error.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, ModelError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<String, ModelError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ModelError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Transport("script exhausted".into())))
    }
}

// ── Observer ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct StageLog {
    pub events: Mutex<Vec<(String, Stage)>>,
    pub pages: Mutex<Vec<(String, usize)>>,
    pub completed: Mutex<Vec<(String, bool)>>,
}

impl StageLog {
    pub fn stages_for(&self, document: &str) -> Vec<Stage> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(d, _)| d == document)
            .map(|(_, s)| *s)
            .collect()
    }
}

impl PipelineObserver for StageLog {
    fn on_stage(&self, document: &str, stage: Stage) {
        self.events.lock().unwrap().push((document.to_string(), stage));
    }

    fn on_pages(&self, document: &str, page_count: usize) {
        self.pages.lock().unwrap().push((document.to_string(), page_count));
    }

    fn on_complete(&self, document: &str, success: bool) {
        self.completed
            .lock()
            .unwrap()
            .push((document.to_string(), success));
    }
}

// ── Processor construction ───────────────────────────────────────────────────

/// A processor backed by `model`, with workspaces under `root` and no
/// retry delays.
pub fn processor(model: Arc<ScriptedModel>, root: &Path) -> DocumentProcessor {
    processor_with_observer(model, root, None)
}

pub fn processor_with_observer(
    model: Arc<ScriptedModel>,
    root: &Path,
    observer: Option<Arc<StageLog>>,
) -> DocumentProcessor {
    let mut builder = ProcessorConfig::builder()
        .chat_model(model)
        .workspace_root(root)
        .max_retries(0)
        .retry_backoff_ms(0)
        .dpi(72);
    if let Some(o) = observer {
        builder = builder.observer(o);
    }
    DocumentProcessor::new(builder.build().unwrap()).unwrap()
}

/// Entries left under the workspace root.
pub fn leftover_workspaces(root: &Path) -> usize {
    match std::fs::read_dir(root) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}
