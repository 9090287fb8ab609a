use lot_lookup::model::types::{FailureReason, FileDescriptor, LookupOutcome, LookupQuery};
use lot_lookup::transport::{Transport, TransportError};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use url::Url;

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: Arc<Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

struct TestWriter(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Deterministic file descriptor builder.
#[derive(Debug, Clone)]
pub struct FileFixture {
    file: FileDescriptor,
}

#[allow(dead_code)]
impl FileFixture {
    pub fn new(name: &str) -> Self {
        Self {
            file: FileDescriptor {
                file_id: format!("id-{name}"),
                name: name.to_string(),
                open: format!("https://drive.example/{name}/open"),
                view: format!("https://drive.example/{name}/view"),
                preview: format!("https://drive.example/{name}/preview"),
                thumb: Some(format!("https://drive.example/{name}/thumb")),
                image: Some(format!("https://images.example/{name}")),
            },
        }
    }

    pub fn view(mut self, url: &str) -> Self {
        self.file.view = url.to_string();
        self
    }

    pub fn image(mut self, url: Option<&str>) -> Self {
        self.file.image = url.map(str::to_string);
        self
    }

    pub fn build(self) -> FileDescriptor {
        self.file
    }
}

#[allow(dead_code)]
pub fn found(items: Vec<FileDescriptor>, primary: Option<FileDescriptor>) -> LookupOutcome {
    LookupOutcome::Found {
        count: items.len() as u64,
        items,
        primary,
    }
}

#[allow(dead_code)]
pub fn not_found() -> LookupOutcome {
    LookupOutcome::Failed {
        reason: FailureReason::NotFound,
    }
}

#[allow(dead_code)]
pub fn endpoint() -> Url {
    Url::parse("https://lookup.example/exec").unwrap()
}

pub type Reply = Result<LookupOutcome, TransportError>;

/// Transport whose replies are released by the test through oneshot senders,
/// recording every LOT it is asked for.
#[derive(Clone, Default)]
pub struct GatedTransport {
    calls: Arc<Mutex<Vec<String>>>,
    pending: Arc<Mutex<VecDeque<oneshot::Receiver<Reply>>>>,
}

#[allow(dead_code)]
impl GatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply slot for the next fetch; send on the returned handle to resolve it.
    pub fn expect_call(&self) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().push_back(rx);
        tx
    }

    /// Queue an immediate reply for the next fetch.
    pub fn reply(&self, reply: Reply) {
        let _ = self.expect_call().send(reply);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transport for GatedTransport {
    fn fetch(
        &self,
        _endpoint: &Url,
        query: &LookupQuery,
    ) -> impl Future<Output = Reply> + Send {
        self.calls.lock().unwrap().push(query.as_str().to_string());
        let slot = self.pending.lock().unwrap().pop_front();
        async move {
            match slot {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(TransportError::Load("reply dropped".into()))),
                None => Err(TransportError::Load("unexpected fetch".into())),
            }
        }
    }
}
