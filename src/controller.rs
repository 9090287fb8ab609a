//! Request lifecycle for LOT lookups.
//!
//! [`QueryController`] owns one page session: the input value, the status
//! line, the results region and the page address. Each lookup trims its
//! input, reports progress, awaits the [`Transport`] and applies the outcome.
//!
//! Overlapping lookups are allowed; a generation counter makes sure only the
//! most recently started one (or a later `clear`) decides what is shown.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::model::types::{FileDescriptor, LookupOutcome, LookupQuery};
use crate::render::node::{Element, Node};
use crate::render::{CellLinks, Renderer, page};
use crate::transport::Transport;
use crate::url_sync::PageAddress;

pub const STATUS_SEARCHING: &str = "Searching…";
pub const STATUS_LOOKUP_FAILED: &str = "Lookup failed";

/// Transient status line text plus an error flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }

    fn to_element(&self) -> Element {
        let mut el = Element::new("div")
            .attr("id", "status")
            .class("status")
            .attr("role", "status")
            .text(&self.text);
        if self.is_error {
            el.add_class("error");
        }
        el
    }
}

/// Inline error shown in the results region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorBlock {
    /// The service answered but reported failure for `lot`.
    Remote { message: String, lot: String },
    /// The request itself failed.
    Transport { detail: String },
}

impl ErrorBlock {
    pub fn to_element(&self) -> Element {
        let block = Element::new("div").class("err");
        match self {
            ErrorBlock::Remote { message, lot } => block
                .text(format!("{message} for LOT "))
                .child(Element::new("span").class("mono").text(lot))
                .text("."),
            ErrorBlock::Transport { detail } => block.text(format!(
                "Lookup error. Check the lookup endpoint deployment and sharing. ({detail})"
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ResultsRegion {
    #[default]
    Empty,
    Error(ErrorBlock),
    Files(Renderer),
}

/// Everything a page session shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageState {
    pub input: String,
    pub input_focused: bool,
    pub status: StatusMessage,
    pub results: ResultsRegion,
    pub address: PageAddress,
}

impl PageState {
    pub fn new(address: PageAddress) -> Self {
        Self {
            input: String::new(),
            input_focused: false,
            status: StatusMessage::default(),
            results: ResultsRegion::Empty,
            address,
        }
    }

    pub fn renderer(&self) -> Option<&Renderer> {
        match &self.results {
            ResultsRegion::Files(renderer) => Some(renderer),
            _ => None,
        }
    }

    /// The results region element alone.
    pub fn results_element(&self, links: CellLinks<'_>) -> Element {
        let mut result = Element::new("div").attr("id", "result");
        match &self.results {
            ResultsRegion::Empty => {}
            ResultsRegion::Error(block) => result = result.child(block.to_element()),
            ResultsRegion::Files(renderer) => {
                for node in renderer.to_nodes(links) {
                    result = result.child(node);
                }
            }
        }
        result
    }

    /// Form, status line and results region.
    pub fn to_nodes(&self, links: CellLinks<'_>) -> Vec<Node> {
        let path = self.address.url().path().to_string();
        let mut input = Element::new("input")
            .attr("id", "lot")
            .attr("name", "lot")
            .attr("placeholder", "Enter LOT")
            .attr("value", &self.input);
        if self.input_focused {
            input.set_attr("autofocus", "autofocus");
        }
        let form = Element::new("form")
            .attr("id", "f")
            .attr("method", "get")
            .attr("action", &path)
            .child(input)
            .child(Element::new("button").attr("type", "submit").text("Search"))
            .child(Element::new("a").attr("id", "clear").attr("href", &path).text("Clear"));

        vec![
            form.into(),
            self.status.to_element().into(),
            self.results_element(links).into(),
        ]
    }

    /// Complete HTML document for this state.
    pub fn to_document(&self, links: CellLinks<'_>) -> String {
        let title = match self.address.read_initial() {
            Some(lot) => format!("LOT {lot}"),
            None => "LOT lookup".to_string(),
        };
        page::document(&title, &self.to_nodes(links))
    }
}

/// What a call to [`QueryController::lookup`] ended up doing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum LookupDisposition {
    /// Blank input; nothing changed.
    Ignored,
    /// A newer lookup or a clear started before this one finished.
    Superseded,
    Found { count: u64 },
    RemoteFailure { message: String },
    TransportFailure { message: String },
}

pub struct QueryController<T> {
    transport: T,
    endpoint: Url,
    state: Mutex<PageState>,
    generation: AtomicU64,
}

impl<T: Transport> QueryController<T> {
    pub fn new(transport: T, endpoint: Url, address: PageAddress) -> Self {
        Self {
            transport,
            endpoint,
            state: Mutex::new(PageState::new(address)),
            generation: AtomicU64::new(0),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Copy of the current page state.
    pub fn snapshot(&self) -> PageState {
        self.state.lock().clone()
    }

    pub fn status(&self) -> StatusMessage {
        self.state.lock().status.clone()
    }

    pub fn address(&self) -> Url {
        self.state.lock().address.url().clone()
    }

    pub fn set_input(&self, value: &str) {
        self.state.lock().input = value.to_string();
    }

    /// Look up the current input value.
    pub async fn submit(&self) -> LookupDisposition {
        let input = self.state.lock().input.clone();
        self.lookup(&input).await
    }

    pub async fn lookup(&self, raw: &str) -> LookupDisposition {
        let Some(query) = LookupQuery::parse(raw) else {
            trace!("ignoring blank lookup");
            return LookupDisposition::Ignored;
        };

        // Bumped under the state lock so a newer lookup's writes always land after ours.
        let generation = {
            let mut state = self.state.lock();
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            state.status = StatusMessage::info(STATUS_SEARCHING);
            state.results = ResultsRegion::Empty;
            generation
        };
        debug!(lot = %query, generation, "lookup started");

        let result = self.transport.fetch(&self.endpoint, &query).await;

        let mut state = self.state.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(lot = %query, generation, "discarding superseded lookup result");
            return LookupDisposition::Superseded;
        }

        let lot = query.as_str();
        match result {
            Ok(LookupOutcome::Found {
                count,
                items,
                primary,
            }) => {
                info!(lot, generation, count, items = items.len(), "lookup found files");
                state.status = StatusMessage::info(format!("Found {count} file(s)"));
                state.results = ResultsRegion::Files(Renderer::render(lot, items, primary.as_ref()));
                state.address.update(lot);
                LookupDisposition::Found { count }
            }
            Ok(LookupOutcome::Failed { reason }) => {
                let message = reason.message().to_string();
                info!(lot, generation, reason = %message, "lookup reported failure");
                state.status = StatusMessage::error(&message);
                state.results = ResultsRegion::Error(ErrorBlock::Remote {
                    message: message.clone(),
                    lot: lot.to_string(),
                });
                state.address.update(lot);
                LookupDisposition::RemoteFailure { message }
            }
            Err(err) => {
                let message = err.to_string();
                warn!(lot, generation, error = %message, "lookup transport failed");
                state.status = StatusMessage::error(STATUS_LOOKUP_FAILED);
                state.results = ResultsRegion::Error(ErrorBlock::Transport {
                    detail: message.clone(),
                });
                LookupDisposition::TransportFailure { message }
            }
        }
    }

    /// Clear input, results and status; drop `lot` from the address.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        self.generation.fetch_add(1, Ordering::SeqCst);
        state.input.clear();
        state.results = ResultsRegion::Empty;
        state.status = StatusMessage::default();
        state.address.update("");
        state.input_focused = true;
        debug!("cleared page");
    }

    /// Page load: run the lookup named by the address, or focus the input.
    pub async fn boot(&self) -> LookupDisposition {
        let initial = {
            let mut state = self.state.lock();
            match state.address.read_initial() {
                Some(lot) => {
                    state.input = lot.clone();
                    Some(lot)
                }
                None => {
                    state.input_focused = true;
                    None
                }
            }
        };
        match initial {
            Some(lot) => self.lookup(&lot).await,
            None => LookupDisposition::Ignored,
        }
    }

    fn with_renderer<R>(&self, f: impl FnOnce(&mut Renderer) -> R) -> Option<R> {
        let mut state = self.state.lock();
        match &mut state.results {
            ResultsRegion::Files(renderer) => Some(f(renderer)),
            _ => None,
        }
    }

    /// Grid click on cell `index`.
    pub fn select(&self, index: usize) -> Option<FileDescriptor> {
        self.with_renderer(|r| r.select(index).cloned()).flatten()
    }

    pub fn select_by_name(&self, name: &str) -> Option<FileDescriptor> {
        self.with_renderer(|r| r.select_by_name(name).cloned()).flatten()
    }

    pub fn select_by_file_id(&self, file_id: &str) -> Option<FileDescriptor> {
        self.with_renderer(|r| r.select_by_file_id(file_id).cloned()).flatten()
    }

    pub fn thumbnail_failed(&self, index: usize) -> bool {
        self.with_renderer(|r| r.thumbnail_failed(index)).unwrap_or(false)
    }

    pub fn detail_image_failed(&self) -> bool {
        self.with_renderer(Renderer::detail_image_failed).unwrap_or(false)
    }
}
