//! Thumbnail grid and detail panel for one LOT's files.
//!
//! [`Renderer`] owns the selection state derived from a successful lookup.
//! It keeps typed state (cells, image sources, active index) and builds the
//! markup tree on demand, so selecting an item or failing an image load never
//! touches the network and never accumulates stale markup.

pub mod node;
pub mod page;

use tracing::{debug, trace};

use crate::model::types::FileDescriptor;
use node::{Element, Node};

pub const THUMB_CLASS: &str = "thumb";
pub const ACTIVE_CLASS: &str = "active";

/// An image element source with a one-shot fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    src: String,
    fallback: Option<String>,
    fell_back: bool,
}

impl ImageSource {
    pub fn new(src: impl Into<String>, fallback: Option<&str>) -> Self {
        Self {
            src: src.into(),
            fallback: fallback.map(str::to_string),
            fell_back: false,
        }
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    /// Handle a load error. Swaps to the fallback at most once; returns whether
    /// the source changed. A fallback equal to the current source is terminal.
    pub fn fail(&mut self) -> bool {
        if self.fell_back {
            return false;
        }
        self.fell_back = true;
        match self.fallback.as_deref() {
            Some(fallback) if fallback != self.src => {
                self.src = fallback.to_string();
                true
            }
            _ => false,
        }
    }

    fn to_element(&self, alt: &str) -> Element {
        let mut img = Element::new("img").attr("src", &self.src).attr("alt", alt);
        if !self.fell_back
            && let Some(fallback) = self.fallback.as_deref()
        {
            img.set_attr("data-fallback", fallback);
        }
        img
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Thumbnail {
    PdfPlaceholder,
    Image(ImageSource),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridCell {
    pub item: FileDescriptor,
    pub thumbnail: Thumbnail,
}

impl GridCell {
    fn new(item: FileDescriptor) -> Self {
        let thumbnail = if item.is_pdf() {
            Thumbnail::PdfPlaceholder
        } else {
            Thumbnail::Image(ImageSource::new(
                item.thumb_source().unwrap_or_default(),
                item.image_fallback(),
            ))
        };
        Self { item, thumbnail }
    }

    /// Cell title used to locate the initially selected cell.
    pub fn title(&self) -> &str {
        &self.item.name
    }
}

/// Primary content of the detail panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailContent {
    PdfViewer { src: String },
    Image(ImageSource),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Selection {
    index: usize,
    content: DetailContent,
}

/// How grid cells link back to a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellLinks<'a> {
    #[default]
    Plain,
    /// Wrap each cell in a link to `?lot=<lot>&file=<fileId>` on this base.
    Page(&'a url::Url),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renderer {
    lot: String,
    cells: Vec<GridCell>,
    selection: Option<Selection>,
}

impl Renderer {
    /// Build the grid and select `primary` (matched by name) or the first item.
    pub fn render(lot: &str, items: Vec<FileDescriptor>, primary: Option<&FileDescriptor>) -> Self {
        let cells: Vec<GridCell> = items.into_iter().map(GridCell::new).collect();
        let mut renderer = Self {
            lot: lot.to_string(),
            cells,
            selection: None,
        };

        let initial = primary
            .and_then(|p| renderer.position_by_name(&p.name))
            .unwrap_or(0);
        if renderer.cells.is_empty() {
            debug!(lot, "rendered empty grid");
        } else {
            renderer.select(initial);
        }
        renderer
    }

    pub fn lot(&self) -> &str {
        &self.lot
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn active_index(&self) -> Option<usize> {
        self.selection.as_ref().map(|s| s.index)
    }

    pub fn active(&self) -> Option<&FileDescriptor> {
        self.active_index().map(|i| &self.cells[i].item)
    }

    pub fn detail(&self) -> Option<&DetailContent> {
        self.selection.as_ref().map(|s| &s.content)
    }

    fn position_by_name(&self, name: &str) -> Option<usize> {
        self.cells.iter().position(|c| c.title() == name)
    }

    /// Click handler: make `index` the active cell and rebuild the detail panel.
    pub fn select(&mut self, index: usize) -> Option<&FileDescriptor> {
        let item = &self.cells.get(index)?.item;
        let content = if item.is_pdf() {
            DetailContent::PdfViewer {
                src: item.preview.clone(),
            }
        } else {
            DetailContent::Image(ImageSource::new(&item.view, item.image_fallback()))
        };
        trace!(lot = %self.lot, index, name = %item.name, "selected file");
        self.selection = Some(Selection { index, content });
        Some(&self.cells[index].item)
    }

    pub fn select_by_name(&mut self, name: &str) -> Option<&FileDescriptor> {
        let index = self.position_by_name(name)?;
        self.select(index)
    }

    pub fn select_by_file_id(&mut self, file_id: &str) -> Option<&FileDescriptor> {
        let index = self.cells.iter().position(|c| c.item.file_id == file_id)?;
        self.select(index)
    }

    /// Load error on a grid thumbnail. Returns whether the source changed.
    pub fn thumbnail_failed(&mut self, index: usize) -> bool {
        match self.cells.get_mut(index).map(|c| &mut c.thumbnail) {
            Some(Thumbnail::Image(source)) => source.fail(),
            _ => false,
        }
    }

    /// Load error on the detail image. Returns whether the source changed.
    pub fn detail_image_failed(&mut self) -> bool {
        match self.selection.as_mut().map(|s| &mut s.content) {
            Some(DetailContent::Image(source)) => source.fail(),
            _ => false,
        }
    }

    /// Grid followed by the detail panel.
    pub fn to_nodes(&self, links: CellLinks<'_>) -> Vec<Node> {
        vec![self.grid(links).into(), self.panel().into()]
    }

    pub fn grid(&self, links: CellLinks<'_>) -> Element {
        let mut grid = Element::new("div").class("grid");
        for (index, cell) in self.cells.iter().enumerate() {
            let card = self.cell_element(index, cell);
            grid = match links {
                CellLinks::Plain => grid.child(card),
                CellLinks::Page(base) => grid.child(
                    Element::new("a")
                        .class("cell-link")
                        .attr("href", cell_href(base, &self.lot, &cell.item.file_id))
                        .child(card),
                ),
            };
        }
        grid
    }

    fn cell_element(&self, index: usize, cell: &GridCell) -> Element {
        let mut card = Element::new("div")
            .class(THUMB_CLASS)
            .attr("title", &cell.item.name)
            .attr("data-index", index.to_string());
        if self.active_index() == Some(index) {
            card.add_class(ACTIVE_CLASS);
        }
        let preview = match &cell.thumbnail {
            Thumbnail::PdfPlaceholder => Element::new("div").class("pdf-tile").text("PDF"),
            Thumbnail::Image(source) => source.to_element("thumb"),
        };
        card.child(preview)
            .child(Element::new("div").class("name").class("mono").text(&cell.item.name))
    }

    /// Links block plus the embedded viewer or image; empty without a selection.
    pub fn panel(&self) -> Element {
        let mut panel = Element::new("div").class("panel");
        let Some(selection) = &self.selection else {
            return panel;
        };
        let item = &self.cells[selection.index].item;

        let links = Element::new("div")
            .class("links")
            .child(
                Element::new("div")
                    .text("LOT ")
                    .child(Element::new("strong").text(&self.lot)),
            )
            .child(Element::new("span").class("mono").text("FILE_ID:"))
            .child(Node::text(" "))
            .child(Element::new("span").class("mono").class("file-id").text(&item.file_id))
            .child(external_link(&item.open, "Open in Drive"))
            .child(external_link(&item.view, "Direct view"))
            .child(external_link(&item.preview, "Preview URL"));
        panel = panel.child(links);

        let content = match &selection.content {
            DetailContent::PdfViewer { src } => Element::new("embed")
                .class("embed")
                .attr("type", "application/pdf")
                .attr("src", src),
            DetailContent::Image(source) => source
                .to_element("Certificate image")
                .class("detail-image"),
        };
        panel.child(content)
    }
}

fn external_link(href: &str, label: &str) -> Element {
    Element::new("a")
        .attr("href", href)
        .attr("target", "_blank")
        .attr("rel", "noopener")
        .text(label)
}

fn cell_href(base: &url::Url, lot: &str, file_id: &str) -> String {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.query_pairs_mut()
        .append_pair("lot", lot)
        .append_pair("file", file_id);
    match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    }
}
