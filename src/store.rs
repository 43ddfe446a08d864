//! Bookmark store: owns the current document and runs import/organize/export
//!
//! The document is only ever replaced whole. Readers take a snapshot under the
//! lock; an organize run works on its own copy and swaps the result in at the
//! end, so a failed or cancelled run leaves the previous document in place.

use std::fs;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::{info, warn};

use crate::ai_client::CompletionService;
use crate::categorize::{CancelFlag, Categorizer, ChunkOrder, OrganizeOptions, Sleeper, TokioSleeper};
use crate::error::{Error, OrganizeError, Result};
use crate::hierarchy;
use crate::model::{BookmarkNode, Document};
use crate::netscape;

/// Summary of a successful organize run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizeReport {
    /// Links sent for categorization
    pub links: usize,
    /// Records the service returned
    pub categorized: usize,
    /// Records left out for lacking a category
    pub dropped: usize,
    /// Category folders in the new document
    pub folders: usize,
}

#[derive(Debug, Default)]
struct StoreState {
    document: Document,
    loading: bool,
    error: Option<String>,
    options: OrganizeOptions,
}

pub struct BookmarkStore<C, S = TokioSleeper> {
    categorizer: Categorizer<C, S>,
    state: RwLock<StoreState>,
    cancel: CancelFlag,
}

impl<C: CompletionService, S: Sleeper> BookmarkStore<C, S> {
    pub fn new(categorizer: Categorizer<C, S>) -> Self {
        Self {
            categorizer,
            state: RwLock::new(StoreState::default()),
            cancel: CancelFlag::new(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current document
    pub fn document(&self) -> Document {
        self.read().document.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.read().loading
    }

    pub fn last_error(&self) -> Option<String> {
        self.read().error.clone()
    }

    pub fn options(&self) -> OrganizeOptions {
        self.read().options
    }

    pub fn set_options(&self, options: OrganizeOptions) {
        self.write().options = options;
    }

    pub fn set_use_simple_categories(&self, value: bool) {
        self.write().options.use_simple_categories = value;
    }

    pub fn set_clean_titles(&self, value: bool) {
        self.write().options.clean_titles = value;
    }

    pub fn set_chunk_order(&self, order: ChunkOrder) {
        self.write().options.chunk_order = order;
    }

    /// Handle that can stop a running `organize` between chunks
    pub fn cancel_handle(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    fn record_failure(&self, err: &Error) {
        let mut state = self.write();
        state.loading = false;
        state.error = Some(err.to_string());
    }

    /// Replace the document with the parsed export. Returns the number of links.
    pub fn import_html(&self, html: &str) -> Result<usize> {
        self.write().loading = true;
        match netscape::parse(html) {
            Ok(document) => {
                let links = document.link_count();
                let mut state = self.write();
                state.document = document;
                state.loading = false;
                state.error = None;
                info!("[Store] Imported {} bookmarks", links);
                Ok(links)
            }
            Err(e) => {
                let err = Error::from(e);
                warn!("[Store] Import failed: {}", err);
                self.record_failure(&err);
                Err(err)
            }
        }
    }

    pub fn import_file(&self, path: &Path) -> Result<usize> {
        let result = netscape::ensure_html(path).and_then(|_| {
            fs::read_to_string(path).map_err(|source| Error::Io {
                path: path.to_path_buf(),
                source,
            })
        });
        match result {
            Ok(html) => self.import_html(&html),
            Err(err) => {
                self.record_failure(&err);
                Err(err)
            }
        }
    }

    pub fn export_html(&self) -> String {
        netscape::generate(&self.read().document)
    }

    pub fn export_file(&self, path: &Path) -> Result<()> {
        netscape::ensure_html(path)?;
        fs::write(path, self.export_html()).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Append a node at the root level
    pub fn add_bookmark(&self, node: BookmarkNode) {
        let mut state = self.write();
        let mut roots = state.document.roots.clone();
        roots.push(node);
        state.document = Document::new(roots);
    }

    /// Flatten, categorize and regroup the current document.
    ///
    /// On success the document is replaced by the organized tree; on any
    /// failure it is left as it was and the error is recorded.
    pub async fn organize(&self) -> Result<OrganizeReport> {
        self.cancel.reset();
        let (document, options) = {
            let mut state = self.write();
            state.loading = true;
            state.error = None;
            (state.document.clone(), state.options)
        };

        match self.run_organize(&document, &options).await {
            Ok((organized, report)) => {
                let mut state = self.write();
                state.document = organized;
                state.loading = false;
                info!(
                    "[Store] Organized {} bookmarks into {} folders ({} dropped)",
                    report.categorized, report.folders, report.dropped
                );
                Ok(report)
            }
            Err(e) => {
                let err = Error::from(e);
                warn!("[Store] Organize failed, keeping previous bookmarks: {}", err);
                self.record_failure(&err);
                Err(err)
            }
        }
    }

    async fn run_organize(
        &self,
        document: &Document,
        options: &OrganizeOptions,
    ) -> std::result::Result<(Document, OrganizeReport), OrganizeError> {
        let links = hierarchy::flatten(document);
        if links.is_empty() {
            return Err(OrganizeError::EmptyInput);
        }

        let categorized = self.categorizer.categorize(&links, options, &self.cancel).await?;
        let grouping = hierarchy::group(&categorized, options)?;

        let folders = grouping
            .document
            .roots
            .first()
            .map(|root| root.children().len())
            .unwrap_or_default();
        let report = OrganizeReport {
            links: links.len(),
            categorized: categorized.len(),
            dropped: grouping.dropped,
            folders,
        };
        Ok((grouping.document, report))
    }
}
