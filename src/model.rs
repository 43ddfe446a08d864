//! Bookmark document model
//!
//! A bookmark export is a forest: the `Document` holds the root-level nodes in
//! file order, and every folder keeps its children in file order.

use serde::{Deserialize, Serialize};

/// A single entry in the bookmark tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BookmarkNode {
    Link {
        title: String,
        url: String,
    },
    Folder {
        title: String,
        children: Vec<BookmarkNode>,
    },
}

impl BookmarkNode {
    pub fn link(title: impl Into<String>, url: impl Into<String>) -> Self {
        BookmarkNode::Link {
            title: title.into(),
            url: url.into(),
        }
    }

    pub fn folder(title: impl Into<String>, children: Vec<BookmarkNode>) -> Self {
        BookmarkNode::Folder {
            title: title.into(),
            children,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            BookmarkNode::Link { title, .. } | BookmarkNode::Folder { title, .. } => title,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, BookmarkNode::Folder { .. })
    }

    /// Children of a folder; links have none
    pub fn children(&self) -> &[BookmarkNode] {
        match self {
            BookmarkNode::Folder { children, .. } => children,
            BookmarkNode::Link { .. } => &[],
        }
    }
}

/// Ordered sequence of root-level nodes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    pub roots: Vec<BookmarkNode>,
}

impl Document {
    pub fn new(roots: Vec<BookmarkNode>) -> Self {
        Self { roots }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of links anywhere in the tree (including ones with an empty URL)
    pub fn link_count(&self) -> usize {
        fn count(nodes: &[BookmarkNode]) -> usize {
            nodes
                .iter()
                .map(|n| match n {
                    BookmarkNode::Link { .. } => 1,
                    BookmarkNode::Folder { children, .. } => count(children),
                })
                .sum()
        }
        count(&self.roots)
    }

    /// Number of folders anywhere in the tree
    pub fn folder_count(&self) -> usize {
        fn count(nodes: &[BookmarkNode]) -> usize {
            nodes
                .iter()
                .map(|n| match n {
                    BookmarkNode::Link { .. } => 0,
                    BookmarkNode::Folder { children, .. } => 1 + count(children),
                })
                .sum()
        }
        count(&self.roots)
    }
}

/// Link stripped of folder context; the unit sent for categorization
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlatLinkRecord {
    pub title: String,
    pub url: String,
}

/// A link as returned by the categorization service.
///
/// `category` is optional on the wire: records without a usable category are
/// dropped during grouping rather than rejected while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizedRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, rename = "subCategory", skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<String>,
}

impl CategorizedRecord {
    pub fn new(title: impl Into<String>, url: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            category: Some(category.into()),
            sub_category: None,
        }
    }

    pub fn with_sub_category(mut self, sub_category: impl Into<String>) -> Self {
        self.sub_category = Some(sub_category.into());
        self
    }

    pub fn link(&self) -> FlatLinkRecord {
        FlatLinkRecord {
            title: self.title.clone(),
            url: self.url.clone(),
        }
    }
}
