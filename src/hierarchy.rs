//! Flattening a bookmark tree and regrouping categorized links into folders
//!
//! `flatten` feeds the categorizer; `group` turns its output into a fresh
//! document with one synthetic root folder:
//!
//! ```text
//! Organized Bookmarks
//! ├── Dev            (category)
//! │   ├── Rust       (sub-category, omitted with simple categories)
//! │   │   └── links...
//! │   └── Other
//! └── News
//! ```

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::categorize::OrganizeOptions;
use crate::error::OrganizeError;
use crate::model::{BookmarkNode, CategorizedRecord, Document, FlatLinkRecord};

/// Title of the synthetic root folder produced by `group`
pub const ORGANIZED_ROOT_TITLE: &str = "Organized Bookmarks";

/// Sub-category used when the service returns none (or a blank one)
pub const DEFAULT_SUB_CATEGORY: &str = "Other";

/// Result of regrouping: the new document plus how many records were dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouping {
    pub document: Document,
    pub dropped: usize,
}

/// Every link with a non-empty URL, depth-first, left to right
pub fn flatten(document: &Document) -> Vec<FlatLinkRecord> {
    let mut out = Vec::new();
    flatten_into(&document.roots, &mut out);
    out
}

fn flatten_into(nodes: &[BookmarkNode], out: &mut Vec<FlatLinkRecord>) {
    for node in nodes {
        match node {
            BookmarkNode::Link { title, url } => {
                if !url.is_empty() {
                    out.push(FlatLinkRecord {
                        title: title.clone(),
                        url: url.clone(),
                    });
                }
            }
            BookmarkNode::Folder { children, .. } => flatten_into(children, out),
        }
    }
}

/// Category folders keyed by trimmed category name, in first-seen order
enum Buckets {
    Simple(IndexMap<String, Vec<BookmarkNode>>),
    Nested(IndexMap<String, IndexMap<String, Vec<BookmarkNode>>>),
}

/// Regroup categorized records into a category (and sub-category) hierarchy.
///
/// Records without a usable category are dropped and counted. Fails with
/// `EmptyInput` when there is nothing to group.
pub fn group(records: &[CategorizedRecord], options: &OrganizeOptions) -> Result<Grouping, OrganizeError> {
    if records.is_empty() {
        return Err(OrganizeError::EmptyInput);
    }

    let mut buckets = if options.use_simple_categories {
        Buckets::Simple(IndexMap::new())
    } else {
        Buckets::Nested(IndexMap::new())
    };
    let mut dropped = 0;

    for record in records {
        let Some(category) = record
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
        else {
            warn!("[Group] Dropping bookmark without a category: {} ({})", record.title, record.url);
            dropped += 1;
            continue;
        };

        let title = if options.clean_titles {
            record.title.trim().to_string()
        } else {
            record.title.clone()
        };
        let link = BookmarkNode::Link {
            title,
            url: record.url.clone(),
        };

        match &mut buckets {
            Buckets::Simple(map) => {
                map.entry(category.to_string()).or_default().push(link);
            }
            Buckets::Nested(map) => {
                let sub = record
                    .sub_category
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .unwrap_or(DEFAULT_SUB_CATEGORY);
                map.entry(category.to_string())
                    .or_default()
                    .entry(sub.to_string())
                    .or_default()
                    .push(link);
            }
        }
    }

    if dropped > 0 {
        warn!("[Group] {} of {} bookmarks had no category and were left out", dropped, records.len());
    }

    let folders: Vec<BookmarkNode> = match buckets {
        Buckets::Simple(map) => map
            .into_iter()
            .map(|(category, links)| BookmarkNode::folder(capitalize_first_char(&category), links))
            .collect(),
        Buckets::Nested(map) => map
            .into_iter()
            .map(|(category, subs)| {
                let children = subs
                    .into_iter()
                    .map(|(sub, links)| BookmarkNode::folder(sub, links))
                    .collect();
                BookmarkNode::folder(capitalize_first_char(&category), children)
            })
            .collect(),
    };

    if folders.is_empty() {
        return Err(OrganizeError::EmptyInput);
    }

    debug!("[Group] Built {} category folders", folders.len());
    Ok(Grouping {
        document: Document::new(vec![BookmarkNode::folder(ORGANIZED_ROOT_TITLE, folders)]),
        dropped,
    })
}

/// Capitalize first character of a string
fn capitalize_first_char(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(c) => c.to_uppercase().chain(chars).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netscape;
    use std::collections::HashSet;

    fn simple() -> OrganizeOptions {
        OrganizeOptions {
            use_simple_categories: true,
            ..OrganizeOptions::default()
        }
    }

    fn link(title: &str, url: &str) -> BookmarkNode {
        BookmarkNode::link(title, url)
    }

    #[test]
    fn test_flatten_depth_first_order() {
        let html = r#"<DL><p>
            <DT><H3>Work</H3>
            <DL><p>
                <DT><A HREF="https://a.com">A</A>
                <DT><A HREF="https://b.com">B</A>
            </DL><p>
            <DT><A HREF="https://c.com">C</A>
        </DL><p>"#;
        let doc = netscape::parse(html).unwrap();
        let titles: Vec<String> = flatten(&doc).into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_flatten_skips_empty_urls() {
        let doc = Document::new(vec![
            link("No url", ""),
            BookmarkNode::folder("F", vec![link("Inner", "https://i.com"), link("Blank", "")]),
        ]);
        let flat = flatten(&doc);
        assert_eq!(flat, vec![FlatLinkRecord { title: "Inner".into(), url: "https://i.com".into() }]);
    }

    #[test]
    fn test_group_simple_categories() {
        let records = vec![
            CategorizedRecord::new("A", "https://a.com", "Dev"),
            CategorizedRecord::new("B", "https://b.com", "Dev"),
            CategorizedRecord::new("C", "https://c.com", "News"),
        ];
        let grouping = group(&records, &simple()).unwrap();
        assert_eq!(grouping.dropped, 0);
        assert_eq!(
            grouping.document,
            Document::new(vec![BookmarkNode::folder(
                ORGANIZED_ROOT_TITLE,
                vec![
                    BookmarkNode::folder("Dev", vec![link("A", "https://a.com"), link("B", "https://b.com")]),
                    BookmarkNode::folder("News", vec![link("C", "https://c.com")]),
                ]
            )])
        );

        // Simple mode never nests sub-folders
        for category in grouping.document.roots[0].children() {
            assert!(category.children().iter().all(|c| !c.is_folder()));
        }
    }

    #[test]
    fn test_group_nested_sub_categories() {
        let records = vec![
            CategorizedRecord::new("A", "https://a.com", "dev").with_sub_category("Rust"),
            CategorizedRecord::new("B", "https://b.com", " dev ").with_sub_category(" "),
            CategorizedRecord::new("C", "https://c.com", "dev"),
            CategorizedRecord::new("D", "https://d.com", "dev").with_sub_category("Rust"),
        ];
        let grouping = group(&records, &OrganizeOptions::default()).unwrap();
        let root = &grouping.document.roots[0];
        assert_eq!(root.children().len(), 1);

        let dev = &root.children()[0];
        assert_eq!(dev.title(), "Dev");
        assert_eq!(
            dev.children(),
            &[
                BookmarkNode::folder("Rust", vec![link("A", "https://a.com"), link("D", "https://d.com")]),
                BookmarkNode::folder(
                    DEFAULT_SUB_CATEGORY,
                    vec![link("B", "https://b.com"), link("C", "https://c.com")]
                ),
            ]
        );
        assert!(dev.children().iter().all(|c| c.is_folder()));
    }

    #[test]
    fn test_group_categories_are_case_sensitive() {
        let records = vec![
            CategorizedRecord::new("A", "https://a.com", "dev"),
            CategorizedRecord::new("B", "https://b.com", "Dev"),
        ];
        let grouping = group(&records, &simple()).unwrap();
        // Two buckets, both displayed capitalized
        let titles: Vec<&str> = grouping.document.roots[0].children().iter().map(|c| c.title()).collect();
        assert_eq!(titles, vec!["Dev", "Dev"]);
    }

    #[test]
    fn test_group_drops_records_without_category() {
        let mut missing = CategorizedRecord::new("X", "https://x.com", "");
        missing.category = None;
        let records = vec![
            CategorizedRecord::new("A", "https://a.com", "Dev"),
            missing,
            CategorizedRecord::new("Y", "https://y.com", "   "),
        ];
        let grouping = group(&records, &simple()).unwrap();
        assert_eq!(grouping.dropped, 2);
        assert_eq!(flatten(&grouping.document).len(), 1);
    }

    #[test]
    fn test_group_clean_titles_trims() {
        let records = vec![CategorizedRecord::new("  Padded  ", "https://a.com", "Dev")];
        let options = OrganizeOptions {
            use_simple_categories: true,
            clean_titles: true,
            ..OrganizeOptions::default()
        };
        let grouping = group(&records, &options).unwrap();
        assert_eq!(grouping.document.roots[0].children()[0].children()[0].title(), "Padded");

        let untouched = group(&records, &simple()).unwrap();
        assert_eq!(untouched.document.roots[0].children()[0].children()[0].title(), "  Padded  ");
    }

    #[test]
    fn test_group_empty_input() {
        assert!(matches!(group(&[], &simple()), Err(OrganizeError::EmptyInput)));

        let mut only_missing = CategorizedRecord::new("X", "https://x.com", "");
        only_missing.category = None;
        assert!(matches!(group(&[only_missing], &simple()), Err(OrganizeError::EmptyInput)));
    }

    #[test]
    fn test_flatten_of_group_preserves_link_set() {
        let records: Vec<CategorizedRecord> = (0..12)
            .map(|i| {
                CategorizedRecord::new(format!("T{i}"), format!("https://{i}.example"), ["Dev", "News", "Shop"][i % 3])
                    .with_sub_category(["x", "y"][i % 2])
            })
            .collect();
        let expected: HashSet<FlatLinkRecord> = records.iter().map(|r| r.link()).collect();

        for options in [simple(), OrganizeOptions::default()] {
            let grouping = group(&records, &options).unwrap();
            let flat = flatten(&grouping.document);
            assert_eq!(flat.len(), records.len());
            assert_eq!(flat.into_iter().collect::<HashSet<_>>(), expected);
        }
    }

    #[test]
    fn test_capitalize_first_char() {
        assert_eq!(capitalize_first_char("news"), "News");
        assert_eq!(capitalize_first_char("éducation"), "Éducation");
        assert_eq!(capitalize_first_char(""), "");
    }
}
