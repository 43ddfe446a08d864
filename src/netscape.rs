//! NETSCAPE-Bookmark-file-1 codec
//!
//! Reads the HTML dialect that browser bookmark exporters write and renders a
//! `Document` back into it. Parsing goes through a real HTML5 parser so
//! unbalanced tags are repaired the same way a browser would repair them.
//!
//! Shape of an export after parsing:
//!
//! ```text
//! <H1>Bookmarks</H1>
//! <DL><p>
//!     <DT><H3>Folder</H3>
//!     <DL><p>
//!         <DT><A HREF="https://example.com">Link</A>
//!     </DL><p>
//!     <DT><A HREF="https://example.org">Top-level link</A>
//! </DL><p>
//! ```
//!
//! Each top-level `<DL>` is unwrapped: its entries become the document roots.

use std::fs;
use std::path::Path;

use scraper::{ElementRef, Html};
use tracing::debug;

use crate::error::{Error, ParseError};
use crate::model::{BookmarkNode, Document};

/// Folder title used when a list has no heading in front of it
pub const UNTITLED_FOLDER: &str = "Untitled Folder";

const PROLOGUE: &str = "<!DOCTYPE NETSCAPE-Bookmark-file-1>
<META HTTP-EQUIV=\"Content-Type\" CONTENT=\"text/html; charset=UTF-8\">
<TITLE>Bookmarks</TITLE>
<H1>Bookmarks</H1>
";

const INDENT: &str = "    ";

/// Parse a bookmark export into a `Document`.
///
/// Anything that is not a link or a folder is skipped; only blank input or a
/// document without any `<DL>` list is an error.
pub fn parse(html: &str) -> Result<Document, ParseError> {
    if html.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let doc = Html::parse_document(html);

    let mut lists = Vec::new();
    collect_top_level_lists(doc.root_element(), &mut lists);
    if lists.is_empty() {
        return Err(ParseError::NotABookmarkFile);
    }

    let roots: Vec<BookmarkNode> = lists.into_iter().flat_map(parse_list_entries).collect();

    debug!("[Codec] Parsed {} root entries", roots.len());
    Ok(Document::new(roots))
}

/// Only `.html` files are accepted for import and export
pub fn ensure_html(path: &Path) -> Result<(), Error> {
    let is_html = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("html"));
    if is_html {
        Ok(())
    } else {
        Err(Error::UnsupportedExtension(path.to_path_buf()))
    }
}

/// Read and parse an `.html` export from disk
pub fn read_file(path: &Path) -> Result<Document, Error> {
    ensure_html(path)?;
    let html = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse(&html)?)
}

/// Find every `<DL>` that is not nested inside another `<DL>`
fn collect_top_level_lists<'a>(element: ElementRef<'a>, out: &mut Vec<ElementRef<'a>>) {
    for child in element.children().filter_map(ElementRef::wrap) {
        if tag_is(&child, "dl") {
            out.push(child);
        } else {
            collect_top_level_lists(child, out);
        }
    }
}

/// Entries of one list.
///
/// `<DT>` wrappers hold links, headings and sub-lists. A `<DD>` (folder
/// description) closes the `<DT>` before it, so a folder's `<DL>` can end up
/// inside the `<DD>`; it still takes the heading from that preceding `<DT>`.
fn parse_list_entries(list: ElementRef<'_>) -> Vec<BookmarkNode> {
    let mut nodes = Vec::new();
    let mut heading: Option<String> = None;

    for child in list.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "dt" => {
                heading = None;
                parse_entry(child, &mut heading, &mut nodes);
            }
            "dd" => parse_entry(child, &mut heading, &mut nodes),
            _ => {}
        }
    }

    nodes
}

/// A heading, even an empty one, names the next `<DL>`
fn parse_entry(entry: ElementRef<'_>, heading: &mut Option<String>, nodes: &mut Vec<BookmarkNode>) {
    for child in entry.children().filter_map(ElementRef::wrap) {
        let name = child.value().name();
        if is_heading(name) {
            *heading = Some(text_of(&child));
        } else if name == "a" {
            let url = child.value().attr("href").unwrap_or_default().to_string();
            nodes.push(BookmarkNode::Link {
                title: text_of(&child),
                url,
            });
        } else if name == "dl" {
            let title = heading.take().unwrap_or_else(|| UNTITLED_FOLDER.to_string());
            nodes.push(BookmarkNode::Folder {
                title,
                children: parse_list_entries(child),
            });
        }
    }
}

fn tag_is(element: &ElementRef<'_>, name: &str) -> bool {
    element.value().name() == name
}

fn is_heading(name: &str) -> bool {
    matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

fn text_of(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Render a `Document` as a NETSCAPE-Bookmark-file-1 export.
///
/// Titles and URLs are HTML-escaped so `parse(generate(d))` returns `d`.
pub fn generate(document: &Document) -> String {
    let mut out = String::from(PROLOGUE);
    out.push_str("<DL><p>\n");
    for node in &document.roots {
        render_node(node, 0, &mut out);
    }
    out.push_str("</DL><p>\n");
    out
}

fn render_node(node: &BookmarkNode, level: usize, out: &mut String) {
    let indent = INDENT.repeat(level);
    match node {
        BookmarkNode::Link { title, url } => {
            out.push_str(&format!(
                "{}<DT><A HREF=\"{}\">{}</A>\n",
                indent,
                html_escape::encode_double_quoted_attribute(url),
                html_escape::encode_text(title)
            ));
        }
        BookmarkNode::Folder { title, children } => {
            out.push_str(&format!("{}<DT><H3>{}</H3>\n", indent, html_escape::encode_text(title)));
            out.push_str(&format!("{}<DL><p>\n", indent));
            for child in children {
                render_node(child, level + 1, out);
            }
            out.push_str(&format!("{}</DL><p>\n", indent));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_EXPORT: &str = r#"<!DOCTYPE NETSCAPE-Bookmark-file-1>
<!-- This is an automatically generated file.
     It will be read and overwritten.
     DO NOT EDIT! -->
<META HTTP-EQUIV="Content-Type" CONTENT="text/html; charset=UTF-8">
<TITLE>Bookmarks</TITLE>
<H1>Bookmarks</H1>
<DL><p>
    <DT><H3 ADD_DATE="1700000000" LAST_MODIFIED="1700000001" PERSONAL_TOOLBAR_FOLDER="true">Work</H3>
    <DL><p>
        <DT><A HREF="https://a.com" ADD_DATE="1700000002">A</A>
        <DT><A HREF="https://b.com" ADD_DATE="1700000003">B</A>
    </DL><p>
    <DT><A HREF="https://c.com" ADD_DATE="1700000004">C</A>
</DL><p>
"#;

    fn sample() -> Document {
        Document::new(vec![
            BookmarkNode::folder(
                "Work",
                vec![
                    BookmarkNode::link("A", "https://a.com"),
                    BookmarkNode::link("B", "https://b.com"),
                ],
            ),
            BookmarkNode::link("C", "https://c.com"),
        ])
    }

    #[test]
    fn test_parse_browser_export() {
        let doc = parse(CHROME_EXPORT).unwrap();
        assert_eq!(doc, sample());
    }

    #[test]
    fn test_round_trip_nested_folders() {
        let doc = Document::new(vec![
            BookmarkNode::folder(
                "Dev",
                vec![
                    BookmarkNode::folder(
                        "Rust",
                        vec![
                            BookmarkNode::link("The Book", "https://doc.rust-lang.org/book/"),
                            BookmarkNode::folder("Empty", vec![]),
                        ],
                    ),
                    BookmarkNode::link("Crates", "https://crates.io"),
                ],
            ),
            BookmarkNode::link("News", "https://news.ycombinator.com"),
            BookmarkNode::folder("Later", vec![BookmarkNode::link("Blog", "https://blog.example")]),
        ]);

        let html = generate(&doc);
        assert_eq!(parse(&html).unwrap(), doc);
    }

    #[test]
    fn test_generate_escapes_special_characters() {
        let doc = Document::new(vec![BookmarkNode::folder(
            "R&D <internal>",
            vec![BookmarkNode::link(
                "Tom & Jerry <3 \"quotes\"",
                "https://example.com/search?q=a&b=\"c\"",
            )],
        )]);

        let html = generate(&doc);
        assert!(html.contains("R&amp;D &lt;internal&gt;"));
        assert!(html.contains("Tom &amp; Jerry &lt;3"));
        assert!(!html.contains("q=a&b"));

        assert_eq!(parse(&html).unwrap(), doc);
    }

    #[test]
    fn test_generate_prologue_and_layout() {
        let html = generate(&sample());
        assert!(html.starts_with("<!DOCTYPE NETSCAPE-Bookmark-file-1>\n"));
        assert!(html.contains("<TITLE>Bookmarks</TITLE>"));
        assert!(html.contains("<H1>Bookmarks</H1>"));
        assert!(html.contains("<DT><H3>Work</H3>\n<DL><p>\n    <DT><A HREF=\"https://a.com\">A</A>\n"));
        assert!(html.trim_end().ends_with("</DL><p>"));
    }

    #[test]
    fn test_whitespace_is_not_significant() {
        let compact = "<DL><p><DT><H3>Work</H3><DL><p><DT><A HREF=\"https://a.com\">A</A><DT><A HREF=\"https://b.com\">B</A></DL><p><DT><A HREF=\"https://c.com\">C</A></DL><p>";
        assert_eq!(parse(compact).unwrap(), sample());
    }

    #[test]
    fn test_missing_heading_and_href() {
        let html = "<DL><p><DT><DL><p><DT><A>No link</A></DL><p></DL>";
        let doc = parse(html).unwrap();
        assert_eq!(
            doc,
            Document::new(vec![BookmarkNode::folder(
                UNTITLED_FOLDER,
                vec![BookmarkNode::link("No link", "")]
            )])
        );
    }

    #[test]
    fn test_malformed_html_is_best_effort() {
        // Unclosed anchors, stray tags, and a description (<DD>) that is not a bookmark
        let html = r#"<DL><p>
            <DT><A HREF="https://a.com">A
            <DT><A HREF="https://b.com">B</A>
            <DD>Some description</DD>
            <DT><span>not a bookmark</span>
            <DT><H3>Folder</H3>
            <DL><p>
                <DT><A HREF="https://c.com">C</A>
        "#;
        let doc = parse(html).unwrap();
        let titles: Vec<&str> = doc.roots.iter().map(|n| n.title()).collect();
        assert_eq!(titles, vec!["A", "B", "Folder"]);
        assert_eq!(doc.roots[2].children(), &[BookmarkNode::link("C", "https://c.com")]);
    }

    #[test]
    fn test_parse_firefox_folder_descriptions() {
        let html = r#"<!DOCTYPE NETSCAPE-Bookmark-file-1>
<META HTTP-EQUIV="Content-Type" CONTENT="text/html; charset=UTF-8">
<TITLE>Bookmarks</TITLE>
<H1>Bookmarks Menu</H1>

<DL><p>
    <DT><H3 ADD_DATE="1700000000" PERSONAL_TOOLBAR_FOLDER="true">Bookmarks Toolbar</H3>
    <DD>Add bookmarks to this folder to see them displayed on the Bookmarks Toolbar
    <DL><p>
        <DT><A HREF="https://a.com" ADD_DATE="1700000001">A</A>
        <DT><H3>Reading</H3>
        <DD>Things to read later
        <DL><p>
            <DT><A HREF="https://b.com">B</A>
        </DL><p>
    </DL><p>
    <DT><A HREF="https://c.com">C</A>
    <DD>A link with a description
    <DT><A HREF="https://d.com">D</A>
</DL>
"#;
        let doc = parse(html).unwrap();
        assert_eq!(
            doc,
            Document::new(vec![
                BookmarkNode::folder(
                    "Bookmarks Toolbar",
                    vec![
                        BookmarkNode::link("A", "https://a.com"),
                        BookmarkNode::folder("Reading", vec![BookmarkNode::link("B", "https://b.com")]),
                    ]
                ),
                BookmarkNode::link("C", "https://c.com"),
                BookmarkNode::link("D", "https://d.com"),
            ])
        );
        assert_eq!(doc.link_count(), 4);
    }

    #[test]
    fn test_description_list_without_heading_is_untitled() {
        let html = r#"<DL><p>
            <DT><A HREF="https://a.com">A</A>
            <DD>desc
            <DL><p><DT><A HREF="https://b.com">B</A></DL><p>
        </DL>"#;
        let doc = parse(html).unwrap();
        assert_eq!(
            doc.roots,
            vec![
                BookmarkNode::link("A", "https://a.com"),
                BookmarkNode::folder(UNTITLED_FOLDER, vec![BookmarkNode::link("B", "https://b.com")]),
            ]
        );
    }

    #[test]
    fn test_round_trip_empty_folder_title() {
        let doc = Document::new(vec![BookmarkNode::folder(
            "",
            vec![BookmarkNode::link("A", "https://a.com")],
        )]);
        assert_eq!(parse(&generate(&doc)).unwrap(), doc);
    }

    #[test]
    fn test_read_file_requires_html_extension() {
        let dir = tempfile::tempdir().unwrap();

        let txt = dir.path().join("bookmarks.txt");
        fs::write(&txt, CHROME_EXPORT).unwrap();
        assert!(matches!(read_file(&txt), Err(Error::UnsupportedExtension(_))));

        let html = dir.path().join("bookmarks.html");
        fs::write(&html, CHROME_EXPORT).unwrap();
        assert_eq!(read_file(&html).unwrap(), sample());

        assert!(matches!(
            read_file(&dir.path().join("missing.html")),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn test_multiple_top_level_lists_are_concatenated() {
        let html = r#"<H1>One</H1><DL><p><DT><A HREF="https://a.com">A</A></DL><p>
                      <H1>Two</H1><DL><p><DT><A HREF="https://b.com">B</A></DL><p>"#;
        let doc = parse(html).unwrap();
        assert_eq!(
            doc.roots,
            vec![BookmarkNode::link("A", "https://a.com"), BookmarkNode::link("B", "https://b.com")]
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse("   \n"), Err(ParseError::Empty));
        assert_eq!(parse("just some text, no markup"), Err(ParseError::NotABookmarkFile));
        assert_eq!(parse("<html><body><p>Hello</p></body></html>"), Err(ParseError::NotABookmarkFile));
    }

    #[test]
    fn test_generate_empty_document_still_parses() {
        let html = generate(&Document::default());
        assert_eq!(parse(&html).unwrap(), Document::default());
    }
}
