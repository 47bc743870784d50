//! Chapter XML parsing.
//!
//! Reads the Matroska chapter XML written by `mkvextract chapters`.

use std::path::Path;

use super::types::{parse_timestamp_ns, ChapterEntry, ChapterError, ChapterList, ChapterResult};

/// Parse chapter XML from a file.
pub fn parse_chapter_file(path: &Path) -> ChapterResult<ChapterList> {
    let content = std::fs::read_to_string(path)?;
    parse_chapter_xml(&content)
}

/// Parse chapter XML into a flat, time-sorted list.
///
/// Top-level atoms of every edition are listed. Nested atoms are ignored.
pub fn parse_chapter_xml(xml: &str) -> ChapterResult<ChapterList> {
    // roxmltree rejects a leading BOM
    let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);

    let doc = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let doc = roxmltree::Document::parse_with_options(xml, doc)
        .map_err(|e| ChapterError::MalformedXml(format!("XML parse error: {}", e)))?;

    let root = doc.root_element();
    if root.tag_name().name() != "Chapters" {
        return Err(ChapterError::MalformedXml(
            "Root element must be <Chapters>".to_string(),
        ));
    }

    let mut list = ChapterList::new();

    for edition in root
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "EditionEntry")
    {
        for atom in edition
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "ChapterAtom")
        {
            if let Some(chapter) = parse_chapter_atom(&atom) {
                list.push(chapter);
            }
        }
    }

    if list.is_empty() {
        return Err(ChapterError::NoChapters);
    }

    list.sort_by_time();
    Ok(list)
}

fn element_text<'a>(node: &roxmltree::Node<'a, '_>) -> Option<&'a str> {
    node.text().map(str::trim)
}

/// Parse a single ChapterAtom element.
fn parse_chapter_atom(atom: &roxmltree::Node) -> Option<ChapterEntry> {
    let mut start_ns: Option<u64> = None;
    let mut end_ns: Option<u64> = None;
    let mut title: Option<String> = None;
    let mut hidden = false;

    for child in atom.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "ChapterTimeStart" => start_ns = element_text(&child).and_then(parse_timestamp_ns),
            "ChapterTimeEnd" => end_ns = element_text(&child).and_then(parse_timestamp_ns),
            "ChapterFlagHidden" => hidden |= element_text(&child) == Some("1"),
            "ChapterFlagEnabled" => hidden |= element_text(&child) == Some("0"),
            "ChapterDisplay" if title.is_none() => {
                title = child
                    .children()
                    .find(|n| n.is_element() && n.tag_name().name() == "ChapterString")
                    .and_then(|n| n.text())
                    .map(str::to_string);
            }
            _ => {}
        }
    }

    // ChapterTimeStart is required
    Some(ChapterEntry {
        start_ns: start_ns?,
        end_ns,
        title,
        hidden,
    })
}
