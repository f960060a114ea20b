//! Typesets a [`HeaderArtifact`] as one or more A4 text pages.
//!
//! Layout: 12pt Helvetica, 17pt leading, 28pt margins. Long lines are
//! word-wrapped (words longer than a line are hard-broken) and text that
//! does not fit one page continues on the next.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

use super::{HeaderArtifact, HeaderError};

/// A4 width in points.
const PAGE_WIDTH: i64 = 595;
/// A4 height in points.
const PAGE_HEIGHT: i64 = 842;
/// Page margin on every side (10 mm).
const MARGIN: i64 = 28;
const FONT_SIZE: i64 = 12;
/// Baseline-to-baseline distance (6 mm).
const LEADING: i64 = 17;
/// Characters per line at the average Helvetica glyph width.
const LINE_CHARS: usize = 88;

/// Builds the header text, one entry per output line before wrapping.
pub(crate) fn header_lines(header: &HeaderArtifact) -> Vec<String> {
    let mut lines = vec![String::new()];
    lines.extend(header.title.lines().map(str::to_string));
    lines.push(format!("Catalog ID: {}", header.catalog_id));
    lines.push(String::new());

    for property in &header.properties {
        lines.push(format!("{} {}", property.key, property.value));
    }

    if !header.links.is_empty() {
        lines.push(String::new());
        lines.push("Links:".to_string());
        lines.extend(header.links.iter().cloned());
    }
    lines
}

/// Splits `line` into pieces of at most `width` characters, breaking on
/// whitespace where possible.
fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let mut wrapped = Vec::new();
    let mut current = String::new();

    for word in line.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > width {
            if !current.is_empty() {
                wrapped.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(width);
            wrapped.push(word.into_iter().collect());
            word = rest;
        }

        let current_len = current.chars().count();
        if current_len > 0 && current_len + 1 + word.len() > width {
            wrapped.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }

    if !current.is_empty() || wrapped.is_empty() {
        wrapped.push(current);
    }
    wrapped
}

/// Encodes text for a WinAnsi Type1 font. Characters WinAnsi cannot
/// represent become `?`.
fn encode_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2026}' => 0x85,
            '\u{20AC}' => 0x80,
            _ => match u8::try_from(u32::from(c)) {
                Ok(b) if b.is_ascii_control() => b' ',
                Ok(0x80..=0x9F) | Err(_) => b'?',
                Ok(b) => b,
            },
        })
        .collect()
}

fn page_content(lines: &[String]) -> Content {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(b"F1".to_vec()), Object::Integer(FONT_SIZE)],
        ),
        Operation::new("TL", vec![Object::Integer(LEADING)]),
        Operation::new(
            "Td",
            vec![
                Object::Integer(MARGIN),
                Object::Integer(PAGE_HEIGHT - MARGIN - FONT_SIZE),
            ],
        ),
    ];

    for line in lines {
        if !line.is_empty() {
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal(encode_text(line))],
            ));
        }
        operations.push(Operation::new("T*", vec![]));
    }

    operations.push(Operation::new("ET", vec![]));
    Content { operations }
}

/// Builds the header document in memory.
///
/// # Errors
///
/// Returns [`HeaderError::Render`] if a content stream cannot be encoded.
pub(crate) fn header_document(header: &HeaderArtifact) -> Result<Document, HeaderError> {
    let lines: Vec<String> = header_lines(header)
        .iter()
        .flat_map(|line| wrap_line(line, LINE_CHARS))
        .collect();
    let lines_per_page = usize::try_from((PAGE_HEIGHT - 2 * MARGIN) / LEADING).unwrap_or(1);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for chunk in lines.chunks(lines_per_page) {
        let content = page_content(chunk).encode().map_err(HeaderError::render)?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
        });
        kids.push(Object::Reference(page_id));
    }

    let count = i64::try_from(kids.len()).map_err(HeaderError::render)?;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(count),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    Ok(doc)
}

/// Renders `header` as a PDF into `writer`.
///
/// # Errors
///
/// Returns [`HeaderError::Render`] if the document cannot be built or
/// serialized.
pub fn render_header_page<W: Write>(
    header: &HeaderArtifact,
    writer: &mut W,
) -> Result<(), HeaderError> {
    let mut doc = header_document(header)?;
    doc.save_to(writer).map_err(HeaderError::render)?;
    Ok(())
}

/// Renders `header` to a new file at `path`, replacing any existing file.
///
/// # Errors
///
/// Returns [`HeaderError::Io`] if the file cannot be created or flushed,
/// or [`HeaderError::Render`] on serialization failure.
pub fn write_header_file(header: &HeaderArtifact, path: &Path) -> Result<(), HeaderError> {
    let file = File::create(path).map_err(|e| HeaderError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    render_header_page(header, &mut writer)?;
    writer.flush().map_err(|e| HeaderError::io(path, e))
}
