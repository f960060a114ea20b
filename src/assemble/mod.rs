//! Image-to-PDF assembly.
//!
//! Each downloaded image becomes one page sized to the image (1 px = 1 pt).
//! Baseline gray and RGB JPEG data is embedded as-is; anything else
//! (including CMYK JPEGs) is decoded and stored as Flate-compressed RGB. When asked to append, the pages are added after
//! the pages already present in the destination (the rendered header).

mod error;

pub use error::AssemblyError;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use image::{ImageFormat, ImageReader};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use tracing::{debug, info, instrument};

/// Appends `images` as pages to `destination`, in order.
///
/// With `append` set, `destination` must already hold a PDF; otherwise a
/// new document is created (replacing any existing file). Runs on the
/// blocking thread pool. Returns the page count of the written document.
///
/// # Errors
///
/// Returns [`AssemblyError`] if an image cannot be read, the existing
/// document cannot be loaded, or the result cannot be written.
#[instrument(skip(images), fields(images = images.len(), destination = %destination.display()))]
pub async fn assemble_images(
    images: Vec<PathBuf>,
    destination: PathBuf,
    append: bool,
) -> Result<usize, AssemblyError> {
    let pages =
        tokio::task::spawn_blocking(move || assemble_blocking(&images, &destination, append))
            .await
            .map_err(AssemblyError::join)??;
    info!(pages, "document assembled");
    Ok(pages)
}

fn assemble_blocking(
    images: &[PathBuf],
    destination: &Path,
    append: bool,
) -> Result<usize, AssemblyError> {
    let (mut doc, pages_id) = if append {
        open_document(destination)?
    } else {
        new_document()
    };

    let mut added = Vec::with_capacity(images.len());
    for path in images {
        let (image, width, height) = embed_image(path)?;
        let image_id = doc.add_object(image);
        let content = image_page_content(width, height)
            .encode()
            .map_err(AssemblyError::pdf)?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(i64::from(width)),
                Object::Integer(i64::from(height)),
            ],
        });
        debug!(path = %path.display(), width, height, "added image page");
        added.push(Object::Reference(page_id));
    }

    attach_pages(&mut doc, pages_id, added)?;

    let file = File::create(destination).map_err(|e| AssemblyError::io(destination, e))?;
    let mut writer = BufWriter::new(file);
    doc.save_to(&mut writer).map_err(AssemblyError::pdf)?;
    writer
        .flush()
        .map_err(|e| AssemblyError::io(destination, e))?;

    Ok(doc.get_pages().len())
}

fn new_document() -> (Document, ObjectId) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => Vec::<Object>::new(),
        "Count" => Object::Integer(0),
    });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    (doc, pages_id)
}

fn open_document(path: &Path) -> Result<(Document, ObjectId), AssemblyError> {
    let doc = Document::load(path).map_err(AssemblyError::pdf)?;
    let pages_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .and_then(|root| doc.get_dictionary(root))
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(AssemblyError::pdf)?;
    Ok((doc, pages_id))
}

fn attach_pages(
    doc: &mut Document,
    pages_id: ObjectId,
    added: Vec<Object>,
) -> Result<(), AssemblyError> {
    let pages = doc
        .get_object_mut(pages_id)
        .and_then(Object::as_dict_mut)
        .map_err(AssemblyError::pdf)?;
    let existing = pages.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
    let count = existing + i64::try_from(added.len()).map_err(AssemblyError::pdf)?;

    pages
        .get_mut(b"Kids")
        .and_then(Object::as_array_mut)
        .map_err(AssemblyError::pdf)?
        .extend(added);
    pages.set("Count", Object::Integer(count));
    Ok(())
}

fn image_page_content(width: u32, height: u32) -> Content {
    Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(i64::from(width)),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(i64::from(height)),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    }
}

fn image_dictionary(width: u32, height: u32, color_space: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => Object::Integer(i64::from(width)),
        "Height" => Object::Integer(i64::from(height)),
        "ColorSpace" => Object::Name(color_space.as_bytes().to_vec()),
        "BitsPerComponent" => Object::Integer(8),
    }
}

/// Builds the image XObject for `path` and returns it with its pixel size.
fn embed_image(path: &Path) -> Result<(Stream, u32, u32), AssemblyError> {
    if open_reader(path)?.format() == Some(ImageFormat::Jpeg) {
        let data = std::fs::read(path).map_err(|e| AssemblyError::io(path, e))?;
        let passthrough = jpeg_frame(&data)
            .and_then(|frame| frame.color_space().map(|space| (frame, space)));
        if let Some((frame, color_space)) = passthrough {
            let mut dict = image_dictionary(frame.width, frame.height, color_space);
            dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
            let mut stream = Stream::new(dict, data);
            stream.allows_compression = false;
            return Ok((stream, frame.width, frame.height));
        }
        debug!(path = %path.display(), "JPEG layout not embeddable as-is; decoding");
    }

    embed_decoded(path)
}

/// Frame header of a JPEG stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JpegFrame {
    width: u32,
    height: u32,
    precision: u8,
    components: u8,
}

impl JpegFrame {
    /// PDF colour space for embedding the DCT data unchanged, if any.
    fn color_space(self) -> Option<&'static str> {
        match (self.precision, self.components) {
            (8, 1) => Some("DeviceGray"),
            (8, 3) => Some("DeviceRGB"),
            _ => None,
        }
    }
}

/// Reads the first SOF segment of `bytes`.
fn jpeg_frame(bytes: &[u8]) -> Option<JpegFrame> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut i = 2;
    while i + 3 < bytes.len() {
        if bytes[i] != 0xFF {
            return None;
        }
        let marker = bytes[i + 1];
        if marker == 0xFF {
            i += 1;
            continue;
        }
        if marker == 0xD9 || marker == 0xDA {
            return None;
        }
        let len = usize::from(u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]));
        let payload = bytes.get(i + 4..i + 2 + len)?;
        if is_sof_marker(marker) {
            let &[precision, h1, h0, w1, w0, components, ..] = payload else {
                return None;
            };
            return Some(JpegFrame {
                width: u32::from(u16::from_be_bytes([w1, w0])),
                height: u32::from(u16::from_be_bytes([h1, h0])),
                precision,
                components,
            });
        }
        i += 2 + len;
    }
    None
}

fn is_sof_marker(marker: u8) -> bool {
    matches!(
        marker,
        0xC0 | 0xC1 | 0xC2 | 0xC3 | 0xC5 | 0xC6 | 0xC7 | 0xC9 | 0xCA | 0xCB | 0xCD | 0xCE | 0xCF
    )
}

fn open_reader(path: &Path) -> Result<ImageReader<BufReader<File>>, AssemblyError> {
    ImageReader::open(path)
        .and_then(ImageReader::with_guessed_format)
        .map_err(|e| AssemblyError::io(path, e))
}

fn embed_decoded(path: &Path) -> Result<(Stream, u32, u32), AssemblyError> {
    let rgb = open_reader(path)?
        .decode()
        .map_err(|e| AssemblyError::image(path, e))?
        .to_rgb8();
    let (width, height) = rgb.dimensions();
    let mut stream = Stream::new(
        image_dictionary(width, height, "DeviceRGB"),
        rgb.into_raw(),
    );
    stream.compress().map_err(AssemblyError::pdf)?;
    Ok((stream, width, height))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use tempfile::TempDir;

    use super::*;
    use crate::header::{HeaderArtifact, write_header_file};

    fn write_jpeg(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(width, height, Rgb([200, 120, 40]))
            .save_with_format(&path, ImageFormat::Jpeg)
            .unwrap();
        path
    }

    fn media_box(doc: &Document, page_id: ObjectId) -> Vec<i64> {
        doc.get_dictionary(page_id)
            .unwrap()
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o.as_i64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_assemble_new_document_one_page_per_image() {
        let temp = TempDir::new().unwrap();
        let images = vec![
            write_jpeg(temp.path(), "img_1.jpg", 40, 60),
            write_jpeg(temp.path(), "img_2.jpg", 80, 20),
        ];
        let output = temp.path().join("out.pdf");

        let pages = assemble_images(images, output.clone(), false).await.unwrap();
        assert_eq!(pages, 2);

        let doc = Document::load(&output).unwrap();
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        assert_eq!(media_box(&doc, page_ids[0]), vec![0, 0, 40, 60]);
        assert_eq!(media_box(&doc, page_ids[1]), vec![0, 0, 80, 20]);
    }

    #[tokio::test]
    async fn test_assemble_appends_after_header() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("out.pdf");
        write_header_file(&HeaderArtifact::new("id", "Title"), &output).unwrap();
        let images = vec![
            write_jpeg(temp.path(), "img_1.jpg", 10, 10),
            write_jpeg(temp.path(), "img_2.jpg", 10, 10),
            write_jpeg(temp.path(), "img_3.jpg", 10, 10),
        ];

        let pages = assemble_images(images, output.clone(), true).await.unwrap();
        assert_eq!(pages, 4);

        let doc = Document::load(&output).unwrap();
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        assert_eq!(media_box(&doc, page_ids[0]), vec![0, 0, 595, 842]);
        assert_eq!(media_box(&doc, page_ids[3]), vec![0, 0, 10, 10]);
    }

    #[tokio::test]
    async fn test_assemble_png_and_grayscale_jpeg() {
        let temp = TempDir::new().unwrap();
        let png = temp.path().join("img_1.jpg");
        RgbImage::from_pixel(12, 8, Rgb([1, 2, 3]))
            .save_with_format(&png, ImageFormat::Png)
            .unwrap();
        let gray = temp.path().join("img_2.jpg");
        GrayImage::from_pixel(5, 7, Luma([90]))
            .save_with_format(&gray, ImageFormat::Jpeg)
            .unwrap();
        let output = temp.path().join("out.pdf");

        let pages = assemble_images(vec![png, gray], output.clone(), false)
            .await
            .unwrap();
        assert_eq!(pages, 2);

        let doc = Document::load(&output).unwrap();
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        assert_eq!(media_box(&doc, page_ids[0]), vec![0, 0, 12, 8]);
        assert_eq!(media_box(&doc, page_ids[1]), vec![0, 0, 5, 7]);
    }

    /// Minimal JPEG prefix: SOI, an APP0 segment, then a SOF0 header.
    fn jpeg_header(components: u8) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        bytes.extend_from_slice(b"JFIF\0\x01\x01\0\0\x01\0\x01\0\0");
        let len = 8 + 3 * u16::from(components);
        bytes.extend_from_slice(&[0xFF, 0xC0]);
        bytes.extend_from_slice(&len.to_be_bytes());
        bytes.extend_from_slice(&[0x08, 0x02, 0x58, 0x03, 0x20, components]);
        for id in 1..=components {
            bytes.extend_from_slice(&[id, 0x11, 0x00]);
        }
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        bytes
    }

    #[test]
    fn test_jpeg_frame_reads_sof_header() {
        let frame = jpeg_frame(&jpeg_header(3)).unwrap();
        assert_eq!(
            frame,
            JpegFrame {
                width: 800,
                height: 600,
                precision: 8,
                components: 3,
            }
        );
        assert_eq!(frame.color_space(), Some("DeviceRGB"));
        assert_eq!(jpeg_frame(&jpeg_header(1)).unwrap().color_space(), Some("DeviceGray"));
    }

    #[test]
    fn test_cmyk_jpeg_is_not_passed_through() {
        let frame = jpeg_frame(&jpeg_header(4)).unwrap();
        assert_eq!(frame.components, 4);
        assert_eq!(frame.color_space(), None);
    }

    #[test]
    fn test_jpeg_frame_rejects_truncated_data() {
        assert_eq!(jpeg_frame(b"\xFF\xD8"), None);
        assert_eq!(jpeg_frame(b"not a jpeg"), None);
        let header = jpeg_header(3);
        assert_eq!(jpeg_frame(&header[..header.len() - 12]), None);
    }

    #[tokio::test]
    async fn test_assemble_rejects_non_image() {
        let temp = TempDir::new().unwrap();
        let bogus = temp.path().join("img_1.jpg");
        std::fs::write(&bogus, b"<html>not found</html>").unwrap();

        let result = assemble_images(vec![bogus], temp.path().join("out.pdf"), false).await;
        assert!(matches!(result, Err(AssemblyError::Image { .. })));
    }

    #[tokio::test]
    async fn test_append_to_missing_document_fails() {
        let temp = TempDir::new().unwrap();
        let image = write_jpeg(temp.path(), "img_1.jpg", 4, 4);

        let result = assemble_images(vec![image], temp.path().join("absent.pdf"), true).await;
        assert!(matches!(result, Err(AssemblyError::Pdf { .. })));
    }
}
