//! Upload pipeline: validated bytes in, fully-populated [`Document`] out.
//!
//! Validation failures never install a partial document; the caller's
//! store keeps its prior state. A page whose thumbnail fails to render
//! gets a placeholder instead of aborting the whole load.

use doc_model::{Document, Page, PageId};
use image::Rgba;
use page_canvas::encode_png_data_url;
use pdf_engine::{OpenSource, PdfEngine, PdfEngineError, RgbaImage, ThumbnailSize};
use tracing::warn;
use uuid::Uuid;

pub const MAX_FILE_BYTES: usize = 50 * 1024 * 1024;
pub const COVER_CANDIDATE_LIMIT: usize = 3;

const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Clone, Copy)]
pub struct LoaderConfig {
    pub max_file_bytes: usize,
    pub thumbnail: ThumbnailSize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { max_file_bytes: MAX_FILE_BYTES, thumbnail: ThumbnailSize::default() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("file is {actual} bytes, over the {limit} byte limit")]
    TooLarge { actual: usize, limit: usize },
    #[error("file is not a PDF")]
    NotAPdf,
    #[error(transparent)]
    Engine(#[from] PdfEngineError),
}

/// Process uploaded bytes into a [`Document`]: validate size and magic,
/// parse, and render one thumbnail per page. Page ids are minted as
/// `page-N` from the original 1-based page number and never reassigned.
pub fn load_document<E: PdfEngine>(
    engine: &mut E,
    name: &str,
    bytes: Vec<u8>,
    config: &LoaderConfig,
) -> Result<Document, LoadError> {
    if bytes.len() > config.max_file_bytes {
        return Err(LoadError::TooLarge { actual: bytes.len(), limit: config.max_file_bytes });
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(LoadError::NotAPdf);
    }

    let handle = engine.open(OpenSource::Bytes(bytes.clone()))?;
    let page_count = match engine.page_count(handle) {
        Ok(count) => count,
        Err(err) => {
            let _ = engine.close(handle);
            return Err(err.into());
        }
    };

    let mut pages = Vec::with_capacity(page_count as usize);
    for number in 1..=page_count {
        let thumbnail = match engine
            .render_thumbnail(handle, number - 1, config.thumbnail)
            .map_err(LoadError::from)
            .and_then(|raster| Ok(encode_png_data_url(&raster)?))
        {
            Ok(url) => Some(url),
            Err(err) => {
                warn!(page = number, error = %err, "thumbnail render failed, using placeholder");
                placeholder_thumbnail(config.thumbnail)
            }
        };

        let mut page = Page::new(format!("page-{number}"), number);
        page.thumbnail = thumbnail;
        pages.push(page);
    }

    let _ = engine.close(handle);

    Ok(Document {
        id: format!("doc-{}", Uuid::new_v4()),
        name: name.to_owned(),
        file_bytes: bytes,
        pages,
    })
}

/// First few pages as cover suggestions. Purely positional; the
/// at-most-one-cover invariant is enforced by `mark_as_cover`, not here.
pub fn detect_cover_candidates(document: &Document) -> Vec<PageId> {
    document.pages.iter().take(COVER_CANDIDATE_LIMIT).map(|page| page.id.clone()).collect()
}

fn placeholder_thumbnail(size: ThumbnailSize) -> Option<String> {
    let raster = RgbaImage::from_pixel(
        size.width_px.max(1),
        size.height_px.max(1),
        Rgba([229, 231, 235, 255]),
    );
    encode_png_data_url(&raster).ok()
}

impl From<page_canvas::DataUrlError> for LoadError {
    fn from(err: page_canvas::DataUrlError) -> Self {
        match err {
            page_canvas::DataUrlError::Image(image_err) => {
                LoadError::Engine(PdfEngineError::ImageEncode(image_err))
            }
            other => LoadError::Engine(PdfEngineError::Backend(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_engine::test_support::{not_a_pdf, sample_pdf};
    use pdf_engine::LopdfEngine;

    #[test]
    fn load_mints_stable_ids_and_thumbnails() {
        let mut engine = LopdfEngine::new();
        let document =
            load_document(&mut engine, "deck.pdf", sample_pdf(3), &LoaderConfig::default())
                .expect("load should succeed");

        assert!(document.id.starts_with("doc-"));
        assert_eq!(document.name, "deck.pdf");
        assert_eq!(document.total_pages(), 3);

        let ids: Vec<&str> = document.pages.iter().map(|page| page.id.as_str()).collect();
        assert_eq!(ids, vec!["page-1", "page-2", "page-3"]);

        for page in &document.pages {
            let thumbnail = page.thumbnail.as_deref().expect("thumbnail expected");
            assert!(thumbnail.starts_with("data:image/png;base64,"));
            assert!(!page.is_cover);
            assert!(page.edited_data_url.is_none());
        }
    }

    #[test]
    fn load_rejects_oversized_files() {
        let mut engine = LopdfEngine::new();
        let config = LoaderConfig { max_file_bytes: 16, ..LoaderConfig::default() };

        let err = load_document(&mut engine, "big.pdf", sample_pdf(1), &config)
            .expect_err("oversized file should be rejected");
        assert!(matches!(err, LoadError::TooLarge { limit: 16, .. }));
    }

    #[test]
    fn load_rejects_non_pdf_bytes() {
        let mut engine = LopdfEngine::new();
        let err = load_document(&mut engine, "note.txt", not_a_pdf(), &LoaderConfig::default())
            .expect_err("non-PDF bytes should be rejected");
        assert!(matches!(err, LoadError::NotAPdf));
    }

    #[test]
    fn load_surfaces_parse_failures() {
        let mut engine = LopdfEngine::new();
        let err = load_document(
            &mut engine,
            "broken.pdf",
            b"%PDF-1.5 but truncated garbage".to_vec(),
            &LoaderConfig::default(),
        )
        .expect_err("unparseable PDF should be rejected");
        assert!(matches!(err, LoadError::Engine(_)));
    }

    #[test]
    fn cover_candidates_are_the_first_three_pages() {
        let mut engine = LopdfEngine::new();
        let document =
            load_document(&mut engine, "deck.pdf", sample_pdf(5), &LoaderConfig::default())
                .expect("load should succeed");

        assert_eq!(detect_cover_candidates(&document), vec!["page-1", "page-2", "page-3"]);
    }

    #[test]
    fn cover_candidates_handle_short_documents() {
        let mut engine = LopdfEngine::new();
        let document =
            load_document(&mut engine, "deck.pdf", sample_pdf(2), &LoaderConfig::default())
                .expect("load should succeed");

        assert_eq!(detect_cover_candidates(&document), vec!["page-1", "page-2"]);
    }
}
