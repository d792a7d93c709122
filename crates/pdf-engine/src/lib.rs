use image::{ImageBuffer, Rgba};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub mod text;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use text::{RunBox, TextRun};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    pub scale: f32,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self { page_index: 0, scale: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSize {
    pub width_px: u32,
    pub height_px: u32,
}

impl Default for ThumbnailSize {
    fn default() -> Self {
        Self { width_px: 256, height_px: 256 }
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("image encode error: {0}")]
    ImageEncode(#[from] image::ImageError),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("cannot remove the only remaining page")]
    LastPage,
    #[error("no pages selected for extraction")]
    EmptySelection,
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Binary PDF adapter boundary. All PDF parsing, rendering, and byte-level
/// mutation happens behind this trait; callers treat handles as opaque.
pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError>;
    fn render_thumbnail(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        target: ThumbnailSize,
    ) -> Result<RgbaImage, PdfEngineError>;
    /// Remove the page at `page_index` from the document structure.
    fn remove_page(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<(), PdfEngineError>;
    /// Draw a white rectangle over the page at `page_index`, then the given
    /// raster full-bleed at the page's exact dimensions. The white layer
    /// prevents transparency showing through as black on some viewers.
    fn overlay_page_image(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        raster: &RgbaImage,
    ) -> Result<(), PdfEngineError>;
    /// Produce a new PDF containing only the pages at `page_indices`
    /// (0-based, any order), in ascending page order.
    fn extract_pages(
        &self,
        handle: DocumentHandle,
        page_indices: &[u32],
    ) -> Result<Vec<u8>, PdfEngineError>;
    /// Serialize the document in its current state.
    fn save(&self, handle: DocumentHandle) -> Result<Vec<u8>, PdfEngineError>;
    /// Positioned text runs for a page, for overlay editing.
    fn text_runs(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<Vec<TextRun>, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

struct DocumentRecord {
    doc: Document,
}

#[derive(Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

/// Convert a numeric PDF object (Integer or Real) to f32.
fn object_to_f32(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    fn record_mut(&mut self, handle: DocumentHandle) -> Result<&mut DocumentRecord, PdfEngineError> {
        self.docs.get_mut(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    fn page_id(doc: &Document, page_index: u32) -> Result<ObjectId, PdfEngineError> {
        let pages = doc.get_pages();
        pages.get(&(page_index + 1)).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: pages.len() as u32,
        })
    }

    fn media_box_size(doc: &Document, page_id: ObjectId) -> PageSize {
        doc.get_dictionary(page_id)
            .ok()
            .and_then(|dict| dict.get(b"MediaBox").ok())
            .and_then(|object| object.as_array().ok())
            .and_then(|array| {
                if array.len() != 4 {
                    return None;
                }
                let x0 = object_to_f32(&array[0])?;
                let y0 = object_to_f32(&array[1])?;
                let x1 = object_to_f32(&array[2])?;
                let y1 = object_to_f32(&array[3])?;
                Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
            })
            .unwrap_or(PageSize { width_pt: 612.0, height_pt: 792.0 })
    }

    fn serialize(doc: &Document) -> Result<Vec<u8>, PdfEngineError> {
        let mut bytes = Vec::new();
        let mut copy = doc.clone();
        copy.save_to(&mut bytes)?;
        Ok(bytes)
    }

    /// Register an image XObject under `name` in the page's Resources,
    /// handling inline and referenced Resources dictionaries.
    fn attach_xobject(
        doc: &mut Document,
        page_id: ObjectId,
        name: &str,
        image_id: ObjectId,
    ) -> Result<(), PdfEngineError> {
        let resources_ref = match doc.get_dictionary(page_id)?.get(b"Resources") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        };

        let target_id = match resources_ref {
            Some(id) => id,
            None => {
                let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
                if !page_dict.has(b"Resources") {
                    page_dict.set("Resources", dictionary! {});
                }
                page_id
            }
        };

        // The XObject entry itself may also be a reference.
        let xobject_ref = {
            let holder = if resources_ref.is_some() {
                doc.get_dictionary(target_id)?
            } else {
                doc.get_dictionary(page_id)?.get(b"Resources")?.as_dict()?
            };
            match holder.get(b"XObject") {
                Ok(Object::Reference(id)) => Some(*id),
                _ => None,
            }
        };

        if let Some(xobject_id) = xobject_ref {
            let xobjects = doc.get_object_mut(xobject_id)?.as_dict_mut()?;
            xobjects.set(name, image_id);
            return Ok(());
        }

        let resources = if resources_ref.is_some() {
            doc.get_object_mut(target_id)?.as_dict_mut()?
        } else {
            doc.get_object_mut(page_id)?
                .as_dict_mut()?
                .get_mut(b"Resources")?
                .as_dict_mut()?
        };

        if !resources.has(b"XObject") {
            resources.set("XObject", dictionary! {});
        }
        resources.get_mut(b"XObject")?.as_dict_mut()?.set(name, image_id);

        Ok(())
    }

    /// Append a content stream to the page's Contents entry.
    fn append_content(
        doc: &mut Document,
        page_id: ObjectId,
        content_id: ObjectId,
    ) -> Result<(), PdfEngineError> {
        let existing = doc.get_dictionary(page_id)?.get(b"Contents").ok().cloned();

        let new_contents = match existing {
            Some(Object::Array(mut items)) => {
                items.push(content_id.into());
                Object::Array(items)
            }
            Some(Object::Reference(id)) => {
                Object::Array(vec![id.into(), content_id.into()])
            }
            _ => Object::Reference(content_id),
        };

        doc.get_object_mut(page_id)?.as_dict_mut()?.set("Contents", new_contents);
        Ok(())
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(&bytes)?;
        if doc.get_pages().is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        self.docs.insert(handle, DocumentRecord { doc });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.doc.get_pages().len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        let doc = &self.record(handle)?.doc;
        let page_id = Self::page_id(doc, page_index)?;
        Ok(Self::media_box_size(doc, page_id))
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page_size = self.page_size(handle, request.page_index)?;
        let scale = if request.scale <= 0.0 { 1.0 } else { request.scale };

        let width = (page_size.width_pt * scale).round().max(1.0) as u32;
        let height = (page_size.height_pt * scale).round().max(1.0) as u32;

        // Placeholder raster: white page with a light border. The pdfium
        // feature swaps in a real rasterizer.
        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(image)
    }

    fn render_thumbnail(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        target: ThumbnailSize,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page = self.render_page(handle, RenderRequest { page_index, scale: 0.25 })?;

        Ok(image::imageops::thumbnail(&page, target.width_px.max(1), target.height_px.max(1)))
    }

    fn remove_page(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<(), PdfEngineError> {
        let record = self.record_mut(handle)?;
        let page_count = record.doc.get_pages().len() as u32;

        if page_index >= page_count {
            return Err(PdfEngineError::PageOutOfRange { page: page_index, page_count });
        }
        if page_count <= 1 {
            return Err(PdfEngineError::LastPage);
        }

        record.doc.delete_pages(&[page_index + 1]);
        Ok(())
    }

    fn overlay_page_image(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        raster: &RgbaImage,
    ) -> Result<(), PdfEngineError> {
        // Encode as JPEG/DCTDecode; the white backdrop below makes the
        // alpha channel irrelevant.
        let rgb = image::DynamicImage::ImageRgba8(raster.clone()).to_rgb8();
        let mut jpeg = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 90).encode_image(&rgb)?;

        let record = self.record_mut(handle)?;
        let doc = &mut record.doc;
        let page_id = Self::page_id(doc, page_index)?;
        let PageSize { width_pt, height_pt } = Self::media_box_size(doc, page_id);

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => rgb.width() as i64,
                "Height" => rgb.height() as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        ));

        let name = format!("PdImg{}", image_id.0);
        Self::attach_xobject(doc, page_id, &name, image_id)?;

        let ops = format!(
            "q\n1 1 1 rg\n0 0 {width_pt:.2} {height_pt:.2} re\nf\nQ\nq\n{width_pt:.2} 0 0 {height_pt:.2} 0 0 cm\n/{name} Do\nQ\n"
        );
        let content_id = doc.add_object(Stream::new(dictionary! {}, ops.into_bytes()));

        Self::append_content(doc, page_id, content_id)
    }

    fn extract_pages(
        &self,
        handle: DocumentHandle,
        page_indices: &[u32],
    ) -> Result<Vec<u8>, PdfEngineError> {
        if page_indices.is_empty() {
            return Err(PdfEngineError::EmptySelection);
        }

        let doc = &self.record(handle)?.doc;
        let page_count = doc.get_pages().len() as u32;

        let mut keep: Vec<u32> = page_indices.iter().map(|index| index + 1).collect();
        keep.sort_unstable();
        keep.dedup();

        if let Some(out_of_range) = keep.iter().find(|number| **number > page_count) {
            return Err(PdfEngineError::PageOutOfRange {
                page: out_of_range - 1,
                page_count,
            });
        }

        let to_drop: Vec<u32> =
            (1..=page_count).filter(|number| !keep.contains(number)).collect();

        let mut subset = doc.clone();
        if !to_drop.is_empty() {
            subset.delete_pages(&to_drop);
        }

        let mut bytes = Vec::new();
        subset.save_to(&mut bytes)?;
        Ok(bytes)
    }

    fn save(&self, handle: DocumentHandle) -> Result<Vec<u8>, PdfEngineError> {
        Self::serialize(&self.record(handle)?.doc)
    }

    fn text_runs(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<Vec<TextRun>, PdfEngineError> {
        let doc = &self.record(handle)?.doc;
        let page_id = Self::page_id(doc, page_index)?;
        let content = doc.get_page_content(page_id)?;
        text::runs_from_content(&content)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

#[cfg(feature = "pdfium")]
pub mod pdfium_backend {
    use super::*;
    use pdfium_render::prelude::*;

    pub struct PdfiumEngine {
        inner: LopdfEngine,
    }

    impl PdfiumEngine {
        pub fn from_system_library() -> Result<Self, PdfEngineError> {
            let _ = Pdfium::bind_to_system_library().map_err(|err| {
                PdfEngineError::Backend(format!("failed to bind pdfium system library: {err}"))
            })?;

            Ok(Self { inner: LopdfEngine::default() })
        }
    }

    impl PdfEngine for PdfiumEngine {
        fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
            self.inner.open(source)
        }

        fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
            self.inner.page_count(handle)
        }

        fn page_size(
            &self,
            handle: DocumentHandle,
            page_index: u32,
        ) -> Result<PageSize, PdfEngineError> {
            self.inner.page_size(handle, page_index)
        }

        fn render_page(
            &self,
            handle: DocumentHandle,
            request: RenderRequest,
        ) -> Result<RgbaImage, PdfEngineError> {
            self.inner.render_page(handle, request)
        }

        fn render_thumbnail(
            &self,
            handle: DocumentHandle,
            page_index: u32,
            target: ThumbnailSize,
        ) -> Result<RgbaImage, PdfEngineError> {
            self.inner.render_thumbnail(handle, page_index, target)
        }

        fn remove_page(
            &mut self,
            handle: DocumentHandle,
            page_index: u32,
        ) -> Result<(), PdfEngineError> {
            self.inner.remove_page(handle, page_index)
        }

        fn overlay_page_image(
            &mut self,
            handle: DocumentHandle,
            page_index: u32,
            raster: &RgbaImage,
        ) -> Result<(), PdfEngineError> {
            self.inner.overlay_page_image(handle, page_index, raster)
        }

        fn extract_pages(
            &self,
            handle: DocumentHandle,
            page_indices: &[u32],
        ) -> Result<Vec<u8>, PdfEngineError> {
            self.inner.extract_pages(handle, page_indices)
        }

        fn save(&self, handle: DocumentHandle) -> Result<Vec<u8>, PdfEngineError> {
            self.inner.save(handle)
        }

        fn text_runs(
            &self,
            handle: DocumentHandle,
            page_index: u32,
        ) -> Result<Vec<TextRun>, PdfEngineError> {
            self.inner.text_runs(handle, page_index)
        }

        fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
            self.inner.close(handle)
        }
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}
