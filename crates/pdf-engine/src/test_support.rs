//! Programmatic PDF fixtures for tests.
//!
//! Builds small, well-formed documents with one `Page N` text run per page
//! so tests never depend on binary fixture files.

use lopdf::{dictionary, Document, Object, Stream};

/// A `page_count`-page US-letter PDF with a single text run per page.
pub fn sample_pdf(page_count: u32) -> Vec<u8> {
    sample_pdf_with_size(page_count, 612, 792)
}

/// Same as [`sample_pdf`] with an explicit MediaBox (whole points).
pub fn sample_pdf_with_size(page_count: u32, width_pt: i64, height_pt: i64) -> Vec<u8> {
    assert!(page_count > 0, "fixture needs at least one page");

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids: Vec<Object> = Vec::with_capacity(page_count as usize);
    for number in 1..=page_count {
        let ops = format!("BT\n/F1 24 Tf\n72 720 Td\n(Page {number}) Tj\nET\n");
        let content_id = doc.add_object(Stream::new(dictionary! {}, ops.into_bytes()));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width_pt.into(), height_pt.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture serialization should not fail");
    bytes
}

/// A valid single-page PDF carrying an `/Encrypt` marker, for exercising
/// the encrypted-rejection path without real encryption.
pub fn encrypted_marker_pdf() -> Vec<u8> {
    let mut bytes = sample_pdf(1);
    bytes.extend_from_slice(b"\n%/Encrypt\n");
    bytes
}

/// Bytes that are not a PDF at all.
pub fn not_a_pdf() -> Vec<u8> {
    b"this is definitely not a portable document".to_vec()
}
