//! Positioned text-run extraction from page content streams.
//!
//! Walks the decoded content operators tracking the text cursor and font
//! size, and reports one run per shown string. Positions come straight
//! from `Td`/`TD`/`Tm`; widths are estimated from the glyph count, which
//! is enough for overlay editing where the user repositions text anyway.

use crate::PdfEngineError;
use lopdf::content::Content;
use lopdf::Object;

/// Bounding box in page coordinates (points, origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A positioned text run: string, bounding box, font size.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub bbox: RunBox,
    pub font_size: f32,
}

// Average glyph advance as a fraction of the font size, used when the
// font's real metrics are not loaded.
const APPROX_GLYPH_ADVANCE: f32 = 0.5;

fn operand_f32(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

fn decode_text_operand(object: &Object) -> String {
    match object {
        Object::String(bytes, _) => String::from_utf8_lossy(bytes).into_owned(),
        _ => String::new(),
    }
}

pub fn runs_from_content(content: &[u8]) -> Result<Vec<TextRun>, PdfEngineError> {
    let content = Content::decode(content)?;

    let mut runs = Vec::new();
    let mut font_size: f32 = 12.0;
    let mut leading: f32 = 0.0;
    let mut cursor_x: f32 = 0.0;
    let mut cursor_y: f32 = 0.0;

    let mut emit = |text: String, x: f32, y: f32, size: f32, runs: &mut Vec<TextRun>| {
        if text.is_empty() {
            return;
        }
        let width = text.chars().count() as f32 * size * APPROX_GLYPH_ADVANCE;
        runs.push(TextRun { text, bbox: RunBox { x, y, width, height: size }, font_size: size });
    };

    for operation in &content.operations {
        let operands = &operation.operands;
        match operation.operator.as_str() {
            "BT" => {
                cursor_x = 0.0;
                cursor_y = 0.0;
            }
            "Tf" => {
                if let Some(size) = operands.get(1).and_then(operand_f32) {
                    font_size = size;
                }
            }
            "TL" => {
                if let Some(value) = operands.first().and_then(operand_f32) {
                    leading = value;
                }
            }
            "Td" => {
                if let (Some(tx), Some(ty)) = (
                    operands.first().and_then(operand_f32),
                    operands.get(1).and_then(operand_f32),
                ) {
                    cursor_x += tx;
                    cursor_y += ty;
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (
                    operands.first().and_then(operand_f32),
                    operands.get(1).and_then(operand_f32),
                ) {
                    cursor_x += tx;
                    cursor_y += ty;
                    leading = -ty;
                }
            }
            "Tm" => {
                if let (Some(x), Some(y)) = (
                    operands.get(4).and_then(operand_f32),
                    operands.get(5).and_then(operand_f32),
                ) {
                    cursor_x = x;
                    cursor_y = y;
                }
            }
            "T*" => {
                cursor_y -= if leading != 0.0 { leading } else { font_size * 1.2 };
            }
            "Tj" => {
                let text = operands.first().map(decode_text_operand).unwrap_or_default();
                emit(text, cursor_x, cursor_y, font_size, &mut runs);
            }
            "'" | "\"" => {
                cursor_y -= if leading != 0.0 { leading } else { font_size * 1.2 };
                let text = operands.last().map(decode_text_operand).unwrap_or_default();
                emit(text, cursor_x, cursor_y, font_size, &mut runs);
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    let text: String = items.iter().map(decode_text_operand).collect();
                    emit(text, cursor_x, cursor_y, font_size, &mut runs);
                }
            }
            _ => {}
        }
    }

    Ok(runs)
}
