//! Retained 2D scene graph: shape/text/image objects with JSON
//! serialization and raster export.

use crate::data_url::{decode_data_url, DataUrlError};
use image::{imageops, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("scene snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error(transparent)]
    DataUrl(#[from] DataUrlError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255 };
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    fn pixel(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, 255])
    }
}

/// One retained object. Coordinates are scene pixels, origin top-left,
/// matching the editor surface the UI draws on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SceneObject {
    Text {
        id: u64,
        left: f32,
        top: f32,
        width: f32,
        text: String,
        font_size: f32,
        fill: Color,
    },
    Rect {
        id: u64,
        left: f32,
        top: f32,
        width: f32,
        height: f32,
        fill: Color,
    },
    Ellipse {
        id: u64,
        left: f32,
        top: f32,
        radius_x: f32,
        radius_y: f32,
        fill: Color,
    },
    Image {
        id: u64,
        left: f32,
        top: f32,
        width: f32,
        height: f32,
        /// Source raster as a data URL.
        data_url: String,
    },
}

impl SceneObject {
    pub fn id(&self) -> u64 {
        match self {
            SceneObject::Text { id, .. }
            | SceneObject::Rect { id, .. }
            | SceneObject::Ellipse { id, .. }
            | SceneObject::Image { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub width: u32,
    pub height: u32,
    pub background: Color,
    objects: Vec<SceneObject>,
    next_object_id: u64,
}

impl Scene {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            background: Color::WHITE,
            objects: Vec::new(),
            next_object_id: 1,
        }
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_object_id;
        self.next_object_id += 1;
        id
    }

    pub fn add_text(
        &mut self,
        text: impl Into<String>,
        left: f32,
        top: f32,
        font_size: f32,
        fill: Color,
    ) -> u64 {
        let id = self.next_id();
        let text = text.into();
        let width = text.chars().count() as f32 * font_size * 0.5;
        self.objects.push(SceneObject::Text { id, left, top, width, text, font_size, fill });
        id
    }

    pub fn add_rect(&mut self, left: f32, top: f32, width: f32, height: f32, fill: Color) -> u64 {
        let id = self.next_id();
        self.objects.push(SceneObject::Rect { id, left, top, width, height, fill });
        id
    }

    pub fn add_ellipse(
        &mut self,
        left: f32,
        top: f32,
        radius_x: f32,
        radius_y: f32,
        fill: Color,
    ) -> u64 {
        let id = self.next_id();
        self.objects.push(SceneObject::Ellipse { id, left, top, radius_x, radius_y, fill });
        id
    }

    pub fn add_image(
        &mut self,
        data_url: impl Into<String>,
        left: f32,
        top: f32,
        width: f32,
        height: f32,
    ) -> u64 {
        let id = self.next_id();
        self.objects.push(SceneObject::Image {
            id,
            left,
            top,
            width,
            height,
            data_url: data_url.into(),
        });
        id
    }

    pub fn remove_object(&mut self, id: u64) -> bool {
        let before = self.objects.len();
        self.objects.retain(|object| object.id() != id);
        self.objects.len() != before
    }

    pub fn clear_objects(&mut self) {
        self.objects.clear();
    }

    /// Serialized snapshot of the full scene.
    pub fn to_json(&self) -> Result<String, SceneError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SceneError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Raster export of the scene. Shapes and images draw exactly; text
    /// draws as a solid strip sized to its metrics (the UI surface owns
    /// glyph rendering).
    pub fn rasterize(&self) -> Result<RgbaImage, SceneError> {
        let mut canvas =
            RgbaImage::from_pixel(self.width, self.height, self.background.pixel());

        for object in &self.objects {
            match object {
                SceneObject::Rect { left, top, width, height, fill, .. } => {
                    fill_rect(&mut canvas, *left, *top, *width, *height, fill.pixel());
                }
                SceneObject::Text { left, top, width, text, font_size, fill, .. } => {
                    if !text.is_empty() {
                        fill_rect(
                            &mut canvas,
                            *left,
                            *top,
                            *width,
                            font_size * 0.7,
                            fill.pixel(),
                        );
                    }
                }
                SceneObject::Ellipse { left, top, radius_x, radius_y, fill, .. } => {
                    fill_ellipse(&mut canvas, *left, *top, *radius_x, *radius_y, fill.pixel());
                }
                SceneObject::Image { left, top, width, height, data_url, .. } => {
                    let source = decode_data_url(data_url)?;
                    let target_w = width.round().max(1.0) as u32;
                    let target_h = height.round().max(1.0) as u32;
                    let resized = imageops::resize(
                        &source,
                        target_w,
                        target_h,
                        imageops::FilterType::Triangle,
                    );
                    imageops::overlay(&mut canvas, &resized, *left as i64, *top as i64);
                }
            }
        }

        Ok(canvas)
    }
}

fn fill_rect(canvas: &mut RgbaImage, left: f32, top: f32, width: f32, height: f32, pixel: Rgba<u8>) {
    let x0 = left.max(0.0) as u32;
    let y0 = top.max(0.0) as u32;
    let x1 = ((left + width).max(0.0) as u32).min(canvas.width());
    let y1 = ((top + height).max(0.0) as u32).min(canvas.height());

    for y in y0..y1 {
        for x in x0..x1 {
            canvas.put_pixel(x, y, pixel);
        }
    }
}

fn fill_ellipse(
    canvas: &mut RgbaImage,
    left: f32,
    top: f32,
    radius_x: f32,
    radius_y: f32,
    pixel: Rgba<u8>,
) {
    if radius_x <= 0.0 || radius_y <= 0.0 {
        return;
    }

    let center_x = left + radius_x;
    let center_y = top + radius_y;
    let x0 = left.max(0.0) as u32;
    let y0 = top.max(0.0) as u32;
    let x1 = ((left + radius_x * 2.0).max(0.0) as u32).min(canvas.width());
    let y1 = ((top + radius_y * 2.0).max(0.0) as u32).min(canvas.height());

    for y in y0..y1 {
        for x in x0..x1 {
            let dx = (x as f32 + 0.5 - center_x) / radius_x;
            let dy = (y as f32 + 0.5 - center_y) / radius_y;
            if dx * dx + dy * dy <= 1.0 {
                canvas.put_pixel(x, y, pixel);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_url::encode_png_data_url;

    #[test]
    fn snapshot_round_trips_exactly() {
        let mut scene = Scene::new(200, 100);
        scene.add_text("Hello", 10.0, 10.0, 16.0, Color::BLACK);
        scene.add_rect(0.0, 0.0, 50.0, 20.0, Color::rgb(29, 78, 216));
        scene.add_ellipse(40.0, 40.0, 30.0, 20.0, Color::rgb(245, 158, 11));

        let json = scene.to_json().expect("serialize");
        let restored = Scene::from_json(&json).expect("deserialize");
        assert_eq!(restored, scene);
    }

    #[test]
    fn object_ids_are_unique_and_removal_works() {
        let mut scene = Scene::new(100, 100);
        let a = scene.add_rect(0.0, 0.0, 10.0, 10.0, Color::BLACK);
        let b = scene.add_rect(0.0, 0.0, 10.0, 10.0, Color::BLACK);
        assert_ne!(a, b);

        assert!(scene.remove_object(a));
        assert!(!scene.remove_object(a));
        assert_eq!(scene.objects().len(), 1);
        assert_eq!(scene.objects()[0].id(), b);
    }

    #[test]
    fn rasterize_fills_background_and_draws_rect() {
        let mut scene = Scene::new(40, 40);
        scene.add_rect(10.0, 10.0, 20.0, 20.0, Color::BLACK);

        let raster = scene.rasterize().expect("rasterize");
        assert_eq!(raster.dimensions(), (40, 40));
        assert_eq!(raster.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(raster.get_pixel(20, 20), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn rasterize_draws_image_objects_resized_in_place() {
        let source = RgbaImage::from_pixel(4, 4, Rgba([200, 0, 0, 255]));
        let data_url = encode_png_data_url(&source).expect("encode");

        let mut scene = Scene::new(50, 50);
        scene.add_image(data_url, 20.0, 20.0, 10.0, 10.0);

        let raster = scene.rasterize().expect("rasterize");
        assert_eq!(raster.get_pixel(25, 25), &Rgba([200, 0, 0, 255]));
        assert_eq!(raster.get_pixel(5, 5), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn ellipse_fills_center_but_not_corner() {
        let mut scene = Scene::new(40, 40);
        scene.add_ellipse(10.0, 10.0, 10.0, 10.0, Color::BLACK);

        let raster = scene.rasterize().expect("rasterize");
        assert_eq!(raster.get_pixel(20, 20), &Rgba([0, 0, 0, 255]));
        // The bounding-box corner lies outside the ellipse.
        assert_eq!(raster.get_pixel(10, 10), &Rgba([255, 255, 255, 255]));
    }
}
