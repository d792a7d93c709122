//! Canvas editing surface: a retained scene graph with JSON snapshots,
//! raster export, and a bounded-history edit session.

pub mod data_url;
pub mod scene;
pub mod session;

pub use data_url::{decode_data_url, encode_png_data_url, DataUrlError};
pub use scene::{Color, Scene, SceneError, SceneObject};
pub use session::{EditSession, Template, HISTORY_LIMIT};
