//! Headless mask editor: an explicit session object over the upload/edit
//! flow, a transparent mask raster painted with a round brush, and a
//! backend boundary for submitting edits.

pub mod backend;
pub mod brush;
pub mod mask;
pub mod session;

pub use backend::{EditBackend, EditRequest, EditResult, HttpEditBackend};
pub use brush::Brush;
pub use mask::{MaskSurface, Point};
pub use session::{DisplayedImage, EditorEvent, EditorSession, View, Viewport};

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("no image loaded")]
    NoImage,

    #[error("an edit request is already in flight")]
    Busy,

    #[error("could not decode image: {0}")]
    Decode(String),

    #[error("could not encode mask: {0}")]
    Encode(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("edit rejected ({status}): {body}")]
    Backend { status: u16, body: String },
}
