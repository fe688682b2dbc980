use base64::Engine as _;
use image::GenericImageView;

use crate::editor::EditorError;
use crate::editor::backend::{EditBackend, EditRequest, EditResult};
use crate::editor::brush::Brush;
use crate::editor::mask::{MaskSurface, Point};

/// Instruction sent upstream when the embedding UI supplies no prompt of
/// its own.
const DEFAULT_PROMPT: &str = "Remove the regions highlighted by the semi-transparent red mask \
     and fill them in to match the surrounding image.";

/// Which of the two pages is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Upload,
    Edit,
}

/// Display-facing changes, drained by the embedding frontend instead of
/// being wired through callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    ViewChanged(View),
    BusyChanged(bool),
    MaskCleared,
    ResultReady { base64_data: String, mime_type: String },
    Error(String),
}

/// Viewport the image is rendered into, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

struct SourceImage {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
}

/// Image currently shown to the user: the uploaded source, or the latest
/// edit result once one arrives.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayedImage {
    pub base64_data: String,
    pub mime_type: String,
}

/// The editor session: all previously free-floating UI state (brush size,
/// drawing flag, selected file, page visibility) behind explicit mutation
/// points.
pub struct EditorSession {
    view: View,
    viewport: Viewport,
    source: Option<SourceImage>,
    displayed: Option<DisplayedImage>,
    mask: MaskSurface,
    brush: Brush,
    drawing: bool,
    last_point: Option<Point>,
    busy: bool,
    events: Vec<EditorEvent>,
}

impl EditorSession {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            view: View::Upload,
            viewport,
            source: None,
            displayed: None,
            mask: MaskSurface::new(0, 0),
            brush: Brush::default(),
            drawing: false,
            last_point: None,
            busy: false,
            events: Vec::new(),
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn brush_size(&self) -> u32 {
        self.brush.size()
    }

    pub fn mask(&self) -> &MaskSurface {
        &self.mask
    }

    pub fn displayed_image(&self) -> Option<&DisplayedImage> {
        self.displayed.as_ref()
    }

    /// Takes all pending events, oldest first.
    pub fn drain_events(&mut self) -> Vec<EditorEvent> {
        std::mem::take(&mut self.events)
    }

    /// Loads the selected file. A missing file is a silent no-op; a file
    /// that does not decode as an image surfaces an error and leaves the
    /// upload view active. On success the mask surface is sized to the
    /// image's rendered box and the edit view becomes active.
    pub fn load_image(&mut self, file: Option<Vec<u8>>) {
        let Some(bytes) = file else {
            return;
        };

        let decoded = match image::load_from_memory(&bytes) {
            Ok(img) => img,
            Err(e) => {
                self.push(EditorEvent::Error(
                    EditorError::Decode(e.to_string()).to_string(),
                ));
                return;
            }
        };

        let (width, height) = decoded.dimensions();
        self.displayed = Some(DisplayedImage {
            base64_data: base64::engine::general_purpose::STANDARD.encode(&bytes),
            mime_type: sniffed_mime(&bytes),
        });
        self.source = Some(SourceImage {
            bytes,
            width,
            height,
        });

        self.sync_mask_to_rendered_box();
        self.set_view(View::Edit);
    }

    /// Returns to the upload view, discarding the source image, result and
    /// mask.
    pub fn back(&mut self) {
        self.source = None;
        self.displayed = None;
        self.mask.resize(0, 0);
        self.drawing = false;
        self.last_point = None;
        self.set_view(View::Upload);
    }

    pub fn set_brush_size(&mut self, px: u32) {
        self.brush.set_size(px);
    }

    /// Starts a stroke and immediately paints a dot, so a single click
    /// still marks a point.
    pub fn begin_stroke(&mut self, point: Point) {
        if self.view != View::Edit {
            return;
        }
        self.drawing = true;
        self.mask.paint_dot(point, self.brush.size());
        self.last_point = Some(point);
    }

    /// Extends the active stroke to `point`. A no-op unless a stroke is
    /// active. Each segment starts where the previous one ended, so large
    /// jumps between samples stay connected.
    pub fn continue_stroke(&mut self, point: Point) {
        if !self.drawing {
            return;
        }
        let from = self.last_point.unwrap_or(point);
        self.mask.paint_segment(from, point, self.brush.size());
        self.last_point = Some(point);
    }

    pub fn end_stroke(&mut self) {
        self.drawing = false;
        self.last_point = None;
    }

    /// Clears all strokes without touching the image.
    pub fn reset_mask(&mut self) {
        self.mask.clear();
        self.push(EditorEvent::MaskCleared);
    }

    /// Resynchronizes the mask surface with the image's rendered box after
    /// a viewport change. Existing strokes are discarded.
    pub fn resize_viewport(&mut self, width: u32, height: u32) {
        self.viewport = Viewport::new(width, height);
        if self.source.is_some() {
            self.sync_mask_to_rendered_box();
            self.push(EditorEvent::MaskCleared);
        }
    }

    /// Submits the current image and mask for processing. At most one
    /// request is in flight per session; the busy flag is restored on every
    /// path. On success the displayed image is replaced and the mask
    /// cleared; on failure all editor state is left unchanged for a retry.
    pub async fn submit_edit(
        &mut self,
        backend: &dyn EditBackend,
        prompt: Option<&str>,
    ) -> Result<(), EditorError> {
        if self.busy {
            return Err(EditorError::Busy);
        }
        if self.source.is_none() {
            return Err(EditorError::NoImage);
        }

        self.busy = true;
        self.push(EditorEvent::BusyChanged(true));

        let outcome = self.run_submit(backend, prompt).await;

        self.busy = false;
        self.push(EditorEvent::BusyChanged(false));

        match outcome {
            Ok(result) => {
                self.displayed = Some(DisplayedImage {
                    base64_data: result.base64_data.clone(),
                    mime_type: result.mime_type.clone(),
                });
                self.mask.clear();
                self.push(EditorEvent::MaskCleared);
                self.push(EditorEvent::ResultReady {
                    base64_data: result.base64_data,
                    mime_type: result.mime_type,
                });
                Ok(())
            }
            Err(e) => {
                self.push(EditorEvent::Error(e.to_string()));
                Err(e)
            }
        }
    }

    async fn run_submit(
        &self,
        backend: &dyn EditBackend,
        prompt: Option<&str>,
    ) -> Result<EditResult, EditorError> {
        let source = self.source.as_ref().ok_or(EditorError::NoImage)?;

        let image = base64::engine::general_purpose::STANDARD.encode(&source.bytes);
        let mask_png = self.mask.to_png()?;
        let mask = base64::engine::general_purpose::STANDARD.encode(&mask_png);
        let prompt = prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(DEFAULT_PROMPT)
            .to_string();

        backend
            .process(EditRequest {
                prompt,
                image,
                mask,
            })
            .await
    }

    fn sync_mask_to_rendered_box(&mut self) {
        if let Some(source) = &self.source {
            let (w, h) = rendered_box(self.viewport, source.width, source.height);
            self.mask.resize(w, h);
        }
    }

    fn set_view(&mut self, view: View) {
        if self.view != view {
            self.view = view;
            self.push(EditorEvent::ViewChanged(view));
        }
    }

    fn push(&mut self, event: EditorEvent) {
        self.events.push(event);
    }
}

/// Aspect-fit dimensions of an image rendered inside the viewport, with a
/// 1-pixel floor on both axes.
fn rendered_box(viewport: Viewport, image_w: u32, image_h: u32) -> (u32, u32) {
    if image_w == 0 || image_h == 0 || viewport.width == 0 || viewport.height == 0 {
        return (1, 1);
    }

    let scale = (viewport.width as f32 / image_w as f32)
        .min(viewport.height as f32 / image_h as f32);

    let w = ((image_w as f32 * scale).round() as u32).max(1);
    let h = ((image_h as f32 * scale).round() as u32).max(1);
    (w, h)
}

fn sniffed_mime(bytes: &[u8]) -> String {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Jpeg) => "image/jpeg".to_string(),
        Ok(image::ImageFormat::WebP) => "image/webp".to_string(),
        _ => "image/png".to_string(),
    }
}
