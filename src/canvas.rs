use crate::metrics::Face;
use crate::types::{Color, Mm, Size};
use std::collections::HashMap;

/// One recorded drawing operation. Coordinates are millimeters from the
/// top-left corner of the page; text `y` is the baseline.
#[derive(Debug, Clone)]
pub enum Command {
    SetFillColor(Color),
    SetFont(Face),
    SetFontSize(f32),
    SetLineWidth(Mm),
    DrawLine {
        x1: Mm,
        y1: Mm,
        x2: Mm,
        y2: Mm,
    },
    FillRect {
        x: Mm,
        y: Mm,
        width: Mm,
        height: Mm,
    },
    DrawString {
        x: Mm,
        y: Mm,
        text: String,
    },
    DrawImage {
        x: Mm,
        y: Mm,
        width: Mm,
        height: Mm,
        resource_id: String,
    },
}

/// A finished page: explicit size plus its command stream. Attachment pages
/// may be larger than the nominal A4 canvas.
#[derive(Debug, Clone)]
pub struct Page {
    pub size: Size,
    pub commands: Vec<Command>,
}

/// Ordered, append-only page sequence plus the raster resources the pages
/// reference. This is the composition output prior to PDF serialization.
#[derive(Debug, Clone)]
pub struct OutputDocument {
    pub pages: Vec<Page>,
    pub images: HashMap<String, Vec<u8>>,
}

impl OutputDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    fill_color: Color,
    face: Face,
    font_size: f32,
    line_width: Mm,
}

impl GraphicsState {
    fn fresh() -> Self {
        Self {
            fill_color: Color::BLACK,
            face: Face::Helvetica,
            font_size: 10.0,
            // The PDF graphics-state default, 1 pt.
            line_width: Mm::from_pt(1.0),
        }
    }
}

/// Records commands for the current page and accumulates finished pages.
/// State setters are deduplicated against the current graphics state so the
/// stream stays small.
pub struct Canvas {
    pages: Vec<Page>,
    current_size: Size,
    current: Vec<Command>,
    state: GraphicsState,
    images: HashMap<String, Vec<u8>>,
    next_image_index: usize,
}

impl Canvas {
    pub fn new(page_size: Size) -> Self {
        Self {
            pages: Vec::new(),
            current_size: page_size,
            current: Vec::new(),
            state: GraphicsState::fresh(),
            images: HashMap::new(),
            next_image_index: 1,
        }
    }

    pub fn page_size(&self) -> Size {
        self.current_size
    }

    pub fn set_fill_color(&mut self, color: Color) {
        if self.state.fill_color == color {
            return;
        }
        self.state.fill_color = color;
        self.current.push(Command::SetFillColor(color));
    }

    pub fn set_font(&mut self, face: Face) {
        if self.state.face == face {
            return;
        }
        self.state.face = face;
        self.current.push(Command::SetFont(face));
    }

    pub fn set_font_size(&mut self, size: f32) {
        if self.state.font_size == size {
            return;
        }
        self.state.font_size = size;
        self.current.push(Command::SetFontSize(size));
    }

    pub fn set_line_width(&mut self, width: Mm) {
        let width = width.max(Mm::ZERO);
        if self.state.line_width == width {
            return;
        }
        self.state.line_width = width;
        self.current.push(Command::SetLineWidth(width));
    }

    pub fn draw_line(&mut self, x1: Mm, y1: Mm, x2: Mm, y2: Mm) {
        self.current.push(Command::DrawLine { x1, y1, x2, y2 });
    }

    pub fn fill_rect(&mut self, x: Mm, y: Mm, width: Mm, height: Mm) {
        self.current.push(Command::FillRect {
            x,
            y,
            width,
            height,
        });
    }

    pub fn draw_string(&mut self, x: Mm, y: Mm, text: impl Into<String>) {
        self.current.push(Command::DrawString {
            x,
            y,
            text: text.into(),
        });
    }

    /// Registers raster bytes once and returns the resource id to draw with.
    pub fn register_image(&mut self, data: Vec<u8>) -> String {
        let id = format!("img{}", self.next_image_index);
        self.next_image_index += 1;
        self.images.insert(id.clone(), data);
        id
    }

    pub fn draw_image(&mut self, x: Mm, y: Mm, width: Mm, height: Mm, resource_id: &str) {
        self.current.push(Command::DrawImage {
            x,
            y,
            width,
            height,
            resource_id: resource_id.to_string(),
        });
    }

    /// Closes the page in progress and opens a fresh one of `size`. The
    /// closed page is immutable from here on; graphics state resets so each
    /// page's stream is self-contained.
    pub fn new_page(&mut self, size: Size) {
        let commands = std::mem::take(&mut self.current);
        self.pages.push(Page {
            size: self.current_size,
            commands,
        });
        self.current_size = size;
        self.state = GraphicsState::fresh();
    }

    pub fn finish(mut self) -> OutputDocument {
        if !self.current.is_empty() || self.pages.is_empty() {
            let commands = std::mem::take(&mut self.current);
            self.pages.push(Page {
                size: self.current_size,
                commands,
            });
        }
        OutputDocument {
            pages: self.pages,
            images: self.images,
        }
    }
}
