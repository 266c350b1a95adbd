use crate::canvas::Canvas;
use crate::error::FormPressError;
use crate::metrics::{self, Face};
use crate::record::field_or_placeholder;
use crate::types::{Color, Mm, Size};

/// Geometry the section writer works within. All distances in millimeters.
#[derive(Debug, Clone)]
pub struct LayoutOptions {
    pub page_size: Size,
    /// Left edge of labels and dividers.
    pub margin_left: Mm,
    /// Right edge of dividers.
    pub margin_right: Mm,
    /// Cursor position after a page break.
    pub top_margin: Mm,
    /// Vertical slot consumed by one field row.
    pub row_height: Mm,
    /// Line height for wrapped free-text values.
    pub wrap_line_height: Mm,
    /// Cursor past this value triggers a page break.
    pub break_threshold: Mm,
    /// Painted on every fresh data page when set.
    pub background: Option<Color>,
}

impl LayoutOptions {
    pub fn a4_receipt() -> Self {
        let page_size = Size::a4();
        Self {
            page_size,
            margin_left: Mm::from_i32(10),
            margin_right: Mm::from_i32(10),
            top_margin: Mm::from_i32(20),
            row_height: Mm::from_i32(6),
            wrap_line_height: Mm::from_i32(4),
            // 17 mm above the bottom edge of a 297 mm page.
            break_threshold: Mm::from_i32(280),
            background: None,
        }
    }

    fn validate(&self) -> Result<(), FormPressError> {
        if self.page_size.width <= Mm::ZERO || self.page_size.height <= Mm::ZERO {
            return Err(FormPressError::InvalidLayout(
                "page size must be positive".to_string(),
            ));
        }
        if self.break_threshold <= self.top_margin {
            return Err(FormPressError::InvalidLayout(format!(
                "break threshold {} must lie below the top margin {}",
                self.break_threshold.to_f32(),
                self.top_margin.to_f32()
            )));
        }
        if self.row_height <= Mm::ZERO || self.wrap_line_height <= Mm::ZERO {
            return Err(FormPressError::InvalidLayout(
                "row and line heights must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Positions labeled fields on the page. The cursor is never stored here:
/// every write takes the current y and returns the next one, so a
/// composition sequence is testable call by call.
pub struct SectionWriter<'a> {
    canvas: &'a mut Canvas,
    opts: LayoutOptions,
}

impl<'a> SectionWriter<'a> {
    pub fn new(canvas: &'a mut Canvas, opts: LayoutOptions) -> Result<Self, FormPressError> {
        opts.validate()?;
        Ok(Self { canvas, opts })
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.opts
    }

    pub fn canvas(&mut self) -> &mut Canvas {
        self.canvas
    }

    /// Centered bold section title. Advances by one row.
    pub fn write_section(&mut self, title: &str, y: Mm) -> Mm {
        self.draw_centered(title, y, Face::HelveticaBold, 12.0);
        y + self.opts.row_height
    }

    /// One `Label: value` row. Bold label at `x_label`, regular value at
    /// `x_value`, absent values rendered as the placeholder. Advances the
    /// cursor by one row.
    pub fn write_field(
        &mut self,
        label: &str,
        value: Option<&str>,
        y: Mm,
        x_label: Mm,
        x_value: Mm,
    ) -> Mm {
        self.canvas.set_font(Face::HelveticaBold);
        self.canvas.set_font_size(10.0);
        self.canvas.draw_string(x_label, y, format!("{}:", label));
        self.canvas.set_font(Face::Helvetica);
        self.canvas
            .draw_string(x_value, y, field_or_placeholder(value));
        y + self.opts.row_height
    }

    /// Second-column counterpart of a field row. Writes at the given y and
    /// does not advance, so the caller re-uses the primary row's slot.
    pub fn write_inline_field(
        &mut self,
        label: &str,
        value: Option<&str>,
        y: Mm,
        x_label: Mm,
        x_value: Mm,
    ) {
        self.canvas.set_font(Face::HelveticaBold);
        self.canvas.set_font_size(10.0);
        self.canvas.draw_string(x_label, y, format!("{}:", label));
        self.canvas.set_font(Face::Helvetica);
        self.canvas
            .draw_string(x_value, y, field_or_placeholder(value));
    }

    /// A field row plus its designated inline counterpart sharing the same
    /// vertical slot, regardless of write order.
    pub fn write_field_pair(
        &mut self,
        label: &str,
        value: Option<&str>,
        inline: Option<(&str, Option<&str>, Mm, Mm)>,
        y: Mm,
        x_label: Mm,
        x_value: Mm,
    ) -> Mm {
        let next = self.write_field(label, value, y, x_label, x_value);
        if let Some((inline_label, inline_value, ix_label, ix_value)) = inline {
            self.write_inline_field(inline_label, inline_value, y, ix_label, ix_value);
        }
        next
    }

    /// Long free-text field (addresses): bold label at the left margin,
    /// value word-wrapped at `max_width` starting at `x_value`. Advances by
    /// `wrap_line_height * lines` plus 2 mm of padding.
    pub fn write_wrapped(
        &mut self,
        label: &str,
        value: Option<&str>,
        y: Mm,
        x_value: Mm,
        max_width: Mm,
    ) -> Result<Mm, FormPressError> {
        if max_width <= Mm::ZERO {
            return Err(FormPressError::InvalidLayout(format!(
                "wrap width must be positive, got {}",
                max_width.to_f32()
            )));
        }
        self.canvas.set_font(Face::HelveticaBold);
        self.canvas.set_font_size(11.0);
        self.canvas
            .draw_string(self.opts.margin_left, y, format!("{}:", label));
        self.canvas.set_font(Face::Helvetica);

        let text = field_or_placeholder(value);
        let lines = wrap_text(Face::Helvetica, 11.0, text, max_width);
        for (index, line) in lines.iter().enumerate() {
            let line_y = y + self.opts.wrap_line_height * index as i32;
            self.canvas.draw_string(x_value, line_y, line.clone());
        }
        Ok(y + self.opts.wrap_line_height * lines.len() as i32 + Mm::from_i32(2))
    }

    /// Full-width wrapped paragraph (note and terms text), no label.
    pub fn write_paragraph(
        &mut self,
        text: &str,
        y: Mm,
        x: Mm,
        max_width: Mm,
        font_size: f32,
        line_height: Mm,
    ) -> Result<Mm, FormPressError> {
        if max_width <= Mm::ZERO {
            return Err(FormPressError::InvalidLayout(format!(
                "paragraph width must be positive, got {}",
                max_width.to_f32()
            )));
        }
        self.canvas.set_font(Face::Helvetica);
        self.canvas.set_font_size(font_size);
        let mut cursor = y;
        for source_line in text.lines() {
            let trimmed = source_line.trim();
            if trimmed.is_empty() {
                continue;
            }
            for line in wrap_text(Face::Helvetica, font_size, trimmed, max_width) {
                self.canvas.draw_string(x, cursor, line);
                cursor += line_height;
            }
        }
        Ok(cursor)
    }

    /// Horizontal separator between sections, drawn as a thin rule.
    pub fn divider(&mut self, y: Mm) {
        let right = self.opts.page_size.width - self.opts.margin_right;
        self.canvas.set_line_width(Mm::from_f32(0.2));
        self.canvas
            .draw_line(self.opts.margin_left, y, right, y);
    }

    /// Starts a fresh data page once the cursor crosses `threshold`,
    /// repainting the background and returning the reset cursor. A cursor
    /// above the threshold passes through untouched.
    pub fn maybe_break_page(&mut self, y: Mm, threshold: Mm) -> Mm {
        if y < threshold {
            return y;
        }
        self.canvas.new_page(self.opts.page_size);
        self.paint_background();
        self.opts.top_margin
    }

    /// Background fill for a freshly opened data page.
    pub fn paint_background(&mut self) {
        if let Some(color) = self.opts.background {
            self.canvas.set_fill_color(color);
            self.canvas.fill_rect(
                Mm::ZERO,
                Mm::ZERO,
                self.opts.page_size.width,
                self.opts.page_size.height,
            );
            self.canvas.set_fill_color(Color::BLACK);
        }
    }

    /// Text centered on the page's vertical axis.
    pub fn draw_centered(&mut self, text: &str, y: Mm, face: Face, size: f32) {
        let width = metrics::text_width(face, size, text);
        let x = (self.opts.page_size.width - width) / 2;
        self.canvas.set_font(face);
        self.canvas.set_font_size(size);
        self.canvas.draw_string(x.max(Mm::ZERO), y, text);
    }

    /// Text whose right edge sits at `x_right`.
    pub fn draw_right_aligned(&mut self, text: &str, y: Mm, x_right: Mm, face: Face, size: f32) {
        let width = metrics::text_width(face, size, text);
        let x = (x_right - width).max(Mm::ZERO);
        self.canvas.set_font(face);
        self.canvas.set_font_size(size);
        self.canvas.draw_string(x, y, text);
    }
}

/// Greedy word wrap against measured Helvetica widths. A single word wider
/// than `max_width` is broken at character granularity rather than
/// overflowing the column.
pub fn wrap_text(face: Face, font_size: f32, text: &str, max_width: Mm) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    let mut push_word = |word: &str, lines: &mut Vec<String>, current: &mut String| {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if metrics::text_width(face, font_size, &candidate) <= max_width {
            *current = candidate;
            return;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(current));
        }
        if metrics::text_width(face, font_size, word) <= max_width {
            *current = word.to_string();
            return;
        }
        // Oversized word: hard-break by characters.
        let mut piece = String::new();
        for ch in word.chars() {
            piece.push(ch);
            if metrics::text_width(face, font_size, &piece) > max_width && piece.chars().count() > 1
            {
                let overflow = piece.pop();
                lines.push(std::mem::take(&mut piece));
                if let Some(ch) = overflow {
                    piece.push(ch);
                }
            }
        }
        *current = piece;
    };

    for word in text.split_whitespace() {
        push_word(word, &mut lines, &mut current);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}
