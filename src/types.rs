use fixed::types::I32F32;

/// Millimeters per pixel at the reference 96 DPI.
pub const MM_PER_PX: f32 = 0.264583;
/// Millimeters per PostScript point (1/72 in).
pub const MM_PER_PT: f32 = 0.352778;

/// Page-space length in millimeters, stored as fixed-point so that layout
/// arithmetic is deterministic across platforms.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Mm(I32F32);

impl Mm {
    pub const ZERO: Mm = Mm(I32F32::from_bits(0));

    pub fn from_f32(value: f32) -> Mm {
        if !value.is_finite() {
            return Mm::ZERO;
        }
        let milli = (value as f64 * 1000.0).round();
        let milli = milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
        Mm::from_milli_i64(milli)
    }

    pub fn from_i32(value: i32) -> Mm {
        Mm::from_milli_i64((value as i64) * 1000)
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    /// Thousandths of a millimeter, rounded half away from zero.
    pub fn to_milli_i64(self) -> i64 {
        let bits = self.0.to_bits() as i128;
        let denom = 1i128 << 32;
        let scaled = bits * 1000;
        let adj = if scaled >= 0 { denom / 2 } else { -denom / 2 };
        let milli = (scaled + adj) / denom;
        milli.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn from_milli_i64(milli: i64) -> Mm {
        Mm::from_milli_i128(milli as i128)
    }

    fn from_milli_i128(milli: i128) -> Mm {
        let denom = 1i128 << 32;
        let adj = if milli >= 0 { 500 } else { -500 };
        let bits = (milli * denom + adj) / 1000;
        let bits = bits.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        Mm(I32F32::from_bits(bits))
    }

    pub fn max(self, other: Mm) -> Mm {
        if self >= other { self } else { other }
    }

    pub fn min(self, other: Mm) -> Mm {
        if self <= other { self } else { other }
    }

    /// Source pixel dimension to page millimeters at the reference DPI.
    pub fn from_px(px: f32) -> Mm {
        Mm::from_f32(px * MM_PER_PX)
    }

    /// PDF points (as read from a merged document's page box) to millimeters.
    pub fn from_pt(pt: f32) -> Mm {
        Mm::from_f32(pt * MM_PER_PT)
    }

    /// Back to pixels at the reference DPI.
    pub fn to_px(self) -> f32 {
        self.to_f32() / MM_PER_PX
    }

    /// Back to PDF points for the output stream.
    pub fn to_pt(self) -> f32 {
        self.to_f32() * 72.0 / 25.4
    }
}

impl std::ops::Add for Mm {
    type Output = Mm;
    fn add(self, rhs: Mm) -> Mm {
        Mm::from_milli_i128(self.to_milli_i64() as i128 + rhs.to_milli_i64() as i128)
    }
}

impl std::ops::AddAssign for Mm {
    fn add_assign(&mut self, rhs: Mm) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for Mm {
    type Output = Mm;
    fn sub(self, rhs: Mm) -> Mm {
        Mm::from_milli_i128(self.to_milli_i64() as i128 - rhs.to_milli_i64() as i128)
    }
}

impl std::ops::SubAssign for Mm {
    fn sub_assign(&mut self, rhs: Mm) {
        *self = *self - rhs;
    }
}

impl std::ops::Mul<i32> for Mm {
    type Output = Mm;
    fn mul(self, rhs: i32) -> Mm {
        let milli = self.to_milli_i64() as i128;
        Mm::from_milli_i128(milli.saturating_mul(rhs as i128))
    }
}

impl std::ops::Mul<f32> for Mm {
    type Output = Mm;
    fn mul(self, rhs: f32) -> Mm {
        if !rhs.is_finite() {
            return Mm::ZERO;
        }
        Mm::from_f32(self.to_f32() * rhs)
    }
}

impl std::ops::Div<i32> for Mm {
    type Output = Mm;
    fn div(self, rhs: i32) -> Mm {
        if rhs == 0 {
            Mm::ZERO
        } else {
            let milli = self.to_milli_i64() as i128;
            let den = rhs as i128;
            let den_abs = den.abs();
            let value = if milli >= 0 {
                (milli + den_abs / 2) / den
            } else {
                -(((-milli) + den_abs / 2) / den)
            };
            Mm::from_milli_i128(value)
        }
    }
}

impl std::ops::Div<f32> for Mm {
    type Output = Mm;
    fn div(self, rhs: f32) -> Mm {
        if rhs == 0.0 || !rhs.is_finite() {
            Mm::ZERO
        } else {
            Mm::from_f32(self.to_f32() / rhs)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: Mm,
    pub height: Mm,
}

impl Size {
    /// The default receipt canvas: A4 portrait.
    pub fn a4() -> Self {
        Self {
            width: Mm::from_i32(210),
            height: Mm::from_i32(297),
        }
    }

    pub fn new(width: Mm, height: Mm) -> Self {
        Self { width, height }
    }

    /// Page box of a merged source page, given in PDF points.
    pub fn from_pt(width_pt: f32, height_pt: f32) -> Self {
        Self {
            width: Mm::from_pt(width_pt),
            height: Mm::from_pt(height_pt),
        }
    }

    /// Natural pixel dimensions of a decoded bitmap at the reference DPI.
    pub fn from_px(width_px: f32, height_px: f32) -> Self {
        Self {
            width: Mm::from_px(width_px),
            height: Mm::from_px(height_px),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: Mm,
    pub y: Mm,
    pub width: Mm,
    pub height: Mm,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }
}
