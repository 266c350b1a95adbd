use crate::types::Mm;

/// The two base-14 faces the receipt uses. Nothing is embedded; viewers
/// supply these, so only advance widths are needed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    Helvetica,
    HelveticaBold,
}

impl Face {
    pub fn base_font(self) -> &'static str {
        match self {
            Face::Helvetica => "Helvetica",
            Face::HelveticaBold => "Helvetica-Bold",
        }
    }

    pub fn resource(self) -> &'static str {
        match self {
            Face::Helvetica => "F1",
            Face::HelveticaBold => "F2",
        }
    }
}

// Standard AFM advance widths (1/1000 em) for WinAnsi codes 32..=126.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556, 556,
    556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, 1015, 667, 667, 722, 722,
    667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944,
    667, 667, 611, 278, 278, 278, 469, 556, 333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222,
    500, 222, 833, 556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334,
    584,
];

const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556, 556,
    556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, 975, 722, 722, 722, 722, 667,
    611, 778, 722, 278, 556, 722, 611, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667,
    667, 611, 333, 278, 333, 584, 556, 333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556,
    278, 889, 611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

// Glyphs outside the tabled range fall back to 0.6 em, matching the
// approximation the layout uses when no metrics are available at all.
const FALLBACK_MILLI_EM: u16 = 600;

fn advance_milli_em(face: Face, ch: char) -> u16 {
    let table = match face {
        Face::Helvetica => &HELVETICA_WIDTHS,
        Face::HelveticaBold => &HELVETICA_BOLD_WIDTHS,
    };
    let code = ch as u32;
    if (32..=126).contains(&code) {
        table[(code - 32) as usize]
    } else {
        FALLBACK_MILLI_EM
    }
}

/// Width of `text` set in `face` at `font_size_pt`, in page millimeters.
pub fn text_width(face: Face, font_size_pt: f32, text: &str) -> Mm {
    let mut milli_em: i64 = 0;
    for ch in text.chars() {
        milli_em += advance_milli_em(face, ch) as i64;
    }
    // milli-em * pt/em -> pt, then pt -> mm.
    let width_pt = (milli_em as f32 / 1000.0) * font_size_pt;
    Mm::from_pt(width_pt)
}
