//! Half-width / full-width character folding for Japanese venue names.

/// Full-width counterparts of U+FF61..=U+FF9F, in code point order.
const HALF_WIDTH_KATAKANA: &str = "。「」、・ヲァィゥェォャュョッーアイウエオカキクケコサシスセソタチツテトナニヌネノハヒフヘホマミムメモヤユヨラリルレロワン゛゜";

const HALF_KATAKANA_START: u32 = 0xFF61;
const HALF_VOICED_MARK: char = '\u{FF9E}';
const HALF_SEMI_VOICED_MARK: char = '\u{FF9F}';
const ASCII_OFFSET: u32 = 0xFEE0;

fn widen_katakana(c: char) -> Option<char> {
    let index = (c as u32).checked_sub(HALF_KATAKANA_START)?;
    HALF_WIDTH_KATAKANA.chars().nth(index as usize)
}

fn with_voiced_mark(base: char) -> Option<char> {
    match base {
        'ウ' => Some('ヴ'),
        _ if "カキクケコサシスセソタチツテトハヒフヘホ".contains(base) => char::from_u32(base as u32 + 1),
        _ => None,
    }
}

fn with_semi_voiced_mark(base: char) -> Option<char> {
    if "ハヒフヘホ".contains(base) {
        char::from_u32(base as u32 + 2)
    } else {
        None
    }
}

/// Fold printable ASCII, the ASCII space and half-width katakana to their
/// full-width forms. A half-width voicing mark combines with the preceding
/// kana where a precomposed form exists.
pub fn widen(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 3);
    for c in input.chars() {
        let mark = match c {
            HALF_VOICED_MARK => out.chars().last().and_then(with_voiced_mark),
            HALF_SEMI_VOICED_MARK => out.chars().last().and_then(with_semi_voiced_mark),
            _ => None,
        };
        if let Some(composed) = mark {
            out.pop();
            out.push(composed);
            continue;
        }

        let wide = match c {
            ' ' => '\u{3000}',
            '!'..='~' => char::from_u32(c as u32 + ASCII_OFFSET).unwrap_or(c),
            '\u{FF61}'..='\u{FF9F}' => widen_katakana(c).unwrap_or(c),
            _ => c,
        };
        out.push(wide);
    }
    out
}

/// Fold full-width ASCII and the ideographic space back to plain ASCII.
/// Kana are left full-width.
pub fn narrow(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\u{3000}' => ' ',
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - ASCII_OFFSET).unwrap_or(c),
            _ => c,
        })
        .collect()
}
