//! Dropdown vocabularies for purchase status and product type.

use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Status values present in the reference workbook (cell B9).
pub const DEFAULT_STATUS_OPTIONS: [&str; 3] = ["Carregando", "Viajando", "Concluído"];

/// Product types present in the reference workbook (cell B12).
pub const DEFAULT_TIPO_OPTIONS: [&str; 2] = ["Moradas", "VALCATORCE INCA"];

/// Trims, drops blanks, removes exact duplicates and sorts with pt-BR collation.
pub fn unique_non_empty<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let distinct: BTreeSet<String> = values
        .into_iter()
        .map(|v| v.as_ref().trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();

    let mut sorted: Vec<String> = distinct.into_iter().collect();
    sorted.sort_by(|a, b| collate_pt_br(a, b));
    sorted
}

/// Union of two option lists, normalized the same way as [`unique_non_empty`].
pub fn union_sort<A, B>(a: &[A], b: &[B]) -> Vec<String>
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    unique_non_empty(
        a.iter()
            .map(|v| v.as_ref())
            .chain(b.iter().map(|v| v.as_ref())),
    )
}

pub fn with_default_status<S: AsRef<str>>(observed: &[S]) -> Vec<String> {
    union_sort(&DEFAULT_STATUS_OPTIONS, observed)
}

pub fn with_default_tipo<S: AsRef<str>>(observed: &[S]) -> Vec<String> {
    union_sort(&DEFAULT_TIPO_OPTIONS, observed)
}

/// Portuguese collation in three levels, after the CLDR root order: whitespace, then
/// punctuation and symbols, then digits, then letters. Ties on base characters are broken by
/// accents (unaccented first), then by case and compatibility forms (lowercase first).
/// Ligatures and vulgar fractions expand (`ß` as `ss`, `Œ` as `OE`, `½` as `1/2`).
pub fn collate_pt_br(a: &str, b: &str) -> Ordering {
    let (ka, kb) = (CollationKey::new(a), CollationKey::new(b));
    ka.primary
        .cmp(&kb.primary)
        .then_with(|| ka.secondary.cmp(&kb.secondary))
        .then_with(|| ka.tertiary.cmp(&kb.tertiary))
        .then_with(|| a.cmp(b))
}

// Primary weight groups
const WHITESPACE: u32 = 0x0100_0000;
const PUNCTUATION: u32 = 0x0200_0000;
const SYMBOL: u32 = 0x0300_0000;
const DIGIT: u32 = 0x0400_0000;
const LATIN: u32 = 0x0500_0000;
const OTHER_LETTER: u32 = 0x0600_0000;

/// Punctuation and ASCII symbols in root collation order.
const PUNCTUATION_ORDER: &str = "_-,;:!¡?¿.'\"«»()[]{}§¶@*/\\&#%‰`´^¨+<=>|~$";

// Tertiary weights
const LOWER: u8 = 0;
const COMPAT: u8 = 1;
const UPPER: u8 = 2;

struct CollationKey {
    primary: Vec<u32>,
    secondary: Vec<u8>,
    tertiary: Vec<u8>,
}

impl CollationKey {
    fn new(text: &str) -> Self {
        let mut key = CollationKey {
            primary: Vec::with_capacity(text.len()),
            secondary: Vec::with_capacity(text.len()),
            tertiary: Vec::with_capacity(text.len()),
        };
        for ch in text.chars() {
            let lower = ch.to_lowercase().next().unwrap_or(ch);
            let case = if ch != lower { UPPER } else { LOWER };

            if let Some(expansion) = expand(lower) {
                for base in expansion.chars() {
                    key.push(base, 0, case + COMPAT);
                }
                continue;
            }

            let (base, accent) = fold_accent(lower);
            key.push(base, accent, case);
        }
        key
    }

    fn push(&mut self, base: char, accent: u8, tertiary: u8) {
        self.primary.push(primary_weight(base));
        self.secondary.push(accent);
        self.tertiary.push(tertiary);
    }
}

fn primary_weight(ch: char) -> u32 {
    if ch.is_whitespace() {
        return WHITESPACE + ch as u32;
    }
    if let Some(idx) = PUNCTUATION_ORDER.chars().position(|p| p == ch) {
        return PUNCTUATION + idx as u32;
    }
    if let Some(d) = ch.to_digit(10) {
        return DIGIT + d;
    }
    if ch.is_ascii_lowercase() {
        return LATIN + (ch as u32 - 'a' as u32);
    }
    if ch.is_alphabetic() {
        return OTHER_LETTER + ch as u32;
    }
    SYMBOL + ch as u32
}

fn expand(ch: char) -> Option<&'static str> {
    match ch {
        'ß' => Some("ss"),
        'æ' => Some("ae"),
        'œ' => Some("oe"),
        'ĳ' => Some("ij"),
        'ﬀ' => Some("ff"),
        'ﬁ' => Some("fi"),
        'ﬂ' => Some("fl"),
        '¼' => Some("1/4"),
        '½' => Some("1/2"),
        '¾' => Some("3/4"),
        '¹' => Some("1"),
        '²' => Some("2"),
        '³' => Some("3"),
        'ª' => Some("a"),
        'º' => Some("o"),
        _ => None,
    }
}

fn fold_accent(ch: char) -> (char, u8) {
    match ch {
        'á' => ('a', 1),
        'à' => ('a', 2),
        'â' => ('a', 3),
        'ã' => ('a', 4),
        'ä' => ('a', 5),
        'å' => ('a', 6),
        'ç' => ('c', 7),
        'é' => ('e', 1),
        'è' => ('e', 2),
        'ê' => ('e', 3),
        'ë' => ('e', 5),
        'í' => ('i', 1),
        'ì' => ('i', 2),
        'î' => ('i', 3),
        'ï' => ('i', 5),
        'ñ' => ('n', 4),
        'ó' => ('o', 1),
        'ò' => ('o', 2),
        'ô' => ('o', 3),
        'õ' => ('o', 4),
        'ö' => ('o', 5),
        'ø' => ('o', 8),
        'ú' => ('u', 1),
        'ù' => ('u', 2),
        'û' => ('u', 3),
        'ü' => ('u', 5),
        'ý' => ('y', 1),
        'ÿ' => ('y', 5),
        other => (other, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_sort_with_defaults() {
        let merged = union_sort(&["Carregando", "Viajando", "Concluído"], &["Novo Status"]);
        assert_eq!(
            merged,
            vec!["Carregando", "Concluído", "Novo Status", "Viajando"]
        );
    }

    #[test]
    fn test_union_sort_deduplicates_after_trim() {
        let merged = union_sort(&["Viajando", "  Viajando "], &["", "   ", "Viajando"]);
        assert_eq!(merged, vec!["Viajando"]);
    }

    #[test]
    fn test_case_and_accent_variants_are_kept() {
        let merged = unique_non_empty(["concluído", "Concluido", "concluido"]);
        assert_eq!(merged, vec!["concluido", "Concluido", "concluído"]);
    }

    #[test]
    fn test_accents_sort_with_base_letter() {
        let merged = unique_non_empty(["Zeta", "Ágata", "Abacaxi", "ameixa"]);
        assert_eq!(merged, vec!["Abacaxi", "Ágata", "ameixa", "Zeta"]);
    }

    #[test]
    fn test_punctuation_sorts_before_digits_and_letters() {
        let merged = unique_non_empty([
            "Aguardando10",
            "Aguardando-NF",
            "Aguardando_NF",
            "Aguardando 2",
            "½ carga",
            "1 carga",
        ]);
        assert_eq!(
            merged,
            vec![
                "1 carga",
                "½ carga",
                "Aguardando 2",
                "Aguardando_NF",
                "Aguardando-NF",
                "Aguardando10",
            ]
        );
    }

    #[test]
    fn test_ligatures_expand() {
        let merged = unique_non_empty(["Ssa", "ß", "ss", "Pendente", "Œuvre", "Oeste"]);
        assert_eq!(merged, vec!["Oeste", "Œuvre", "Pendente", "ss", "ß", "Ssa"]);
        assert_eq!(collate_pt_br("Æon", "Aeon"), Ordering::Greater);
        assert_eq!(collate_pt_br("Aeon", "Afa"), Ordering::Less);
    }

    #[test]
    fn test_defaults_always_present() {
        let status = with_default_status::<&str>(&[]);
        assert_eq!(status, vec!["Carregando", "Concluído", "Viajando"]);

        let tipo = with_default_tipo(&["Roxa"]);
        assert_eq!(tipo, vec!["Moradas", "Roxa", "VALCATORCE INCA"]);
    }
}
