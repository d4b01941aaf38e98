//! Label normalization and string similarity for entity resolution
//!
//! The normalization key is script-aware: Arabic orthographic variants
//! (alef/hamza forms, ya vs alef maqsura, ta marbuta, tatweel, harakat)
//! collapse to one form, Latin text is case-folded, and combining marks
//! are stripped after NFKD decomposition. Two mentions of the same
//! referent should produce the same key wherever orthography alone
//! separates them.

use unicode_normalization::UnicodeNormalization;

/// Compute the canonical normalization key for an entity label.
pub fn normalize_label(label: &str) -> String {
    let composed: String = label.nfc().collect();
    let folded = fold_arabic(&composed);

    // NFKD then drop combining marks (covers Latin diacritics).
    let stripped: String = folded
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();

    let lowered = stripped.to_lowercase();

    // Collapse internal whitespace.
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Arabic orthography fold, carried from the upstream text pipeline:
/// tatweel removal, alef/hamza unification, alef maqsura -> ya,
/// ta marbuta -> ha, harakat removal.
fn fold_arabic(text: &str) -> String {
    if !text.chars().any(|c| ('\u{0600}'..='\u{06FF}').contains(&c)) {
        return text.to_string();
    }
    text.chars()
        .filter_map(|c| match c {
            'ـ' => None, // tatweel
            'إ' | 'أ' | 'آ' | 'ٱ' => Some('ا'),
            'ى' => Some('ي'),
            'ة' => Some('ه'),
            // Harakat and Quranic annotation marks
            '\u{0617}'..='\u{061A}' | '\u{064B}'..='\u{0652}' | '\u{06D6}'..='\u{06ED}' => None,
            other => Some(other),
        })
        .collect()
}

fn is_combining_mark(c: char) -> bool {
    matches!(c,
        '\u{0300}'..='\u{036F}' | '\u{1AB0}'..='\u{1AFF}' | '\u{20D0}'..='\u{20FF}'
    )
}

/// Similarity between two already-normalized labels.
///
/// Exact equality scores 1.0; otherwise Jaccard overlap of character
/// bigrams. Alias-set membership is scored by the registry, not here.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    bigram_jaccard(a, b)
}

fn bigram_jaccard(a: &str, b: &str) -> f64 {
    let a_grams = bigrams(a);
    let b_grams = bigrams(b);
    if a_grams.is_empty() || b_grams.is_empty() {
        return 0.0;
    }
    let intersection = a_grams.iter().filter(|g| b_grams.contains(*g)).count();
    let union = a_grams.len() + b_grams.len() - intersection;
    intersection as f64 / union as f64
}

fn bigrams(s: &str) -> Vec<(char, char)> {
    let chars: Vec<char> = s.chars().collect();
    let mut grams: Vec<(char, char)> = chars.windows(2).map(|w| (w[0], w[1])).collect();
    grams.sort_unstable();
    grams.dedup();
    grams
}
