//! Fuzzy duplicate detection for destination names.
//!
//! Names are normalized (lowercased, punctuation stripped, words sorted) and
//! compared with the Ratcliff/Obershelp ratio `2*M / (|a| + |b|)`, where `M`
//! is the total size of the matching blocks found by recursively taking the
//! longest common substring.

use regex::Regex;
use std::sync::OnceLock;

/// Similarity at or above which two names are the same destination.
pub const DUPLICATE_THRESHOLD: f64 = 0.75;

static PUNCT_RE: OnceLock<Regex> = OnceLock::new();

fn punct_re() -> &'static Regex {
    PUNCT_RE.get_or_init(|| Regex::new(r"[^\w\s]").unwrap())
}

pub fn normalize_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let stripped = punct_re().replace_all(&lowered, "");
    let mut words: Vec<&str> = stripped.split_whitespace().collect();
    words.sort_unstable();
    words.join(" ")
}

/// Ratio in `[0, 1]` between two already-normalized strings.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

/// Return the first existing name that `name` duplicates.
pub fn find_duplicate<'a, I>(name: &str, existing: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let candidate = normalize_name(name);
    existing
        .into_iter()
        .find(|other| similarity(&candidate, &normalize_name(other)) >= DUPLICATE_THRESHOLD)
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut total = 0;
    let mut stack = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = stack.pop() {
        let (i, j, k) = longest_match(&a[alo..ahi], &b[blo..bhi]);
        if k == 0 {
            continue;
        }
        total += k;
        let (i, j) = (alo + i, blo + j);
        if alo < i && blo < j {
            stack.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            stack.push((i + k, ahi, j + k, bhi));
        }
    }
    total
}

/// Longest common substring as `(start_a, start_b, len)`. Ties go to the
/// earliest start in `a`, then in `b`.
fn longest_match(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    for i in 0..a.len() {
        let mut cur = vec![0usize; b.len() + 1];
        for j in 0..b.len() {
            if a[i] == b[j] {
                let k = prev[j] + 1;
                cur[j + 1] = k;
                if k > best.2 {
                    best = (i + 1 - k, j + 1 - k, k);
                }
            }
        }
        prev = cur;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratio(a: &str, b: &str) -> f64 {
        similarity(&normalize_name(a), &normalize_name(b))
    }

    #[test]
    fn normalize_strips_punctuation_and_sorts_words() {
        assert_eq!(normalize_name("Fuji, Mount"), "fuji mount");
        assert_eq!(normalize_name("  Santorini (Oia) "), "oia santorini");
        assert_eq!(normalize_name("Côte d'Azur"), "côte dazur");
    }

    #[test]
    fn similarity_matches_known_ratios() {
        assert!((ratio("Mount Fuji", "Fuji, Mount") - 1.0).abs() < 1e-9);
        assert!((ratio("Fushimi Inari Shrine", "Fushimi Inari Taisha") - 0.8).abs() < 1e-9);
        assert!((ratio("Lofoten Islands", "Lofoten") - 7.0 / 11.0).abs() < 1e-9);
        assert!((ratio("Petra", "Machu Picchu") - 2.0 / 17.0).abs() < 1e-9);
    }

    #[test]
    fn similarity_edge_cases() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", ""), 0.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn find_duplicate_uses_threshold() {
        let existing = ["Santorini (Oia)", "Machu Picchu", "Lofoten"];
        assert_eq!(
            find_duplicate("Santorini", existing.iter().copied()),
            Some("Santorini (Oia)")
        );
        assert_eq!(find_duplicate("Lofoten Islands", existing.iter().copied()), None);
        assert_eq!(find_duplicate("Petra", existing.iter().copied()), None);
    }
}
