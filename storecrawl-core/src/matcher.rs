//! Fuzzy selection of the candidate closest to a hint.
//!
//! Similarity is the length of the longest *contiguous* run of characters
//! two strings share, normalised by the longer string. Lengths are counted
//! in Unicode scalar values, not bytes.
use serde::Serialize;

/// Best candidate together with its score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchResult<'a> {
    pub candidate: &'a str,
    pub score: f64,
}

/// Longest contiguous substring shared by `a` and `b`.
///
/// When several substrings share the maximal length the first one found
/// while scanning `a` is returned. Returns an empty string when the inputs
/// have no character in common.
pub fn longest_common_substring(a: &str, b: &str) -> String {
    let (start, len) = lcs_span(a, b);
    a.chars().skip(start).take(len).collect()
}

/// Character offset into `a` and length of its longest common substring.
fn lcs_span(a: &str, b: &str) -> (usize, usize) {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    // run[j + 1] is the length of the common run ending at a[i], b[j]
    let mut prev = vec![0usize; b.len() + 1];
    let mut run = vec![0usize; b.len() + 1];
    let mut best_len = 0;
    let mut best_end = 0;

    for (i, ca) in a.iter().enumerate() {
        for (j, cb) in b.iter().enumerate() {
            run[j + 1] = if ca == cb { prev[j] + 1 } else { 0 };
            if run[j + 1] > best_len {
                best_len = run[j + 1];
                best_end = i + 1;
            }
        }
        std::mem::swap(&mut prev, &mut run);
    }

    (best_end - best_len, best_len)
}

/// Score in `[0, 1]`; two empty strings score 0.
pub fn similarity_score(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 0.0;
    }
    let (_, common) = lcs_span(a, b);
    common as f64 / longest as f64
}

/// Candidate most similar to `hint`, or `None` when nothing scores above 0.
///
/// Candidates are visited in order and only a strictly better score replaces
/// the current pick, so the first candidate reaching the top score wins.
pub fn best_match<'a, I>(hint: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    best_match_scored(hint, candidates).map(|m| m.candidate)
}

/// [`best_match`] that also reports the winning score.
pub fn best_match_scored<'a, I>(hint: &str, candidates: I) -> Option<MatchResult<'a>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<MatchResult<'a>> = None;
    let mut best_score = 0.0;

    for candidate in candidates {
        let score = similarity_score(hint, candidate);
        if score > best_score {
            best_score = score;
            best = Some(MatchResult { candidate, score });
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lcs_finds_prefix_match() {
        assert_eq!(longest_common_substring("sony-corporation", "sony"), "sony");
        assert_eq!(longest_common_substring("netflix", "netflix-inc"), "netflix");
    }

    #[test]
    fn lcs_with_repeated_occurrences() {
        assert_eq!(
            longest_common_substring("helloae", "helishelloaethehelloaeqq"),
            "helloae"
        );
    }

    #[test]
    fn lcs_ties_keep_a_single_substring() {
        // "ab" and "cd" are both maximal; they are never joined together
        let common = longest_common_substring("ab-cd", "cd+ab");
        assert_eq!(common, "ab");
        assert_eq!(common.chars().count(), 2);
    }

    #[test]
    fn lcs_disjoint_is_empty() {
        assert_eq!(longest_common_substring("abc", "xyz"), "");
        assert_eq!(longest_common_substring("", "xyz"), "");
    }

    #[test]
    fn lcs_counts_characters_not_bytes() {
        assert_eq!(longest_common_substring("bảo hành", "sony bảo"), "bảo");
        assert_eq!(similarity_score("ñu", "ñu"), 1.0);
    }

    #[test]
    fn identical_strings_score_one() {
        assert_eq!(similarity_score("netflix", "netflix"), 1.0);
    }

    #[test]
    fn score_normalises_by_longer_input() {
        assert_eq!(similarity_score("abc", "eabc"), 0.75);
        assert_eq!(similarity_score("eabc", "abc"), 0.75);
    }

    #[test]
    fn empty_inputs_score_zero() {
        assert_eq!(similarity_score("", ""), 0.0);
        assert_eq!(similarity_score("", "abc"), 0.0);
    }

    #[test]
    fn best_match_prefers_first_top_scorer() {
        let candidates = ["netflix-inc", "apple-netflix", "am-netflix-co"];
        assert_eq!(
            best_match("netflix", candidates.iter().copied()),
            Some("netflix-inc")
        );
    }

    #[test]
    fn exact_match_beats_partial() {
        let candidates = vec!["sony-vietnam".to_string(), "sony".to_string()];
        assert_eq!(
            best_match("sony", candidates.iter().map(String::as_str)),
            Some("sony")
        );
    }

    #[test]
    fn no_candidates_or_no_overlap_is_none() {
        assert_eq!(best_match("sony", std::iter::empty()), None);
        assert_eq!(best_match("sony", ["abc", "qqq"]), None);
        assert!(best_match_scored("sony", ["abc", "qqq", "txz"]).is_none());
    }

    #[test]
    fn single_shared_character_still_matches() {
        let result = best_match_scored("sony", ["xyz", "qqq"]).expect("match");
        assert_eq!(result.candidate, "xyz");
        assert_eq!(result.score, 0.25);
    }

    #[test]
    fn scored_match_reports_score() {
        let result = best_match_scored("abc", ["zzz", "eabc"]).expect("match");
        assert_eq!(result.candidate, "eabc");
        assert_eq!(result.score, 0.75);
    }
}
