//! Tiered lexical relevance scoring.
//!
//! Scoring tiers, highest first:
//!
//! 1. exact case-insensitive match of the full query against the record
//!    name — 100 (ceiling tier, no further additive terms);
//! 2. record name contains the full query as a substring — 80;
//! 3. whole-word overlap between query terms and the record's name and
//!    body — `60 × matched / total`, capped at 60.
//!
//! A category hint equal to the record's category adds a flat +20 on top of
//! any tier. The bonus is a ranking bias, never a filter: records in other
//! categories stay eligible and are still returned.

use std::collections::HashSet;

use crate::extract::normalize;
use crate::index::IndexSnapshot;
use crate::models::{Query, ScoredMatch};

pub const EXACT_NAME_SCORE: f64 = 100.0;
pub const SUBSTRING_NAME_SCORE: f64 = 80.0;
pub const TERM_OVERLAP_CEILING: f64 = 60.0;
pub const CATEGORY_BONUS: f64 = 20.0;

/// Minimum token length kept by [`tokenize`]; single characters carry no
/// matching signal.
const MIN_TOKEN_LEN: usize = 2;

#[derive(Debug, Clone)]
pub struct ScoreParams {
    /// Matches scoring below this are excluded.
    pub min_score: f64,
    /// Cap on the number of returned matches.
    pub limit: usize,
}

/// Normalize and split a text into matching terms.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_string)
        .collect()
}

/// Rank all records of a snapshot against a query.
///
/// Results are sorted by score descending with ties broken by ascending
/// record id (catalog order), so identical queries against an unchanged
/// snapshot always produce identical output.
pub fn rank(snapshot: &IndexSnapshot, query: &Query, params: &ScoreParams) -> Vec<ScoredMatch> {
    let normalized_query = normalize(&query.text);
    if normalized_query.is_empty() {
        return Vec::new();
    }
    let query_terms = tokenize(&query.text);
    let category_hint = query.category.as_deref();

    let mut matches: Vec<ScoredMatch> = snapshot
        .records
        .iter()
        .filter_map(|record| {
            let scored = score_record(
                record,
                &normalized_query,
                &query_terms,
                category_hint,
            );
            (scored.score >= params.min_score).then_some(scored)
        })
        .collect();

    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.record_id.cmp(&b.record_id))
    });
    matches.truncate(params.limit);
    matches
}

fn score_record(
    record: &crate::models::DiscountRecord,
    normalized_query: &str,
    query_terms: &[String],
    category_hint: Option<&str>,
) -> ScoredMatch {
    let normalized_name = normalize(&record.name);

    let (base, matched_terms) = if normalized_name == normalized_query {
        (EXACT_NAME_SCORE, query_terms.to_vec())
    } else if normalized_name.contains(normalized_query) {
        (SUBSTRING_NAME_SCORE, query_terms.to_vec())
    } else if query_terms.is_empty() {
        (0.0, Vec::new())
    } else {
        let record_terms: HashSet<&str> = normalized_name
            .split_whitespace()
            .chain(record.raw_text.split_whitespace())
            .collect();
        let matched: Vec<String> = query_terms
            .iter()
            .filter(|t| record_terms.contains(t.as_str()))
            .cloned()
            .collect();
        let overlap =
            TERM_OVERLAP_CEILING * matched.len() as f64 / query_terms.len() as f64;
        (overlap.min(TERM_OVERLAP_CEILING), matched)
    };

    // The bonus biases ranking among lexical matches; it never makes an
    // unmatched record eligible on its own.
    let bonus = match category_hint {
        Some(hint) if base > 0.0 && hint.eq_ignore_ascii_case(&record.category) => CATEGORY_BONUS,
        _ => 0.0,
    };

    ScoredMatch {
        record_id: record.id.clone(),
        score: base + bonus,
        matched_terms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexSnapshot;
    use crate::models::DiscountRecord;

    fn record(id: &str, name: &str, category: &str, body: &str) -> DiscountRecord {
        DiscountRecord {
            id: id.to_string(),
            name: name.to_string(),
            discount_value: Some("10%".to_string()),
            category: category.to_string(),
            code: None,
            how_to_use: String::new(),
            bonus: None,
            source_document_id: id.trim_end_matches("#0").to_string(),
            raw_text: normalize(body),
        }
    }

    fn snapshot(records: Vec<DiscountRecord>) -> IndexSnapshot {
        IndexSnapshot::seal(1, records, Vec::new())
    }

    fn hotel_catalog() -> IndexSnapshot {
        snapshot(vec![
            record(
                "best_western.txt#0",
                "Best Western Hotels",
                "Travel",
                "20% off hotel stays for employees",
            ),
            record(
                "marriott.txt#0",
                "Marriott Hotels",
                "Travel",
                "hotel discount for corporate travel",
            ),
            record(
                "staples.txt#0",
                "Staples Office Supplies",
                "Office",
                "save on office supplies in store",
            ),
        ])
    }

    fn query(text: &str, category: Option<&str>) -> Query {
        Query::new(text, category.map(str::to_string)).unwrap()
    }

    fn params() -> ScoreParams {
        ScoreParams {
            min_score: 15.0,
            limit: 10,
        }
    }

    #[test]
    fn hotel_query_ranks_hotels_above_threshold_and_drops_staples() {
        let matches = rank(&hotel_catalog(), &query("hotel", None), &params());

        let ids: Vec<&str> = matches.iter().map(|m| m.record_id.as_str()).collect();
        assert_eq!(ids, vec!["best_western.txt#0", "marriott.txt#0"]);
        for m in &matches {
            assert!(m.score >= SUBSTRING_NAME_SCORE);
            assert_eq!(m.matched_terms, vec!["hotel".to_string()]);
        }
    }

    #[test]
    fn exact_name_match_scores_100_and_ranks_first() {
        let matches = rank(
            &hotel_catalog(),
            &query("Best Western Hotels", None),
            &params(),
        );

        assert_eq!(matches[0].record_id, "best_western.txt#0");
        assert_eq!(matches[0].score, EXACT_NAME_SCORE);
        for other in &matches[1..] {
            assert!(other.score < EXACT_NAME_SCORE);
        }
    }

    #[test]
    fn tiers_are_monotonic() {
        let snap = snapshot(vec![
            record("a.txt#0", "Delta Flights", "Travel", "flights"),
            record("b.txt#0", "Cheap Delta Flights Daily", "Travel", "flights"),
            record("c.txt#0", "Airline Deals", "Travel", "delta flights for less"),
        ]);
        let matches = rank(&snap, &query("Delta Flights", None), &params());

        let score_of = |id: &str| {
            matches
                .iter()
                .find(|m| m.record_id == id)
                .map(|m| m.score)
                .unwrap()
        };
        let exact = score_of("a.txt#0");
        let substring = score_of("b.txt#0");
        let overlap = score_of("c.txt#0");
        assert_eq!(exact, EXACT_NAME_SCORE);
        assert_eq!(substring, SUBSTRING_NAME_SCORE);
        assert_eq!(overlap, TERM_OVERLAP_CEILING);
        assert!(exact >= substring && substring >= overlap);
    }

    #[test]
    fn category_hint_is_a_bias_not_a_filter() {
        let snap = snapshot(vec![
            record("chipotle.txt#0", "Chipotle", "Dining", "discount on meals"),
            record("target.txt#0", "Target", "Retail", "discount on home goods"),
        ]);
        let with_hint = rank(&snap, &query("discount", Some("Dining")), &params());
        let without_hint = rank(&snap, &query("discount", None), &params());

        // Both records stay present under the hint.
        assert_eq!(with_hint.len(), 2);
        assert_eq!(with_hint[0].record_id, "chipotle.txt#0");

        let hinted = |ms: &[ScoredMatch], id: &str| {
            ms.iter().find(|m| m.record_id == id).map(|m| m.score).unwrap()
        };
        assert_eq!(
            hinted(&with_hint, "chipotle.txt#0"),
            hinted(&without_hint, "chipotle.txt#0") + CATEGORY_BONUS
        );
        assert_eq!(
            hinted(&with_hint, "target.txt#0"),
            hinted(&without_hint, "target.txt#0")
        );
    }

    #[test]
    fn category_hint_is_case_insensitive() {
        let snap = snapshot(vec![record(
            "chipotle.txt#0",
            "Chipotle",
            "Dining",
            "discount on meals",
        )]);
        let matches = rank(&snap, &query("discount", Some("dining")), &params());
        assert_eq!(matches[0].score, TERM_OVERLAP_CEILING + CATEGORY_BONUS);
    }

    #[test]
    fn exact_match_with_bonus_reaches_score_ceiling() {
        let snap = snapshot(vec![record(
            "bw.txt#0",
            "Best Western Hotels",
            "Travel",
            "hotels",
        )]);
        let matches = rank(
            &snap,
            &query("best western hotels", Some("travel")),
            &params(),
        );
        assert_eq!(matches[0].score, EXACT_NAME_SCORE + CATEGORY_BONUS);
    }

    #[test]
    fn partial_term_overlap_is_proportional() {
        let snap = snapshot(vec![record(
            "bw.txt#0",
            "Best Western Hotels",
            "Travel",
            "free breakfast included",
        )]);
        // "hotels" matches the name, "parking" matches nothing: 1 of 2 terms.
        let matches = rank(&snap, &query("hotels parking", None), &params());
        assert_eq!(matches[0].score, TERM_OVERLAP_CEILING / 2.0);
        assert_eq!(matches[0].matched_terms, vec!["hotels".to_string()]);
    }

    #[test]
    fn ties_break_by_ascending_record_id() {
        let snap = snapshot(vec![
            record("b.txt#0", "Hilton Hotels", "Travel", "stay"),
            record("a.txt#0", "Hyatt Hotels", "Travel", "stay"),
        ]);
        let matches = rank(&snap, &query("hotels", None), &params());
        assert_eq!(matches[0].record_id, "a.txt#0");
        assert_eq!(matches[1].record_id, "b.txt#0");
        assert_eq!(matches[0].score, matches[1].score);
    }

    #[test]
    fn identical_queries_produce_identical_results() {
        let snap = hotel_catalog();
        let q = query("hotel discount", Some("Travel"));
        let first = rank(&snap, &q, &params());
        let second = rank(&snap, &q, &params());

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.record_id, b.record_id);
            assert_eq!(a.score, b.score);
            assert_eq!(a.matched_terms, b.matched_terms);
        }
    }

    #[test]
    fn results_respect_limit() {
        let records: Vec<DiscountRecord> = (0..20)
            .map(|i| {
                record(
                    &format!("doc{i:02}.txt#0"),
                    &format!("Hotel Deal {i}"),
                    "Travel",
                    "hotel",
                )
            })
            .collect();
        let snap = snapshot(records);
        let matches = rank(
            &snap,
            &query("hotel", None),
            &ScoreParams {
                min_score: 15.0,
                limit: 5,
            },
        );
        assert_eq!(matches.len(), 5);
    }

    #[test]
    fn hint_alone_does_not_make_an_unmatched_record_eligible() {
        let snap = snapshot(vec![record(
            "spa.txt#0",
            "Serenity Spa",
            "Health & Wellness",
            "massage and sauna",
        )]);
        let matches = rank(
            &snap,
            &query("submarine rentals", Some("Health & Wellness")),
            &params(),
        );
        assert!(matches.is_empty());
    }

    #[test]
    fn punctuation_only_query_matches_nothing() {
        let matches = rank(&hotel_catalog(), &query("!!!", None), &params());
        assert!(matches.is_empty());
    }
}
