//! # Fuzzy Search
//!
//! Typo-tolerant ranking over the item name and location fields, re-run on
//! every keystroke against the full unfiltered candidate set. No index and
//! no persistence: a pure function of (query, candidates) -> ordered
//! subset. Candidate counts are tens to low hundreds per organization, so
//! recomputing is cheaper than maintaining anything.
//!
//! ## Scoring
//!
//! Query and fields are normalized and tokenized; each query token takes
//! its best Levenshtein similarity against the field's tokens, and the
//! field score is the mean over query tokens. A record scores the better
//! of its name and location, and survives if that clears the similarity
//! threshold. One-edit-class misspellings ("botle") clear it; unrelated
//! strings do not.
use std::cmp::Ordering;

use strsim::normalized_levenshtein;

use crate::utils::normalize;

/// Minimum best-field similarity for a record to appear in the results.
pub const SIMILARITY_THRESHOLD: f64 = 0.6;

pub trait Searchable {
    fn name(&self) -> &str;
    fn location(&self) -> &str;
}

/// Rank `candidates` against `query`, best match first, ties in input
/// order. The empty query is the identity: every record, original order.
/// A whitespace-only query is a real (non-empty) query and matches nothing.
pub fn rank<T: Searchable + Clone>(candidates: &[T], query: &str) -> Vec<T> {
    if query.is_empty() {
        return candidates.to_vec();
    }

    let query_tokens = tokenize(query);

    let mut scored: Vec<(f64, &T)> = candidates
        .iter()
        .filter_map(|candidate| {
            let score = f64::max(
                field_score(candidate.name(), &query_tokens),
                field_score(candidate.location(), &query_tokens),
            );

            (score >= SIMILARITY_THRESHOLD).then_some((score, candidate))
        })
        .collect();

    // sort_by is stable, so equal scores keep their input order.
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

    scored
        .into_iter()
        .map(|(_, candidate)| candidate.clone())
        .collect()
}

fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn field_score(field: &str, query_tokens: &[String]) -> f64 {
    if query_tokens.is_empty() {
        return 0.0;
    }

    let field_tokens = tokenize(field);
    if field_tokens.is_empty() {
        return 0.0;
    }

    let total: f64 = query_tokens
        .iter()
        .map(|query_token| {
            field_tokens
                .iter()
                .map(|field_token| normalized_levenshtein(query_token, field_token))
                .fold(0.0, f64::max)
        })
        .sum();

    total / query_tokens.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Record {
        name: &'static str,
        location: &'static str,
    }

    impl Searchable for Record {
        fn name(&self) -> &str {
            self.name
        }

        fn location(&self) -> &str {
            self.location
        }
    }

    fn inventory() -> Vec<Record> {
        vec![
            Record {
                name: "Red Water Bottle",
                location: "Gym",
            },
            Record {
                name: "Calculus Textbook",
                location: "Room 304",
            },
            Record {
                name: "Black Hoodie",
                location: "Cafeteria",
            },
        ]
    }

    #[test]
    fn empty_query_is_the_identity() {
        let records = inventory();

        assert_eq!(rank(&records, ""), records);
    }

    #[test]
    fn one_edit_misspelling_matches() {
        let records = inventory();

        let results = rank(&records, "botle");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Red Water Bottle");
    }

    #[test]
    fn unrelated_query_matches_nothing() {
        let records = inventory();

        assert!(rank(&records, "xyz123").is_empty());
    }

    #[test]
    fn location_fields_are_searched_too() {
        let records = inventory();

        let results = rank(&records, "cafeteria");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Black Hoodie");
    }

    #[test]
    fn ties_keep_input_order() {
        let records = vec![
            Record {
                name: "Umbrella",
                location: "Gym",
            },
            Record {
                name: "Umbrella",
                location: "Cafeteria",
            },
        ];

        let results = rank(&records, "umbrella");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].location, "Gym");
        assert_eq!(results[1].location, "Cafeteria");
    }

    #[test]
    fn better_matches_rank_first() {
        let records = vec![
            Record {
                name: "Bottle Opener",
                location: "Cafeteria",
            },
            Record {
                name: "Bottle",
                location: "Gym",
            },
        ];

        let results = rank(&records, "bottle opener");
        assert_eq!(results[0].name, "Bottle Opener");
    }

    #[test]
    fn whitespace_query_matches_nothing() {
        let records = inventory();

        assert!(rank(&records, "   ").is_empty());
    }

    #[test]
    fn empty_candidates_stay_empty() {
        let records: Vec<Record> = Vec::new();

        assert!(rank(&records, "bottle").is_empty());
        assert!(rank(&records, "").is_empty());
    }

    #[test]
    fn duplicate_names_are_distinct_records() {
        let records = vec![
            Record {
                name: "Water Bottle",
                location: "Gym",
            },
            Record {
                name: "Water Bottle",
                location: "Room 304",
            },
        ];

        assert_eq!(rank(&records, "water").len(), 2);
    }
}
