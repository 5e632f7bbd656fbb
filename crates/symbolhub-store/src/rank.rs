//! The `weighted_rank` SQL function.
//!
//! Registered on every connection opened by [`Database`](crate::Database).
//! It builds a position-aware weighted text vector from `(text, tier)` pairs
//! and scores a plain-text query against it:
//!
//! ```sql
//! weighted_rank(:query, p.title, 'A', p.description, 'B')
//! ```
//!
//! Each pair's positions continue after the previous pair's last position,
//! the same way concatenated text vectors behave. The score follows the
//! classic `ts_rank` model: a single query term is scored by the weighted,
//! position-decayed sum of its occurrences; several terms are scored by the
//! proximity of every pair of distinct terms, which makes the query an AND.

use std::collections::HashMap;

use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::Connection;

use symbolhub_shared::Tier;

/// Name under which the function is registered.
pub const RANK_FUNCTION: &str = "weighted_rank";

/// Positions past this are clamped.
const MAX_POSITION: u32 = 16_383;

/// Occurrences recorded per lexeme.
const MAX_POSITIONS_PER_LEXEME: usize = 256;

/// sum(1/i^2) for i in 1..inf, i.e. pi^2/6.
const INVERSE_SQUARE_SUM: f64 = 1.644_934_066_85;

/// Returned when the query has terms but none line up with the document.
const NO_MATCH: f64 = 1e-20;

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself", "him",
    "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me",
    "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once", "only",
    "or", "other", "our", "ours", "ourselves", "out", "over", "own", "s", "same", "she", "should",
    "so", "some", "such", "t", "than", "that", "the", "their", "theirs", "them", "themselves",
    "then", "there", "these", "they", "this", "those", "through", "to", "too", "under", "until",
    "up", "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom",
    "why", "will", "with", "you", "your", "yours", "yourself", "yourselves",
];

/// Register [`RANK_FUNCTION`] on `conn`.
pub fn register(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        RANK_FUNCTION,
        -1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        rank_from_sql,
    )
}

fn rank_from_sql(ctx: &Context<'_>) -> rusqlite::Result<f64> {
    if ctx.len() % 2 == 0 {
        return Err(rusqlite::Error::UserFunctionError(
            "weighted_rank expects a query followed by (text, tier) pairs".into(),
        ));
    }

    let query: Option<String> = ctx.get(0)?;
    let mut doc = WeightedDocument::default();

    for i in (1..ctx.len()).step_by(2) {
        let text: Option<String> = ctx.get(i)?;
        let tier: String = ctx.get(i + 1)?;
        let tier = tier
            .chars()
            .next()
            .and_then(Tier::from_char)
            .ok_or_else(|| rusqlite::Error::UserFunctionError("unknown weight tier".into()))?;
        if let Some(text) = text {
            doc.append(&text, tier);
        }
    }

    Ok(rank(&doc, query.as_deref().unwrap_or("")))
}

/// Lowercased alphanumeric runs, stop words included.
fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// A bag of lexemes, each with its weighted positions in ascending order.
#[derive(Debug, Default)]
pub struct WeightedDocument {
    lexemes: HashMap<String, Vec<(u32, Tier)>>,
    last_position: u32,
}

impl WeightedDocument {
    /// Append `text` with every occurrence labelled `tier`.
    pub fn append(&mut self, text: &str, tier: Tier) {
        let base = self.last_position;
        let mut last = base;

        for (i, word) in words(text).enumerate() {
            let position = (base + i as u32 + 1).min(MAX_POSITION);
            if is_stop_word(&word) {
                continue;
            }
            let positions = self.lexemes.entry(word).or_default();
            if positions.len() < MAX_POSITIONS_PER_LEXEME {
                positions.push((position, tier));
            }
            last = position;
        }

        self.last_position = last;
    }

    fn positions(&self, lexeme: &str) -> Option<&[(u32, Tier)]> {
        self.lexemes.get(lexeme).map(Vec::as_slice)
    }
}

/// Distinct non-stop-word query terms in first-seen order.
fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in words(query) {
        if !is_stop_word(&word) && !terms.contains(&word) {
            terms.push(word);
        }
    }
    terms
}

/// Score `query` against `doc`. `0.0` for a query without usable terms.
pub fn rank(doc: &WeightedDocument, query: &str) -> f64 {
    let terms = query_terms(query);
    if terms.is_empty() {
        return 0.0;
    }

    let res = if terms.len() == 1 {
        rank_single(doc, &terms)
    } else {
        rank_proximity(doc, &terms)
    };

    if res < 0.0 {
        NO_MATCH
    } else {
        res
    }
}

fn rank_single(doc: &WeightedDocument, terms: &[String]) -> f64 {
    let mut res = 0.0;

    for term in terms {
        let Some(positions) = doc.positions(term) else {
            continue;
        };

        let mut resj = 0.0;
        let mut wjm = -1.0;
        let mut jm = 0usize;
        for (j, (_, tier)) in positions.iter().enumerate() {
            let w = tier.weight();
            resj += w / ((j + 1) * (j + 1)) as f64;
            if w > wjm {
                wjm = w;
                jm = j;
            }
        }

        res += (wjm + resj - wjm / ((jm + 1) * (jm + 1)) as f64) / INVERSE_SQUARE_SUM;
    }

    res / terms.len() as f64
}

fn word_distance(distance: u32) -> f64 {
    if distance > 100 {
        return 1e-30;
    }
    1.0 / (1.005 + 0.05 * (distance as f64 / 1.5 - 2.0).exp())
}

/// Negative when no pair of distinct terms co-occurs.
fn rank_proximity(doc: &WeightedDocument, terms: &[String]) -> f64 {
    let found: Vec<Option<&[(u32, Tier)]>> = terms.iter().map(|t| doc.positions(t)).collect();
    let mut res = -1.0;

    for i in 0..found.len() {
        let Some(right) = found[i] else { continue };
        for left in found[..i].iter().flatten() {
            for (pos_r, tier_r) in right {
                for (pos_l, tier_l) in left.iter() {
                    let distance = pos_r.abs_diff(*pos_l);
                    if distance == 0 {
                        continue;
                    }
                    let curw =
                        (tier_r.weight() * tier_l.weight() * word_distance(distance)).sqrt();
                    res = if res < 0.0 {
                        curw
                    } else {
                        1.0 - (1.0 - res) * (1.0 - curw)
                    };
                }
            }
        }
    }

    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(fields: &[(&str, Tier)]) -> WeightedDocument {
        let mut d = WeightedDocument::default();
        for (text, tier) in fields {
            d.append(text, *tier);
        }
        d
    }

    #[test]
    fn single_occurrence_in_title() {
        let d = doc(&[("Drake", Tier::A)]);
        let r = rank(&d, "drake");
        assert!((r - 1.0 / INVERSE_SQUARE_SUM).abs() < 1e-9);
    }

    #[test]
    fn higher_tiers_rank_higher() {
        let scores: Vec<f64> = [Tier::A, Tier::B, Tier::C, Tier::D]
            .into_iter()
            .map(|t| rank(&doc(&[("drake", t)]), "drake"))
            .collect();
        assert!(scores.windows(2).all(|w| w[0] > w[1]));
        // The lowest tier still clears the search threshold.
        assert!(scores[3] > symbolhub_shared::constants::RANK_THRESHOLD);
    }

    #[test]
    fn absent_field_contributes_nothing() {
        let d = doc(&[("Pink Bunny", Tier::A)]);
        assert_eq!(rank(&d, "drake"), 0.0);
    }

    #[test]
    fn repeated_occurrences_increase_rank() {
        let once = rank(&doc(&[("drake", Tier::B)]), "drake");
        let twice = rank(&doc(&[("drake drake", Tier::B)]), "drake");
        assert!(twice > once);
    }

    #[test]
    fn multi_term_queries_require_every_term_to_pair_up() {
        let both = rank(&doc(&[("red drake", Tier::A)]), "red drake");
        let one = rank(&doc(&[("drake", Tier::A)]), "red drake");
        assert!(both > 0.9);
        assert_eq!(one, NO_MATCH);
    }

    #[test]
    fn proximity_decays_with_distance() {
        let near = rank(&doc(&[("red drake", Tier::A)]), "red drake");
        let far = rank(
            &doc(&[("red one two three four five six seven drake", Tier::A)]),
            "red drake",
        );
        assert!(near > far);
    }

    #[test]
    fn positions_continue_across_fields() {
        let d = doc(&[("red", Tier::A), ("drake", Tier::B)]);
        let r = rank(&d, "red drake");
        let expected = (1.0 * 0.4 * word_distance(1)).sqrt();
        assert!((r - expected).abs() < 1e-9);
    }

    #[test]
    fn stop_words_are_ignored_but_hold_positions() {
        assert_eq!(rank(&doc(&[("the drake", Tier::A)]), "the"), 0.0);

        let d = doc(&[("red of the drake", Tier::A)]);
        let r = rank(&d, "red drake");
        let expected = (word_distance(3)).sqrt();
        assert!((r - expected).abs() < 1e-9);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let d = doc(&[("DRAKE", Tier::A)]);
        assert_eq!(rank(&d, "drake"), rank(&d, "Drake"));
        assert!(rank(&d, "Drake") > 0.5);
    }

    #[test]
    fn no_stemming() {
        let d = doc(&[("Drake", Tier::A)]);
        assert_eq!(rank(&d, "drakes"), 0.0);

        let d = doc(&[("Drakes", Tier::A)]);
        assert_eq!(rank(&d, "drake"), 0.0);
    }

    #[test]
    fn callable_from_sql() {
        let conn = Connection::open_in_memory().unwrap();
        register(&conn).unwrap();

        let r: f64 = conn
            .query_row(
                "SELECT weighted_rank(?1, ?2, 'A', NULL, 'C', ?3, 'D')",
                ["drake", "Drake Art", "someone"],
                |row| row.get(0),
            )
            .unwrap();
        assert!(r > 0.5);

        let err = conn.query_row("SELECT weighted_rank('q', 'text')", [], |row| {
            row.get::<_, f64>(0)
        });
        assert!(err.is_err());
    }
}
