//! Weighted full-text search over posts.
//!
//! Each searchable field is described by a [`RankedColumn`]: the SQL
//! expression that yields its text and the tier its occurrences are weighted
//! with. A search keeps only the enabled columns and folds them into a single
//! `weighted_rank(...)` call, so a disabled field cannot influence the score.
//! User input only ever travels as a bound parameter.

use rusqlite::params;

use symbolhub_shared::constants::{RANK_THRESHOLD, SEARCH_LIMIT};
use symbolhub_shared::{SearchField, SearchFields, SearchQuery, Tier};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::SearchHit;
use crate::posts::{post_columns, row_to_post, POST_COLUMN_COUNT, POST_SOURCES};
use crate::rank::RANK_FUNCTION;
use crate::tags::TAGS_TEXT;

/// A field's text expression paired with its weight tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankedColumn {
    pub field: SearchField,
    pub expr: &'static str,
    pub tier: Tier,
}

impl RankedColumn {
    pub fn for_field(field: SearchField) -> Self {
        let expr = match field {
            SearchField::Title => "p.title",
            SearchField::Description => "p.description",
            SearchField::Tags => TAGS_TEXT,
            SearchField::Username => "u.username",
        };
        Self {
            field,
            expr,
            tier: field.tier(),
        }
    }
}

/// The enabled fields as ranked columns, in canonical field order.
pub fn ranked_columns(fields: &SearchFields) -> Vec<RankedColumn> {
    fields.iter().map(RankedColumn::for_field).collect()
}

/// The rank expression for one set of enabled fields. `?1` is the query.
pub fn rank_expression(fields: &SearchFields) -> String {
    rank_call(&ranked_columns(fields))
}

fn rank_call(columns: &[RankedColumn]) -> String {
    let args = columns
        .iter()
        .fold(String::new(), |mut acc, col| {
            acc.push_str(", ");
            acc.push_str(col.expr);
            acc.push_str(", '");
            acc.push(col.tier.as_char());
            acc.push('\'');
            acc
        });
    format!("{RANK_FUNCTION}(?1{args})")
}

impl Database {
    /// Validate and run a search.
    ///
    /// No columns or no query text is an invalid request, reported before
    /// any statement is prepared.
    pub fn search_posts(&self, text: Option<&str>, fields: SearchFields) -> Result<Vec<SearchHit>> {
        let query = SearchQuery::new(text, fields)?;
        self.run_search(&query)
    }

    /// Rank every post against `query` and return the best matches above
    /// the threshold, highest rank first.
    pub fn run_search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let columns = ranked_columns(&query.fields);
        let sql = format!(
            "SELECT * FROM (
                 SELECT {columns}, {rank} AS score
                 FROM {POST_SOURCES}
                 GROUP BY p.id
             )
             WHERE score > ?2
             ORDER BY score DESC, id DESC
             LIMIT ?3",
            columns = post_columns(),
            rank = rank_call(&columns),
        );

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![query.text, RANK_THRESHOLD, SEARCH_LIMIT], |row| {
            Ok(SearchHit {
                post: row_to_post(row)?,
                rank: row.get(POST_COLUMN_COUNT)?,
            })
        })?;

        let hits = rows
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::from)?;

        tracing::debug!(
            query = %query.text,
            fields = ?columns.iter().map(|c| c.field.as_str()).collect::<Vec<_>>(),
            hits = hits.len(),
            "search executed"
        );
        Ok(hits)
    }
}
