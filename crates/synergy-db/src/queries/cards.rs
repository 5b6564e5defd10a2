//! Card queries against the canonical `cards` table.
//!
//! The table holds one row per printing (`id` primary key); `oracle_id`
//! groups reprints of the same functional card. Trigram searches require the
//! `pg_trgm` extension.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Postgres, QueryBuilder};
use tracing::debug;

use synergy_core::store::{CardStore, NameQuery, RulesTextQuery};
use synergy_core::{Card, SynergyError, SynergyResult};

use crate::pool::DbPool;

/// Columns selected for every hydrated card, against alias `c`.
const CARD_COLUMNS: &str = "c.id, c.oracle_id, c.name, c.mana_cost, c.cmc::float8 AS cmc, \
     c.type_line, c.oracle_text, c.power, c.toughness, c.loyalty, \
     COALESCE(c.colors, '{}') AS colors, COALESCE(c.color_identity, '{}') AS color_identity, \
     COALESCE(c.keywords, '{}') AS keywords, c.image_uris, c.card_faces, \
     c.set_code, c.set_name, c.rarity, c.lang, \
     NULLIF(c.released_at, '')::date AS released_on, c.deleted_at, c.cached_at";

/// Winner-first ordering of printings within one logical card.
const PRINTING_PRECEDENCE: &str = "NULLIF(c.released_at, '')::date DESC NULLS LAST, c.id DESC";

/// Filters that exclude tokens, emblems and basic lands from searches.
const GAMEPLAY_FILTER: &str = "NOT type_line ILIKE '%Token%' \
     AND NOT type_line ILIKE '%Emblem%' \
     AND NOT type_line ILIKE 'Basic Land%'";

/// Point lookup of one printing; soft-deleted rows are invisible.
fn card_by_id_sql() -> String {
    format!("SELECT {CARD_COLUMNS} FROM cards c WHERE c.id = $1 AND c.deleted_at IS NULL")
}

/// Card row from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CardRow {
    pub id: String,
    pub oracle_id: Option<String>,
    pub name: String,
    pub mana_cost: Option<String>,
    pub cmc: Option<f64>,
    pub type_line: String,
    pub oracle_text: Option<String>,
    pub power: Option<String>,
    pub toughness: Option<String>,
    pub loyalty: Option<String>,
    pub colors: Vec<String>,
    pub color_identity: Vec<String>,
    pub keywords: Vec<String>,
    pub image_uris: Option<serde_json::Value>,
    pub card_faces: Option<serde_json::Value>,
    pub set_code: String,
    pub set_name: Option<String>,
    pub rarity: String,
    pub lang: String,
    pub released_on: Option<NaiveDate>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub cached_at: i64,
}

impl From<CardRow> for Card {
    fn from(row: CardRow) -> Self {
        Self {
            id: row.id,
            oracle_id: row.oracle_id,
            name: row.name,
            mana_cost: row.mana_cost,
            cmc: row.cmc,
            type_line: row.type_line,
            oracle_text: row.oracle_text,
            power: row.power,
            toughness: row.toughness,
            loyalty: row.loyalty,
            colors: row.colors,
            color_identity: row.color_identity,
            keywords: row.keywords,
            image_uris: row.image_uris,
            card_faces: row.card_faces,
            set_code: row.set_code,
            set_name: row.set_name,
            rarity: row.rarity,
            lang: row.lang,
            released_at: row.released_on,
            deleted_at: row.deleted_at,
            cached_at: row.cached_at,
        }
    }
}

fn into_cards(rows: Vec<CardRow>) -> Vec<Card> {
    rows.into_iter().map(Card::from).collect()
}

/// Postgres-backed [`CardStore`].
#[derive(Clone)]
pub struct PgCardStore {
    pool: DbPool,
}

impl PgCardStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert or update a batch of printings keyed on `id`.
    ///
    /// `deleted_at` is left untouched on conflict.
    pub async fn upsert_cards(&self, cards: &[Card]) -> SynergyResult<u64> {
        if cards.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "INSERT INTO cards (id, oracle_id, name, mana_cost, cmc, type_line, oracle_text, \
             power, toughness, loyalty, colors, color_identity, keywords, image_uris, card_faces, \
             set_code, set_name, rarity, lang, released_at, cached_at, created_at, updated_at) ",
        );
        builder.push_values(cards, |mut b, card| {
            b.push_bind(&card.id)
                .push_bind(&card.oracle_id)
                .push_bind(&card.name)
                .push_bind(&card.mana_cost)
                .push_bind(card.cmc)
                .push_bind(&card.type_line)
                .push_bind(&card.oracle_text)
                .push_bind(&card.power)
                .push_bind(&card.toughness)
                .push_bind(&card.loyalty)
                .push_bind(&card.colors)
                .push_bind(&card.color_identity)
                .push_bind(&card.keywords)
                .push_bind(&card.image_uris)
                .push_bind(&card.card_faces)
                .push_bind(&card.set_code)
                .push_bind(&card.set_name)
                .push_bind(&card.rarity)
                .push_bind(&card.lang)
                .push_bind(card.released_at.map(|d| d.format("%Y-%m-%d").to_string()))
                .push_bind(card.cached_at)
                .push("now()")
                .push("now()");
        });
        builder.push(
            " ON CONFLICT (id) DO UPDATE SET \
             oracle_id = EXCLUDED.oracle_id, name = EXCLUDED.name, mana_cost = EXCLUDED.mana_cost, \
             cmc = EXCLUDED.cmc, type_line = EXCLUDED.type_line, \
             oracle_text = EXCLUDED.oracle_text, \
             power = EXCLUDED.power, toughness = EXCLUDED.toughness, loyalty = EXCLUDED.loyalty, \
             colors = EXCLUDED.colors, color_identity = EXCLUDED.color_identity, \
             keywords = EXCLUDED.keywords, image_uris = EXCLUDED.image_uris, \
             card_faces = EXCLUDED.card_faces, set_code = EXCLUDED.set_code, \
             set_name = EXCLUDED.set_name, rarity = EXCLUDED.rarity, lang = EXCLUDED.lang, \
             released_at = EXCLUDED.released_at, cached_at = EXCLUDED.cached_at, \
             updated_at = now()",
        );

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| SynergyError::relational("upsert cards", e))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CardStore for PgCardStore {
    async fn count_logical_cards(&self) -> SynergyResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT oracle_id) FROM cards
             WHERE oracle_id IS NOT NULL AND deleted_at IS NULL",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SynergyError::relational("count logical cards", e))?;
        Ok(count.max(0) as u64)
    }

    async fn canonical_page(&self, offset: u64, limit: u64) -> SynergyResult<Vec<Card>> {
        let sql = format!(
            "SELECT DISTINCT ON (c.oracle_id) {CARD_COLUMNS}
             FROM cards c
             WHERE c.oracle_id IS NOT NULL AND c.deleted_at IS NULL
             ORDER BY c.oracle_id, {PRINTING_PRECEDENCE}
             LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query_as::<_, CardRow>(&sql)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                SynergyError::relational(format!("canonical page at offset {}", offset), e)
            })?;
        debug!(offset, rows = rows.len(), "Fetched canonical page");
        Ok(into_cards(rows))
    }

    async fn cards_by_logical_ids(&self, ids: &[String]) -> SynergyResult<Vec<Card>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT DISTINCT ON (c.oracle_id) {CARD_COLUMNS}
             FROM cards c
             WHERE c.oracle_id = ANY($1) AND c.deleted_at IS NULL
             ORDER BY c.oracle_id, {PRINTING_PRECEDENCE}"
        );
        let rows = sqlx::query_as::<_, CardRow>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SynergyError::relational("hydrate cards by logical id", e))?;
        Ok(into_cards(rows))
    }

    async fn similar_rules_text(&self, query: &RulesTextQuery) -> SynergyResult<Vec<Card>> {
        let sql = format!(
            "SELECT {CARD_COLUMNS}
             FROM cards c
             INNER JOIN (
                 SELECT name, MAX(id) AS id
                 FROM cards
                 WHERE name <> $1
                   AND lang = $2
                   AND oracle_text % $3
                   AND deleted_at IS NULL
                   AND {GAMEPLAY_FILTER}
                 GROUP BY name
             ) AS unique_cards ON c.name = unique_cards.name AND c.id = unique_cards.id
             ORDER BY similarity(c.oracle_text, $3) DESC
             LIMIT $4"
        );

        // The threshold is transaction-local so concurrent searches on other
        // pooled connections keep their own value.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SynergyError::relational("similar rules text", e))?;
        sqlx::query("SELECT set_config('pg_trgm.similarity_threshold', $1, true)")
            .bind(query.threshold.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| SynergyError::relational("set similarity threshold", e))?;
        let rows = sqlx::query_as::<_, CardRow>(&sql)
            .bind(&query.exclude_name)
            .bind(&query.language)
            .bind(&query.text)
            .bind(query.limit as i64)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| SynergyError::relational("similar rules text", e))?;
        tx.commit()
            .await
            .map_err(|e| SynergyError::relational("similar rules text", e))?;

        Ok(into_cards(rows))
    }

    async fn fuzzy_name_search(&self, query: &NameQuery) -> SynergyResult<Vec<Card>> {
        let sql = format!(
            "SELECT {CARD_COLUMNS}
             FROM cards c
             INNER JOIN (
                 SELECT name, MAX(id) AS id
                 FROM cards
                 WHERE name % $1 AND lang = $2 AND deleted_at IS NULL
                 GROUP BY name
             ) AS unique_cards ON c.name = unique_cards.name AND c.id = unique_cards.id
             ORDER BY similarity(c.name, $1) DESC
             LIMIT $3"
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SynergyError::relational("fuzzy name search", e))?;
        sqlx::query("SELECT set_config('pg_trgm.similarity_threshold', $1, true)")
            .bind(query.threshold.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| SynergyError::relational("set similarity threshold", e))?;
        let rows = sqlx::query_as::<_, CardRow>(&sql)
            .bind(&query.name)
            .bind(&query.language)
            .bind(query.limit as i64)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| SynergyError::relational("fuzzy name search", e))?;
        tx.commit()
            .await
            .map_err(|e| SynergyError::relational("fuzzy name search", e))?;

        Ok(into_cards(rows))
    }

    async fn card_by_id(&self, id: &str) -> SynergyResult<Option<Card>> {
        let sql = card_by_id_sql();
        let row = sqlx::query_as::<_, CardRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SynergyError::relational("card by id", e))?;
        Ok(row.map(Card::from))
    }

    async fn card_by_name(&self, name: &str) -> SynergyResult<Option<Card>> {
        let sql = format!(
            "SELECT {CARD_COLUMNS} FROM cards c
             WHERE c.name = $1 AND c.deleted_at IS NULL
             ORDER BY {PRINTING_PRECEDENCE}
             LIMIT 1"
        );
        let row = sqlx::query_as::<_, CardRow>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SynergyError::relational("card by name", e))?;
        Ok(row.map(Card::from))
    }

    async fn variants(
        &self,
        oracle_id: &str,
        exclude_id: &str,
        language: &str,
    ) -> SynergyResult<Vec<Card>> {
        let sql = format!(
            "SELECT {CARD_COLUMNS} FROM cards c
             WHERE c.oracle_id = $1 AND c.id <> $2 AND c.lang = $3 AND c.deleted_at IS NULL
             ORDER BY {PRINTING_PRECEDENCE}"
        );
        let rows = sqlx::query_as::<_, CardRow>(&sql)
            .bind(oracle_id)
            .bind(exclude_id)
            .bind(language)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SynergyError::relational("card variants", e))?;
        Ok(into_cards(rows))
    }

    async fn random_card(&self, language: &str) -> SynergyResult<Option<Card>> {
        let sampled = format!(
            "SELECT {CARD_COLUMNS} FROM cards c TABLESAMPLE BERNOULLI(1)
             WHERE c.lang = $1 AND c.deleted_at IS NULL
             LIMIT 1"
        );
        let row = sqlx::query_as::<_, CardRow>(&sampled)
            .bind(language)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SynergyError::relational("random card", e))?;
        if row.is_some() {
            return Ok(row.map(Card::from));
        }

        // A 1% sample of a small table is often empty.
        let fallback = format!(
            "SELECT {CARD_COLUMNS} FROM cards c
             WHERE c.lang = $1 AND c.deleted_at IS NULL
             ORDER BY random()
             LIMIT 1"
        );
        let row = sqlx::query_as::<_, CardRow>(&fallback)
            .bind(language)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SynergyError::relational("random card", e))?;
        Ok(row.map(Card::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_by_id_skips_deleted_rows() {
        let sql = card_by_id_sql();
        assert!(sql.contains("c.id = $1"));
        assert!(sql.ends_with("AND c.deleted_at IS NULL"));
    }
}
