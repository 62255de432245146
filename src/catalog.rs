//! Catalog search capability and a local SQLite-backed catalog.
//!
//! The matcher only depends on `CatalogSearch`. Remote catalog clients
//! implement it over their HTTP API; `SqliteCatalog` implements it on an
//! FTS5 index so matching can run offline.

use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, OpenFlags};
use tracing::debug;

use crate::error::CatalogError;
use crate::models::{CatalogCandidate, CatalogQuery};
use crate::normalize::fold_to_ascii;

const WRITE_BATCH_SIZE: usize = 10_000;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const TITLE_COLUMN: &str = "search_title";
const ARTISTS_COLUMN: &str = "search_artists";

/// Search an external music catalog.
///
/// Failures are recoverable from the caller's point of view: the matcher
/// logs them and moves on to its next strategy.
pub trait CatalogSearch {
    fn search(
        &self,
        query: &CatalogQuery,
        limit: usize,
    ) -> Result<Vec<CatalogCandidate>, CatalogError>;
}

impl<F> CatalogSearch for F
where
    F: Fn(&CatalogQuery, usize) -> Result<Vec<CatalogCandidate>, CatalogError>,
{
    fn search(
        &self,
        query: &CatalogQuery,
        limit: usize,
    ) -> Result<Vec<CatalogCandidate>, CatalogError> {
        self(query, limit)
    }
}

// ============================================================================
// FTS query construction
// ============================================================================

/// Lowercase ASCII word tokens of a search term.
fn tokens(text: &str) -> Vec<String> {
    fold_to_ascii(text)
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Restrict every token to one FTS5 column:
/// `search_title : "good" AND search_title : "days"`.
fn column_terms(column: &str, text: &str) -> Vec<String> {
    tokens(text)
        .into_iter()
        .map(|t| format!("{} : \"{}\"", column, t))
        .collect()
}

/// Translate a field-scoped query into an FTS5 MATCH expression.
/// Returns `None` when the query has no searchable tokens.
pub fn fts_expression(query: &CatalogQuery) -> Option<String> {
    let terms = match query {
        CatalogQuery::TitleAndArtist { title, artist } => {
            let mut terms = column_terms(TITLE_COLUMN, title);
            terms.extend(column_terms(ARTISTS_COLUMN, artist));
            terms
        }
        CatalogQuery::Title(title) => column_terms(TITLE_COLUMN, title),
        CatalogQuery::Artist(artist) => column_terms(ARTISTS_COLUMN, artist),
    };

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" AND "))
    }
}

// ============================================================================
// SQLite catalog
// ============================================================================

pub struct SqliteCatalog {
    conn: Connection,
}

impl SqliteCatalog {
    /// Create the catalog schema in a fresh database file.
    pub fn create(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open an existing catalog read-only.
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, CatalogError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CatalogError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;

             CREATE TABLE IF NOT EXISTS catalog_tracks (
                 rowid INTEGER PRIMARY KEY,
                 id TEXT NOT NULL UNIQUE,
                 title TEXT NOT NULL,
                 artists_json TEXT NOT NULL,
                 search_title TEXT NOT NULL,
                 search_artists TEXT NOT NULL
             );

             CREATE VIRTUAL TABLE IF NOT EXISTS catalog_fts USING fts5(
                 search_title, search_artists,
                 content='catalog_tracks',
                 content_rowid='rowid',
                 tokenize='unicode61 remove_diacritics 2'
             );",
        )?;
        Ok(Self { conn })
    }

    /// Insert or replace candidates, batched in transactions.
    /// Call `rebuild_index` afterwards to make them searchable.
    ///
    /// The indexed columns hold ASCII-folded text, the same folding applied
    /// to query tokens, so non-Latin titles and artists stay reachable.
    pub fn insert_candidates(&mut self, candidates: &[CatalogCandidate]) -> Result<usize, CatalogError> {
        let mut written = 0;
        for chunk in candidates.chunks(WRITE_BATCH_SIZE) {
            let tx = self.conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT OR REPLACE INTO catalog_tracks
                         (id, title, artists_json, search_title, search_artists)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for candidate in chunk {
                    let artists_json = serde_json::to_string(&candidate.artists)
                        .map_err(|e| CatalogError::InvalidQuery(e.to_string()))?;
                    stmt.execute(params![
                        candidate.id,
                        candidate.title,
                        artists_json,
                        fold_to_ascii(&candidate.title),
                        fold_to_ascii(&candidate.artists.join(", ")),
                    ])?;
                    written += 1;
                }
            }
            tx.commit()?;
        }
        Ok(written)
    }

    pub fn rebuild_index(&self) -> Result<(), CatalogError> {
        self.conn
            .execute("INSERT INTO catalog_fts(catalog_fts) VALUES('rebuild')", [])?;
        Ok(())
    }

    pub fn optimize(&self) -> Result<(), CatalogError> {
        self.conn.execute_batch("VACUUM; ANALYZE;")?;
        Ok(())
    }

    pub fn len(&self) -> Result<usize, CatalogError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM catalog_tracks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, CatalogError> {
        Ok(self.len()? == 0)
    }
}

impl CatalogSearch for SqliteCatalog {
    fn search(
        &self,
        query: &CatalogQuery,
        limit: usize,
    ) -> Result<Vec<CatalogCandidate>, CatalogError> {
        let Some(expression) = fts_expression(query) else {
            debug!(%query, "No searchable tokens");
            return Ok(Vec::new());
        };

        let mut stmt = self.conn.prepare_cached(
            "SELECT t.id, t.title, t.artists_json
             FROM (
                 SELECT rowid, rank FROM catalog_fts
                 WHERE catalog_fts MATCH ?1
                 ORDER BY rank
                 LIMIT ?2
             ) f
             JOIN catalog_tracks t ON t.rowid = f.rowid
             ORDER BY f.rank",
        )?;

        let mut rows = stmt.query(params![expression, limit as i64])?;
        let mut candidates = Vec::new();
        while let Some(row) = rows.next()? {
            let artists_json: String = row.get(2)?;
            let artists: Vec<String> = serde_json::from_str(&artists_json)
                .map_err(|e| CatalogError::Unavailable(format!("corrupt artists column: {}", e)))?;
            candidates.push(CatalogCandidate {
                id: row.get(0)?,
                title: row.get(1)?,
                artists,
            });
        }

        debug!(%query, results = candidates.len(), "Catalog search");
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, title: &str, artists: &[&str]) -> CatalogCandidate {
        CatalogCandidate {
            id: id.to_string(),
            title: title.to_string(),
            artists: artists.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn seeded() -> SqliteCatalog {
        let mut catalog = SqliteCatalog::open_in_memory().unwrap();
        catalog
            .insert_candidates(&[
                candidate("sp:1", "Suzanna", &["Sauti Sol"]),
                candidate("sp:2", "Melanin", &["Sauti Sol", "Patoranking"]),
                candidate("sp:3", "Tití Me Preguntó", &["Bad Bunny"]),
                candidate("sp:4", "Last Last", &["Burna Boy"]),
            ])
            .unwrap();
        catalog.rebuild_index().unwrap();
        catalog
    }

    fn ids(results: &[CatalogCandidate]) -> Vec<&str> {
        results.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_fts_expression() {
        let q = CatalogQuery::TitleAndArtist {
            title: "Last Last!".to_string(),
            artist: "Burna Boy".to_string(),
        };
        assert_eq!(
            fts_expression(&q).unwrap(),
            "search_title : \"last\" AND search_title : \"last\" \
             AND search_artists : \"burna\" AND search_artists : \"boy\""
        );
        assert_eq!(fts_expression(&CatalogQuery::Title("!!".to_string())), None);
    }

    #[test]
    fn test_search_by_title_and_artist() {
        let catalog = seeded();
        let q = CatalogQuery::TitleAndArtist {
            title: "Suzanna".to_string(),
            artist: "Sauti Sol".to_string(),
        };
        let results = catalog.search(&q, 20).unwrap();
        assert_eq!(ids(&results), vec!["sp:1"]);
        assert_eq!(results[0].artists, vec!["Sauti Sol".to_string()]);
    }

    #[test]
    fn test_search_by_artist_returns_all_credits() {
        let catalog = seeded();
        let results = catalog
            .search(&CatalogQuery::Artist("sauti sol".to_string()), 20)
            .unwrap();
        let mut found = ids(&results);
        found.sort();
        assert_eq!(found, vec!["sp:1", "sp:2"]);
    }

    #[test]
    fn test_search_folds_diacritics() {
        let catalog = seeded();
        let results = catalog
            .search(&CatalogQuery::Title("titi me pregunto".to_string()), 20)
            .unwrap();
        assert_eq!(ids(&results), vec!["sp:3"]);
    }

    #[test]
    fn test_search_respects_limit_and_misses() {
        let catalog = seeded();
        let results = catalog
            .search(&CatalogQuery::Artist("sauti sol".to_string()), 1)
            .unwrap();
        assert_eq!(results.len(), 1);

        let none = catalog
            .search(&CatalogQuery::Title("nonexistent".to_string()), 20)
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_search_non_latin_entries() {
        let mut catalog = SqliteCatalog::open_in_memory().unwrap();
        catalog
            .insert_candidates(&[
                candidate("ru:1", "Кукушка", &["Кино"]),
                candidate("sp:5", "Lean On", &["Major Lazer", "MØ"]),
            ])
            .unwrap();
        catalog.rebuild_index().unwrap();

        let by_title = catalog
            .search(&CatalogQuery::Title("Кукушка".to_string()), 20)
            .unwrap();
        assert_eq!(ids(&by_title), vec!["ru:1"]);
        // original spelling survives in the returned candidate
        assert_eq!(by_title[0].title, "Кукушка");

        let by_artist = catalog
            .search(&CatalogQuery::Artist("Кино".to_string()), 20)
            .unwrap();
        assert_eq!(ids(&by_artist), vec!["ru:1"]);

        let folded = catalog
            .search(&CatalogQuery::Artist("MØ".to_string()), 20)
            .unwrap();
        assert_eq!(ids(&folded), vec!["sp:5"]);
        assert_eq!(folded[0].artists, vec!["Major Lazer".to_string(), "MØ".to_string()]);
    }

    #[test]
    fn test_len_and_replace() {
        let mut catalog = seeded();
        assert_eq!(catalog.len().unwrap(), 4);
        catalog
            .insert_candidates(&[candidate("sp:4", "Last Last", &["Burna Boy"])])
            .unwrap();
        assert_eq!(catalog.len().unwrap(), 4);
        assert!(!catalog.is_empty().unwrap());
    }

    #[test]
    fn test_closure_catalog() {
        let catalog = |_: &CatalogQuery, _: usize| -> Result<Vec<CatalogCandidate>, CatalogError> {
            Err(CatalogError::Unavailable("offline".to_string()))
        };
        assert!(catalog
            .search(&CatalogQuery::Title("x".to_string()), 5)
            .is_err());
    }
}
