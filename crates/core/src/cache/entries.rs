//! Cache entry operations.
//!
//! Entries are response snapshots keyed by the SHA-256 of their request
//! identity, scoped to a generation. Writes use UPSERT semantics so the last
//! write for a key wins.

use super::connection::CacheDb;
use super::identity::RequestIdentity;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A stored response snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    /// URL the response was served from (after redirects).
    pub url: String,
    pub status: u16,
    pub status_text: String,
    /// Header values as received on the wire. They need not be UTF-8.
    pub headers: Vec<(String, Vec<u8>)>,
    pub body: Vec<u8>,
    /// RFC 3339 timestamp of when the snapshot was taken.
    pub stored_at: String,
}

impl StoredResponse {
    /// First value of a header as raw bytes, matched case-insensitively.
    pub fn header_bytes(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }

    /// First value of a header, if it is valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_bytes(name).and_then(|v| std::str::from_utf8(v).ok())
    }
}

/// Insert or replace one entry inside an open connection or transaction.
///
/// The generation row is created when missing so a runtime write never
/// fails just because the generation was not opened first.
fn upsert(
    conn: &rusqlite::Connection, generation: &str, identity: &RequestIdentity, response: &StoredResponse,
) -> Result<(), Error> {
    conn.execute(
        "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
        params![generation, chrono::Utc::now().to_rfc3339()],
    )?;

    let headers_json = serde_json::to_string(&response.headers)?;
    conn.execute(
        "INSERT INTO entries (
            generation, key_hash, method, url, response_url, status, status_text,
            headers_json, body, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(generation, key_hash) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            response_url = excluded.response_url,
            status = excluded.status,
            status_text = excluded.status_text,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            generation,
            identity.cache_key(),
            &identity.method,
            &identity.url,
            &response.url,
            response.status,
            &response.status_text,
            headers_json,
            &response.body,
            &response.stored_at,
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Insert or update a single entry.
    pub async fn put_entry(
        &self, generation: &str, identity: &RequestIdentity, response: &StoredResponse,
    ) -> Result<(), Error> {
        let generation = generation.to_string();
        let identity = identity.clone();
        let response = response.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> { upsert(conn, &generation, &identity, &response) })
            .await
            .map_err(Error::from)
    }

    /// Write a batch of entries in one transaction: either all land or none.
    pub async fn put_entries(
        &self, generation: &str, entries: &[(RequestIdentity, StoredResponse)],
    ) -> Result<(), Error> {
        let generation = generation.to_string();
        let entries = entries.to_vec();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for (identity, response) in &entries {
                    upsert(&tx, &generation, identity, response)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up an entry by request identity.
    ///
    /// Returns None if the generation has no entry for the identity.
    pub async fn match_entry(
        &self, generation: &str, identity: &RequestIdentity,
    ) -> Result<Option<StoredResponse>, Error> {
        let generation = generation.to_string();
        let key_hash = identity.cache_key();
        self.conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT response_url, status, status_text, headers_json, body, stored_at
                    FROM entries WHERE generation = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![generation, key_hash], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u16>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Vec<u8>>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                });

                match result {
                    Ok((url, status, status_text, headers_json, body, stored_at)) => {
                        let headers = serde_json::from_str(&headers_json)?;
                        Ok(Some(StoredResponse { url, status, status_text, headers, body, stored_at }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries held by a generation.
    pub async fn count_entries(&self, generation: &str) -> Result<u64, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE generation = ?1", params![generation], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Request URLs stored in a generation, sorted.
    pub async fn entry_urls(&self, generation: &str) -> Result<Vec<String>, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE generation = ?1 ORDER BY url ASC")?;
                let urls = stmt
                    .query_map(params![generation], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}
