//! `SQLite` storage for contacts, relationships, avatars and sender hints.
//!
//! This is the only shared mutable resource of the crate. Every method
//! takes the connection lock for the duration of one statement (or one
//! small group of statements), so each write is individually consistent.
//! Multi-row work such as a reconciliation pass is deliberately *not*
//! wrapped in a transaction; see [`crate::reconcile`].

// SQLite operations need to hold the lock for the duration of the operation.
#![allow(clippy::significant_drop_tightening)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::error::{ContactsError, Result};
use super::types::{Contact, ContactEntry, UserContactRelationship};
use crate::image_cache::ImageCacheEntry;

/// Upper bound on bound parameters per `IN (...)` query.
///
/// Older `SQLite` builds cap host parameters at 999.
pub const EXISTENCE_QUERY_CHUNK: usize = 500;

const CONTACT_COLUMNS: &str = "pubkey, display_name, email, picture_url, picture_cache, about, \
                               metadata, profile_synced_at, created_at, updated_at";

/// `SQLite`-based storage for contact data.
///
/// Thread-safe wrapper around a `SQLite` connection.
pub struct ContactStorage {
    conn: Mutex<Connection>,
}

/// A contact row before the metadata JSON is decoded.
struct ContactRow {
    pubkey: String,
    display_name: String,
    email: Option<String>,
    picture_url: Option<String>,
    picture_cache: Option<String>,
    about: Option<String>,
    metadata_json: String,
    profile_synced_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl ContactRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            pubkey: row.get(0)?,
            display_name: row.get(1)?,
            email: row.get(2)?,
            picture_url: row.get(3)?,
            picture_cache: row.get(4)?,
            about: row.get(5)?,
            metadata_json: row.get(6)?,
            profile_synced_at: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_contact(self) -> Result<Contact> {
        let metadata: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(&self.metadata_json).map_err(|e| {
                ContactsError::InvalidData(format!("Invalid metadata JSON for {}: {e}", self.pubkey))
            })?;

        Ok(Contact {
            pubkey: self.pubkey,
            display_name: self.display_name,
            email: self.email,
            picture_url: self.picture_url,
            picture_cache: self.picture_cache,
            about: self.about,
            metadata,
            profile_synced_at: self.profile_synced_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl ContactStorage {
    /// Creates a new storage instance at the given path.
    ///
    /// Creates the database file and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or initialized.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.initialize_schema()?;
        Ok(storage)
    }

    /// Creates an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.initialize_schema()?;
        Ok(storage)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ContactsError::Storage(format!("Failed to acquire database lock: {e}")))
    }

    /// Initializes the database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS contacts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pubkey TEXT NOT NULL UNIQUE,
                display_name TEXT NOT NULL,
                email TEXT,
                picture_url TEXT,
                picture_cache TEXT,
                about TEXT,
                metadata TEXT NOT NULL DEFAULT '{}',
                profile_synced_at INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            -- Per-owner visibility: is this contact in the owner's follow list?
            CREATE TABLE IF NOT EXISTS user_contacts (
                owner_pubkey TEXT NOT NULL,
                contact_pubkey TEXT NOT NULL,
                is_public INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (owner_pubkey, contact_pubkey)
            );

            CREATE TABLE IF NOT EXISTS image_cache (
                pubkey TEXT PRIMARY KEY,
                source_url TEXT NOT NULL,
                payload BLOB NOT NULL,
                content_type TEXT NOT NULL,
                digest TEXT NOT NULL,
                fetched_at INTEGER NOT NULL
            );

            -- Sender pubkeys that decrypted a given message / address
            CREATE TABLE IF NOT EXISTS message_pubkey_hints (
                message_id TEXT PRIMARY KEY,
                pubkey TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS address_pubkey_hints (
                address TEXT PRIMARY KEY,
                pubkey TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_contacts_email ON contacts(LOWER(TRIM(email)));
            CREATE INDEX IF NOT EXISTS idx_user_contacts_public
                ON user_contacts(owner_pubkey, is_public);
            ",
        )?;

        Ok(())
    }

    // ==================== Contact Operations ====================

    /// Saves a contact, replacing every stored field.
    ///
    /// Used for explicit edits. `created_at` of an existing row is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn save_contact(&self, contact: &Contact) -> Result<()> {
        let metadata_json = serde_json::to_string(&contact.metadata)
            .map_err(|e| ContactsError::Storage(format!("Failed to serialize metadata: {e}")))?;

        let conn = self.conn()?;
        conn.execute(
            r"
            INSERT INTO contacts (pubkey, display_name, email, picture_url, picture_cache, about,
                                  metadata, profile_synced_at, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(pubkey) DO UPDATE SET
                display_name = excluded.display_name,
                email = excluded.email,
                picture_url = excluded.picture_url,
                picture_cache = excluded.picture_cache,
                about = excluded.about,
                metadata = excluded.metadata,
                profile_synced_at = excluded.profile_synced_at,
                updated_at = excluded.updated_at
            ",
            params![
                &contact.pubkey,
                &contact.display_name,
                &contact.email,
                &contact.picture_url,
                &contact.picture_cache,
                &contact.about,
                &metadata_json,
                contact.profile_synced_at,
                contact.created_at,
                contact.updated_at,
            ],
        )?;

        Ok(())
    }

    /// Inserts a contact only if its pubkey is unknown.
    ///
    /// Returns `true` when a row was written. Existing contacts are left
    /// untouched, which makes placeholder creation safe to repeat.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert_contact_if_absent(&self, contact: &Contact) -> Result<bool> {
        let metadata_json = serde_json::to_string(&contact.metadata)
            .map_err(|e| ContactsError::Storage(format!("Failed to serialize metadata: {e}")))?;

        let conn = self.conn()?;
        let rows = conn.execute(
            r"
            INSERT OR IGNORE INTO contacts (pubkey, display_name, email, picture_url, picture_cache,
                                            about, metadata, profile_synced_at, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
            params![
                &contact.pubkey,
                &contact.display_name,
                &contact.email,
                &contact.picture_url,
                &contact.picture_cache,
                &contact.about,
                &metadata_json,
                contact.profile_synced_at,
                contact.created_at,
                contact.updated_at,
            ],
        )?;

        Ok(rows == 1)
    }

    /// Retrieves a contact by pubkey.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_contact(&self, pubkey: &str) -> Result<Option<Contact>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE pubkey = ?1"),
                params![pubkey],
                ContactRow::from_row,
            )
            .optional()?;

        row.map(ContactRow::into_contact).transpose()
    }

    /// Retrieves all contacts, ordered by display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_all_contacts(&self) -> Result<Vec<Contact>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts ORDER BY display_name COLLATE NOCASE, pubkey"
        ))?;

        let rows = stmt
            .query_map([], ContactRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(ContactRow::into_contact).collect()
    }

    /// Retrieves every contact together with the owner's visibility flag.
    ///
    /// Contacts without a relationship row are reported as private.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_contacts_for_owner(&self, owner_pubkey: &str) -> Result<Vec<ContactEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r"
            SELECT c.pubkey, c.display_name, c.email, c.picture_url, c.picture_cache, c.about,
                   c.metadata, c.profile_synced_at, c.created_at, c.updated_at,
                   COALESCE(uc.is_public, 0)
            FROM contacts c
            LEFT JOIN user_contacts uc
                ON uc.contact_pubkey = c.pubkey AND uc.owner_pubkey = ?1
            ORDER BY c.display_name COLLATE NOCASE, c.pubkey
            ",
        )?;

        let rows = stmt
            .query_map(params![owner_pubkey], |row| {
                let contact = ContactRow::from_row(row)?;
                let is_public: i32 = row.get(10)?;
                Ok((contact, is_public != 0))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(row, is_public)| {
                Ok(ContactEntry {
                    contact: row.into_contact()?,
                    is_public,
                })
            })
            .collect()
    }

    /// Deletes a contact along with its relationships and cached avatar.
    ///
    /// Refused while any owner follows the contact publicly, so no
    /// published follow list loses an entry behind its owner's back. Runs
    /// as one transaction. Returns `false` if the contact did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ContactsError::ContactIsPublic`] if some owner has the
    /// contact public, or an error if the database operation fails.
    pub fn delete_contact(&self, pubkey: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let is_public: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM user_contacts WHERE contact_pubkey = ?1 AND is_public = 1)",
            params![pubkey],
            |row| row.get(0),
        )?;
        if is_public {
            return Err(ContactsError::ContactIsPublic(pubkey.to_string()));
        }

        tx.execute(
            "DELETE FROM user_contacts WHERE contact_pubkey = ?1",
            params![pubkey],
        )?;
        tx.execute("DELETE FROM image_cache WHERE pubkey = ?1", params![pubkey])?;
        let removed = tx.execute("DELETE FROM contacts WHERE pubkey = ?1", params![pubkey])?;

        tx.commit()?;
        Ok(removed > 0)
    }

    /// Returns which of `pubkeys` already have a contact row.
    ///
    /// Runs one `IN (...)` query per [`EXISTENCE_QUERY_CHUNK`] pubkeys,
    /// never one query per pubkey.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn existing_pubkeys(&self, pubkeys: &[String]) -> Result<HashSet<String>> {
        let mut existing = HashSet::new();
        if pubkeys.is_empty() {
            return Ok(existing);
        }

        let conn = self.conn()?;
        for chunk in pubkeys.chunks(EXISTENCE_QUERY_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT pubkey FROM contacts WHERE pubkey IN ({placeholders})"
            ))?;
            let found = stmt
                .query_map(params_from_iter(chunk.iter()), |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            existing.extend(found);
        }

        Ok(existing)
    }

    /// Finds pubkeys whose contact email matches `address`.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// Order is deterministic: most recently updated contact first, ties
    /// broken by ascending pubkey.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn find_pubkeys_by_address(&self, address: &str) -> Result<Vec<String>> {
        let normalized = address.trim().to_lowercase();
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r"
            SELECT pubkey FROM contacts
            WHERE LOWER(TRIM(email)) = ?1
            ORDER BY updated_at DESC, pubkey ASC
            ",
        )?;

        let pubkeys = stmt
            .query_map(params![normalized], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(pubkeys)
    }

    /// Stores the cached avatar data URL on the contact row.
    ///
    /// Only applies while the contact still points at `source_url`, so a
    /// late write for a replaced picture is dropped. Does not bump
    /// `updated_at`: a cache fill is not a profile edit. Returns `true`
    /// if the row was updated.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn update_picture_cache(
        &self,
        pubkey: &str,
        source_url: &str,
        data_url: &str,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE contacts SET picture_cache = ?1 WHERE pubkey = ?2 AND picture_url = ?3",
            params![data_url, pubkey, source_url],
        )?;
        Ok(rows == 1)
    }

    /// Marks the profile fetch for `pubkeys` as completed at `synced_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn mark_profiles_synced(&self, pubkeys: &[String], synced_at: i64) -> Result<()> {
        if pubkeys.is_empty() {
            return Ok(());
        }

        let conn = self.conn()?;
        for chunk in pubkeys.chunks(EXISTENCE_QUERY_CHUNK) {
            let placeholders = (2..chunk.len() + 2)
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "UPDATE contacts SET profile_synced_at = ?1 WHERE pubkey IN ({placeholders})"
            );
            let mut values: Vec<rusqlite::types::Value> = Vec::with_capacity(chunk.len() + 1);
            values.push(synced_at.into());
            values.extend(chunk.iter().map(|pk| pk.clone().into()));
            conn.execute(&sql, params_from_iter(values))?;
        }

        Ok(())
    }

    /// Public contacts of `owner_pubkey` whose profile was never fetched.
    ///
    /// A pass interrupted between stub creation and enrichment leaves such
    /// rows behind; the next pass picks them up from here.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn pending_profile_pubkeys(&self, owner_pubkey: &str, limit: usize) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r"
            SELECT c.pubkey FROM contacts c
            JOIN user_contacts uc ON uc.contact_pubkey = c.pubkey
            WHERE uc.owner_pubkey = ?1 AND uc.is_public = 1 AND c.profile_synced_at IS NULL
            ORDER BY c.created_at, c.pubkey
            LIMIT ?2
            ",
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let pubkeys = stmt
            .query_map(params![owner_pubkey, limit], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(pubkeys)
    }

    // ==================== Relationship Operations ====================

    /// Returns `{contact_pubkey -> is_public}` for one owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_relationships(&self, owner_pubkey: &str) -> Result<HashMap<String, bool>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT contact_pubkey, is_public FROM user_contacts WHERE owner_pubkey = ?1",
        )?;

        let rows = stmt
            .query_map(params![owner_pubkey], |row| {
                let pubkey: String = row.get(0)?;
                let is_public: i32 = row.get(1)?;
                Ok((pubkey, is_public != 0))
            })?
            .collect::<std::result::Result<HashMap<_, _>, _>>()?;

        Ok(rows)
    }

    /// Retrieves one relationship.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_relationship(
        &self,
        owner_pubkey: &str,
        contact_pubkey: &str,
    ) -> Result<Option<UserContactRelationship>> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                r"
                SELECT owner_pubkey, contact_pubkey, is_public, created_at, updated_at
                FROM user_contacts
                WHERE owner_pubkey = ?1 AND contact_pubkey = ?2
                ",
                params![owner_pubkey, contact_pubkey],
                |row| {
                    let is_public: i32 = row.get(2)?;
                    Ok(UserContactRelationship {
                        owner_pubkey: row.get(0)?,
                        contact_pubkey: row.get(1)?,
                        is_public: is_public != 0,
                        created_at: row.get(3)?,
                        updated_at: row.get(4)?,
                    })
                },
            )
            .optional()?;

        Ok(result)
    }

    /// Sets the visibility of a contact for an owner.
    ///
    /// Creates the relationship if needed and keeps `created_at` of an
    /// existing one. `updated_at` only moves when the flag changes.
    /// Returns `true` if the stored visibility changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_visibility(
        &self,
        owner_pubkey: &str,
        contact_pubkey: &str,
        is_public: bool,
        now: i64,
    ) -> Result<bool> {
        let conn = self.conn()?;

        let previous: Option<i32> = conn
            .query_row(
                "SELECT is_public FROM user_contacts WHERE owner_pubkey = ?1 AND contact_pubkey = ?2",
                params![owner_pubkey, contact_pubkey],
                |row| row.get(0),
            )
            .optional()?;

        if previous.map(|v| v != 0) == Some(is_public) {
            return Ok(false);
        }

        conn.execute(
            r"
            INSERT INTO user_contacts (owner_pubkey, contact_pubkey, is_public, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT(owner_pubkey, contact_pubkey) DO UPDATE SET
                is_public = excluded.is_public,
                updated_at = excluded.updated_at
            ",
            params![owner_pubkey, contact_pubkey, i32::from(is_public), now],
        )?;

        Ok(true)
    }

    /// Public contact pubkeys of an owner, sorted ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn public_pubkeys(&self, owner_pubkey: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r"
            SELECT contact_pubkey FROM user_contacts
            WHERE owner_pubkey = ?1 AND is_public = 1
            ORDER BY contact_pubkey
            ",
        )?;

        let pubkeys = stmt
            .query_map(params![owner_pubkey], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(pubkeys)
    }

    // ==================== Image Cache Operations ====================

    /// Saves an avatar entry, replacing any previous one for the pubkey.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn save_image(&self, entry: &ImageCacheEntry) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r"
            INSERT INTO image_cache (pubkey, source_url, payload, content_type, digest, fetched_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(pubkey) DO UPDATE SET
                source_url = excluded.source_url,
                payload = excluded.payload,
                content_type = excluded.content_type,
                digest = excluded.digest,
                fetched_at = excluded.fetched_at
            ",
            params![
                &entry.pubkey,
                &entry.source_url,
                &entry.payload,
                &entry.content_type,
                &entry.digest,
                entry.fetched_at,
            ],
        )?;
        Ok(())
    }

    /// Retrieves the avatar entry for a pubkey, valid or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_image(&self, pubkey: &str) -> Result<Option<ImageCacheEntry>> {
        let conn = self.conn()?;
        let entry = conn
            .query_row(
                r"
                SELECT pubkey, source_url, payload, content_type, digest, fetched_at
                FROM image_cache WHERE pubkey = ?1
                ",
                params![pubkey],
                image_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    /// Loads every stored avatar entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn load_images(&self) -> Result<Vec<ImageCacheEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT pubkey, source_url, payload, content_type, digest, fetched_at FROM image_cache",
        )?;
        let entries = stmt
            .query_map([], image_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Removes the avatar entry for a pubkey.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_image(&self, pubkey: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM image_cache WHERE pubkey = ?1", params![pubkey])?;
        Ok(())
    }

    // ==================== Sender Hint Operations ====================

    /// Pubkey that last decrypted the given message, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_message_hint(&self, message_id: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let hint = conn
            .query_row(
                "SELECT pubkey FROM message_pubkey_hints WHERE message_id = ?1",
                params![message_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hint)
    }

    /// Pubkey that last decrypted mail from the given address, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_address_hint(&self, address: &str) -> Result<Option<String>> {
        let normalized = address.trim().to_lowercase();
        let conn = self.conn()?;
        let hint = conn
            .query_row(
                "SELECT pubkey FROM address_pubkey_hints WHERE address = ?1",
                params![normalized],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hint)
    }

    /// Persists the winning pubkey for a message and its sender address.
    ///
    /// A blank address only stores the message hint.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn save_sender_hint(
        &self,
        message_id: &str,
        address: &str,
        pubkey: &str,
        now: i64,
    ) -> Result<()> {
        let normalized = address.trim().to_lowercase();
        let conn = self.conn()?;

        conn.execute(
            r"
            INSERT INTO message_pubkey_hints (message_id, pubkey, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(message_id) DO UPDATE SET
                pubkey = excluded.pubkey,
                updated_at = excluded.updated_at
            ",
            params![message_id, pubkey, now],
        )?;
        if normalized.is_empty() {
            return Ok(());
        }
        conn.execute(
            r"
            INSERT INTO address_pubkey_hints (address, pubkey, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(address) DO UPDATE SET
                pubkey = excluded.pubkey,
                updated_at = excluded.updated_at
            ",
            params![normalized, pubkey, now],
        )?;

        Ok(())
    }
}

fn image_from_row(row: &Row<'_>) -> rusqlite::Result<ImageCacheEntry> {
    Ok(ImageCacheEntry {
        pubkey: row.get(0)?,
        source_url: row.get(1)?,
        payload: row.get(2)?,
        content_type: row.get(3)?,
        digest: row.get(4)?,
        fetched_at: row.get(5)?,
    })
}
