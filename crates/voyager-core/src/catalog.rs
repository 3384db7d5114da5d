//! Persistent catalog of destinations and accounts, backed by redb.
//!
//! # Table design
//!
//! ```text
//! destinations      u64 sequence (insertion order) -> JSON StoredDestination
//! users             user id                        -> JSON User
//! saved_destinations "{user}\0{destination}"       -> JSON SavedDestination
//! trips             "{user}\0{trip}"               -> JSON Trip
//! ```
//!
//! Child rows of a user share the `"{user}\0"` prefix, so everything a user
//! owns is one range scan `"{user}\0".."{user}\x01"`. Deleting a user removes
//! those ranges and the user row in a single write transaction.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition, WriteTransaction};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::dedup;
use crate::error::{Result, VoyagerError};
use crate::types::{
    validate_email, DestinationRecord, NewDestination, SavedDestination, Trip, User, UserId,
    UserPatch,
};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

const DESTINATIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("destinations");
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");
const SAVED: TableDefinition<&str, &[u8]> = TableDefinition::new("saved_destinations");
const TRIPS: TableDefinition<&str, &[u8]> = TableDefinition::new("trips");

fn db_err(e: impl std::fmt::Display) -> VoyagerError {
    VoyagerError::Catalog(e.to_string())
}

fn child_key(user_id: &UserId, child: Uuid) -> String {
    format!("{user_id}\u{0}{child}")
}

fn child_range(user_id: &UserId) -> (String, String) {
    (format!("{user_id}\u{0}"), format!("{user_id}\u{1}"))
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDestination {
    pub id: Uuid,
    pub name: String,
    pub location: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub image_prompt: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_personalized: bool,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub viewed: bool,
    pub created_at: DateTime<Utc>,
}

impl StoredDestination {
    fn from_new(d: NewDestination) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: d.name.trim().to_string(),
            location: d.location,
            description: d.description,
            tags: d.tags,
            image_prompt: d.image_prompt,
            image_url: d.image_url,
            is_personalized: d.is_personalized,
            country: d.country,
            viewed: false,
            created_at: Utc::now(),
        }
    }

    /// The feed wire shape.
    pub fn to_record(&self) -> DestinationRecord {
        DestinationRecord {
            id: Some(self.id.to_string()),
            name: self.name.clone(),
            location: self.location.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            image_prompt: self.image_prompt.clone(),
            image_url: self.image_url.clone(),
            is_personalized: self.is_personalized,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedDuplicate {
    pub name: String,
    pub matches: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub inserted: Vec<StoredDestination>,
    pub duplicates: Vec<SkippedDuplicate>,
    pub invalid: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedAccount {
    pub saved_destinations: usize,
    pub trips: usize,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

pub struct Catalog {
    db: Database,
}

impl Catalog {
    /// Open or create the catalog at `path`, creating every table.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            crate::io::ensure_dir(parent)?;
        }
        let db = Database::create(path).map_err(db_err)?;
        let wt = db.begin_write().map_err(db_err)?;
        wt.open_table(DESTINATIONS).map_err(db_err)?;
        wt.open_table(USERS).map_err(db_err)?;
        wt.open_table(SAVED).map_err(db_err)?;
        wt.open_table(TRIPS).map_err(db_err)?;
        wt.commit().map_err(db_err)?;
        Ok(Self { db })
    }

    // -----------------------------------------------------------------------
    // Destinations
    // -----------------------------------------------------------------------

    pub fn destination_count(&self) -> Result<u64> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(DESTINATIONS).map_err(db_err)?;
        table.len().map_err(db_err)
    }

    /// All destinations in insertion order.
    pub fn list_destinations(&self, include_viewed: bool) -> Result<Vec<StoredDestination>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(DESTINATIONS).map_err(db_err)?;
        let mut result = Vec::new();
        for entry in table.iter().map_err(db_err)? {
            let (_, v) = entry.map_err(db_err)?;
            let d: StoredDestination = serde_json::from_slice(v.value())?;
            if include_viewed || !d.viewed {
                result.push(d);
            }
        }
        Ok(result)
    }

    /// The first `limit` unviewed destinations in insertion order.
    pub fn next_batch(&self, limit: usize) -> Result<Vec<StoredDestination>> {
        let mut batch = self.list_destinations(false)?;
        batch.truncate(limit);
        Ok(batch)
    }

    pub fn get_destination(&self, id: Uuid) -> Result<StoredDestination> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(DESTINATIONS).map_err(db_err)?;
        find_destination(&table, id)?
            .map(|(_, d)| d)
            .ok_or_else(|| VoyagerError::DestinationNotFound(id.to_string()))
    }

    pub fn mark_viewed(&self, id: Uuid) -> Result<StoredDestination> {
        let wt = self.db.begin_write().map_err(db_err)?;
        let updated = {
            let mut table = wt.open_table(DESTINATIONS).map_err(db_err)?;
            let (key, mut d) = find_destination(&table, id)?
                .ok_or_else(|| VoyagerError::DestinationNotFound(id.to_string()))?;
            d.viewed = true;
            let value = serde_json::to_vec(&d)?;
            table.insert(key, value.as_slice()).map_err(db_err)?;
            d
        };
        wt.commit().map_err(db_err)?;
        Ok(updated)
    }

    /// Insert `records`, skipping any whose name fuzzily matches a stored
    /// destination or an earlier record of the same import.
    pub fn import(&self, records: Vec<NewDestination>) -> Result<ImportReport> {
        let mut report = ImportReport::default();

        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = wt.open_table(DESTINATIONS).map_err(db_err)?;
            let mut known = Vec::new();
            for entry in table.iter().map_err(db_err)? {
                let (_, v) = entry.map_err(db_err)?;
                let d: StoredDestination = serde_json::from_slice(v.value())?;
                known.push(d.name);
            }
            let mut next_key = table
                .last()
                .map_err(db_err)?
                .map(|(k, _)| k.value() + 1)
                .unwrap_or(1);

            for record in records {
                if record.name.trim().is_empty() {
                    report.invalid.push(record.location);
                    continue;
                }
                if let Some(matched) = dedup::find_duplicate(&record.name, known.iter().map(String::as_str)) {
                    tracing::info!(name = %record.name, matches = %matched, "skipping duplicate destination");
                    report.duplicates.push(SkippedDuplicate {
                        name: record.name.clone(),
                        matches: matched.to_string(),
                    });
                    continue;
                }

                let stored = StoredDestination::from_new(record);
                let value = serde_json::to_vec(&stored)?;
                table.insert(next_key, value.as_slice()).map_err(db_err)?;
                next_key += 1;
                known.push(stored.name.clone());
                report.inserted.push(stored);
            }
        }
        wt.commit().map_err(db_err)?;
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Users
    //
    // Every check that guards a write (email uniqueness, the owner of a
    // saved destination or trip) runs inside that write's transaction.
    // -----------------------------------------------------------------------

    pub fn list_users(&self) -> Result<Vec<User>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(USERS).map_err(db_err)?;
        let mut users = Vec::new();
        for entry in table.iter().map_err(db_err)? {
            let (_, v) = entry.map_err(db_err)?;
            users.push(serde_json::from_slice(v.value())?);
        }
        Ok(users)
    }

    pub fn create_user(&self, email: &str, full_name: Option<String>) -> Result<User> {
        let email = email.trim();
        validate_email(email)?;
        let user = User::new(email, full_name);
        let value = serde_json::to_vec(&user)?;

        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut users = wt.open_table(USERS).map_err(db_err)?;
            ensure_email_free(&users, email, None)?;
            users
                .insert(user.id.as_str(), value.as_slice())
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        tracing::info!(user = %user.id, "user created");
        Ok(user)
    }

    pub fn get_user(&self, user_id: &UserId) -> Result<User> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(USERS).map_err(db_err)?;
        read_user(&table, user_id)
    }

    pub fn update_user(&self, user_id: &UserId, patch: &UserPatch) -> Result<User> {
        let wt = self.db.begin_write().map_err(db_err)?;
        let user = {
            let mut users = wt.open_table(USERS).map_err(db_err)?;
            let mut user = read_user(&users, user_id)?;
            if let Some(email) = &patch.email {
                ensure_email_free(&users, email.trim(), Some(user_id))?;
            }
            user.apply(patch)?;
            let value = serde_json::to_vec(&user)?;
            users
                .insert(user_id.as_str(), value.as_slice())
                .map_err(db_err)?;
            user
        };
        wt.commit().map_err(db_err)?;
        Ok(user)
    }

    /// Remove the user and everything they own in one transaction.
    pub fn delete_user(&self, user_id: &UserId) -> Result<DeletedAccount> {
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut users = wt.open_table(USERS).map_err(db_err)?;
            if users.remove(user_id.as_str()).map_err(db_err)?.is_none() {
                return Err(VoyagerError::UserNotFound(user_id.to_string()));
            }
        }
        let summary = DeletedAccount {
            saved_destinations: remove_children(&wt, SAVED, user_id)?,
            trips: remove_children(&wt, TRIPS, user_id)?,
        };
        wt.commit().map_err(db_err)?;
        tracing::info!(
            user = %user_id,
            saved = summary.saved_destinations,
            trips = summary.trips,
            "deleted user and associated data"
        );
        Ok(summary)
    }

    // -----------------------------------------------------------------------
    // Saved destinations and trips
    // -----------------------------------------------------------------------

    pub fn save_destination(&self, user_id: &UserId, destination_id: Uuid) -> Result<SavedDestination> {
        let saved = SavedDestination {
            user_id: user_id.clone(),
            destination_id,
            saved_at: Utc::now(),
        };
        self.put_child(
            SAVED,
            user_id,
            &[destination_id],
            &child_key(user_id, destination_id),
            &saved,
        )?;
        Ok(saved)
    }

    pub fn saved_destinations(&self, user_id: &UserId) -> Result<Vec<SavedDestination>> {
        self.get_user(user_id)?;
        self.children(SAVED, user_id)
    }

    pub fn add_trip(&self, user_id: &UserId, name: &str, destination_ids: Vec<Uuid>) -> Result<Trip> {
        let trip = Trip {
            id: Uuid::new_v4(),
            user_id: user_id.clone(),
            name: name.to_string(),
            destination_ids,
            created_at: Utc::now(),
        };
        self.put_child(
            TRIPS,
            user_id,
            &trip.destination_ids,
            &child_key(user_id, trip.id),
            &trip,
        )?;
        Ok(trip)
    }

    pub fn trips(&self, user_id: &UserId) -> Result<Vec<Trip>> {
        self.get_user(user_id)?;
        self.children(TRIPS, user_id)
    }

    /// Insert a row owned by `user_id`. The owner and every referenced
    /// destination are checked in the same write transaction, so a
    /// concurrent `delete_user` either sees the row or rejects it.
    fn put_child<T: Serialize>(
        &self,
        def: TableDefinition<&str, &[u8]>,
        user_id: &UserId,
        destination_ids: &[Uuid],
        key: &str,
        value: &T,
    ) -> Result<()> {
        let value = serde_json::to_vec(value)?;
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let users = wt.open_table(USERS).map_err(db_err)?;
            read_user(&users, user_id)?;
            let destinations = wt.open_table(DESTINATIONS).map_err(db_err)?;
            for id in destination_ids {
                if find_destination(&destinations, *id)?.is_none() {
                    return Err(VoyagerError::DestinationNotFound(id.to_string()));
                }
            }
            let mut table = wt.open_table(def).map_err(db_err)?;
            table.insert(key, value.as_slice()).map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    fn children<T: DeserializeOwned>(
        &self,
        def: TableDefinition<&str, &[u8]>,
        user_id: &UserId,
    ) -> Result<Vec<T>> {
        let (lo, hi) = child_range(user_id);
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(def).map_err(db_err)?;
        let mut result = Vec::new();
        for entry in table.range(lo.as_str()..hi.as_str()).map_err(db_err)? {
            let (_, v) = entry.map_err(db_err)?;
            result.push(serde_json::from_slice(v.value())?);
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Table helpers, usable from read and write transactions alike
// ---------------------------------------------------------------------------

fn read_user(
    users: &impl ReadableTable<&'static str, &'static [u8]>,
    user_id: &UserId,
) -> Result<User> {
    let value = users
        .get(user_id.as_str())
        .map_err(db_err)?
        .ok_or_else(|| VoyagerError::UserNotFound(user_id.to_string()))?;
    Ok(serde_json::from_slice(value.value())?)
}

fn ensure_email_free(
    users: &impl ReadableTable<&'static str, &'static [u8]>,
    email: &str,
    except: Option<&UserId>,
) -> Result<()> {
    for entry in users.iter().map_err(db_err)? {
        let (_, v) = entry.map_err(db_err)?;
        let user: User = serde_json::from_slice(v.value())?;
        if user.email.eq_ignore_ascii_case(email) && Some(&user.id) != except {
            return Err(VoyagerError::UserExists(email.to_string()));
        }
    }
    Ok(())
}

fn find_destination(
    table: &impl ReadableTable<u64, &'static [u8]>,
    id: Uuid,
) -> Result<Option<(u64, StoredDestination)>> {
    for entry in table.iter().map_err(db_err)? {
        let (k, v) = entry.map_err(db_err)?;
        let d: StoredDestination = serde_json::from_slice(v.value())?;
        if d.id == id {
            return Ok(Some((k.value(), d)));
        }
    }
    Ok(None)
}

fn remove_children(
    wt: &WriteTransaction,
    def: TableDefinition<&str, &[u8]>,
    user_id: &UserId,
) -> Result<usize> {
    let (lo, hi) = child_range(user_id);
    let mut table = wt.open_table(def).map_err(db_err)?;
    let mut keys = Vec::new();
    for entry in table.range(lo.as_str()..hi.as_str()).map_err(db_err)? {
        let (k, _) = entry.map_err(db_err)?;
        keys.push(k.value().to_string());
    }
    for key in &keys {
        table.remove(key.as_str()).map_err(db_err)?;
    }
    Ok(keys.len())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
