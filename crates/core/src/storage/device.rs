//! Device identity storage
//!
//! One row per installation. The identity is created the first time it is
//! asked for and never changes afterwards; the verification result is
//! cached alongside it so the selfie check only ever runs once.

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::info;

use crate::error::Result;
use crate::models::{Gender, Identity};
use crate::storage::parse::{parse_gender_opt, OptionalExt};

pub struct DeviceStore<'a> {
    conn: &'a Connection,
}

impl<'a> DeviceStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Stored identity, if one was created
    pub fn identity(&self) -> Result<Option<Identity>> {
        let identity = self
            .conn
            .query_row("SELECT identity FROM device WHERE slot = 1", [], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(identity.map(Identity::new))
    }

    /// Return the stored identity, creating one on first use
    pub fn get_or_create_identity(&self) -> Result<Identity> {
        if let Some(identity) = self.identity()? {
            return Ok(identity);
        }

        let identity = Identity::generate();
        self.conn.execute(
            "INSERT INTO device (slot, identity, created_at) VALUES (1, ?1, ?2)",
            params![identity.as_str(), Utc::now().to_rfc3339()],
        )?;
        info!(identity = %identity.short(), "Created device identity");
        Ok(identity)
    }

    /// Cached verification result
    pub fn cached_gender(&self) -> Result<Option<Gender>> {
        let gender = self
            .conn
            .query_row("SELECT gender FROM device WHERE slot = 1", [], |row| {
                parse_gender_opt(row.get(0)?)
            })
            .optional()?;
        Ok(gender.flatten())
    }

    /// Cache the verification result
    pub fn cache_gender(&self, gender: Gender) -> Result<()> {
        self.conn.execute(
            "UPDATE device SET gender = ?1, verified_at = ?2 WHERE slot = 1",
            params![gender.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::models::Gender;
    use crate::storage::Database;

    #[test]
    fn test_identity_created_once() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.device().identity().unwrap().is_none());

        let first = db.device().get_or_create_identity().unwrap();
        let second = db.device().get_or_create_identity().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_gender_cache() {
        let db = Database::open_in_memory().unwrap();
        db.device().get_or_create_identity().unwrap();
        assert_eq!(db.device().cached_gender().unwrap(), None);

        db.device().cache_gender(Gender::NonBinary).unwrap();
        assert_eq!(db.device().cached_gender().unwrap(), Some(Gender::NonBinary));
    }
}
