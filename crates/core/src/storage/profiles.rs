//! Profile storage

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::{Identity, Profile};
use crate::storage::parse::{parse_gender, OptionalExt};

pub struct ProfileStore<'a> {
    conn: &'a Connection,
}

impl<'a> ProfileStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Save (or replace) the profile for an identity
    pub fn save(&self, identity: &Identity, profile: &Profile) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO profiles (identity, gender, nickname, bio, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                identity.as_str(),
                profile.gender.as_str(),
                profile.nickname,
                profile.bio,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn load(&self, identity: &Identity) -> Result<Option<Profile>> {
        let profile = self
            .conn
            .query_row(
                "SELECT gender, nickname, bio FROM profiles WHERE identity = ?1",
                params![identity.as_str()],
                |row| {
                    Ok(Profile {
                        gender: parse_gender(&row.get::<_, String>(0)?)?,
                        nickname: row.get(1)?,
                        bio: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }
}
