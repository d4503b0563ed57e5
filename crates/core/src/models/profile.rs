//! Profile model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::validation::{validate_bio, validate_nickname};

/// Gender label produced by the verification service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Gender {
    Male,
    Female,
    NonBinary,
    PreferNotToSay,
}

impl Gender {
    pub const ALL: [Gender; 4] = [
        Gender::Male,
        Gender::Female,
        Gender::NonBinary,
        Gender::PreferNotToSay,
    ];

    /// Wire spelling
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::NonBinary => "non-binary",
            Gender::PreferNotToSay => "prefer-not-to-say",
        }
    }

    /// Map a label from the server, falling back to the neutral category
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or(Gender::PreferNotToSay)
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "non-binary" => Ok(Gender::NonBinary),
            "prefer-not-to-say" => Ok(Gender::PreferNotToSay),
            other => Err(Error::InvalidValue(format!("unknown gender: {other}"))),
        }
    }
}

/// Our own pseudonymous profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub gender: Gender,
    pub nickname: String,
    pub bio: String,
}

impl Profile {
    /// Build a profile, sanitizing and validating nickname and bio
    pub fn new(gender: Gender, nickname: &str, bio: &str) -> Result<Self> {
        Ok(Self {
            gender,
            nickname: validate_nickname(nickname)?,
            bio: validate_bio(bio)?,
        })
    }
}

/// What we know about a matched peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerProfile {
    pub nickname: String,
    /// `None` when the server did not know (sent as `?`)
    pub gender: Option<Gender>,
    pub bio: Option<String>,
}

impl PeerProfile {
    pub fn anonymous(gender: Option<Gender>) -> Self {
        Self {
            nickname: "Stranger".to_string(),
            gender,
            bio: None,
        }
    }
}
