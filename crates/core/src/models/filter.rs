//! Match filter model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Gender;
use crate::error::{Error, Result};

/// The pool a user asks to be matched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Filter {
    #[default]
    Any,
    Male,
    Female,
    NonBinary,
    PreferNotToSay,
}

impl Filter {
    pub const ALL: [Filter; 5] = [
        Filter::Any,
        Filter::Male,
        Filter::Female,
        Filter::NonBinary,
        Filter::PreferNotToSay,
    ];

    /// Concrete category this filter selects, `None` for `Any`
    pub fn category(self) -> Option<Gender> {
        match self {
            Filter::Any => None,
            Filter::Male => Some(Gender::Male),
            Filter::Female => Some(Gender::Female),
            Filter::NonBinary => Some(Gender::NonBinary),
            Filter::PreferNotToSay => Some(Gender::PreferNotToSay),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self.category() {
            Some(gender) => gender.as_str(),
            None => "any",
        }
    }
}

impl From<Gender> for Filter {
    fn from(gender: Gender) -> Self {
        match gender {
            Gender::Male => Filter::Male,
            Gender::Female => Filter::Female,
            Gender::NonBinary => Filter::NonBinary,
            Gender::PreferNotToSay => Filter::PreferNotToSay,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Filter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("any") {
            return Ok(Filter::Any);
        }
        s.parse::<Gender>()
            .map(Filter::from)
            .map_err(|_| Error::InvalidValue(format!("unknown filter: {s}")))
    }
}
