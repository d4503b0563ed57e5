//! First-run onboarding
//!
//! Makes sure we have an identity, a verified gender and a valid profile
//! before the session starts. Verification runs at most once per identity;
//! afterwards the cached result is used.

use std::path::Path;

use async_trait::async_trait;
use pairup_core::{Database, Gender, Identity, Profile};
use pairup_net::VerifyClient;
use tracing::info;

use crate::config::ProfileConfig;
use crate::error::{AppError, Result};

/// Who classifies the selfie
#[async_trait]
pub trait Verifier {
    async fn verify(&self, identity: &Identity, selfie: &Path) -> Result<Gender>;
}

#[async_trait]
impl Verifier for VerifyClient {
    async fn verify(&self, identity: &Identity, selfie: &Path) -> Result<Gender> {
        let verification = self.verify_file(identity, selfie).await?;
        if let Some(message) = &verification.message {
            info!(message = %message, "Verification service says");
        }
        Ok(verification.gender)
    }
}

/// Result of onboarding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Onboarded {
    pub identity: Identity,
    pub profile: Profile,
}

pub async fn onboard<V: Verifier + ?Sized>(
    db: &Database,
    verifier: &V,
    config: &ProfileConfig,
) -> Result<Onboarded> {
    let identity = db.device().get_or_create_identity()?;

    let gender = match db.device().cached_gender()? {
        Some(gender) => gender,
        None => {
            let selfie = config.selfie.as_deref().ok_or_else(|| {
                AppError::Onboarding(
                    "verification required: set profile.selfie in the config file".into(),
                )
            })?;
            let gender = verifier.verify(&identity, selfie).await?;
            db.device().cache_gender(gender)?;
            info!(gender = %gender, "Verified");
            gender
        }
    };

    let profile = Profile::new(gender, &config.nickname, &config.bio)?;
    db.profiles().save(&identity, &profile)?;

    Ok(Onboarded { identity, profile })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedVerifier {
        gender: Gender,
        calls: AtomicUsize,
    }

    impl FixedVerifier {
        fn new(gender: Gender) -> Self {
            Self {
                gender,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Verifier for FixedVerifier {
        async fn verify(&self, _identity: &Identity, _selfie: &Path) -> Result<Gender> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.gender)
        }
    }

    fn profile_config(nickname: &str) -> ProfileConfig {
        ProfileConfig {
            nickname: nickname.to_string(),
            bio: "likes <tea>".to_string(),
            selfie: Some(PathBuf::from("selfie.jpg")),
        }
    }

    #[tokio::test]
    async fn test_verifies_once() {
        let db = Database::open_in_memory().unwrap();
        let verifier = FixedVerifier::new(Gender::Female);

        let first = onboard(&db, &verifier, &profile_config("Nova")).await.unwrap();
        let second = onboard(&db, &verifier, &profile_config("Nova")).await.unwrap();

        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.identity, second.identity);
        assert_eq!(second.profile.gender, Gender::Female);
        assert_eq!(second.profile.bio, "likes tea");
        assert_eq!(db.profiles().load(&first.identity).unwrap(), Some(second.profile));
    }

    #[tokio::test]
    async fn test_missing_selfie_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        let verifier = FixedVerifier::new(Gender::Male);
        let config = ProfileConfig {
            selfie: None,
            ..profile_config("Nova")
        };

        let result = onboard(&db, &verifier, &config).await;
        assert!(matches!(result, Err(AppError::Onboarding(_))));
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_nickname_rejected() {
        let db = Database::open_in_memory().unwrap();
        let verifier = FixedVerifier::new(Gender::Male);

        let result = onboard(&db, &verifier, &profile_config("<>")).await;
        assert!(matches!(result, Err(AppError::Core(_))));
        // the verification result is still cached
        assert_eq!(db.device().cached_gender().unwrap(), Some(Gender::Male));
    }
}
