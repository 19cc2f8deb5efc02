use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;

use crate::config::SecretSettings;

/// Which configured secret a PIN matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinMatch {
    ArmToggle,
    Sos,
    Resize,
    None,
}

/// The three panel secrets as argon2 PHC strings.
///
/// Only hashes are held; PINs are checked with a slow verification, never
/// by comparing digests.
#[derive(Clone)]
pub struct SecretSet {
    arm_toggle: String,
    sos: String,
    resize: String,
}

impl SecretSet {
    pub fn new(arm_toggle: &str, sos: &str, resize: &str) -> Result<Self> {
        for (name, phc) in [("arm_toggle", arm_toggle), ("sos", sos), ("resize", resize)] {
            PasswordHash::new(phc)
                .map_err(|e| anyhow!("secrets.{} is not a valid PHC hash: {}", name, e))?;
        }
        Ok(Self {
            arm_toggle: arm_toggle.to_string(),
            sos: sos.to_string(),
            resize: resize.to_string(),
        })
    }

    pub fn from_settings(settings: &SecretSettings) -> Result<Self> {
        Self::new(&settings.arm_toggle, &settings.sos, &settings.resize)
    }

    /// Checks the PIN against arm toggle, SOS and resize, in that order.
    /// Verification errors count as a mismatch.
    pub fn classify(&self, pin: &str) -> PinMatch {
        if verify(&self.arm_toggle, pin) {
            PinMatch::ArmToggle
        } else if verify(&self.sos, pin) {
            PinMatch::Sos
        } else if verify(&self.resize, pin) {
            PinMatch::Resize
        } else {
            PinMatch::None
        }
    }
}

impl std::fmt::Debug for SecretSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretSet").finish_non_exhaustive()
    }
}

fn verify(phc: &str, pin: &str) -> bool {
    let parsed = match PasswordHash::new(phc) {
        Ok(parsed) => parsed,
        Err(e) => {
            log::debug!("stored secret unparseable: {}", e);
            return false;
        }
    };
    match Argon2::default().verify_password(pin.as_bytes(), &parsed) {
        Ok(()) => true,
        Err(argon2::password_hash::Error::Password) => false,
        Err(e) => {
            log::debug!("secret verification failed: {}", e);
            false
        }
    }
}

/// Hashes a PIN with the default argon2id parameters.
pub fn hash_secret(pin: &str) -> Result<String> {
    hash_secret_with(pin, Params::default())
}

/// Hashes a PIN with explicit argon2id parameters. Verification reads the
/// parameters back from the PHC string.
pub fn hash_secret_with(pin: &str, params: Params) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let hash = argon2
        .hash_password(pin.as_bytes(), &salt)
        .map_err(|e| anyhow!("argon2 hashing failed: {}", e))?;
    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick(pin: &str) -> String {
        let params = Params::new(1024, 1, 1, None).expect("params");
        hash_secret_with(pin, params).expect("hash")
    }

    #[test]
    fn classify_checks_each_secret() {
        let set = SecretSet::new(&quick("1111"), &quick("2222"), &quick("3333")).expect("set");
        assert_eq!(set.classify("1111"), PinMatch::ArmToggle);
        assert_eq!(set.classify("2222"), PinMatch::Sos);
        assert_eq!(set.classify("3333"), PinMatch::Resize);
        assert_eq!(set.classify("4444"), PinMatch::None);
        assert_eq!(set.classify(""), PinMatch::None);
    }

    #[test]
    fn arm_toggle_wins_when_secrets_collide() {
        let set = SecretSet::new(&quick("1234"), &quick("1234"), &quick("9999")).expect("set");
        assert_eq!(set.classify("1234"), PinMatch::ArmToggle);
    }

    #[test]
    fn plaintext_secret_is_rejected() {
        let err = SecretSet::new("1234", &quick("2"), &quick("3")).unwrap_err();
        assert!(format!("{err}").contains("arm_toggle"));
    }

    #[test]
    fn broken_hash_fails_closed() {
        assert!(!verify("$argon2id$v=19$m=1024,t=1,p=1$bm9wZQ$AAAA", "1234"));
        assert!(!verify("garbage", "1234"));
    }
}
