//! Password hashing and strength rules.
//!
//! # Invariants
//! - Only bcrypt hashes are persisted.
//! - A malformed stored hash never authenticates.
//! - Passwords longer than bcrypt's 72-byte input are never hashed or
//!   matched, so two passwords sharing a 72-byte prefix stay distinct.

use crate::service::error::FieldError;
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Longest password bcrypt hashes without truncation.
pub const MAX_PASSWORD_BYTES: usize = 72;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));
static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid username regex"));

/// Failure to produce a password hash.
#[derive(Debug)]
pub enum PasswordHashError {
    Bcrypt(bcrypt::BcryptError),
    /// Input bcrypt would silently truncate.
    TooLong(usize),
    /// The hashing worker stopped before finishing.
    Interrupted(String),
}

impl Display for PasswordHashError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bcrypt(err) => write!(f, "password hashing failed: {err}"),
            Self::TooLong(len) => write!(
                f,
                "password of {len} bytes exceeds the {MAX_PASSWORD_BYTES}-byte limit"
            ),
            Self::Interrupted(reason) => write!(f, "password hashing interrupted: {reason}"),
        }
    }
}

impl Error for PasswordHashError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Bcrypt(err) => Some(err),
            _ => None,
        }
    }
}

/// Hashes `raw` with bcrypt at the given work factor.
pub fn hash_password(raw: &str, cost: u32) -> Result<String, PasswordHashError> {
    if raw.len() > MAX_PASSWORD_BYTES {
        return Err(PasswordHashError::TooLong(raw.len()));
    }
    bcrypt::hash(raw, cost).map_err(PasswordHashError::Bcrypt)
}

/// Checks `raw` against a stored bcrypt hash.
pub fn verify_password(raw: &str, hash: &str) -> bool {
    if raw.len() > MAX_PASSWORD_BYTES {
        return false;
    }
    match bcrypt::verify(raw, hash) {
        Ok(matches) => matches,
        Err(err) => {
            warn!("event=password_verify module=auth status=error error_code=malformed_hash error={err}");
            false
        }
    }
}

/// Hashing backend the services call into.
pub trait PasswordHasher {
    fn hash(&self, raw: &str) -> Result<String, PasswordHashError>;
    fn verify(&self, raw: &str, hash: &str) -> bool;
}

impl<P: PasswordHasher + ?Sized> PasswordHasher for &P {
    fn hash(&self, raw: &str) -> Result<String, PasswordHashError> {
        (**self).hash(raw)
    }

    fn verify(&self, raw: &str, hash: &str) -> bool {
        (**self).verify(raw, hash)
    }
}

impl<P: PasswordHasher + ?Sized> PasswordHasher for Arc<P> {
    fn hash(&self, raw: &str) -> Result<String, PasswordHashError> {
        (**self).hash(raw)
    }

    fn verify(&self, raw: &str, hash: &str) -> bool {
        (**self).verify(raw, hash)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bcrypt {
    pub cost: u32,
}

impl PasswordHasher for Bcrypt {
    fn hash(&self, raw: &str) -> Result<String, PasswordHashError> {
        hash_password(raw, self.cost)
    }

    fn verify(&self, raw: &str, hash: &str) -> bool {
        verify_password(raw, hash)
    }
}

/// Hash and verify results computed ahead of time, typically on a blocking
/// worker before any storage lock is taken.
///
/// Lookups that were not prepared fall through to `fallback`, so results
/// never differ from calling `fallback` directly.
pub struct PreparedPasswords<P> {
    fallback: P,
    hashes: Vec<(String, String)>,
    checks: Vec<(String, String, bool)>,
}

impl<P: PasswordHasher> PreparedPasswords<P> {
    pub fn new(fallback: P) -> Self {
        Self {
            fallback,
            hashes: Vec::new(),
            checks: Vec::new(),
        }
    }

    pub fn prepare_hash(&mut self, raw: &str) -> Result<(), PasswordHashError> {
        let hash = self.fallback.hash(raw)?;
        self.hashes.push((raw.to_owned(), hash));
        Ok(())
    }

    pub fn prepare_check(&mut self, raw: &str, hash: &str) {
        let matches = self.fallback.verify(raw, hash);
        self.checks.push((raw.to_owned(), hash.to_owned(), matches));
    }
}

impl<P: PasswordHasher> PasswordHasher for PreparedPasswords<P> {
    fn hash(&self, raw: &str) -> Result<String, PasswordHashError> {
        match self.hashes.iter().find(|(prepared, _)| prepared == raw) {
            Some((_, hash)) => Ok(hash.clone()),
            None => self.fallback.hash(raw),
        }
    }

    fn verify(&self, raw: &str, hash: &str) -> bool {
        self.checks
            .iter()
            .find(|(prepared, stored, _)| prepared == raw && stored == hash)
            .map_or_else(|| self.fallback.verify(raw, hash), |(_, _, matches)| *matches)
    }
}

/// Validates a new password pair.
///
/// `confirm_field` names the second input so errors point at the right
/// argument (`password2` on register, `newPassword2` elsewhere).
pub fn validate_new_password(
    password1: &str,
    password2: &str,
    confirm_field: &str,
    username: &str,
    email: &str,
    min_length: usize,
) -> Vec<FieldError> {
    if password1 != password2 {
        return vec![FieldError::new(
            confirm_field,
            "password_mismatch",
            "The two password fields didn't match.",
        )];
    }

    let mut errors = Vec::new();
    if password1.len() > MAX_PASSWORD_BYTES {
        errors.push(FieldError::new(
            confirm_field,
            "password_too_long",
            format!("This password is too long. It must contain at most {MAX_PASSWORD_BYTES} bytes."),
        ));
    }
    if password1.chars().count() < min_length {
        errors.push(FieldError::new(
            confirm_field,
            "password_too_short",
            format!("This password is too short. It must contain at least {min_length} characters."),
        ));
    }
    if !password1.is_empty() && password1.chars().all(|c| c.is_ascii_digit()) {
        errors.push(FieldError::new(
            confirm_field,
            "password_entirely_numeric",
            "This password is entirely numeric.",
        ));
    }
    if is_too_similar(password1, username, email) {
        errors.push(FieldError::new(
            confirm_field,
            "password_too_similar",
            "The password is too similar to the username or email.",
        ));
    }
    errors
}

/// Whether `email` has a plausible `local@domain.tld` shape.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Whether `username` uses only letters, digits and `@.+-_`.
pub fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

fn is_too_similar(password: &str, username: &str, email: &str) -> bool {
    let password = password.to_lowercase();
    let local_part = email.split('@').next().unwrap_or_default();
    [username, local_part]
        .into_iter()
        .map(str::to_lowercase)
        .filter(|attribute| attribute.chars().count() >= 3)
        .any(|attribute| password.contains(&attribute) || attribute.contains(&password))
}

#[cfg(test)]
mod tests {
    use super::{
        hash_password, is_valid_email, is_valid_username, validate_new_password, verify_password,
        Bcrypt, PasswordHashError, PasswordHasher, PreparedPasswords, MAX_PASSWORD_BYTES,
    };
    use std::cell::Cell;

    const TEST_COST: u32 = 4;

    fn codes(errors: &[crate::service::error::FieldError]) -> Vec<&'static str> {
        errors.iter().map(|error| error.code).collect()
    }

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("correct horse", TEST_COST).expect("hash");
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn malformed_hash_never_matches() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
    }

    #[test]
    fn mismatch_short_circuits() {
        let errors = validate_new_password("abc", "abd", "password2", "ada", "ada@x.io", 8);
        assert_eq!(codes(&errors), vec!["password_mismatch"]);
        assert_eq!(errors[0].field, "password2");
    }

    #[test]
    fn reports_every_strength_rule() {
        let errors = validate_new_password("1234", "1234", "password2", "ada", "ada@x.io", 8);
        assert_eq!(
            codes(&errors),
            vec!["password_too_short", "password_entirely_numeric"]
        );

        let errors = validate_new_password(
            "lovelace-rocks",
            "lovelace-rocks",
            "newPassword2",
            "lovelace",
            "ada@x.io",
            8,
        );
        assert_eq!(codes(&errors), vec!["password_too_similar"]);
    }

    #[test]
    fn strong_password_passes() {
        let errors =
            validate_new_password("v3ry-s3cret!", "v3ry-s3cret!", "password2", "ada", "ada@x.io", 8);
        assert!(errors.is_empty());
    }

    #[test]
    fn email_and_username_shapes() {
        assert!(is_valid_email("ada@example.com"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("ada example.com"));
        assert!(is_valid_username("ada.lovelace+1"));
        assert!(!is_valid_username("ada lovelace"));
        assert!(!is_valid_username(""));
    }

    #[test]
    fn shared_72_byte_prefix_does_not_sign_in() {
        let prefix = "a".repeat(MAX_PASSWORD_BYTES);
        let hash = hash_password(&prefix, TEST_COST).expect("hash");
        assert!(verify_password(&prefix, &hash));
        assert!(!verify_password(&format!("{prefix}-totally-different"), &hash));
    }

    #[test]
    fn over_long_passwords_are_rejected_before_hashing() {
        let long = "x1-".repeat(30);
        assert!(matches!(
            hash_password(&long, TEST_COST),
            Err(PasswordHashError::TooLong(90))
        ));

        let errors = validate_new_password(&long, &long, "password2", "ada", "ada@x.io", 8);
        assert_eq!(codes(&errors), vec!["password_too_long"]);
    }

    struct CountingHasher {
        inner: Bcrypt,
        calls: Cell<usize>,
    }

    impl PasswordHasher for CountingHasher {
        fn hash(&self, raw: &str) -> Result<String, PasswordHashError> {
            self.calls.set(self.calls.get() + 1);
            self.inner.hash(raw)
        }

        fn verify(&self, raw: &str, hash: &str) -> bool {
            self.calls.set(self.calls.get() + 1);
            self.inner.verify(raw, hash)
        }
    }

    #[test]
    fn prepared_results_are_served_without_rehashing() {
        let counting = CountingHasher {
            inner: Bcrypt { cost: TEST_COST },
            calls: Cell::new(0),
        };
        let stored = hash_password("correct horse", TEST_COST).expect("hash");

        let mut prepared = PreparedPasswords::new(&counting);
        prepared.prepare_check("correct horse", &stored);
        prepared.prepare_hash("new secret").expect("hash");
        assert_eq!(counting.calls.get(), 2);

        assert!(prepared.verify("correct horse", &stored));
        let new_hash = prepared.hash("new secret").expect("hash");
        assert!(verify_password("new secret", &new_hash));
        assert_eq!(counting.calls.get(), 2);

        assert!(!prepared.verify("wrong horse", &stored));
        assert_eq!(counting.calls.get(), 3);
    }
}
