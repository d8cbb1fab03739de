//! Password policy checks and a coarse strength estimate
//!
//! Neither check affects the key derivation itself; they gate what the CLI
//! accepts when a new container is created.

use fvlt_core::config::PasswordConfig;
use fvlt_core::{FvltError, FvltResult};
use secrecy::{ExposeSecret, SecretString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PasswordStrength {
    Weak,
    Medium,
    Strong,
    VeryStrong,
}

impl std::fmt::Display for PasswordStrength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PasswordStrength::Weak => "Weak",
            PasswordStrength::Medium => "Medium",
            PasswordStrength::Strong => "Strong",
            PasswordStrength::VeryStrong => "Very Strong",
        })
    }
}

/// Requirements a new password must satisfy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_upper: bool,
    pub require_lower: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_upper: false,
            require_lower: false,
            require_digit: false,
            require_special: false,
        }
    }
}

impl PasswordPolicy {
    pub fn from_config(config: &PasswordConfig) -> Self {
        let strong = config.require_strong;
        Self {
            min_length: config.min_length,
            require_upper: strong,
            require_lower: strong,
            require_digit: strong,
            require_special: strong,
        }
    }

    /// Check `password` against the policy, naming the first unmet requirement.
    pub fn validate(&self, password: &SecretString) -> FvltResult<()> {
        let password = password.expose_secret();
        if password.chars().count() < self.min_length {
            return Err(FvltError::InvalidInput(format!(
                "password must be at least {} characters long",
                self.min_length
            )));
        }

        let classes = CharClasses::scan(password);
        let missing = [
            (self.require_upper && !classes.upper, "an uppercase letter"),
            (self.require_lower && !classes.lower, "a lowercase letter"),
            (self.require_digit && !classes.digit, "a digit"),
            (self.require_special && !classes.special, "a special character"),
        ];
        if let Some((_, what)) = missing.iter().find(|(unmet, _)| *unmet) {
            return Err(FvltError::InvalidInput(format!(
                "password must contain at least {what}"
            )));
        }
        Ok(())
    }
}

#[derive(Default)]
struct CharClasses {
    upper: bool,
    lower: bool,
    digit: bool,
    special: bool,
}

impl CharClasses {
    fn scan(s: &str) -> Self {
        let mut classes = Self::default();
        for c in s.chars() {
            if c.is_uppercase() {
                classes.upper = true;
            } else if c.is_lowercase() {
                classes.lower = true;
            } else if c.is_numeric() {
                classes.digit = true;
            } else if !c.is_whitespace() && !c.is_control() {
                classes.special = true;
            }
        }
        classes
    }

    fn count(&self) -> u32 {
        [self.upper, self.lower, self.digit, self.special]
            .iter()
            .filter(|&&b| b)
            .count() as u32
    }
}

/// Score a password: one point each for reaching 8, 12 and 16 characters,
/// plus one per character class present.
pub fn check_strength(password: &SecretString) -> PasswordStrength {
    let password = password.expose_secret();
    let len = password.chars().count();

    let score = [8, 12, 16].iter().filter(|&&n| len >= n).count() as u32
        + CharClasses::scan(password).count();

    match score {
        7.. => PasswordStrength::VeryStrong,
        5..=6 => PasswordStrength::Strong,
        3..=4 => PasswordStrength::Medium,
        _ => PasswordStrength::Weak,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pw(s: &str) -> SecretString {
        SecretString::from(s)
    }

    #[test]
    fn test_strength_levels() {
        assert_eq!(check_strength(&pw("abc")), PasswordStrength::Weak);
        assert_eq!(check_strength(&pw("abcdefgh")), PasswordStrength::Weak);
        assert_eq!(check_strength(&pw("abcdefgh1")), PasswordStrength::Medium);
        assert_eq!(check_strength(&pw("Abcdefgh12!x")), PasswordStrength::Strong);
        assert_eq!(check_strength(&pw("Abcdefghij12!xyz")), PasswordStrength::VeryStrong);
        assert_eq!(check_strength(&pw("abcdefghij12")), PasswordStrength::Medium);
        assert_eq!(check_strength(&pw("Abcdefghij12")), PasswordStrength::Strong);
    }

    #[test]
    fn test_strength_display() {
        assert_eq!(PasswordStrength::VeryStrong.to_string(), "Very Strong");
        assert!(PasswordStrength::Strong > PasswordStrength::Medium);
    }

    #[test]
    fn test_default_policy_only_checks_length() {
        let policy = PasswordPolicy::default();
        assert!(policy.validate(&pw("longenough")).is_ok());
        assert!(matches!(
            policy.validate(&pw("short")),
            Err(FvltError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_strong_policy_names_missing_class() {
        let config = PasswordConfig {
            min_length: 8,
            require_strong: true,
        };
        let policy = PasswordPolicy::from_config(&config);

        let err = policy.validate(&pw("alllowercase1!")).unwrap_err();
        assert!(err.to_string().contains("uppercase"));

        let err = policy.validate(&pw("NoDigitsHere!")).unwrap_err();
        assert!(err.to_string().contains("digit"));

        assert!(policy.validate(&pw("Correct-Horse-9")).is_ok());
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let policy = PasswordPolicy {
            min_length: 4,
            ..PasswordPolicy::default()
        };
        // three characters, nine bytes
        assert!(policy.validate(&pw("äöü")).is_err());
    }
}
