//! Pre-commit validators.
//!
//! Every mutating credential operation runs an ordered chain of named checks
//! before it touches the store, so API callers cannot bypass what the forms
//! validate client-side. Evaluation is deterministic: the first denial wins.

use lazy_static::lazy_static;
use regex::Regex;

pub const MIN_NAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 8;

pub const PASSWORD_NOT_STRONG: &str = "Password not strong enough";

/// Candidate credentials for a single operation. Fields not relevant to the
/// operation stay `None` and are ignored by checks that do not name them.
#[derive(Debug, Default)]
pub struct CredentialInput<'a> {
    pub name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub password: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    Deny {
        rule: &'static str,
        field: &'static str,
        reason: &'static str,
    },
}

pub struct PolicyCheck {
    pub name: &'static str,
    check: fn(&CredentialInput) -> PolicyDecision,
}

impl PolicyCheck {
    pub fn run(&self, input: &CredentialInput) -> PolicyDecision {
        (self.check)(input)
    }
}

fn name_length(input: &CredentialInput) -> PolicyDecision {
    match input.name {
        Some(name) if name.trim().chars().count() >= MIN_NAME_LEN => PolicyDecision::Allow,
        _ => PolicyDecision::Deny {
            rule: "name-length",
            field: "name",
            reason: "Name must be at least 3 characters",
        },
    }
}

fn email_shape(input: &CredentialInput) -> PolicyDecision {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    match input.email {
        Some(email) if EMAIL_RE.is_match(email) => PolicyDecision::Allow,
        _ => PolicyDecision::Deny {
            rule: "email-shape",
            field: "email",
            reason: "Invalid email",
        },
    }
}

fn password_strength(input: &CredentialInput) -> PolicyDecision {
    match input.password {
        Some(password) if password.chars().count() >= MIN_PASSWORD_LEN => PolicyDecision::Allow,
        _ => PolicyDecision::Deny {
            rule: "password-strength",
            field: "password",
            reason: PASSWORD_NOT_STRONG,
        },
    }
}

// Sign-in only requires presence; strength was enforced when the credential
// was written.
fn password_present(input: &CredentialInput) -> PolicyDecision {
    match input.password {
        Some(password) if !password.is_empty() => PolicyDecision::Allow,
        _ => PolicyDecision::Deny {
            rule: "password-present",
            field: "password",
            reason: "Password is required",
        },
    }
}

pub const SIGN_UP: &[PolicyCheck] = &[
    PolicyCheck {
        name: "name-length",
        check: name_length,
    },
    PolicyCheck {
        name: "email-shape",
        check: email_shape,
    },
    PolicyCheck {
        name: "password-strength",
        check: password_strength,
    },
];

pub const SIGN_IN: &[PolicyCheck] = &[
    PolicyCheck {
        name: "email-shape",
        check: email_shape,
    },
    PolicyCheck {
        name: "password-present",
        check: password_present,
    },
];

pub const FORGOT_PASSWORD: &[PolicyCheck] = &[PolicyCheck {
    name: "email-shape",
    check: email_shape,
}];

pub const RESET_PASSWORD: &[PolicyCheck] = &[PolicyCheck {
    name: "password-strength",
    check: password_strength,
}];

pub fn evaluate(chain: &[PolicyCheck], input: &CredentialInput) -> PolicyDecision {
    for check in chain {
        if let deny @ PolicyDecision::Deny { .. } = check.run(input) {
            return deny;
        }
    }
    PolicyDecision::Allow
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign_up_input<'a>(
        name: &'a str,
        email: &'a str,
        password: &'a str,
    ) -> CredentialInput<'a> {
        CredentialInput {
            name: Some(name),
            email: Some(email),
            password: Some(password),
        }
    }

    #[test]
    fn valid_sign_up_passes_every_check() {
        let input = sign_up_input("Jordan", "a@b.com", "longenough1");
        assert_eq!(evaluate(SIGN_UP, &input), PolicyDecision::Allow);
    }

    #[test]
    fn short_password_denied_with_fixed_reason() {
        let input = sign_up_input("Jordan", "a@b.com", "short");
        match evaluate(SIGN_UP, &input) {
            PolicyDecision::Deny { rule, reason, .. } => {
                assert_eq!(rule, "password-strength");
                assert_eq!(reason, PASSWORD_NOT_STRONG);
            }
            PolicyDecision::Allow => panic!("weak password must be denied"),
        }
    }

    #[test]
    fn first_violation_wins_deterministically() {
        // Name and password are both bad; the chain must always report the
        // name first because it is ordered before the password check.
        let input = sign_up_input("Jo", "a@b.com", "short");
        for _ in 0..10 {
            match evaluate(SIGN_UP, &input) {
                PolicyDecision::Deny { rule, field, .. } => {
                    assert_eq!(rule, "name-length");
                    assert_eq!(field, "name");
                }
                PolicyDecision::Allow => panic!("invalid sign-up must be denied"),
            }
        }
    }

    #[test]
    fn malformed_email_denied() {
        let input = sign_up_input("Jordan", "not-an-email", "longenough1");
        match evaluate(SIGN_UP, &input) {
            PolicyDecision::Deny { rule, .. } => assert_eq!(rule, "email-shape"),
            PolicyDecision::Allow => panic!("bad email must be denied"),
        }
    }

    #[test]
    fn sign_in_accepts_weak_but_present_password() {
        let input = CredentialInput {
            name: None,
            email: Some("a@b.com"),
            password: Some("x"),
        };
        assert_eq!(evaluate(SIGN_IN, &input), PolicyDecision::Allow);
    }

    #[test]
    fn sign_in_rejects_empty_password() {
        let input = CredentialInput {
            name: None,
            email: Some("a@b.com"),
            password: Some(""),
        };
        match evaluate(SIGN_IN, &input) {
            PolicyDecision::Deny { rule, .. } => assert_eq!(rule, "password-present"),
            PolicyDecision::Allow => panic!("empty password must be denied"),
        }
    }

    #[test]
    fn reset_chain_enforces_strength_only() {
        let weak = CredentialInput {
            password: Some("short"),
            ..Default::default()
        };
        assert!(matches!(
            evaluate(RESET_PASSWORD, &weak),
            PolicyDecision::Deny {
                rule: "password-strength",
                ..
            }
        ));

        let ok = CredentialInput {
            password: Some("longenough1"),
            ..Default::default()
        };
        assert_eq!(evaluate(RESET_PASSWORD, &ok), PolicyDecision::Allow);
    }
}
