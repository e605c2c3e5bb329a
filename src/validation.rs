//! Registration field validation

use serde::Serialize;

/// Outcome of validating the three registration fields. The checks are
/// independent: one failing field never hides another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistrationCheck {
    pub name_valid: bool,
    pub email_valid: bool,
    pub phone_valid: bool,
}

impl RegistrationCheck {
    pub fn all_valid(&self) -> bool {
        self.name_valid && self.email_valid && self.phone_valid
    }
}

impl std::fmt::Display for RegistrationCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "name {}, email {}, phone {}",
            if self.name_valid { "ok" } else { "invalid" },
            if self.email_valid { "ok" } else { "invalid" },
            if self.phone_valid { "ok" } else { "invalid" },
        )
    }
}

/// Validate registration input.
///
/// - name: one or more Latin letters, Norwegian Æ/Ø/Å (either case) or spaces
/// - email: must contain an `@` (deliberately permissive, not RFC validation)
/// - phone: exactly 8 decimal digits
pub fn validate_registration(name: &str, email: &str, phone: &str) -> RegistrationCheck {
    RegistrationCheck {
        name_valid: !name.is_empty() && name.chars().all(is_name_char),
        email_valid: email.contains('@'),
        phone_valid: phone.len() == 8 && phone.chars().all(|c| c.is_ascii_digit()),
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c == ' ' || matches!(c, 'Æ' | 'Ø' | 'Å' | 'æ' | 'ø' | 'å')
}
