//! Checking form input before it is sent to the server.

use crate::endpoints::{PasswordChange, Registration};
use std::fmt::{self, Display, Formatter};

/// The shortest password the server will accept.
pub const MIN_PASSWORD_LEN: usize = 6;

/// A single field which failed validation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every problem found with a form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool { self.errors.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> + '_ {
        self.errors.iter()
    }

    /// The message for a particular field, if it failed.
    pub fn get(&self, field: &str) -> Option<&'static str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message)
    }

    fn check(&mut self, ok: bool, field: &'static str, message: &'static str) {
        if !ok {
            self.errors.push(FieldError { field, message });
        }
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", error)?;
        }

        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

fn is_filled(value: &str) -> bool { !value.trim().is_empty() }

fn looks_like_email(value: &str) -> bool {
    let value = value.trim();
    if value.chars().any(char::is_whitespace) {
        return false;
    }

    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        },
        None => false,
    }
}

/// The login page's form.
#[derive(Clone, PartialEq)]
pub struct LoginForm {
    pub phone: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(phone: impl Into<String>, password: impl Into<String>) -> Self {
        LoginForm {
            phone: phone.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.check(
            is_filled(&self.phone),
            "phone",
            "Phone number is required",
        );
        errors.check(
            is_filled(&self.password),
            "password",
            "Password is required",
        );
        errors.into_result()
    }
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("phone", &self.phone)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Registration {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.check(is_filled(&self.name), "name", "Name is required");
        errors.check(
            is_filled(&self.phone),
            "phone",
            "Phone number is required",
        );
        errors.check(looks_like_email(&self.email), "email", "Invalid email");
        errors.check(
            is_filled(&self.address),
            "address",
            "Address is required",
        );
        errors.check(
            self.password.chars().count() >= MIN_PASSWORD_LEN,
            "password",
            "Password must be at least 6 characters",
        );
        errors.into_result()
    }
}

impl PasswordChange {
    pub fn new(
        current_password: impl Into<String>,
        new_password: impl Into<String>,
        new_password_confirmation: impl Into<String>,
    ) -> Self {
        PasswordChange {
            current_password: current_password.into(),
            new_password: new_password.into(),
            new_password_confirmation: new_password_confirmation.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.check(
            is_filled(&self.current_password),
            "currentPassword",
            "Current password is required",
        );
        errors.check(
            self.new_password.chars().count() >= MIN_PASSWORD_LEN,
            "newPassword",
            "Password must be at least 6 characters",
        );
        errors.check(
            self.new_password == self.new_password_confirmation,
            "newPasswordConfirmation",
            "Passwords don't match",
        );
        errors.into_result()
    }
}
