use serde::Deserialize;

use super::{optional, required, FieldErrors};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.username.trim().is_empty() {
            errors.add("username", "Enter user name");
        }
        if self.password.is_empty() {
            errors.add("password", "Enter user password");
        }
        errors.finish(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(alias = "confirm_password")]
    pub confirm: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub address: String,
}

/// A registration that passed validation; the password is still plaintext.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl RegisterForm {
    pub fn validate(self) -> Result<Registration, FieldErrors> {
        let mut errors = FieldErrors::new();

        let username = required(&mut errors, "username", &self.username, 50);
        let email = required(&mut errors, "email", &self.email, 120).to_lowercase();
        if !email.is_empty() && !looks_like_email(&email) {
            errors.add("email", "Enter a valid email address");
        }
        if self.password.is_empty() {
            errors.add("password", "This field is required");
        } else if self.password != self.confirm {
            errors.add("password", "Passwords should match");
        }
        let first_name = required(&mut errors, "first_name", &self.first_name, 50);
        let last_name = required(&mut errors, "last_name", &self.last_name, 50);
        let phone = optional(&mut errors, "phone", &self.phone, 20);
        let address = optional(&mut errors, "address", &self.address, 200);

        errors.finish(Registration {
            username,
            email,
            password: self.password,
            first_name,
            last_name,
            phone,
            address,
        })
    }
}

/// Minimal shape check: one `@`, non-empty local part, dotted domain.
fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

/// Accepts only same-origin paths as post-login destinations. The path must
/// also be usable verbatim as a `Location` header, so whitespace, control
/// characters and non-ASCII text fall back to `/`.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.starts_with("/\\")
                && path.chars().all(|c| c.is_ascii_graphic()) =>
        {
            path
        }
        _ => "/",
    }
}
