//! Input validation
//!
//! Pure checks for everything a user can type. Each validator returns
//! `Some(message)` on failure and `None` when the value is acceptable;
//! [`validate_entry`] gathers them into a field-keyed [`ValidationErrors`].

use chrono::{Months, NaiveDate};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::model::{Category, NewEntry, Profile};

pub const TITLE_MIN: usize = 3;
pub const TITLE_MAX: usize = 100;
pub const DESCRIPTION_MIN: usize = 10;
pub const DESCRIPTION_MAX: usize = 1000;
pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 30;
pub const BIO_MAX: usize = 500;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"))
}

fn username_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid username regex"))
}

fn account_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("valid account id regex"))
}

fn markup_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<[^>]*>|javascript:|\bon\w+\s*=").expect("valid markup regex")
    })
}

/// Field-keyed validation failures
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for `field` if `error` is set
    pub fn check(&mut self, field: &str, error: Option<String>) {
        if let Some(message) = error {
            self.0.insert(field.to_string(), message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    /// `Ok(())` when nothing failed
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

pub fn validate_title(title: &str) -> Option<String> {
    let trimmed = title.trim();
    let len = trimmed.chars().count();

    if trimmed.is_empty() {
        Some("Title is required".to_string())
    } else if len < TITLE_MIN {
        Some(format!("Title must be at least {} characters", TITLE_MIN))
    } else if len > TITLE_MAX {
        Some(format!("Title must be at most {} characters", TITLE_MAX))
    } else {
        None
    }
}

pub fn validate_description(description: &str) -> Option<String> {
    let trimmed = description.trim();
    let len = trimmed.chars().count();

    if trimmed.is_empty() {
        Some("Description is required".to_string())
    } else if len < DESCRIPTION_MIN {
        Some(format!(
            "Description must be at least {} characters",
            DESCRIPTION_MIN
        ))
    } else if len > DESCRIPTION_MAX {
        Some(format!(
            "Description must be at most {} characters",
            DESCRIPTION_MAX
        ))
    } else {
        None
    }
}

/// Dates may be today or up to one year back, relative to `today`
pub fn validate_date(date: NaiveDate, today: NaiveDate) -> Option<String> {
    if date > today {
        return Some("Date cannot be in the future".to_string());
    }

    let earliest = today
        .checked_sub_months(Months::new(12))
        .unwrap_or(NaiveDate::MIN);
    if date < earliest {
        return Some("Date cannot be more than one year in the past".to_string());
    }

    None
}

pub fn validate_category(category: &str) -> Option<String> {
    if category.trim().is_empty() {
        return Some("Category is required".to_string());
    }
    match category.parse::<Category>() {
        Ok(_) => None,
        Err(_) => {
            let names: Vec<&str> = Category::all().iter().map(|c| c.as_str()).collect();
            Some(format!(
                "Invalid category: {}. Use one of {}",
                category,
                names.join(", ")
            ))
        }
    }
}

pub fn validate_username(username: &str) -> Option<String> {
    let trimmed = username.trim();
    let len = trimmed.chars().count();

    if trimmed.is_empty() {
        Some("Username is required".to_string())
    } else if len < USERNAME_MIN || len > USERNAME_MAX {
        Some(format!(
            "Username must be between {} and {} characters",
            USERNAME_MIN, USERNAME_MAX
        ))
    } else if !username_regex().is_match(trimmed) {
        Some("Username may only contain letters, numbers, '_' and '-'".to_string())
    } else {
        None
    }
}

pub fn validate_email(email: &str) -> Option<String> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        Some("Email is required".to_string())
    } else if !email_regex().is_match(trimmed) {
        Some("Email address is not valid".to_string())
    } else {
        None
    }
}

/// Hedera account ids look like `0.0.12345`
pub fn validate_account_id(account_id: &str) -> Option<String> {
    if account_id_regex().is_match(account_id.trim()) {
        None
    } else {
        Some("Account ID must be in the form shard.realm.num (e.g. 0.0.12345)".to_string())
    }
}

/// User ids are UUIDs minted at registration
pub fn validate_user_id(user_id: &str) -> Option<String> {
    match uuid::Uuid::parse_str(user_id) {
        Ok(_) => None,
        Err(_) => Some(format!("User id {} is not a valid id", user_id)),
    }
}

/// Strip markup and script vectors from free text
pub fn sanitize_input(input: &str) -> String {
    markup_regex().replace_all(input, "").trim().to_string()
}

/// Validate every field of a new entry
pub fn validate_entry(entry: &NewEntry, today: NaiveDate) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check("title", validate_title(&entry.title));
    errors.check("description", validate_description(&entry.description));
    errors.check("date", validate_date(entry.date, today));
    errors.into_result()
}

pub fn validate_registration(username: &str, email: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check("username", validate_username(username));
    errors.check("email", validate_email(email));
    errors.into_result()
}

pub fn validate_profile(profile: &Profile) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if let Some(account) = profile.hedera_account_id.as_deref() {
        if !account.trim().is_empty() {
            errors.check("hederaAccountId", validate_account_id(account));
        }
    }

    if let Some(bio) = profile.bio.as_deref() {
        if bio.chars().count() > BIO_MAX {
            errors.check(
                "bio",
                Some(format!("Bio must be at most {} characters", BIO_MAX)),
            );
        }
    }

    if let Some(website) = profile.website.as_deref() {
        let website = website.trim();
        if !website.is_empty()
            && !(website.starts_with("https://") || website.starts_with("http://"))
        {
            errors.check(
                "website",
                Some("Website must start with http:// or https://".to_string()),
            );
        }
    }

    errors.into_result()
}
