//! User and friend domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::view::{fallback, split_tags};

pub const UNKNOWN_NAME: &str = "Unknown name";
pub const UNKNOWN_COMPANY: &str = "Unknown company";
pub const UNKNOWN_EMAIL: &str = "Unknown email";
pub const UNKNOWN_ADDRESS: &str = "Unknown address";
pub const UNKNOWN_ABOUT: &str = "Unknown about";
pub const UNKNOWN_REGISTERED: &str = "Unknown registration date";

/// A friend reference as persisted in the cache
///
/// Friend rows are keyed by their external id and shared by every user that
/// lists them. Membership lives in a separate table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friend {
    pub id: String,
    pub name: Option<String>,
}

impl Friend {
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
        }
    }

    pub fn display_name(&self) -> &str {
        fallback(self.name.as_deref(), UNKNOWN_NAME)
    }
}

/// Friend as shown to the presentation layer, nullability already resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FriendView {
    pub id: String,
    pub name: String,
}

/// Scalar columns of a cached user, as written by one ingest batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub is_active: bool,
    pub name: Option<String>,
    pub age: i16,
    pub company: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub about: Option<String>,
    pub registered: Option<DateTime<Utc>>,
    /// Comma-joined tag list (see `view::join_tags`)
    pub tags: Option<String>,
}

impl UserRecord {
    /// Create a record with only the identity set
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_active: false,
            name: None,
            age: 0,
            company: None,
            email: None,
            address: None,
            about: None,
            registered: None,
            tags: None,
        }
    }
}

/// A cached user with its ordered friend list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub is_active: bool,
    pub name: Option<String>,
    pub age: i16,
    pub company: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub about: Option<String>,
    pub registered: Option<DateTime<Utc>>,
    pub tags: Option<String>,
    pub friends: Vec<Friend>,
}

impl User {
    pub fn from_record(record: UserRecord, friends: Vec<Friend>) -> Self {
        Self {
            id: record.id,
            is_active: record.is_active,
            name: record.name,
            age: record.age,
            company: record.company,
            email: record.email,
            address: record.address,
            about: record.about,
            registered: record.registered,
            tags: record.tags,
            friends,
        }
    }

    pub fn display_name(&self) -> &str {
        fallback(self.name.as_deref(), UNKNOWN_NAME)
    }

    pub fn display_company(&self) -> &str {
        fallback(self.company.as_deref(), UNKNOWN_COMPANY)
    }

    pub fn display_email(&self) -> &str {
        fallback(self.email.as_deref(), UNKNOWN_EMAIL)
    }

    pub fn display_address(&self) -> &str {
        fallback(self.address.as_deref(), UNKNOWN_ADDRESS)
    }

    pub fn display_about(&self) -> &str {
        fallback(self.about.as_deref(), UNKNOWN_ABOUT)
    }

    /// Registration date in long form, e.g. "November 10, 2015"
    pub fn display_registered(&self) -> String {
        self.registered
            .map(|dt| dt.format("%B %-d, %Y").to_string())
            .unwrap_or_else(|| UNKNOWN_REGISTERED.to_string())
    }

    pub fn activity_label(&self) -> &'static str {
        if self.is_active {
            "Is active"
        } else {
            "Not active"
        }
    }

    /// Stored tags re-expanded into an ordered list
    pub fn display_tags(&self) -> Vec<String> {
        self.tags.as_deref().map(split_tags).unwrap_or_default()
    }

    /// Friends in payload order, names resolved
    pub fn display_friends(&self) -> Vec<FriendView> {
        self.friends
            .iter()
            .map(|f| FriendView {
                id: f.id.clone(),
                name: f.display_name().to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_user() -> User {
        let mut record = UserRecord::new("1");
        record.name = Some("Ann".to_string());
        record.tags = Some("x,y".to_string());
        User::from_record(
            record,
            vec![Friend::new("f1", Some("Bob".to_string()))],
        )
    }

    #[test]
    fn test_display_tags_and_friends() {
        let user = sample_user();
        assert_eq!(user.display_tags(), vec!["x", "y"]);
        assert_eq!(
            user.display_friends(),
            vec![FriendView {
                id: "f1".to_string(),
                name: "Bob".to_string()
            }]
        );
    }

    #[test]
    fn test_missing_fields_use_fallback_labels() {
        let user = User::from_record(UserRecord::new("2"), Vec::new());
        assert_eq!(user.display_name(), "Unknown name");
        assert_eq!(user.display_company(), "Unknown company");
        assert_eq!(user.display_email(), "Unknown email");
        assert_eq!(user.display_address(), "Unknown address");
        assert_eq!(user.display_about(), "Unknown about");
        assert_eq!(user.display_registered(), "Unknown registration date");
        assert!(user.display_tags().is_empty());
        assert!(user.display_friends().is_empty());
    }

    #[test]
    fn test_empty_stored_tags_yield_no_tags() {
        let mut record = UserRecord::new("3");
        record.tags = Some(String::new());
        let user = User::from_record(record, Vec::new());
        assert!(user.display_tags().is_empty());
    }

    #[test]
    fn test_friend_without_name() {
        let user = User::from_record(UserRecord::new("4"), vec![Friend::new("f9", None)]);
        assert_eq!(user.display_friends()[0].name, "Unknown name");
    }

    #[test]
    fn test_display_registered_long_date() {
        let mut record = UserRecord::new("5");
        record.registered = Some(Utc.with_ymd_and_hms(2015, 11, 10, 1, 47, 18).unwrap());
        let user = User::from_record(record, Vec::new());
        assert_eq!(user.display_registered(), "November 10, 2015");
    }

    #[test]
    fn test_activity_label() {
        let mut user = sample_user();
        assert_eq!(user.activity_label(), "Not active");
        user.is_active = true;
        assert_eq!(user.activity_label(), "Is active");
    }
}
