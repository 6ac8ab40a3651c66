// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use crate::schema::users;

/// A user account. Credentials live with the identity provider, not here.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    // Denormalized, always recomputed from the follows/posts relations
    pub followers_count: i32,
    pub following_count: i32,
    pub posts_count: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Profile edit; `None` fields are left untouched
#[derive(Debug, Clone, Default, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = users)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    #[serde(skip)]
    pub updated_at: Option<NaiveDateTime>,
}

/// Public profile attributes as exposed over the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
}

/// Compact view of an account for lists (followers, authors, search results)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i32,
    pub username: String,
    pub profile: SummaryProfile,
    pub followers_count: i32,
    pub following_count: i32,
    pub posts_count: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
}

impl User {
    pub fn profile(&self) -> ProfileFields {
        ProfileFields {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            bio: self.bio.clone(),
            avatar: self.avatar.clone(),
            location: self.location.clone(),
            website: self.website.clone(),
        }
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            profile: SummaryProfile {
                first_name: self.first_name.clone(),
                last_name: self.last_name.clone(),
                avatar: self.avatar.clone(),
            },
            followers_count: self.followers_count,
            following_count: self.following_count,
            posts_count: self.posts_count,
        }
    }

    /// Apply a profile edit the same way the SQL changeset does
    pub fn apply(&mut self, changes: &UpdateProfile) {
        let fields = [
            (&mut self.first_name, &changes.first_name),
            (&mut self.last_name, &changes.last_name),
            (&mut self.bio, &changes.bio),
            (&mut self.avatar, &changes.avatar),
            (&mut self.location, &changes.location),
            (&mut self.website, &changes.website),
        ];
        for (current, change) in fields {
            if change.is_some() {
                *current = change.clone();
            }
        }
        if let Some(updated_at) = changes.updated_at {
            self.updated_at = updated_at;
        }
    }

    /// Case-insensitive match on username, first name or last name
    pub fn matches(&self, needle_lowercase: &str) -> bool {
        let hit = |value: &str| value.to_lowercase().contains(needle_lowercase);
        hit(&self.username)
            || self.first_name.as_deref().is_some_and(hit)
            || self.last_name.as_deref().is_some_and(hit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        let now = chrono::Utc::now().naive_utc();
        User {
            id: 1,
            username: "ada".into(),
            email: "ada@example.com".into(),
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            bio: None,
            avatar: None,
            location: None,
            website: None,
            followers_count: 0,
            following_count: 0,
            posts_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn apply_leaves_absent_fields_untouched() {
        let mut u = user();
        u.apply(&UpdateProfile {
            bio: Some("analyst".into()),
            ..Default::default()
        });
        assert_eq!(u.bio.as_deref(), Some("analyst"));
        assert_eq!(u.first_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn search_matches_names_case_insensitively() {
        let u = user();
        assert!(u.matches("love"));
        assert!(u.matches("ad"));
        assert!(!u.matches("babbage"));
    }
}
