// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! User directory: provisioning, profiles, profile edits and search.

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{SocialError, SocialResult};
use crate::graph::SocialGraph;
use crate::models::user::ProfileFields;
use crate::models::{NewUser, PageRequest, PostView, UpdateProfile, User, UserSummary};
use crate::store::DynStore;

const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 30;
const MAX_NAME_LENGTH: usize = 50;
const MAX_BIO_LENGTH: usize = 500;
const MAX_EMAIL_LENGTH: usize = 255;
const MAX_URL_LENGTH: usize = 512;
const MAX_LOCATION_LENGTH: usize = 255;
const RECENT_POSTS: i64 = 10;
const DEFAULT_SEARCH_LIMIT: i64 = 20;

/// Full public profile of an account
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i32,
    pub username: String,
    pub profile: ProfileFields,
    pub followers: Vec<UserSummary>,
    pub following: Vec<UserSummary>,
    pub followers_count: i32,
    pub following_count: i32,
    pub posts_count: i32,
    pub posts: Vec<PostView>,
    pub created_at: NaiveDateTime,
}

/// Account provisioning request from the identity provider
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Clone)]
pub struct Directory {
    store: DynStore,
    graph: SocialGraph,
}

impl Directory {
    pub fn new(store: DynStore, graph: SocialGraph) -> Self {
        Self { store, graph }
    }

    pub async fn register(&self, registration: Registration) -> SocialResult<User> {
        let username = registration.username.trim();
        let length = username.chars().count();
        if !(MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&length) {
            return Err(SocialError::validation(format!(
                "Username must be between {} and {} characters",
                MIN_USERNAME_LENGTH, MAX_USERNAME_LENGTH
            )));
        }
        let email = registration.email.trim().to_lowercase();
        if !email.contains('@') || email.chars().count() > MAX_EMAIL_LENGTH {
            return Err(SocialError::validation("Please enter a valid email"));
        }
        check_length("First name", &registration.first_name, MAX_NAME_LENGTH)?;
        check_length("Last name", &registration.last_name, MAX_NAME_LENGTH)?;

        let now = Utc::now().naive_utc();
        let user = self
            .store
            .create_user(NewUser {
                username: username.to_string(),
                email,
                first_name: registration.first_name,
                last_name: registration.last_name,
                created_at: now,
                updated_at: now,
            })
            .await?;
        info!("Registered user {} ({})", user.id, user.username);
        Ok(user)
    }

    /// Profile with both follow lists and the most recent posts
    pub async fn profile(&self, user_id: i32) -> SocialResult<UserProfile> {
        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or(SocialError::NotFound("User"))?;

        let followers = self.graph.list_followers(user_id, PageRequest::all()).await?;
        let following = self.graph.list_following(user_id, PageRequest::all()).await?;
        let posts = self
            .store
            .list_posts_by_authors(&[user_id], PageRequest { page: 1, limit: RECENT_POSTS })
            .await?;

        Ok(UserProfile {
            id: user.id,
            username: user.username.clone(),
            profile: user.profile(),
            followers: followers.items.into_iter().map(|d| d.user).collect(),
            following: following.items.into_iter().map(|d| d.user).collect(),
            followers_count: user.followers_count,
            following_count: user.following_count,
            posts_count: user.posts_count,
            posts: posts.items,
            created_at: user.created_at,
        })
    }

    pub async fn update_profile(&self, actor: i32, mut changes: UpdateProfile) -> SocialResult<User> {
        check_length("First name", &changes.first_name, MAX_NAME_LENGTH)?;
        check_length("Last name", &changes.last_name, MAX_NAME_LENGTH)?;
        check_length("Bio", &changes.bio, MAX_BIO_LENGTH)?;
        check_length("Avatar", &changes.avatar, MAX_URL_LENGTH)?;
        check_length("Website", &changes.website, MAX_URL_LENGTH)?;
        check_length("Location", &changes.location, MAX_LOCATION_LENGTH)?;

        changes.updated_at = Some(Utc::now().naive_utc());
        let user = self
            .store
            .update_profile(actor, changes)
            .await?
            .ok_or(SocialError::NotFound("User"))?;
        debug!("Profile of user {} updated", actor);
        Ok(user)
    }

    pub async fn search(&self, term: Option<&str>, limit: Option<i64>) -> SocialResult<Vec<UserSummary>> {
        let term = term.map(str::trim).filter(|t| !t.is_empty());
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, DEFAULT_SEARCH_LIMIT * 5);
        self.store.search_users(term, limit).await
    }
}

fn check_length(field: &str, value: &Option<String>, max: usize) -> SocialResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(SocialError::validation(format!(
            "{} cannot exceed {} characters",
            field, max
        ))),
        _ => Ok(()),
    }
}
