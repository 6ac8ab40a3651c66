// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use crate::schema::{post_likes, posts};
use super::user::UserSummary;

pub const MAX_POST_LENGTH: usize = 1000;
pub const MAX_IMAGE_LENGTH: usize = 512;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = posts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Post {
    pub id: i32,
    pub user_id: i32,
    pub content: String,
    pub image: String,
    pub likes_count: i32,
    pub comments_count: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = posts)]
pub struct NewPost {
    pub user_id: i32,
    pub content: String,
    pub image: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = posts)]
pub struct UpdatePost {
    pub content: String,
    /// `None` keeps the current image
    pub image: Option<String>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = post_likes)]
pub struct NewPostLike {
    pub post_id: i32,
    pub user_id: i32,
    pub created_at: NaiveDateTime,
}

/// A single like, as embedded in post and comment payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeRecord {
    pub user: i32,
    pub created_at: NaiveDateTime,
}

/// A post with its author populated and its likes in creation order
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: i32,
    pub user: UserSummary,
    pub content: String,
    pub image: String,
    pub likes: Vec<LikeRecord>,
    pub likes_count: i32,
    pub comments_count: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl PostView {
    pub fn new(post: Post, user: UserSummary, likes: Vec<LikeRecord>) -> Self {
        Self {
            id: post.id,
            user,
            content: post.content,
            image: post.image,
            likes,
            likes_count: post.likes_count,
            comments_count: post.comments_count,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }

    pub fn is_liked_by(&self, user_id: i32) -> bool {
        self.likes.iter().any(|like| like.user == user_id)
    }
}
