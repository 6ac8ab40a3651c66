// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use crate::schema::follows;
use super::user::UserSummary;

/// A directed follow edge
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = follows)]
pub struct Follow {
    pub id: i32,
    pub follower_id: i32,
    pub following_id: i32,
    pub created_at: NaiveDateTime,
}

/// DTO for creating a new follow edge
#[derive(Debug, Insertable, Serialize, Deserialize)]
#[diesel(table_name = follows)]
pub struct NewFollow {
    pub follower_id: i32,
    pub following_id: i32,
    pub created_at: NaiveDateTime,
}

/// Counterpart account of a follow edge, with when the edge was created
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowDetail {
    #[serde(flatten)]
    pub user: UserSummary,
    pub followed_at: NaiveDateTime,
}

/// Counters of both participants after a follow/unfollow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowCounts {
    /// `following_count` of the acting user
    pub following_count: i32,
    /// `followers_count` of the target user
    pub followers_count: i32,
}
