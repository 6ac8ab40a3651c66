// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

pub mod comment;
pub mod follow;
pub mod post;
pub mod user;

pub use comment::{Comment, CommentView, NewComment};
pub use follow::{FollowCounts, FollowDetail, NewFollow};
pub use post::{LikeRecord, NewPost, Post, PostView, UpdatePost};
pub use user::{NewUser, UpdateProfile, User, UserSummary};

use serde::{Deserialize, Serialize};

/// Page selection, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Normalize raw query values: page below 1 becomes 1, limit is clamped to `[1, max_limit]`
    pub fn new(page: Option<i64>, limit: Option<i64>, default_limit: i64, max_limit: i64) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(default_limit).clamp(1, max_limit.max(1));
        Self { page, limit }
    }

    /// A single page large enough to hold any listing
    pub fn all() -> Self {
        Self {
            page: 1,
            limit: i32::MAX as i64,
        }
    }

    /// Rows to skip; saturates instead of overflowing on huge page numbers
    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0).saturating_mul(self.limit)
    }
}

/// One page of results plus the total size of the listing
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            limit: request.limit,
        }
    }

    /// ceil(total / limit)
    pub fn total_pages(&self) -> i64 {
        if self.total <= 0 {
            0
        } else {
            (self.total + self.limit - 1) / self.limit
        }
    }
}

/// Entities that carry a likes list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LikeTarget {
    Post(i32),
    Comment(i32),
}

impl LikeTarget {
    pub fn id(&self) -> i32 {
        match self {
            LikeTarget::Post(id) | LikeTarget::Comment(id) => *id,
        }
    }

    pub fn entity(&self) -> &'static str {
        match self {
            LikeTarget::Post(_) => "Post",
            LikeTarget::Comment(_) => "Comment",
        }
    }
}

/// Outcome of a like toggle: the new state and the recomputed count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeToggle {
    pub liked: bool,
    pub likes_count: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_clamps_out_of_range_values() {
        let req = PageRequest::new(Some(0), Some(500), 10, 100);
        assert_eq!(req, PageRequest { page: 1, limit: 100 });
        assert_eq!(PageRequest::new(None, Some(-3), 10, 100).limit, 1);
        assert_eq!(PageRequest::new(Some(3), None, 10, 100).offset(), 20);
    }

    #[test]
    fn offset_saturates_for_huge_pages() {
        let req = PageRequest::new(Some(i64::MAX), Some(10), 10, 100);
        assert_eq!(req.offset(), i64::MAX);
        assert_eq!(PageRequest { page: 0, limit: 10 }.offset(), 0);
    }

    #[test]
    fn total_pages_rounds_up() {
        let req = PageRequest::new(Some(1), Some(10), 10, 100);
        assert_eq!(Page::<()>::new(vec![], 15, req).total_pages(), 2);
        assert_eq!(Page::<()>::new(vec![], 20, req).total_pages(), 2);
        assert_eq!(Page::<()>::new(vec![], 0, req).total_pages(), 0);
    }
}
