// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! Storage seam for the social graph and engagement ledger.
//!
//! Every method is one atomic unit: an implementation either applies all of
//! its writes (edge + both counters, comment + parent counter, ...) or none.
//! Denormalized counters are recomputed from the authoritative relation inside
//! the same unit, never adjusted by a delta.

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::SocialResult;
use crate::models::{
    Comment, CommentView, FollowCounts, FollowDetail, LikeTarget, LikeToggle, NewComment,
    NewPost, NewUser, Page, PageRequest, Post, PostView, UpdatePost, UpdateProfile, User,
    UserSummary,
};

pub use memory::MemoryStore;
pub use pg::PgStore;

pub type DynStore = Arc<dyn SocialStore>;

#[async_trait]
pub trait SocialStore: Send + Sync + 'static {
    /// Cheap liveness probe used by the health endpoint
    async fn ping(&self) -> SocialResult<()>;

    // Users

    /// Fails with `Validation` when the username or email is taken
    async fn create_user(&self, new_user: NewUser) -> SocialResult<User>;

    async fn find_user(&self, id: i32) -> SocialResult<Option<User>>;

    async fn update_profile(&self, id: i32, changes: UpdateProfile) -> SocialResult<Option<User>>;

    /// Case-insensitive substring search; `None` lists everyone
    async fn search_users(&self, term: Option<&str>, limit: i64) -> SocialResult<Vec<UserSummary>>;

    // Social graph

    /// Insert the edge `follower -> following` and recompute both counters.
    /// `NotFound` if either user is absent, `AlreadyFollowing` if the edge exists.
    async fn follow(&self, follower: i32, following: i32) -> SocialResult<FollowCounts>;

    /// Remove the edge if present and recompute both counters.
    /// `NotFound` if either user is absent; an absent edge is not an error.
    async fn unfollow(&self, follower: i32, following: i32) -> SocialResult<FollowCounts>;

    async fn is_following(&self, follower: i32, following: i32) -> SocialResult<bool>;

    /// Accounts following `user`, in edge insertion order
    async fn list_followers(&self, user: i32, page: PageRequest) -> SocialResult<Page<FollowDetail>>;

    /// Accounts `user` follows, in edge insertion order
    async fn list_following(&self, user: i32, page: PageRequest) -> SocialResult<Page<FollowDetail>>;

    /// Ids of all accounts `user` follows, in edge insertion order
    async fn following_ids(&self, user: i32) -> SocialResult<Vec<i32>>;

    // Posts

    /// Insert the post and recompute the author's `posts_count`
    async fn create_post(&self, new_post: NewPost) -> SocialResult<PostView>;

    async fn find_post(&self, id: i32) -> SocialResult<Option<Post>>;

    async fn post_view(&self, id: i32) -> SocialResult<Option<PostView>>;

    async fn update_post(&self, id: i32, changes: UpdatePost) -> SocialResult<PostView>;

    /// Delete the post and its likes, recompute the owner's `posts_count`.
    /// Comments of the post are removed only when `cascade_comments` is set.
    async fn delete_post(&self, id: i32, cascade_comments: bool) -> SocialResult<()>;

    /// Posts by any of `authors`, newest first
    async fn list_posts_by_authors(&self, authors: &[i32], page: PageRequest) -> SocialResult<Page<PostView>>;

    // Engagement

    /// Flip the like of `user` on `target` and recompute `likes_count`.
    /// Concurrent toggles on the same target are serialized.
    /// `NotFound` if the user or the target is absent.
    async fn toggle_like(&self, target: LikeTarget, user: i32) -> SocialResult<LikeToggle>;

    /// Insert the comment and recompute the post's `comments_count`.
    /// `NotFound` if the post or the author is absent.
    async fn add_comment(&self, new_comment: NewComment) -> SocialResult<CommentView>;

    async fn find_comment(&self, id: i32) -> SocialResult<Option<Comment>>;

    /// Unlink the comment from its post, delete it with its likes and
    /// recompute the post's `comments_count`. `NotFound` if it is already gone.
    async fn delete_comment(&self, comment: &Comment) -> SocialResult<()>;

    /// Comments on `post`, newest first
    async fn list_comments(&self, post: i32, page: PageRequest) -> SocialResult<Page<CommentView>>;
}
