// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! Engagement ledger: like toggles on posts and comments, comment attachment
//! and removal, post deletion. Every counter it returns has been recomputed
//! from the authoritative list in the same storage unit as the mutation.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{SocialError, SocialResult};
use crate::metrics;
use crate::models::comment::MAX_COMMENT_LENGTH;
use crate::models::{CommentView, LikeTarget, LikeToggle, NewComment, Page, PageRequest};
use crate::store::DynStore;

#[derive(Clone)]
pub struct EngagementLedger {
    store: DynStore,
    cascade_comments: bool,
}

impl EngagementLedger {
    pub fn new(store: DynStore, cascade_comments: bool) -> Self {
        Self {
            store,
            cascade_comments,
        }
    }

    /// Flip the like of `actor` on `target`
    pub async fn toggle_like(&self, actor: i32, target: LikeTarget) -> SocialResult<LikeToggle> {
        let result = self.store.toggle_like(target, actor).await;
        metrics::record("toggle_like", &result);

        match &result {
            Ok(toggle) => debug!(
                "{} {} {} by user {}, likes={}",
                target.entity(),
                target.id(),
                if toggle.liked { "liked" } else { "unliked" },
                actor,
                toggle.likes_count
            ),
            Err(e) => warn!("Like toggle on {} {} failed: {}", target.entity(), target.id(), e),
        }
        result
    }

    pub async fn add_comment(&self, actor: i32, post: i32, content: &str) -> SocialResult<CommentView> {
        let result = self.insert_comment(actor, post, content).await;
        metrics::record("add_comment", &result);

        if let Ok(comment) = &result {
            info!("User {} commented on post {} (comment {})", actor, post, comment.id);
        }
        result
    }

    async fn insert_comment(&self, actor: i32, post: i32, content: &str) -> SocialResult<CommentView> {
        validate_comment(content)?;

        let now = Utc::now().naive_utc();
        self.store
            .add_comment(NewComment {
                user_id: actor,
                post_id: post,
                content: content.to_string(),
                created_at: now,
                updated_at: now,
            })
            .await
    }

    /// Delete a comment owned by `actor`
    pub async fn delete_comment(&self, actor: i32, comment_id: i32) -> SocialResult<()> {
        let result = self.remove_comment(actor, comment_id).await;
        metrics::record("delete_comment", &result);

        match &result {
            Ok(()) => info!("Comment {} deleted by user {}", comment_id, actor),
            Err(e) => warn!("Delete of comment {} by user {} rejected: {}", comment_id, actor, e),
        }
        result
    }

    async fn remove_comment(&self, actor: i32, comment_id: i32) -> SocialResult<()> {
        let comment = self
            .store
            .find_comment(comment_id)
            .await?
            .ok_or(SocialError::NotFound("Comment"))?;

        if comment.user_id != actor {
            return Err(SocialError::Forbidden("delete this comment"));
        }
        self.store.delete_comment(&comment).await
    }

    /// Delete a post owned by `actor`, with its likes
    pub async fn delete_post(&self, actor: i32, post_id: i32) -> SocialResult<()> {
        let result = self.remove_post(actor, post_id).await;
        metrics::record("delete_post", &result);

        match &result {
            Ok(()) => info!(
                "Post {} deleted by user {} (comments {})",
                post_id,
                actor,
                if self.cascade_comments { "removed" } else { "kept" }
            ),
            Err(e) => warn!("Delete of post {} by user {} rejected: {}", post_id, actor, e),
        }
        result
    }

    async fn remove_post(&self, actor: i32, post_id: i32) -> SocialResult<()> {
        let post = self
            .store
            .find_post(post_id)
            .await?
            .ok_or(SocialError::NotFound("Post"))?;

        if post.user_id != actor {
            return Err(SocialError::Forbidden("delete this post"));
        }
        self.store.delete_post(post_id, self.cascade_comments).await
    }

    /// Comments on `post`, newest first
    pub async fn list_comments(&self, post: i32, page: PageRequest) -> SocialResult<Page<CommentView>> {
        debug!("Listing comments for post {}, page {}", post, page.page);
        self.store.list_comments(post, page).await
    }
}

fn validate_comment(content: &str) -> SocialResult<()> {
    let length = content.chars().count();
    if length == 0 {
        return Err(SocialError::validation("Comment content is required"));
    }
    if length > MAX_COMMENT_LENGTH {
        return Err(SocialError::validation(format!(
            "Comment cannot exceed {} characters",
            MAX_COMMENT_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_store, seed_post, seed_users};
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};
    use tracing_test::traced_test;

    #[tokio::test]
    async fn toggle_twice_restores_post_state() {
        let store = memory_store();
        let ledger = EngagementLedger::new(store.clone(), false);
        let a = seed_users(&store, &["alice"]).await[0];
        let post = seed_post(&store, a, "hello").await;

        let on = assert_ok!(ledger.toggle_like(a, LikeTarget::Post(post)).await);
        assert_eq!(on, LikeToggle { liked: true, likes_count: 1 });

        let off = assert_ok!(ledger.toggle_like(a, LikeTarget::Post(post)).await);
        assert_eq!(off, LikeToggle { liked: false, likes_count: 0 });

        let view = store.post_view(post).await.unwrap().unwrap();
        assert!(view.likes.is_empty());
        assert_eq!(view.likes_count, 0);
    }

    #[tokio::test]
    async fn two_likers_then_one_unlike() {
        let store = memory_store();
        let ledger = EngagementLedger::new(store.clone(), false);
        let users = seed_users(&store, &["author", "alice", "bob"]).await;
        let post = seed_post(&store, users[0], "count me").await;

        assert_ok!(ledger.toggle_like(users[1], LikeTarget::Post(post)).await);
        let both = assert_ok!(ledger.toggle_like(users[2], LikeTarget::Post(post)).await);
        assert_eq!(both.likes_count, 2);

        let after = assert_ok!(ledger.toggle_like(users[1], LikeTarget::Post(post)).await);
        assert_eq!(after, LikeToggle { liked: false, likes_count: 1 });

        let view = store.post_view(post).await.unwrap().unwrap();
        assert!(view.is_liked_by(users[2]));
        assert!(!view.is_liked_by(users[1]));
        assert_eq!(view.likes.len() as i32, view.likes_count);
    }

    #[tokio::test]
    async fn comment_likes_toggle_independently_of_post() {
        let store = memory_store();
        let ledger = EngagementLedger::new(store.clone(), false);
        let users = seed_users(&store, &["author", "fan"]).await;
        let post = seed_post(&store, users[0], "post").await;
        let comment = assert_ok!(ledger.add_comment(users[0], post, "first").await);

        let on = assert_ok!(ledger.toggle_like(users[1], LikeTarget::Comment(comment.id)).await);
        assert_eq!(on, LikeToggle { liked: true, likes_count: 1 });
        assert_eq!(store.post_view(post).await.unwrap().unwrap().likes_count, 0);

        let off = assert_ok!(ledger.toggle_like(users[1], LikeTarget::Comment(comment.id)).await);
        assert_eq!(off, LikeToggle { liked: false, likes_count: 0 });
    }

    #[tokio::test]
    async fn like_on_missing_entity_is_not_found() {
        let store = memory_store();
        let ledger = EngagementLedger::new(store.clone(), false);
        let a = seed_users(&store, &["alice"]).await[0];

        let err = assert_err!(ledger.toggle_like(a, LikeTarget::Post(42)).await);
        assert!(matches!(err, SocialError::NotFound("Post")));
        let err = assert_err!(ledger.toggle_like(a, LikeTarget::Comment(42)).await);
        assert!(matches!(err, SocialError::NotFound("Comment")));
    }

    #[tokio::test]
    async fn unknown_actor_cannot_like_or_comment() {
        let store = memory_store();
        let ledger = EngagementLedger::new(store.clone(), false);
        let a = seed_users(&store, &["alice"]).await[0];
        let post = seed_post(&store, a, "p").await;
        let comment = assert_ok!(ledger.add_comment(a, post, "c").await);

        let err = assert_err!(ledger.toggle_like(999, LikeTarget::Post(post)).await);
        assert!(matches!(err, SocialError::NotFound("User")));
        let err = assert_err!(ledger.toggle_like(999, LikeTarget::Comment(comment.id)).await);
        assert!(matches!(err, SocialError::NotFound("User")));
        let err = assert_err!(ledger.add_comment(999, post, "ghost").await);
        assert!(matches!(err, SocialError::NotFound("User")));

        let view = store.post_view(post).await.unwrap().unwrap();
        assert_eq!((view.likes_count, view.comments_count), (0, 1));
    }

    #[tokio::test]
    async fn concurrent_toggles_flip_exactly_once_each() {
        let store = memory_store();
        let ledger = Arc::new(EngagementLedger::new(store.clone(), false));
        let a = seed_users(&store, &["alice"]).await[0];
        let post = seed_post(&store, a, "race").await;

        // An odd number of flips by one actor ends liked, with a single record
        let handles: Vec<_> = (0..7)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.toggle_like(a, LikeTarget::Post(post)).await })
            })
            .collect();
        for handle in handles {
            assert_ok!(handle.await.unwrap());
        }

        let view = store.post_view(post).await.unwrap().unwrap();
        assert_eq!(view.likes_count, 1);
        assert_eq!(view.likes.len(), 1);
    }

    #[tokio::test]
    async fn add_comment_links_and_lists() {
        let store = memory_store();
        let ledger = EngagementLedger::new(store.clone(), false);
        let users = seed_users(&store, &["author", "reader"]).await;
        let post = seed_post(&store, users[0], "talk to me").await;

        let comment = assert_ok!(ledger.add_comment(users[1], post, "hello").await);
        assert_eq!(comment.post, post);
        assert_eq!(comment.user.id, users[1]);

        let view = store.post_view(post).await.unwrap().unwrap();
        assert_eq!(view.comments_count, 1);

        let listing = ledger.list_comments(post, PageRequest::all()).await.unwrap();
        assert_eq!(listing.total, 1);
        assert_eq!(listing.items[0].id, comment.id);
        assert_eq!(listing.items[0].content, "hello");
    }

    #[tokio::test]
    async fn comment_content_is_validated() {
        let store = memory_store();
        let ledger = EngagementLedger::new(store.clone(), false);
        let a = seed_users(&store, &["alice"]).await[0];
        let post = seed_post(&store, a, "p").await;

        assert!(matches!(
            ledger.add_comment(a, post, "").await,
            Err(SocialError::Validation(_))
        ));
        // Whitespace still counts towards the length
        let blank = assert_ok!(ledger.add_comment(a, post, "   ").await);
        assert_eq!(blank.content, "   ");
        let too_long = "x".repeat(MAX_COMMENT_LENGTH + 1);
        assert!(matches!(
            ledger.add_comment(a, post, &too_long).await,
            Err(SocialError::Validation(_))
        ));
        assert_ok!(ledger.add_comment(a, post, &"é".repeat(MAX_COMMENT_LENGTH)).await);

        let err = assert_err!(ledger.add_comment(a, 999, "orphan").await);
        assert!(matches!(err, SocialError::NotFound("Post")));
    }

    #[tokio::test]
    #[traced_test]
    async fn non_owner_cannot_delete_comment() {
        let store = memory_store();
        let ledger = EngagementLedger::new(store.clone(), false);
        let users = seed_users(&store, &["owner", "intruder"]).await;
        let post = seed_post(&store, users[0], "p").await;
        let comment = assert_ok!(ledger.add_comment(users[0], post, "mine").await);

        let err = assert_err!(ledger.delete_comment(users[1], comment.id).await);
        assert!(matches!(err, SocialError::Forbidden(_)));
        assert!(logs_contain("rejected"));

        assert!(store.find_comment(comment.id).await.unwrap().is_some());
        let view = store.post_view(post).await.unwrap().unwrap();
        assert_eq!(view.comments_count, 1);
        assert_eq!(ledger.list_comments(post, PageRequest::all()).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn owner_deletes_comment_and_counter_follows() {
        let store = memory_store();
        let ledger = EngagementLedger::new(store.clone(), false);
        let a = seed_users(&store, &["alice"]).await[0];
        let post = seed_post(&store, a, "p").await;
        let keep = assert_ok!(ledger.add_comment(a, post, "keep").await);
        let drop = assert_ok!(ledger.add_comment(a, post, "drop").await);

        assert_ok!(ledger.delete_comment(a, drop.id).await);
        assert!(store.find_comment(drop.id).await.unwrap().is_none());

        let view = store.post_view(post).await.unwrap().unwrap();
        assert_eq!(view.comments_count, 1);
        let listing = ledger.list_comments(post, PageRequest::all()).await.unwrap();
        assert_eq!(listing.items.iter().map(|c| c.id).collect::<Vec<_>>(), vec![keep.id]);

        let err = assert_err!(ledger.delete_comment(a, drop.id).await);
        assert!(matches!(err, SocialError::NotFound("Comment")));
    }

    #[tokio::test]
    async fn second_delete_of_a_fetched_comment_is_not_found() {
        let store = memory_store();
        let ledger = EngagementLedger::new(store.clone(), false);
        let a = seed_users(&store, &["alice"]).await[0];
        let post = seed_post(&store, a, "p").await;
        let created = assert_ok!(ledger.add_comment(a, post, "once").await);

        // Both deleters looked the comment up before either removed it
        let comment = store.find_comment(created.id).await.unwrap().unwrap();
        assert_ok!(store.delete_comment(&comment).await);
        let err = assert_err!(store.delete_comment(&comment).await);
        assert!(matches!(err, SocialError::NotFound("Comment")));
        assert_eq!(store.post_view(post).await.unwrap().unwrap().comments_count, 0);
    }

    #[tokio::test]
    async fn fifteen_comments_paginate_by_ten() {
        let store = memory_store();
        let ledger = EngagementLedger::new(store.clone(), false);
        let a = seed_users(&store, &["chatty"]).await[0];
        let post = seed_post(&store, a, "p").await;
        for i in 0..15 {
            assert_ok!(ledger.add_comment(a, post, &format!("comment {}", i)).await);
        }

        let first = ledger.list_comments(post, PageRequest { page: 1, limit: 10 }).await.unwrap();
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.total, 15);
        assert_eq!(first.total_pages(), 2);
        // Newest first
        assert_eq!(first.items[0].content, "comment 14");

        let second = ledger.list_comments(post, PageRequest { page: 2, limit: 10 }).await.unwrap();
        assert_eq!(second.items.len(), 5);
        assert_eq!(second.items[4].content, "comment 0");
    }

    #[tokio::test]
    async fn page_far_past_the_end_is_empty() {
        let store = memory_store();
        let ledger = EngagementLedger::new(store.clone(), false);
        let a = seed_users(&store, &["chatty"]).await[0];
        let post = seed_post(&store, a, "p").await;
        assert_ok!(ledger.add_comment(a, post, "only one").await);

        let page = PageRequest::new(Some(i64::MAX), Some(10), 10, 100);
        let listing = assert_ok!(ledger.list_comments(post, page).await);
        assert!(listing.items.is_empty());
        assert_eq!(listing.total, 1);
    }

    #[tokio::test]
    async fn post_delete_requires_ownership() {
        let store = memory_store();
        let ledger = EngagementLedger::new(store.clone(), false);
        let users = seed_users(&store, &["owner", "other"]).await;
        let post = seed_post(&store, users[0], "p").await;

        let err = assert_err!(ledger.delete_post(users[1], post).await);
        assert!(matches!(err, SocialError::Forbidden(_)));
        assert!(store.find_post(post).await.unwrap().is_some());

        assert_ok!(ledger.delete_post(users[0], post).await);
        assert!(store.find_post(post).await.unwrap().is_none());
        assert_eq!(store.find_user(users[0]).await.unwrap().unwrap().posts_count, 0);

        let err = assert_err!(ledger.delete_post(users[0], post).await);
        assert!(matches!(err, SocialError::NotFound("Post")));
    }

    #[tokio::test]
    async fn post_delete_keeps_comments_unless_cascading() {
        let store = memory_store();
        let users = seed_users(&store, &["owner"]).await;
        let a = users[0];

        let keeping = EngagementLedger::new(store.clone(), false);
        let post = seed_post(&store, a, "kept").await;
        let survivor = assert_ok!(keeping.add_comment(a, post, "still here").await);
        assert_ok!(keeping.delete_post(a, post).await);
        assert!(store.find_comment(survivor.id).await.unwrap().is_some());

        let cascading = EngagementLedger::new(store.clone(), true);
        let post = seed_post(&store, a, "gone").await;
        let doomed = assert_ok!(cascading.add_comment(a, post, "bye").await);
        assert_ok!(cascading.delete_post(a, post).await);
        assert!(store.find_comment(doomed.id).await.unwrap().is_none());
    }
}
