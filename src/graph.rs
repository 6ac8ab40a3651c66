// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! Social graph manager: the directed follow relation and its derived counts.
//!
//! An edge is either absent or present. `follow` moves absent to present and
//! rejects a present edge; `unfollow` moves present to absent and is a no-op
//! on an absent edge.

use tracing::{debug, info, warn};

use crate::error::{SocialError, SocialResult};
use crate::metrics;
use crate::models::{FollowCounts, FollowDetail, Page, PageRequest};
use crate::store::DynStore;

#[derive(Clone)]
pub struct SocialGraph {
    store: DynStore,
}

impl SocialGraph {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    /// Make `actor` follow `target`
    pub async fn follow(&self, actor: i32, target: i32) -> SocialResult<FollowCounts> {
        debug!("Processing follow: {} -> {}", actor, target);

        let result = if actor == target {
            Err(SocialError::SelfFollowNotAllowed)
        } else {
            self.store.follow(actor, target).await
        };
        metrics::record("follow", &result);

        match &result {
            Ok(counts) => info!(
                "User {} now follows {} (following={}, followers={})",
                actor, target, counts.following_count, counts.followers_count
            ),
            Err(e) => warn!("Follow {} -> {} rejected: {}", actor, target, e),
        }
        result
    }

    /// Remove the edge `actor -> target` if it exists
    pub async fn unfollow(&self, actor: i32, target: i32) -> SocialResult<FollowCounts> {
        debug!("Processing unfollow: {} -> {}", actor, target);

        let result = self.store.unfollow(actor, target).await;
        metrics::record("unfollow", &result);

        match &result {
            Ok(_) => info!("User {} no longer follows {}", actor, target),
            Err(e) => warn!("Unfollow {} -> {} rejected: {}", actor, target, e),
        }
        result
    }

    pub async fn is_following(&self, actor: i32, target: i32) -> SocialResult<bool> {
        self.store.is_following(actor, target).await
    }

    /// Accounts following `user`, oldest edge first
    pub async fn list_followers(&self, user: i32, page: PageRequest) -> SocialResult<Page<FollowDetail>> {
        debug!("Getting followers for user {}, page {}", user, page.page);
        self.store.list_followers(user, page).await
    }

    /// Accounts `user` follows, oldest edge first
    pub async fn list_following(&self, user: i32, page: PageRequest) -> SocialResult<Page<FollowDetail>> {
        debug!("Getting following for user {}, page {}", user, page.page);
        self.store.list_following(user, page).await
    }

    /// Ids of the accounts `user` follows, oldest edge first
    pub async fn following_ids(&self, user: i32) -> SocialResult<Vec<i32>> {
        self.store.following_ids(user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_store, seed_users};
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};
    use tracing_test::traced_test;

    fn ids(page: &Page<FollowDetail>) -> Vec<i32> {
        page.items.iter().map(|d| d.user.id).collect()
    }

    #[tokio::test]
    async fn follow_then_unfollow_round_trip() {
        let store = memory_store();
        let graph = SocialGraph::new(store.clone());
        let users = seed_users(&store, &["alice", "bob"]).await;
        let (a, b) = (users[0], users[1]);

        let first = assert_ok!(graph.follow(a, b).await);
        assert_eq!(first, FollowCounts { following_count: 1, followers_count: 1 });
        assert!(graph.is_following(a, b).await.unwrap());
        assert_eq!(ids(&graph.list_followers(b, PageRequest::all()).await.unwrap()), vec![a]);

        let after_unfollow = assert_ok!(graph.unfollow(a, b).await);
        assert_eq!(after_unfollow, FollowCounts { following_count: 0, followers_count: 0 });
        assert!(!graph.is_following(a, b).await.unwrap());
        assert!(graph.list_followers(b, PageRequest::all()).await.unwrap().items.is_empty());
        assert!(graph.list_following(a, PageRequest::all()).await.unwrap().items.is_empty());

        let again = assert_ok!(graph.follow(a, b).await);
        assert_eq!(again, first);
        assert_eq!(ids(&graph.list_following(a, PageRequest::all()).await.unwrap()), vec![b]);

        let alice = store.find_user(a).await.unwrap().unwrap();
        let bob = store.find_user(b).await.unwrap().unwrap();
        assert_eq!((alice.following_count, alice.followers_count), (1, 0));
        assert_eq!((bob.following_count, bob.followers_count), (0, 1));
    }

    #[tokio::test]
    async fn self_follow_is_rejected() {
        let store = memory_store();
        let graph = SocialGraph::new(store.clone());
        let a = seed_users(&store, &["solo"]).await[0];

        let err = assert_err!(graph.follow(a, a).await);
        assert!(matches!(err, SocialError::SelfFollowNotAllowed));
        assert!(!graph.is_following(a, a).await.unwrap());
    }

    #[tokio::test]
    async fn second_follow_fails_and_leaves_counts_alone() {
        let store = memory_store();
        let graph = SocialGraph::new(store.clone());
        let users = seed_users(&store, &["alice", "bob"]).await;

        assert_ok!(graph.follow(users[0], users[1]).await);
        let err = assert_err!(graph.follow(users[0], users[1]).await);
        assert!(matches!(err, SocialError::AlreadyFollowing));

        let bob = store.find_user(users[1]).await.unwrap().unwrap();
        assert_eq!(bob.followers_count, 1);
    }

    #[tokio::test]
    async fn follow_unknown_target_is_not_found() {
        let store = memory_store();
        let graph = SocialGraph::new(store.clone());
        let a = seed_users(&store, &["alice"]).await[0];

        let err = assert_err!(graph.follow(a, 999).await);
        assert!(matches!(err, SocialError::NotFound("User")));
        let err = assert_err!(graph.unfollow(a, 999).await);
        assert!(matches!(err, SocialError::NotFound("User")));
    }

    #[tokio::test]
    #[traced_test]
    async fn unfollow_without_edge_is_a_quiet_success() {
        let store = memory_store();
        let graph = SocialGraph::new(store.clone());
        let users = seed_users(&store, &["alice", "bob"]).await;

        let counts = assert_ok!(graph.unfollow(users[0], users[1]).await);
        assert_eq!(counts, FollowCounts { following_count: 0, followers_count: 0 });
        assert_ok!(graph.unfollow(users[0], users[0]).await);
        assert!(logs_contain("no longer follows"));
    }

    #[tokio::test]
    async fn mutual_follow_lists_each_other() {
        let store = memory_store();
        let graph = SocialGraph::new(store.clone());
        let users = seed_users(&store, &["alice", "bob"]).await;
        let (a, b) = (users[0], users[1]);

        assert_ok!(graph.follow(a, b).await);
        assert_ok!(graph.follow(b, a).await);

        assert_eq!(ids(&graph.list_followers(a, PageRequest::all()).await.unwrap()), vec![b]);
        assert_eq!(ids(&graph.list_following(a, PageRequest::all()).await.unwrap()), vec![b]);
        assert_eq!(ids(&graph.list_followers(b, PageRequest::all()).await.unwrap()), vec![a]);
    }

    #[tokio::test]
    async fn lists_keep_insertion_order() {
        let store = memory_store();
        let graph = SocialGraph::new(store.clone());
        let users = seed_users(&store, &["zed", "carol", "bob", "amy"]).await;
        let (zed, carol, bob, amy) = (users[0], users[1], users[2], users[3]);

        assert_ok!(graph.follow(carol, zed).await);
        assert_ok!(graph.follow(amy, zed).await);
        assert_ok!(graph.follow(bob, zed).await);

        let followers = graph.list_followers(zed, PageRequest::all()).await.unwrap();
        assert_eq!(ids(&followers), vec![carol, amy, bob]);

        let second = graph
            .list_followers(zed, PageRequest { page: 2, limit: 2 })
            .await
            .unwrap();
        assert_eq!(ids(&second), vec![bob]);
        assert_eq!(second.total, 3);
        assert_eq!(second.total_pages(), 2);
    }

    #[tokio::test]
    async fn concurrent_followers_are_all_counted() {
        let store = memory_store();
        let graph = Arc::new(SocialGraph::new(store.clone()));
        let names: Vec<String> = (0..20).map(|i| format!("fan{}", i)).collect();
        let mut all = vec!["star"];
        all.extend(names.iter().map(String::as_str));
        let users = seed_users(&store, &all).await;
        let star = users[0];

        let handles: Vec<_> = users[1..]
            .iter()
            .map(|&fan| {
                let graph = graph.clone();
                tokio::spawn(async move { graph.follow(fan, star).await })
            })
            .collect();
        for handle in handles {
            assert_ok!(handle.await.unwrap());
        }

        let star_user = store.find_user(star).await.unwrap().unwrap();
        assert_eq!(star_user.followers_count, 20);
        assert_eq!(graph.list_followers(star, PageRequest::all()).await.unwrap().total, 20);
    }
}
