// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! Posts and the follow-based feed.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{SocialError, SocialResult};
use crate::graph::SocialGraph;
use crate::metrics;
use crate::models::post::{MAX_IMAGE_LENGTH, MAX_POST_LENGTH};
use crate::models::{NewPost, Page, PageRequest, PostView, UpdatePost};
use crate::store::DynStore;

#[derive(Clone)]
pub struct Timeline {
    store: DynStore,
    graph: SocialGraph,
}

impl Timeline {
    pub fn new(store: DynStore, graph: SocialGraph) -> Self {
        Self { store, graph }
    }

    pub async fn create_post(&self, actor: i32, content: &str, image: Option<String>) -> SocialResult<PostView> {
        validate_post(content, image.as_deref())?;

        let now = Utc::now().naive_utc();
        let result = self
            .store
            .create_post(NewPost {
                user_id: actor,
                content: content.to_string(),
                image: image.unwrap_or_default(),
                created_at: now,
                updated_at: now,
            })
            .await;
        metrics::record("create_post", &result);

        if let Ok(post) = &result {
            info!("User {} created post {}", actor, post.id);
        }
        result
    }

    /// Edit the content (and optionally the image) of a post owned by `actor`
    pub async fn update_post(
        &self,
        actor: i32,
        post_id: i32,
        content: &str,
        image: Option<String>,
    ) -> SocialResult<PostView> {
        validate_post(content, image.as_deref())?;

        let post = self
            .store
            .find_post(post_id)
            .await?
            .ok_or(SocialError::NotFound("Post"))?;
        if post.user_id != actor {
            warn!("User {} tried to edit post {} owned by {}", actor, post_id, post.user_id);
            return Err(SocialError::Forbidden("update this post"));
        }

        self.store
            .update_post(
                post_id,
                UpdatePost {
                    content: content.to_string(),
                    image,
                    updated_at: Utc::now().naive_utc(),
                },
            )
            .await
    }

    pub async fn get_post(&self, post_id: i32) -> SocialResult<PostView> {
        self.store
            .post_view(post_id)
            .await?
            .ok_or(SocialError::NotFound("Post"))
    }

    /// Posts of everyone `actor` follows plus their own, newest first
    pub async fn feed(&self, actor: i32, page: PageRequest) -> SocialResult<Page<PostView>> {
        let mut authors = self.graph.following_ids(actor).await?;
        authors.push(actor);
        debug!("Building feed for user {} from {} authors", actor, authors.len());

        self.store.list_posts_by_authors(&authors, page).await
    }

    pub async fn user_posts(&self, user: i32, page: PageRequest) -> SocialResult<Page<PostView>> {
        if self.store.find_user(user).await?.is_none() {
            return Err(SocialError::NotFound("User"));
        }
        self.store.list_posts_by_authors(&[user], page).await
    }
}

fn validate_post(content: &str, image: Option<&str>) -> SocialResult<()> {
    let length = content.chars().count();
    if length == 0 {
        return Err(SocialError::validation("Post content is required"));
    }
    if length > MAX_POST_LENGTH {
        return Err(SocialError::validation(format!(
            "Post cannot exceed {} characters",
            MAX_POST_LENGTH
        )));
    }
    if image.is_some_and(|i| i.chars().count() > MAX_IMAGE_LENGTH) {
        return Err(SocialError::validation(format!(
            "Image path cannot exceed {} characters",
            MAX_IMAGE_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_store, seed_users};
    use tokio_test::{assert_err, assert_ok};

    fn timeline(store: &DynStore) -> Timeline {
        Timeline::new(store.clone(), SocialGraph::new(store.clone()))
    }

    #[tokio::test]
    async fn create_post_counts_towards_author() {
        let store = memory_store();
        let timeline = timeline(&store);
        let a = seed_users(&store, &["alice"]).await[0];

        let post = assert_ok!(timeline.create_post(a, "first post", None).await);
        assert_eq!(post.user.id, a);
        assert_eq!(post.image, "");
        assert_eq!((post.likes_count, post.comments_count), (0, 0));

        assert_ok!(timeline.create_post(a, "second", Some("/uploads/cat.png".into())).await);
        assert_eq!(store.find_user(a).await.unwrap().unwrap().posts_count, 2);
    }

    #[tokio::test]
    async fn post_content_is_validated() {
        let store = memory_store();
        let timeline = timeline(&store);
        let a = seed_users(&store, &["alice"]).await[0];

        assert!(matches!(timeline.create_post(a, "", None).await, Err(SocialError::Validation(_))));
        assert_ok!(timeline.create_post(a, " ", None).await);
        let too_long = "y".repeat(MAX_POST_LENGTH + 1);
        assert!(matches!(
            timeline.create_post(a, &too_long, None).await,
            Err(SocialError::Validation(_))
        ));
        assert_ok!(timeline.create_post(a, &"y".repeat(MAX_POST_LENGTH), None).await);

        let huge_image = Some(format!("/uploads/{}", "i".repeat(MAX_IMAGE_LENGTH)));
        let err = assert_err!(timeline.create_post(a, "pic", huge_image.clone()).await);
        assert!(matches!(err, SocialError::Validation(_)));
        let post = assert_ok!(timeline.create_post(a, "pic", None).await);
        let err = assert_err!(timeline.update_post(a, post.id, "pic", huge_image).await);
        assert!(matches!(err, SocialError::Validation(_)));
        assert_eq!(store.find_user(a).await.unwrap().unwrap().posts_count, 3);
    }

    #[tokio::test]
    async fn only_the_owner_edits_a_post() {
        let store = memory_store();
        let timeline = timeline(&store);
        let users = seed_users(&store, &["owner", "other"]).await;
        let post = assert_ok!(timeline.create_post(users[0], "draft", Some("a.png".into())).await);

        let err = assert_err!(timeline.update_post(users[1], post.id, "hijack", None).await);
        assert!(matches!(err, SocialError::Forbidden(_)));

        let edited = assert_ok!(timeline.update_post(users[0], post.id, "final", None).await);
        assert_eq!(edited.content, "final");
        assert_eq!(edited.image, "a.png");
        assert_eq!(timeline.get_post(post.id).await.unwrap().content, "final");

        let err = assert_err!(timeline.update_post(users[0], 999, "x", None).await);
        assert!(matches!(err, SocialError::NotFound("Post")));
    }

    #[tokio::test]
    async fn feed_holds_followed_and_own_posts_newest_first() {
        let store = memory_store();
        let timeline = timeline(&store);
        let graph = SocialGraph::new(store.clone());
        let users = seed_users(&store, &["reader", "followed", "stranger"]).await;
        let (reader, followed, stranger) = (users[0], users[1], users[2]);

        assert_ok!(graph.follow(reader, followed).await);
        let older = assert_ok!(timeline.create_post(followed, "older", None).await);
        assert_ok!(timeline.create_post(stranger, "not for you", None).await);
        let mine = assert_ok!(timeline.create_post(reader, "mine", None).await);

        let feed = timeline.feed(reader, PageRequest::all()).await.unwrap();
        assert_eq!(feed.total, 2);
        assert_eq!(feed.items.iter().map(|p| p.id).collect::<Vec<_>>(), vec![mine.id, older.id]);

        let stranger_posts = timeline.user_posts(stranger, PageRequest::all()).await.unwrap();
        assert_eq!(stranger_posts.total, 1);

        let err = assert_err!(timeline.user_posts(999, PageRequest::all()).await);
        assert!(matches!(err, SocialError::NotFound("User")));
    }
}
