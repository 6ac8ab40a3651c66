// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! In-process store. The whole state sits behind one async `RwLock` and every
//! mutating call holds the write guard for its full duration, so each trait
//! method is atomic with respect to every other.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use super::SocialStore;
use crate::error::{SocialError, SocialResult};
use crate::models::follow::Follow;
use crate::models::{
    Comment, CommentView, FollowCounts, FollowDetail, LikeRecord, LikeTarget, LikeToggle,
    NewComment, NewPost, NewUser, Page, PageRequest, Post, PostView, UpdatePost, UpdateProfile,
    User, UserSummary,
};

#[derive(Debug, Default)]
struct Sequences {
    users: i32,
    follows: i32,
    posts: i32,
    comments: i32,
}

#[derive(Debug, Default)]
struct MemoryState {
    seq: Sequences,
    users: BTreeMap<i32, User>,
    /// Follow edges in insertion order
    follows: Vec<Follow>,
    posts: BTreeMap<i32, Post>,
    post_likes: HashMap<i32, Vec<LikeRecord>>,
    /// Comment ids linked from each post, in insertion order
    post_comments: HashMap<i32, Vec<i32>>,
    comments: BTreeMap<i32, Comment>,
    comment_likes: HashMap<i32, Vec<LikeRecord>>,
}

impl MemoryState {
    fn require_user(&self, id: i32) -> SocialResult<&User> {
        self.users.get(&id).ok_or(SocialError::NotFound("User"))
    }

    fn summary(&self, id: i32) -> SocialResult<UserSummary> {
        self.require_user(id).map(User::summary)
    }

    fn has_edge(&self, follower: i32, following: i32) -> bool {
        self.follows
            .iter()
            .any(|f| f.follower_id == follower && f.following_id == following)
    }

    /// Recompute both follow counters of `id` from the edge list
    fn recount_follows(&mut self, id: i32) {
        let following = self.follows.iter().filter(|f| f.follower_id == id).count() as i32;
        let followers = self.follows.iter().filter(|f| f.following_id == id).count() as i32;
        if let Some(user) = self.users.get_mut(&id) {
            user.following_count = following;
            user.followers_count = followers;
        }
    }

    fn recount_posts(&mut self, id: i32) {
        let posts = self.posts.values().filter(|p| p.user_id == id).count() as i32;
        if let Some(user) = self.users.get_mut(&id) {
            user.posts_count = posts;
        }
    }

    fn follow_counts(&self, follower: i32, following: i32) -> SocialResult<FollowCounts> {
        Ok(FollowCounts {
            following_count: self.require_user(follower)?.following_count,
            followers_count: self.require_user(following)?.followers_count,
        })
    }

    fn post_view(&self, post: &Post) -> SocialResult<PostView> {
        let likes = self.post_likes.get(&post.id).cloned().unwrap_or_default();
        Ok(PostView::new(post.clone(), self.summary(post.user_id)?, likes))
    }

    fn comment_view(&self, comment: &Comment) -> SocialResult<CommentView> {
        let likes = self.comment_likes.get(&comment.id).cloned().unwrap_or_default();
        Ok(CommentView::new(comment.clone(), self.summary(comment.user_id)?, likes))
    }

    fn follow_details<'a>(
        &self,
        counterparts: impl Iterator<Item = &'a Follow>,
        pick: impl Fn(&Follow) -> i32,
        page: PageRequest,
    ) -> SocialResult<Page<FollowDetail>> {
        let edges: Vec<&Follow> = counterparts.collect();
        let total = edges.len() as i64;
        let items = edges
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .map(|edge| {
                Ok(FollowDetail {
                    user: self.summary(pick(edge))?,
                    followed_at: edge.created_at,
                })
            })
            .collect::<SocialResult<Vec<_>>>()?;
        Ok(Page::new(items, total, page))
    }
}

/// Newest first, id as tie-breaker
fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (chrono::NaiveDateTime, i32)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

fn page_of<T>(items: Vec<T>, page: PageRequest) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let items = items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect();
    (items, total)
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SocialStore for MemoryStore {
    async fn ping(&self) -> SocialResult<()> {
        let _state = self.state.read().await;
        Ok(())
    }

    async fn create_user(&self, new_user: NewUser) -> SocialResult<User> {
        let mut state = self.state.write().await;

        let taken = state.users.values().any(|u| {
            u.username == new_user.username || u.email == new_user.email
        });
        if taken {
            return Err(SocialError::validation("User already exists"));
        }

        state.seq.users += 1;
        let user = User {
            id: state.seq.users,
            username: new_user.username,
            email: new_user.email,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            bio: None,
            avatar: None,
            location: None,
            website: None,
            followers_count: 0,
            following_count: 0,
            posts_count: 0,
            created_at: new_user.created_at,
            updated_at: new_user.updated_at,
        };
        state.users.insert(user.id, user.clone());
        debug!("Created user {} ({})", user.id, user.username);
        Ok(user)
    }

    async fn find_user(&self, id: i32) -> SocialResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn update_profile(&self, id: i32, changes: UpdateProfile) -> SocialResult<Option<User>> {
        let mut state = self.state.write().await;
        Ok(state.users.get_mut(&id).map(|user| {
            user.apply(&changes);
            user.clone()
        }))
    }

    async fn search_users(&self, term: Option<&str>, limit: i64) -> SocialResult<Vec<UserSummary>> {
        let state = self.state.read().await;
        let needle = term.map(str::to_lowercase);
        Ok(state
            .users
            .values()
            .filter(|u| needle.as_deref().map_or(true, |n| u.matches(n)))
            .take(limit.max(0) as usize)
            .map(User::summary)
            .collect())
    }

    async fn follow(&self, follower: i32, following: i32) -> SocialResult<FollowCounts> {
        let mut state = self.state.write().await;
        state.require_user(follower)?;
        state.require_user(following)?;

        if state.has_edge(follower, following) {
            return Err(SocialError::AlreadyFollowing);
        }

        state.seq.follows += 1;
        let edge = Follow {
            id: state.seq.follows,
            follower_id: follower,
            following_id: following,
            created_at: Utc::now().naive_utc(),
        };
        state.follows.push(edge);
        state.recount_follows(follower);
        state.recount_follows(following);
        trace!("Edge {} -> {} stored", follower, following);

        state.follow_counts(follower, following)
    }

    async fn unfollow(&self, follower: i32, following: i32) -> SocialResult<FollowCounts> {
        let mut state = self.state.write().await;
        state.require_user(follower)?;
        state.require_user(following)?;

        state
            .follows
            .retain(|f| !(f.follower_id == follower && f.following_id == following));
        state.recount_follows(follower);
        state.recount_follows(following);

        state.follow_counts(follower, following)
    }

    async fn is_following(&self, follower: i32, following: i32) -> SocialResult<bool> {
        Ok(self.state.read().await.has_edge(follower, following))
    }

    async fn list_followers(&self, user: i32, page: PageRequest) -> SocialResult<Page<FollowDetail>> {
        let state = self.state.read().await;
        state.require_user(user)?;
        state.follow_details(
            state.follows.iter().filter(|f| f.following_id == user),
            |f| f.follower_id,
            page,
        )
    }

    async fn list_following(&self, user: i32, page: PageRequest) -> SocialResult<Page<FollowDetail>> {
        let state = self.state.read().await;
        state.require_user(user)?;
        state.follow_details(
            state.follows.iter().filter(|f| f.follower_id == user),
            |f| f.following_id,
            page,
        )
    }

    async fn following_ids(&self, user: i32) -> SocialResult<Vec<i32>> {
        let state = self.state.read().await;
        Ok(state
            .follows
            .iter()
            .filter(|f| f.follower_id == user)
            .map(|f| f.following_id)
            .collect())
    }

    async fn create_post(&self, new_post: NewPost) -> SocialResult<PostView> {
        let mut state = self.state.write().await;
        state.require_user(new_post.user_id)?;

        state.seq.posts += 1;
        let post = Post {
            id: state.seq.posts,
            user_id: new_post.user_id,
            content: new_post.content,
            image: new_post.image,
            likes_count: 0,
            comments_count: 0,
            created_at: new_post.created_at,
            updated_at: new_post.updated_at,
        };
        state.posts.insert(post.id, post.clone());
        state.recount_posts(post.user_id);
        state.post_view(&post)
    }

    async fn find_post(&self, id: i32) -> SocialResult<Option<Post>> {
        Ok(self.state.read().await.posts.get(&id).cloned())
    }

    async fn post_view(&self, id: i32) -> SocialResult<Option<PostView>> {
        let state = self.state.read().await;
        state.posts.get(&id).map(|p| state.post_view(p)).transpose()
    }

    async fn update_post(&self, id: i32, changes: UpdatePost) -> SocialResult<PostView> {
        let mut state = self.state.write().await;
        let post = state.posts.get_mut(&id).ok_or(SocialError::NotFound("Post"))?;
        post.content = changes.content;
        if let Some(image) = changes.image {
            post.image = image;
        }
        post.updated_at = changes.updated_at;
        let post = post.clone();
        state.post_view(&post)
    }

    async fn delete_post(&self, id: i32, cascade_comments: bool) -> SocialResult<()> {
        let mut state = self.state.write().await;
        let post = state.posts.remove(&id).ok_or(SocialError::NotFound("Post"))?;
        state.post_likes.remove(&id);
        let linked = state.post_comments.remove(&id).unwrap_or_default();

        if cascade_comments {
            for comment_id in linked {
                state.comments.remove(&comment_id);
                state.comment_likes.remove(&comment_id);
            }
        }
        state.recount_posts(post.user_id);
        Ok(())
    }

    async fn list_posts_by_authors(&self, authors: &[i32], page: PageRequest) -> SocialResult<Page<PostView>> {
        let state = self.state.read().await;
        let mut posts: Vec<&Post> = state
            .posts
            .values()
            .filter(|p| authors.contains(&p.user_id))
            .collect();
        newest_first(&mut posts, |p| (p.created_at, p.id));

        let (posts, total) = page_of(posts, page);
        let items = posts
            .into_iter()
            .map(|p| state.post_view(p))
            .collect::<SocialResult<Vec<_>>>()?;
        Ok(Page::new(items, total, page))
    }

    async fn toggle_like(&self, target: LikeTarget, user: i32) -> SocialResult<LikeToggle> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        state.require_user(user)?;

        let (likes, parent_count) = match target {
            LikeTarget::Post(id) => {
                let post = state.posts.get_mut(&id).ok_or(SocialError::NotFound("Post"))?;
                (state.post_likes.entry(id).or_default(), &mut post.likes_count)
            }
            LikeTarget::Comment(id) => {
                let comment = state.comments.get_mut(&id).ok_or(SocialError::NotFound("Comment"))?;
                (state.comment_likes.entry(id).or_default(), &mut comment.likes_count)
            }
        };

        let liked = match likes.iter().position(|like| like.user == user) {
            Some(index) => {
                likes.remove(index);
                false
            }
            None => {
                likes.push(LikeRecord {
                    user,
                    created_at: Utc::now().naive_utc(),
                });
                true
            }
        };
        *parent_count = likes.len() as i32;

        Ok(LikeToggle {
            liked,
            likes_count: *parent_count,
        })
    }

    async fn add_comment(&self, new_comment: NewComment) -> SocialResult<CommentView> {
        let mut state = self.state.write().await;
        if !state.posts.contains_key(&new_comment.post_id) {
            return Err(SocialError::NotFound("Post"));
        }
        state.require_user(new_comment.user_id)?;

        state.seq.comments += 1;
        let comment = Comment {
            id: state.seq.comments,
            user_id: new_comment.user_id,
            post_id: new_comment.post_id,
            content: new_comment.content,
            likes_count: 0,
            created_at: new_comment.created_at,
            updated_at: new_comment.updated_at,
        };
        state.comments.insert(comment.id, comment.clone());

        let linked = state.post_comments.entry(comment.post_id).or_default();
        linked.push(comment.id);
        let count = linked.len() as i32;
        if let Some(post) = state.posts.get_mut(&comment.post_id) {
            post.comments_count = count;
        }

        state.comment_view(&comment)
    }

    async fn find_comment(&self, id: i32) -> SocialResult<Option<Comment>> {
        Ok(self.state.read().await.comments.get(&id).cloned())
    }

    async fn delete_comment(&self, comment: &Comment) -> SocialResult<()> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        if !state.comments.contains_key(&comment.id) {
            return Err(SocialError::NotFound("Comment"));
        }

        // Back-reference first, then the record
        if let Some(linked) = state.post_comments.get_mut(&comment.post_id) {
            linked.retain(|id| *id != comment.id);
            let count = linked.len() as i32;
            if let Some(post) = state.posts.get_mut(&comment.post_id) {
                post.comments_count = count;
            }
        }
        state.comments.remove(&comment.id);
        state.comment_likes.remove(&comment.id);
        Ok(())
    }

    async fn list_comments(&self, post: i32, page: PageRequest) -> SocialResult<Page<CommentView>> {
        let state = self.state.read().await;
        let mut comments: Vec<&Comment> = state
            .comments
            .values()
            .filter(|c| c.post_id == post)
            .collect();
        newest_first(&mut comments, |c| (c.created_at, c.id));

        let (comments, total) = page_of(comments, page);
        let items = comments
            .into_iter()
            .map(|c| state.comment_view(c))
            .collect::<SocialResult<Vec<_>>>()?;
        Ok(Page::new(items, total, page))
    }
}
