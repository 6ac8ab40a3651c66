// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! PostgreSQL store. Each mutating operation runs in one transaction: parent
//! rows are locked with `FOR UPDATE` first, then the relation row is written,
//! then the denormalized counters are recomputed from `COUNT(*)`.

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::Integer;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use super::SocialStore;
use crate::db::{Database, DbConnection};
use crate::error::{SocialError, SocialResult};
use crate::models::comment::NewCommentLike;
use crate::models::post::NewPostLike;
use crate::models::{
    Comment, CommentView, FollowCounts, FollowDetail, LikeRecord, LikeTarget, LikeToggle,
    NewComment, NewFollow, NewPost, NewUser, Page, PageRequest, Post, PostView, UpdatePost,
    UpdateProfile, User, UserSummary,
};
use crate::schema::{comment_likes, comments, follows, post_likes, posts, users};

#[derive(QueryableByName)]
struct FollowCountsRow {
    #[diesel(sql_type = Integer)]
    followers_count: i32,
    #[diesel(sql_type = Integer)]
    following_count: i32,
}

#[derive(QueryableByName)]
struct CountRow {
    #[diesel(sql_type = Integer)]
    count: i32,
}

pub struct PgStore {
    db: Arc<Database>,
}

impl PgStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn get_connection(&self) -> SocialResult<DbConnection> {
        Ok(self.db.get_connection().await?)
    }
}

/// Lock the given user rows in ascending id order; returns the ids that exist
async fn lock_users(conn: &mut AsyncPgConnection, ids: &[i32]) -> QueryResult<Vec<i32>> {
    users::table
        .filter(users::id.eq_any(ids.to_vec()))
        .order(users::id.asc())
        .select(users::id)
        .for_update()
        .load::<i32>(conn)
        .await
}

async fn user_exists(conn: &mut AsyncPgConnection, id: i32) -> QueryResult<bool> {
    diesel::select(diesel::dsl::exists(users::table.find(id)))
        .get_result::<bool>(conn)
        .await
}

/// Recompute both follow counters of a user from the follows relation
async fn recount_follows(conn: &mut AsyncPgConnection, user: i32) -> QueryResult<FollowCountsRow> {
    diesel::sql_query(
        "UPDATE users
         SET following_count = (SELECT COUNT(*) FROM follows WHERE follower_id = $1),
             followers_count = (SELECT COUNT(*) FROM follows WHERE following_id = $1)
         WHERE id = $1
         RETURNING followers_count, following_count",
    )
    .bind::<Integer, _>(user)
    .get_result::<FollowCountsRow>(conn)
    .await
}

async fn recount_posts(conn: &mut AsyncPgConnection, user: i32) -> QueryResult<usize> {
    diesel::sql_query(
        "UPDATE users
         SET posts_count = (SELECT COUNT(*) FROM posts WHERE user_id = $1)
         WHERE id = $1",
    )
    .bind::<Integer, _>(user)
    .execute(conn)
    .await
}

async fn recount_comments(conn: &mut AsyncPgConnection, post: i32) -> QueryResult<usize> {
    diesel::sql_query(
        "UPDATE posts
         SET comments_count = (SELECT COUNT(*) FROM comments WHERE post_id = $1)
         WHERE id = $1",
    )
    .bind::<Integer, _>(post)
    .execute(conn)
    .await
}

async fn recount_likes(conn: &mut AsyncPgConnection, target: LikeTarget) -> QueryResult<i32> {
    let query = match target {
        LikeTarget::Post(_) => {
            "UPDATE posts
             SET likes_count = (SELECT COUNT(*) FROM post_likes WHERE post_id = $1)
             WHERE id = $1
             RETURNING likes_count AS count"
        }
        LikeTarget::Comment(_) => {
            "UPDATE comments
             SET likes_count = (SELECT COUNT(*) FROM comment_likes WHERE comment_id = $1)
             WHERE id = $1
             RETURNING likes_count AS count"
        }
    };
    let row = diesel::sql_query(query)
        .bind::<Integer, _>(target.id())
        .get_result::<CountRow>(conn)
        .await?;
    Ok(row.count)
}

/// Flip the like row for a post. The post row must already be locked.
async fn flip_post_like(conn: &mut AsyncPgConnection, post: i32, user: i32) -> QueryResult<bool> {
    let removed = diesel::delete(
        post_likes::table
            .filter(post_likes::post_id.eq(post))
            .filter(post_likes::user_id.eq(user)),
    )
    .execute(conn)
    .await?;
    if removed > 0 {
        return Ok(false);
    }

    diesel::insert_into(post_likes::table)
        .values(&NewPostLike {
            post_id: post,
            user_id: user,
            created_at: Utc::now().naive_utc(),
        })
        .on_conflict((post_likes::post_id, post_likes::user_id))
        .do_nothing()
        .execute(conn)
        .await?;
    Ok(true)
}

/// Flip the like row for a comment. The comment row must already be locked.
async fn flip_comment_like(conn: &mut AsyncPgConnection, comment: i32, user: i32) -> QueryResult<bool> {
    let removed = diesel::delete(
        comment_likes::table
            .filter(comment_likes::comment_id.eq(comment))
            .filter(comment_likes::user_id.eq(user)),
    )
    .execute(conn)
    .await?;
    if removed > 0 {
        return Ok(false);
    }

    diesel::insert_into(comment_likes::table)
        .values(&NewCommentLike {
            comment_id: comment,
            user_id: user,
            created_at: Utc::now().naive_utc(),
        })
        .on_conflict((comment_likes::comment_id, comment_likes::user_id))
        .do_nothing()
        .execute(conn)
        .await?;
    Ok(true)
}

async fn load_summaries(conn: &mut AsyncPgConnection, ids: Vec<i32>) -> QueryResult<HashMap<i32, UserSummary>> {
    let found = users::table
        .filter(users::id.eq_any(ids))
        .select(User::as_select())
        .load::<User>(conn)
        .await?;
    Ok(found.into_iter().map(|u| (u.id, u.summary())).collect())
}

fn group_likes(rows: Vec<(i32, i32, NaiveDateTime)>) -> HashMap<i32, Vec<LikeRecord>> {
    let mut grouped: HashMap<i32, Vec<LikeRecord>> = HashMap::new();
    for (parent, user, created_at) in rows {
        grouped.entry(parent).or_default().push(LikeRecord { user, created_at });
    }
    grouped
}

/// Populate authors and likes for a batch of posts, keeping their order
async fn post_views(conn: &mut AsyncPgConnection, batch: Vec<Post>) -> SocialResult<Vec<PostView>> {
    let post_ids: Vec<i32> = batch.iter().map(|p| p.id).collect();
    let authors = load_summaries(conn, batch.iter().map(|p| p.user_id).collect()).await?;
    let likes = post_likes::table
        .filter(post_likes::post_id.eq_any(post_ids))
        .order((post_likes::created_at.asc(), post_likes::id.asc()))
        .select((post_likes::post_id, post_likes::user_id, post_likes::created_at))
        .load::<(i32, i32, NaiveDateTime)>(conn)
        .await?;
    let mut likes = group_likes(likes);

    batch
        .into_iter()
        .map(|post| {
            let author = authors
                .get(&post.user_id)
                .cloned()
                .ok_or(SocialError::NotFound("User"))?;
            let post_likes = likes.remove(&post.id).unwrap_or_default();
            Ok(PostView::new(post, author, post_likes))
        })
        .collect()
}

/// Populate authors and likes for a batch of comments, keeping their order
async fn comment_views(conn: &mut AsyncPgConnection, batch: Vec<Comment>) -> SocialResult<Vec<CommentView>> {
    let comment_ids: Vec<i32> = batch.iter().map(|c| c.id).collect();
    let authors = load_summaries(conn, batch.iter().map(|c| c.user_id).collect()).await?;
    let likes = comment_likes::table
        .filter(comment_likes::comment_id.eq_any(comment_ids))
        .order((comment_likes::created_at.asc(), comment_likes::id.asc()))
        .select((comment_likes::comment_id, comment_likes::user_id, comment_likes::created_at))
        .load::<(i32, i32, NaiveDateTime)>(conn)
        .await?;
    let mut likes = group_likes(likes);

    batch
        .into_iter()
        .map(|comment| {
            let author = authors
                .get(&comment.user_id)
                .cloned()
                .ok_or(SocialError::NotFound("User"))?;
            let comment_likes = likes.remove(&comment.id).unwrap_or_default();
            Ok(CommentView::new(comment, author, comment_likes))
        })
        .collect()
}

fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn follow_page(rows: Vec<(User, NaiveDateTime)>, total: i64, page: PageRequest) -> Page<FollowDetail> {
    let items = rows
        .into_iter()
        .map(|(user, followed_at)| FollowDetail {
            user: user.summary(),
            followed_at,
        })
        .collect();
    Page::new(items, total, page)
}

#[async_trait]
impl SocialStore for PgStore {
    async fn ping(&self) -> SocialResult<()> {
        let mut conn = self.get_connection().await?;
        diesel::sql_query("SELECT 1").execute(&mut conn).await?;
        Ok(())
    }

    async fn create_user(&self, new_user: NewUser) -> SocialResult<User> {
        let mut conn = self.get_connection().await?;

        let created = diesel::insert_into(users::table)
            .values(&new_user)
            .returning(User::as_returning())
            .get_result::<User>(&mut conn)
            .await;

        match created {
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Err(SocialError::validation("User already exists"))
            }
            other => Ok(other?),
        }
    }

    async fn find_user(&self, id: i32) -> SocialResult<Option<User>> {
        let mut conn = self.get_connection().await?;
        Ok(users::table
            .find(id)
            .select(User::as_select())
            .first::<User>(&mut conn)
            .await
            .optional()?)
    }

    async fn update_profile(&self, id: i32, changes: UpdateProfile) -> SocialResult<Option<User>> {
        let mut conn = self.get_connection().await?;
        Ok(diesel::update(users::table.find(id))
            .set(&changes)
            .returning(User::as_returning())
            .get_result::<User>(&mut conn)
            .await
            .optional()?)
    }

    async fn search_users(&self, term: Option<&str>, limit: i64) -> SocialResult<Vec<UserSummary>> {
        let mut conn = self.get_connection().await?;

        let mut query = users::table
            .select(User::as_select())
            .order(users::id.asc())
            .limit(limit)
            .into_boxed();

        if let Some(term) = term {
            let pattern = like_pattern(term);
            query = query.filter(
                users::username
                    .ilike(pattern.clone())
                    .or(users::first_name.ilike(pattern.clone()))
                    .or(users::last_name.ilike(pattern)),
            );
        }

        let found = query.load::<User>(&mut conn).await?;
        Ok(found.iter().map(User::summary).collect())
    }

    async fn follow(&self, follower: i32, following: i32) -> SocialResult<FollowCounts> {
        if follower == following {
            return Err(SocialError::SelfFollowNotAllowed);
        }
        let mut conn = self.get_connection().await?;

        conn.build_transaction()
            .run(|conn| {
                async move {
                    let locked = lock_users(conn, &[follower, following]).await?;
                    if locked.len() < 2 {
                        return Err(SocialError::NotFound("User"));
                    }

                    let inserted = diesel::insert_into(follows::table)
                        .values(&NewFollow {
                            follower_id: follower,
                            following_id: following,
                            created_at: Utc::now().naive_utc(),
                        })
                        .on_conflict((follows::follower_id, follows::following_id))
                        .do_nothing()
                        .execute(conn)
                        .await?;

                    if inserted == 0 {
                        debug!("Follow relationship {} -> {} already exists", follower, following);
                        return Err(SocialError::AlreadyFollowing);
                    }

                    // Recompute both sides from the relation, never by delta
                    let actor = recount_follows(conn, follower).await?;
                    let target = recount_follows(conn, following).await?;
                    trace!("Follow counts recomputed for {} and {}", follower, following);

                    Ok(FollowCounts {
                        following_count: actor.following_count,
                        followers_count: target.followers_count,
                    })
                }
                .scope_boxed()
            })
            .await
    }

    async fn unfollow(&self, follower: i32, following: i32) -> SocialResult<FollowCounts> {
        let mut conn = self.get_connection().await?;

        conn.build_transaction()
            .run(|conn| {
                async move {
                    let expected = if follower == following { 1 } else { 2 };
                    let locked = lock_users(conn, &[follower, following]).await?;
                    if locked.len() < expected {
                        return Err(SocialError::NotFound("User"));
                    }

                    let deleted = diesel::delete(
                        follows::table
                            .filter(follows::follower_id.eq(follower))
                            .filter(follows::following_id.eq(following)),
                    )
                    .execute(conn)
                    .await?;
                    debug!("Deleted relationship, rows affected: {}", deleted);

                    let actor = recount_follows(conn, follower).await?;
                    let target = recount_follows(conn, following).await?;

                    Ok(FollowCounts {
                        following_count: actor.following_count,
                        followers_count: target.followers_count,
                    })
                }
                .scope_boxed()
            })
            .await
    }

    async fn is_following(&self, follower: i32, following: i32) -> SocialResult<bool> {
        let mut conn = self.get_connection().await?;
        Ok(diesel::select(diesel::dsl::exists(
            follows::table
                .filter(follows::follower_id.eq(follower))
                .filter(follows::following_id.eq(following)),
        ))
        .get_result::<bool>(&mut conn)
        .await?)
    }

    async fn list_followers(&self, user: i32, page: PageRequest) -> SocialResult<Page<FollowDetail>> {
        let mut conn = self.get_connection().await?;
        if !user_exists(&mut conn, user).await? {
            return Err(SocialError::NotFound("User"));
        }

        let total = follows::table
            .filter(follows::following_id.eq(user))
            .count()
            .get_result::<i64>(&mut conn)
            .await?;

        let rows = follows::table
            .inner_join(users::table.on(users::id.eq(follows::follower_id)))
            .filter(follows::following_id.eq(user))
            .order((follows::created_at.asc(), follows::id.asc()))
            .select((User::as_select(), follows::created_at))
            .limit(page.limit)
            .offset(page.offset())
            .load::<(User, NaiveDateTime)>(&mut conn)
            .await?;

        Ok(follow_page(rows, total, page))
    }

    async fn list_following(&self, user: i32, page: PageRequest) -> SocialResult<Page<FollowDetail>> {
        let mut conn = self.get_connection().await?;
        if !user_exists(&mut conn, user).await? {
            return Err(SocialError::NotFound("User"));
        }

        let total = follows::table
            .filter(follows::follower_id.eq(user))
            .count()
            .get_result::<i64>(&mut conn)
            .await?;

        let rows = follows::table
            .inner_join(users::table.on(users::id.eq(follows::following_id)))
            .filter(follows::follower_id.eq(user))
            .order((follows::created_at.asc(), follows::id.asc()))
            .select((User::as_select(), follows::created_at))
            .limit(page.limit)
            .offset(page.offset())
            .load::<(User, NaiveDateTime)>(&mut conn)
            .await?;

        Ok(follow_page(rows, total, page))
    }

    async fn following_ids(&self, user: i32) -> SocialResult<Vec<i32>> {
        let mut conn = self.get_connection().await?;
        Ok(follows::table
            .filter(follows::follower_id.eq(user))
            .order((follows::created_at.asc(), follows::id.asc()))
            .select(follows::following_id)
            .load::<i32>(&mut conn)
            .await?)
    }

    async fn create_post(&self, new_post: NewPost) -> SocialResult<PostView> {
        let mut conn = self.get_connection().await?;

        conn.build_transaction()
            .run(|conn| {
                async move {
                    if lock_users(conn, &[new_post.user_id]).await?.is_empty() {
                        return Err(SocialError::NotFound("User"));
                    }

                    let post = diesel::insert_into(posts::table)
                        .values(&new_post)
                        .returning(Post::as_returning())
                        .get_result::<Post>(conn)
                        .await?;
                    recount_posts(conn, post.user_id).await?;

                    let mut views = post_views(conn, vec![post]).await?;
                    views.pop().ok_or(SocialError::NotFound("Post"))
                }
                .scope_boxed()
            })
            .await
    }

    async fn find_post(&self, id: i32) -> SocialResult<Option<Post>> {
        let mut conn = self.get_connection().await?;
        Ok(posts::table
            .find(id)
            .select(Post::as_select())
            .first::<Post>(&mut conn)
            .await
            .optional()?)
    }

    async fn post_view(&self, id: i32) -> SocialResult<Option<PostView>> {
        let mut conn = self.get_connection().await?;
        let post = posts::table
            .find(id)
            .select(Post::as_select())
            .first::<Post>(&mut conn)
            .await
            .optional()?;

        match post {
            Some(post) => Ok(post_views(&mut conn, vec![post]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn update_post(&self, id: i32, changes: UpdatePost) -> SocialResult<PostView> {
        let mut conn = self.get_connection().await?;
        let post = diesel::update(posts::table.find(id))
            .set(&changes)
            .returning(Post::as_returning())
            .get_result::<Post>(&mut conn)
            .await
            .optional()?
            .ok_or(SocialError::NotFound("Post"))?;

        post_views(&mut conn, vec![post])
            .await?
            .pop()
            .ok_or(SocialError::NotFound("Post"))
    }

    async fn delete_post(&self, id: i32, cascade_comments: bool) -> SocialResult<()> {
        let mut conn = self.get_connection().await?;

        conn.build_transaction()
            .run(|conn| {
                async move {
                    let owner = posts::table
                        .find(id)
                        .select(posts::user_id)
                        .for_update()
                        .first::<i32>(conn)
                        .await
                        .optional()?
                        .ok_or(SocialError::NotFound("Post"))?;

                    // post_likes go with the post through ON DELETE CASCADE
                    diesel::delete(posts::table.find(id)).execute(conn).await?;

                    if cascade_comments {
                        let removed = diesel::delete(comments::table.filter(comments::post_id.eq(id)))
                            .execute(conn)
                            .await?;
                        debug!("Removed {} comments of post {}", removed, id);
                    }

                    recount_posts(conn, owner).await?;
                    Ok(())
                }
                .scope_boxed()
            })
            .await
    }

    async fn list_posts_by_authors(&self, authors: &[i32], page: PageRequest) -> SocialResult<Page<PostView>> {
        let mut conn = self.get_connection().await?;

        let total = posts::table
            .filter(posts::user_id.eq_any(authors.to_vec()))
            .count()
            .get_result::<i64>(&mut conn)
            .await?;

        let batch = posts::table
            .filter(posts::user_id.eq_any(authors.to_vec()))
            .order((posts::created_at.desc(), posts::id.desc()))
            .select(Post::as_select())
            .limit(page.limit)
            .offset(page.offset())
            .load::<Post>(&mut conn)
            .await?;

        let items = post_views(&mut conn, batch).await?;
        Ok(Page::new(items, total, page))
    }

    async fn toggle_like(&self, target: LikeTarget, user: i32) -> SocialResult<LikeToggle> {
        let mut conn = self.get_connection().await?;

        conn.build_transaction()
            .run(|conn| {
                async move {
                    if !user_exists(conn, user).await? {
                        return Err(SocialError::NotFound("User"));
                    }

                    // Holding the parent row lock serializes toggles on the same entity
                    let liked = match target {
                        LikeTarget::Post(id) => {
                            posts::table
                                .find(id)
                                .select(posts::id)
                                .for_update()
                                .first::<i32>(conn)
                                .await
                                .optional()?
                                .ok_or(SocialError::NotFound("Post"))?;
                            flip_post_like(conn, id, user).await?
                        }
                        LikeTarget::Comment(id) => {
                            comments::table
                                .find(id)
                                .select(comments::id)
                                .for_update()
                                .first::<i32>(conn)
                                .await
                                .optional()?
                                .ok_or(SocialError::NotFound("Comment"))?;
                            flip_comment_like(conn, id, user).await?
                        }
                    };

                    let likes_count = recount_likes(conn, target).await?;
                    Ok(LikeToggle { liked, likes_count })
                }
                .scope_boxed()
            })
            .await
    }

    async fn add_comment(&self, new_comment: NewComment) -> SocialResult<CommentView> {
        let mut conn = self.get_connection().await?;

        conn.build_transaction()
            .run(|conn| {
                async move {
                    posts::table
                        .find(new_comment.post_id)
                        .select(posts::id)
                        .for_update()
                        .first::<i32>(conn)
                        .await
                        .optional()?
                        .ok_or(SocialError::NotFound("Post"))?;
                    if !user_exists(conn, new_comment.user_id).await? {
                        return Err(SocialError::NotFound("User"));
                    }

                    let comment = diesel::insert_into(comments::table)
                        .values(&new_comment)
                        .returning(Comment::as_returning())
                        .get_result::<Comment>(conn)
                        .await?;
                    recount_comments(conn, comment.post_id).await?;

                    let mut views = comment_views(conn, vec![comment]).await?;
                    views.pop().ok_or(SocialError::NotFound("Comment"))
                }
                .scope_boxed()
            })
            .await
    }

    async fn find_comment(&self, id: i32) -> SocialResult<Option<Comment>> {
        let mut conn = self.get_connection().await?;
        Ok(comments::table
            .find(id)
            .select(Comment::as_select())
            .first::<Comment>(&mut conn)
            .await
            .optional()?)
    }

    async fn delete_comment(&self, comment: &Comment) -> SocialResult<()> {
        let mut conn = self.get_connection().await?;
        let (comment_id, post_id) = (comment.id, comment.post_id);

        conn.build_transaction()
            .run(|conn| {
                async move {
                    // Lock the parent first so the unlink and the recount see one state
                    posts::table
                        .find(post_id)
                        .select(posts::id)
                        .for_update()
                        .first::<i32>(conn)
                        .await
                        .optional()?;

                    // comment_likes go with the comment through ON DELETE CASCADE
                    let deleted = diesel::delete(comments::table.find(comment_id))
                        .execute(conn)
                        .await?;
                    if deleted == 0 {
                        return Err(SocialError::NotFound("Comment"));
                    }
                    recount_comments(conn, post_id).await?;
                    Ok(())
                }
                .scope_boxed()
            })
            .await
    }

    async fn list_comments(&self, post: i32, page: PageRequest) -> SocialResult<Page<CommentView>> {
        let mut conn = self.get_connection().await?;

        let total = comments::table
            .filter(comments::post_id.eq(post))
            .count()
            .get_result::<i64>(&mut conn)
            .await?;

        let batch = comments::table
            .filter(comments::post_id.eq(post))
            .order((comments::created_at.desc(), comments::id.desc()))
            .select(Comment::as_select())
            .limit(page.limit)
            .offset(page.offset())
            .load::<Comment>(&mut conn)
            .await?;

        let items = comment_views(&mut conn, batch).await?;
        Ok(Page::new(items, total, page))
    }
}
