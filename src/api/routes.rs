// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use super::handlers::{comments, health, posts, social_graph, users};
use super::AppState;

/// Build the application router with every route bound to `state`
pub fn router(state: AppState) -> Router {
    Router::new()
        // General routes
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::get_metrics))

        // User routes
        .route("/api/users", get(users::search_users).post(users::create_user))
        .route("/api/users/profile", put(users::update_profile))
        .route("/api/users/:id", get(users::get_user))

        // Social graph routes
        .route("/api/users/follow/:id", post(social_graph::follow_user))
        .route("/api/users/unfollow/:id", post(social_graph::unfollow_user))
        .route("/api/users/:id/followers", get(social_graph::get_followers))
        .route("/api/users/:id/following", get(social_graph::get_following))
        .route("/api/users/:id/follows/:other", get(social_graph::check_following))

        // Post routes
        .route("/api/posts", get(posts::get_feed).post(posts::create_post))
        .route("/api/posts/user/:user_id", get(posts::get_user_posts))
        .route(
            "/api/posts/:id",
            get(posts::get_post).put(posts::update_post).delete(posts::delete_post),
        )
        .route("/api/posts/like/:id", post(posts::like_post))

        // Comment routes
        .route("/api/comments", post(comments::add_comment))
        .route("/api/comments/post/:post_id", get(comments::get_comments))
        .route("/api/comments/:id", delete(comments::delete_comment))
        .route("/api/comments/like/:id", post(comments::like_comment))

        .with_state(state)
}
