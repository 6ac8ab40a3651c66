// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

// Import diesel table macros
use diesel::{allow_tables_to_appear_in_same_query, joinable, table};

table! {
    users (id) {
        id -> Integer,
        username -> Varchar,
        email -> Varchar,
        first_name -> Nullable<Varchar>,
        last_name -> Nullable<Varchar>,
        bio -> Nullable<Text>,
        avatar -> Nullable<Varchar>,
        location -> Nullable<Varchar>,
        website -> Nullable<Varchar>,
        followers_count -> Integer,
        following_count -> Integer,
        posts_count -> Integer,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

// One row per follow edge, unique on (follower_id, following_id)
table! {
    follows (id) {
        id -> Integer,
        follower_id -> Integer,
        following_id -> Integer,
        created_at -> Timestamp,
    }
}

table! {
    posts (id) {
        id -> Integer,
        user_id -> Integer,
        content -> Text,
        image -> Varchar,
        likes_count -> Integer,
        comments_count -> Integer,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    post_likes (id) {
        id -> Integer,
        post_id -> Integer,
        user_id -> Integer,
        created_at -> Timestamp,
    }
}

// post_id carries no foreign key: comments may outlive their post
table! {
    comments (id) {
        id -> Integer,
        user_id -> Integer,
        post_id -> Integer,
        content -> Text,
        likes_count -> Integer,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    comment_likes (id) {
        id -> Integer,
        comment_id -> Integer,
        user_id -> Integer,
        created_at -> Timestamp,
    }
}

joinable!(posts -> users (user_id));
joinable!(post_likes -> posts (post_id));
joinable!(comments -> users (user_id));
joinable!(comment_likes -> comments (comment_id));

allow_tables_to_appear_in_same_query!(
    users,
    follows,
    posts,
    post_likes,
    comments,
    comment_likes,
);
