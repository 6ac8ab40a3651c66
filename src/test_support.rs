// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use chrono::Utc;
use std::sync::Arc;

use crate::models::{NewPost, NewUser};
use crate::store::{DynStore, MemoryStore};

pub fn memory_store() -> DynStore {
    Arc::new(MemoryStore::new())
}

pub fn new_user(username: &str) -> NewUser {
    let now = Utc::now().naive_utc();
    NewUser {
        username: username.to_string(),
        email: format!("{}@example.com", username),
        first_name: None,
        last_name: None,
        created_at: now,
        updated_at: now,
    }
}

/// Create one user per name and return their ids in the same order
pub async fn seed_users(store: &DynStore, names: &[&str]) -> Vec<i32> {
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        ids.push(store.create_user(new_user(name)).await.unwrap().id);
    }
    ids
}

pub async fn seed_post(store: &DynStore, author: i32, content: &str) -> i32 {
    let now = Utc::now().naive_utc();
    store
        .create_post(NewPost {
            user_id: author,
            content: content.to_string(),
            image: String::new(),
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap()
        .id
}
