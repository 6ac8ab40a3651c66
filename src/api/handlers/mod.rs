// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

pub mod comments;
pub mod health;
pub mod posts;
pub mod social_graph;
pub mod users;

use serde::Deserialize;

/// `?page=&limit=` query parameters, normalized through `AppState::page`
#[derive(Debug, Default, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}
