// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

pub mod api;
pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod graph;
pub mod ledger;
pub mod metrics;
pub mod models;
pub mod schema;
pub mod store;
pub mod timeline;

#[cfg(test)]
pub(crate) mod test_support;
