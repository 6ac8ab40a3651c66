// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

use crate::error::SocialResult;

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static OPERATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("social_operations_total", "Social graph and engagement operations by outcome"),
        &["operation", "outcome"],
    )
    .expect("static metric options are valid");

    if let Err(e) = REGISTRY.register(Box::new(counter.clone())) {
        error!("Failed to register operations counter: {}", e);
    }
    counter
});

/// Count one invocation of `operation`, labelled `ok` or with the error kind
pub fn record<T>(operation: &str, result: &SocialResult<T>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    OPERATIONS.with_label_values(&[operation, outcome]).inc();
}

/// Render the registry in the Prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    // Touch the counter so it is exported before the first operation
    Lazy::force(&OPERATIONS);

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
