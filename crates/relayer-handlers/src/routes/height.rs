// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use bridge_relayer_context::RelayerContext;
use bridge_relayer_store::ProposalStore;
use bridge_relayer_utils::HandlerError;

use super::parse_kind;

/// The next block the watcher of a direction scans.
#[derive(Debug, Serialize)]
pub struct HeightResponse {
    height: u64,
}

/// Handles the cursor request of a direction. A watcher that never ran
/// reports 0.
pub async fn handle_height(
    State(ctx): State<Arc<RelayerContext>>,
    Path(kind): Path<String>,
) -> Result<Json<HeightResponse>, HandlerError> {
    let prefix = parse_kind(&kind)?;
    let height = ctx.store().get_cursor(prefix, 0).unwrap_or_else(|e| {
        tracing::error!(%prefix, "failed to read the cursor: {e}");
        0
    });
    Ok(Json(HeightResponse { height }))
}
