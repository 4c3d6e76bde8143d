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

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Serialize;

use bridge_relayer_context::RelayerContext;
use bridge_relayer_store::{
    DatumWithTag, Page, ProposalStore, PROPOSAL_INDEX,
};
use bridge_relayer_utils::HandlerError;

use super::{parse_kind, PageQuery};

/// Handles the paginated proposal listing of a direction, newest first.
///
/// # Arguments
///
/// * `kind` - `home2foreign` or `foreign2home`
/// * `query` - the `offset` and `size` of the page
pub async fn handle_proposals(
    State(ctx): State<Arc<RelayerContext>>,
    Path(kind): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page>, HandlerError> {
    let prefix = parse_kind(&kind)?;
    let (offset, size) = query.resolve()?;
    let page = ctx
        .store()
        .page(prefix, PROPOSAL_INDEX, offset, size)
        .unwrap_or_else(|e| {
            tracing::error!(%prefix, offset, size, "failed to read proposals: {e}");
            Page {
                rows: Vec::new(),
                count: 0,
            }
        });
    Ok(Json(page))
}

/// Proposals still waiting for a signature or a receipt.
#[derive(Debug, Serialize)]
pub struct UnsignedProposalsResponse {
    rows: Vec<DatumWithTag>,
}

/// Handles the listing of the proposals the signer of a direction works on
/// next, oldest first.
pub async fn handle_unsigned_proposals(
    State(ctx): State<Arc<RelayerContext>>,
    Path(kind): Path<String>,
) -> Result<Json<UnsignedProposalsResponse>, HandlerError> {
    let prefix = parse_kind(&kind)?;
    let rows = ctx
        .store()
        .unfinished(prefix, ctx.config.signer_batch)
        .unwrap_or_else(|e| {
            tracing::error!(%prefix, "failed to read unsigned proposals: {e}");
            Vec::new()
        });
    Ok(Json(UnsignedProposalsResponse { rows }))
}
