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

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use bridge_relayer_utils::Error;

use crate::{
    keys, AppendOutcome, IndexEntry, Prefix, Proposal, ProposalId,
    ProposalStore, RangeQuery, TagEntry, TagValue,
};

type MemStore = BTreeMap<String, Vec<u8>>;

/// InMemoryStore keeps the same ordered key layout as the sled store in a
/// `BTreeMap`. A single write lock makes every batch atomic.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    store: Arc<RwLock<MemStore>>,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish()
    }
}

impl InMemoryStore {
    fn scan(
        &self,
        prefix: Prefix,
        namespace: &str,
        query: &RangeQuery,
    ) -> Vec<(String, Vec<u8>)> {
        let Some((start, end)) = keys::bounds(prefix, namespace, query) else {
            return Vec::new();
        };
        let guard = self.store.read();
        let range = guard.range(start..=end);
        let limit = query.limit.unwrap_or(usize::MAX);
        let pick = |(k, v): (&String, &Vec<u8>)| (k.clone(), v.clone());
        if query.reverse {
            range.rev().take(limit).map(pick).collect()
        } else {
            range.take(limit).map(pick).collect()
        }
    }
}

impl ProposalStore for InMemoryStore {
    #[tracing::instrument(skip(self, value), fields(%prefix))]
    fn set_value<T: Serialize>(
        &self,
        prefix: Prefix,
        key: &str,
        value: &T,
    ) -> crate::Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.store.write().insert(keys::plain(prefix, key), bytes);
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(%prefix))]
    fn get_value<T: DeserializeOwned>(
        &self,
        prefix: Prefix,
        key: &str,
    ) -> crate::Result<Option<T>> {
        let guard = self.store.read();
        match guard.get(&keys::plain(prefix, key)) {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self, payload), fields(%prefix, %id))]
    fn append_indexed(
        &self,
        prefix: Prefix,
        id: ProposalId,
        index: &str,
        payload: &Proposal,
        tag: Option<&str>,
    ) -> crate::Result<AppendOutcome> {
        let payload_bytes = serde_json::to_vec(payload)?;
        let reverse_key = keys::reverse(prefix, index, &id);
        let count_key = keys::plain(prefix, index);

        let mut guard = self.store.write();
        if let Some(bytes) = guard.get(&reverse_key) {
            let sequence = serde_json::from_slice(bytes)?;
            return Ok(AppendOutcome::Duplicate { sequence });
        }
        let count: u64 = match guard.get(&count_key) {
            Some(bytes) => serde_json::from_slice(bytes)?,
            None => 0,
        };
        let sequence = count + 1;
        // serialize everything before the first write, so a failure leaves
        // the map untouched.
        let sequence_bytes = serde_json::to_vec(&sequence)?;
        let id_bytes = serde_json::to_vec(&id)?;
        let tag_bytes = serde_json::to_vec(&TagValue::unsigned())?;

        guard.insert(count_key, sequence_bytes.clone());
        guard.insert(keys::entry(prefix, index, sequence), id_bytes);
        if let Some(tag) = tag {
            guard.insert(keys::entry(prefix, tag, sequence), tag_bytes);
        }
        guard.insert(keys::payload(prefix, &id), payload_bytes);
        guard.insert(reverse_key, sequence_bytes);
        tracing::trace!(sequence, "proposal appended");
        Ok(AppendOutcome::Appended { sequence })
    }

    #[tracing::instrument(skip(self, value), fields(%prefix))]
    fn move_tag(
        &self,
        prefix: Prefix,
        old_tag: &str,
        new_tag: &str,
        sequence: u64,
        value: Option<&TagValue>,
    ) -> crate::Result<()> {
        let replacement = value.map(serde_json::to_vec).transpose()?;
        let mut guard = self.store.write();
        let Some(current) = guard.remove(&keys::entry(prefix, old_tag, sequence))
        else {
            return Err(Error::TagEntryNotFound {
                prefix: prefix.to_string(),
                tag: old_tag.to_owned(),
                sequence,
            });
        };
        guard.insert(
            keys::entry(prefix, new_tag, sequence),
            replacement.unwrap_or(current),
        );
        Ok(())
    }

    fn get_count(&self, prefix: Prefix, index: &str) -> crate::Result<u64> {
        Ok(self.get_value(prefix, index)?.unwrap_or(0))
    }

    #[tracing::instrument(skip(self), fields(%prefix))]
    fn range_by_index(
        &self,
        prefix: Prefix,
        index: &str,
        query: &RangeQuery,
    ) -> crate::Result<Vec<IndexEntry>> {
        self.scan(prefix, index, query)
            .into_iter()
            .map(|(k, v)| {
                Ok(IndexEntry {
                    sequence: keys::sequence_of(k.as_bytes())?,
                    id: serde_json::from_slice(&v)?,
                })
            })
            .collect()
    }

    #[tracing::instrument(skip(self), fields(%prefix))]
    fn range_by_tag(
        &self,
        prefix: Prefix,
        tag: &str,
        query: &RangeQuery,
    ) -> crate::Result<Vec<TagEntry>> {
        self.scan(prefix, tag, query)
            .into_iter()
            .map(|(k, v)| {
                Ok(TagEntry {
                    sequence: keys::sequence_of(k.as_bytes())?,
                    value: serde_json::from_slice(&v)?,
                })
            })
            .collect()
    }

    fn sequence_of(
        &self,
        prefix: Prefix,
        index: &str,
        id: &ProposalId,
    ) -> crate::Result<Option<u64>> {
        let guard = self.store.read();
        match guard.get(&keys::reverse(prefix, index, id)) {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }
}
