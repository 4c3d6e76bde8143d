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

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult,
};

use bridge_relayer_utils::Error;

use crate::{
    keys, AppendOutcome, IndexEntry, Prefix, Proposal, ProposalId,
    ProposalStore, RangeQuery, TagEntry, TagValue,
};

const TREE: &str = "bridge";

/// SledStore is a store that keeps the proposals in a [Sled](https://sled.rs)-based database.
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
    tree: sled::Tree,
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore").finish()
    }
}

impl SledStore {
    /// Create a new SledStore.
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let db = sled::Config::new()
            .path(path)
            .mode(sled::Mode::HighThroughput)
            .open()?;
        let tree = db.open_tree(TREE)?;
        Ok(Self { db, tree })
    }

    /// Creates a temporary SledStore.
    pub fn temporary() -> crate::Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .mode(sled::Mode::HighThroughput)
            .open()?;
        let tree = db.open_tree(TREE)?;
        Ok(Self { db, tree })
    }

    /// Gets the total amount of data stored on disk
    pub fn get_data_stored_size(&self) -> u64 {
        self.db.size_on_disk().unwrap_or_default()
    }

    /// Flushes every pending write to disk.
    pub fn flush(&self) -> crate::Result<usize> {
        Ok(self.db.flush()?)
    }

    fn scan(
        &self,
        prefix: Prefix,
        namespace: &str,
        query: &RangeQuery,
    ) -> crate::Result<Vec<(sled::IVec, sled::IVec)>> {
        let Some((start, end)) = keys::bounds(prefix, namespace, query) else {
            return Ok(Vec::new());
        };
        let range = self.tree.range(start.as_bytes()..=end.as_bytes());
        let limit = query.limit.unwrap_or(usize::MAX);
        let rows = if query.reverse {
            range.rev().take(limit).collect::<Result<Vec<_>, _>>()?
        } else {
            range.take(limit).collect::<Result<Vec<_>, _>>()?
        };
        Ok(rows)
    }
}

/// Decodes a JSON value inside a transaction, aborting it on failure.
fn decode<T: DeserializeOwned>(
    bytes: &[u8],
) -> ConflictableTransactionResult<T, std::io::Error> {
    serde_json::from_slice(bytes)
        .map_err(|e| ConflictableTransactionError::Abort(e.into()))
}

impl ProposalStore for SledStore {
    #[tracing::instrument(skip(self, value), fields(%prefix))]
    fn set_value<T: Serialize>(
        &self,
        prefix: Prefix,
        key: &str,
        value: &T,
    ) -> crate::Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.tree.insert(keys::plain(prefix, key), bytes)?;
        self.db.flush()?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(%prefix))]
    fn get_value<T: DeserializeOwned>(
        &self,
        prefix: Prefix,
        key: &str,
    ) -> crate::Result<Option<T>> {
        match self.tree.get(keys::plain(prefix, key))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
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
        let id_bytes = serde_json::to_vec(&id)?;
        let tag_bytes = serde_json::to_vec(&TagValue::unsigned())?;
        let reverse_key = keys::reverse(prefix, index, &id);
        let count_key = keys::plain(prefix, index);
        let payload_key = keys::payload(prefix, &id);

        // we do everything inside a single transaction
        // so everything happens atomically and if anything fails
        // we revert everything back to the old state.
        let outcome = self.tree.transaction::<_, _, std::io::Error>(|db| {
            if let Some(bytes) = db.get(reverse_key.as_bytes())? {
                let sequence = decode(&bytes)?;
                return Ok(AppendOutcome::Duplicate { sequence });
            }
            let count: u64 = match db.get(count_key.as_bytes())? {
                Some(bytes) => decode(&bytes)?,
                None => 0,
            };
            let sequence = count + 1;
            let sequence_bytes = sequence.to_string().into_bytes();
            db.insert(count_key.as_bytes(), sequence_bytes.as_slice())?;
            db.insert(
                keys::entry(prefix, index, sequence).as_bytes(),
                id_bytes.as_slice(),
            )?;
            if let Some(tag) = tag {
                db.insert(
                    keys::entry(prefix, tag, sequence).as_bytes(),
                    tag_bytes.as_slice(),
                )?;
            }
            db.insert(payload_key.as_bytes(), payload_bytes.as_slice())?;
            db.insert(reverse_key.as_bytes(), sequence_bytes.as_slice())?;
            Ok(AppendOutcome::Appended { sequence })
        })?;
        // flush the db to make sure we don't lose anything.
        self.db.flush()?;
        tracing::trace!(sequence = outcome.sequence(), ?outcome, "append");
        Ok(outcome)
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
        let old_key = keys::entry(prefix, old_tag, sequence);
        let new_key = keys::entry(prefix, new_tag, sequence);
        let moved = self.tree.transaction::<_, _, std::io::Error>(|db| {
            let Some(current) = db.remove(old_key.as_bytes())? else {
                return Ok(false);
            };
            match &replacement {
                Some(bytes) => db.insert(new_key.as_bytes(), bytes.as_slice())?,
                None => db.insert(new_key.as_bytes(), current)?,
            };
            Ok(true)
        })?;
        if !moved {
            return Err(Error::TagEntryNotFound {
                prefix: prefix.to_string(),
                tag: old_tag.to_owned(),
                sequence,
            });
        }
        self.db.flush()?;
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
        self.scan(prefix, index, query)?
            .into_iter()
            .map(|(k, v)| {
                Ok(IndexEntry {
                    sequence: keys::sequence_of(&k)?,
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
        self.scan(prefix, tag, query)?
            .into_iter()
            .map(|(k, v)| {
                Ok(TagEntry {
                    sequence: keys::sequence_of(&k)?,
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
        match self.tree.get(keys::reverse(prefix, index, id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}
