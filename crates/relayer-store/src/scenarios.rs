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

//! Behaviour every backend must share. Each backend runs these from its own
//! test module.

use ethers::types::{Bytes, H256};

use crate::*;

pub fn proposal(n: u64) -> (ProposalId, Proposal) {
    let payload = Proposal {
        hash: H256::from_low_u64_be(n),
        calldata: Bytes::from(vec![0x01, n as u8]),
        block: n,
    };
    (H256::from_low_u64_be(0xabc0 + n), payload)
}

fn append_many<S: ProposalStore>(store: &S, prefix: Prefix, n: u64) {
    for i in 1..=n {
        let (id, payload) = proposal(i);
        store
            .append_indexed(
                prefix,
                id,
                PROPOSAL_INDEX,
                &payload,
                Some(UNSIGNED_TAG),
            )
            .unwrap();
    }
}

fn tags_of<S: ProposalStore>(store: &S, prefix: Prefix, sequence: u64) -> Vec<&'static str> {
    [UNSIGNED_TAG, PENDING_TAG, SIGNED_TAG]
        .into_iter()
        .filter(|tag| {
            !store
                .range_by_tag(
                    prefix,
                    tag,
                    &RangeQuery::all().from(sequence).to(sequence),
                )
                .unwrap()
                .is_empty()
        })
        .collect()
}

pub fn append_on_empty_store<S: ProposalStore>(store: S) {
    let (id, payload) = proposal(1);
    let outcome = store
        .append_indexed(
            Prefix::Home,
            id,
            PROPOSAL_INDEX,
            &payload,
            Some(UNSIGNED_TAG),
        )
        .unwrap();
    assert_eq!(outcome, AppendOutcome::Appended { sequence: 1 });
    assert_eq!(store.get_count(Prefix::Home, PROPOSAL_INDEX).unwrap(), 1);

    let entries = store
        .range_by_index(Prefix::Home, PROPOSAL_INDEX, &RangeQuery::all())
        .unwrap();
    assert_eq!(entries, vec![IndexEntry { sequence: 1, id }]);

    let tagged = store
        .range_by_tag(Prefix::Home, UNSIGNED_TAG, &RangeQuery::all())
        .unwrap();
    assert_eq!(
        tagged,
        vec![TagEntry {
            sequence: 1,
            value: TagValue::unsigned()
        }]
    );
    assert_eq!(
        store.get_proposal(Prefix::Home, &id).unwrap(),
        Some(payload)
    );
    assert_eq!(
        store.sequence_of(Prefix::Home, PROPOSAL_INDEX, &id).unwrap(),
        Some(1)
    );
    // the other direction is untouched.
    assert_eq!(store.get_count(Prefix::Foreign, PROPOSAL_INDEX).unwrap(), 0);
}

pub fn duplicate_append_is_a_noop<S: ProposalStore>(store: S) {
    append_many(&store, Prefix::Home, 2);
    let (id, payload) = proposal(1);
    let outcome = store
        .append_indexed(
            Prefix::Home,
            id,
            PROPOSAL_INDEX,
            &payload,
            Some(UNSIGNED_TAG),
        )
        .unwrap();
    assert_eq!(outcome, AppendOutcome::Duplicate { sequence: 1 });
    assert_eq!(store.get_count(Prefix::Home, PROPOSAL_INDEX).unwrap(), 2);
    let tagged = store
        .range_by_tag(Prefix::Home, UNSIGNED_TAG, &RangeQuery::all())
        .unwrap();
    assert_eq!(tagged.len(), 2);
}

pub fn pagination_is_newest_first<S: ProposalStore>(store: S) {
    append_many(&store, Prefix::Home, 25);

    let first = store.page(Prefix::Home, PROPOSAL_INDEX, 0, 20).unwrap();
    assert_eq!(first.count, 25);
    let sequences: Vec<u64> = first.rows.iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, (6..=25).rev().collect::<Vec<_>>());
    assert_eq!(first.rows[0].key, proposal(25).0);
    assert_eq!(first.rows[0].value, Some(proposal(25).1));

    let second = store.page(Prefix::Home, PROPOSAL_INDEX, 20, 20).unwrap();
    let sequences: Vec<u64> = second.rows.iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, vec![5, 4, 3, 2, 1]);

    let past_the_end = store.page(Prefix::Home, PROPOSAL_INDEX, 40, 20).unwrap();
    assert!(past_the_end.rows.is_empty());
    assert_eq!(past_the_end.count, 25);
}

pub fn move_tag_keeps_the_sequence<S: ProposalStore>(store: S) {
    append_many(&store, Prefix::Foreign, 3);
    let hash = H256::from_low_u64_be(0xdeadbeef);
    store
        .move_tag(
            Prefix::Foreign,
            UNSIGNED_TAG,
            PENDING_TAG,
            2,
            Some(&TagValue::submitted(hash)),
        )
        .unwrap();
    assert_eq!(tags_of(&store, Prefix::Foreign, 2), vec![PENDING_TAG]);

    store
        .move_tag(Prefix::Foreign, PENDING_TAG, SIGNED_TAG, 2, None)
        .unwrap();
    assert_eq!(tags_of(&store, Prefix::Foreign, 2), vec![SIGNED_TAG]);
    let signed = store
        .range_by_tag(Prefix::Foreign, SIGNED_TAG, &RangeQuery::all())
        .unwrap();
    assert_eq!(signed[0].value.tx_hash(), Some(hash));

    for sequence in [1, 3] {
        assert_eq!(
            tags_of(&store, Prefix::Foreign, sequence),
            vec![UNSIGNED_TAG]
        );
    }
}

pub fn move_tag_fails_without_entry<S: ProposalStore>(store: S) {
    append_many(&store, Prefix::Home, 1);
    let err = store
        .move_tag(Prefix::Home, PENDING_TAG, SIGNED_TAG, 1, None)
        .unwrap_err();
    assert!(matches!(
        err,
        bridge_relayer_utils::Error::TagEntryNotFound { sequence: 1, .. }
    ));
    // nothing moved.
    assert_eq!(tags_of(&store, Prefix::Home, 1), vec![UNSIGNED_TAG]);
}

pub fn ranges_respect_bounds_and_limits<S: ProposalStore>(store: S) {
    append_many(&store, Prefix::Home, 12);
    let query = RangeQuery::all().from(9).to(11);
    let sequences: Vec<u64> = store
        .range_by_index(Prefix::Home, PROPOSAL_INDEX, &query)
        .unwrap()
        .into_iter()
        .map(|e| e.sequence)
        .collect();
    assert_eq!(sequences, vec![9, 10, 11]);

    let query = RangeQuery::all().reversed().limit(2);
    let sequences: Vec<u64> = store
        .range_by_tag(Prefix::Home, UNSIGNED_TAG, &query)
        .unwrap()
        .into_iter()
        .map(|e| e.sequence)
        .collect();
    assert_eq!(sequences, vec![12, 11]);

    let empty = RangeQuery::all().from(7).to(3);
    assert!(store
        .range_by_index(Prefix::Home, PROPOSAL_INDEX, &empty)
        .unwrap()
        .is_empty());

    let datum = store.query(Prefix::Home, PROPOSAL_INDEX, 4).unwrap().unwrap();
    assert_eq!(datum.key, proposal(4).0);
    assert!(store.query(Prefix::Home, PROPOSAL_INDEX, 13).unwrap().is_none());
}

pub fn unfinished_merges_buckets_oldest_first<S: ProposalStore>(store: S) {
    append_many(&store, Prefix::Home, 5);
    let hash = H256::from_low_u64_be(7);
    store
        .move_tag(
            Prefix::Home,
            UNSIGNED_TAG,
            PENDING_TAG,
            2,
            Some(&TagValue::submitted(hash)),
        )
        .unwrap();
    store
        .move_tag(Prefix::Home, UNSIGNED_TAG, SIGNED_TAG, 1, None)
        .unwrap();

    let rows = store.unfinished(Prefix::Home, 3).unwrap();
    let view: Vec<(u64, &str)> =
        rows.iter().map(|r| (r.sequence, r.tag.as_str())).collect();
    assert_eq!(
        view,
        vec![(2, PENDING_TAG), (3, UNSIGNED_TAG), (4, UNSIGNED_TAG)]
    );
    assert_eq!(rows[0].value, Some(proposal(2).1));
}

pub fn cursor_never_moves_backwards<S: ProposalStore>(store: S) {
    assert_eq!(store.get_cursor(Prefix::Home, 1).unwrap(), 1);
    assert_eq!(store.set_cursor(Prefix::Home, 101).unwrap(), 101);
    assert_eq!(store.set_cursor(Prefix::Home, 50).unwrap(), 101);
    assert_eq!(store.get_cursor(Prefix::Home, 1).unwrap(), 101);
    assert_eq!(store.get_cursor(Prefix::Foreign, 7).unwrap(), 7);
}

pub fn values_round_trip<S: ProposalStore>(store: S) {
    store
        .set_value(Prefix::Foreign, "note", &"hello".to_string())
        .unwrap();
    let value: Option<String> =
        store.get_value(Prefix::Foreign, "note").unwrap();
    assert_eq!(value.as_deref(), Some("hello"));
    let missing: Option<String> = store.get_value(Prefix::Home, "note").unwrap();
    assert!(missing.is_none());
}

/// Writers on clones of one store, each appending its own proposals and
/// moving every even sequence to `pending` as soon as it gets it.
pub fn concurrent_writers_keep_the_indices<S: ProposalStore>(store: S) {
    const WRITERS: u64 = 4;
    const PER_WRITER: u64 = 100;
    const TOTAL: u64 = WRITERS * PER_WRITER;

    std::thread::scope(|scope| {
        for writer in 0..WRITERS {
            let store = store.clone();
            scope.spawn(move || {
                for i in 1..=PER_WRITER {
                    let (id, payload) = proposal(writer * PER_WRITER + i);
                    let sequence = store
                        .append_indexed(
                            Prefix::Home,
                            id,
                            PROPOSAL_INDEX,
                            &payload,
                            Some(UNSIGNED_TAG),
                        )
                        .unwrap()
                        .sequence();
                    if sequence % 2 == 0 {
                        let tx_hash = H256::from_low_u64_be(sequence);
                        store
                            .move_tag(
                                Prefix::Home,
                                UNSIGNED_TAG,
                                PENDING_TAG,
                                sequence,
                                Some(&TagValue::submitted(tx_hash)),
                            )
                            .unwrap();
                    }
                }
            });
        }
    });

    assert_eq!(store.get_count(Prefix::Home, PROPOSAL_INDEX).unwrap(), TOTAL);
    let entries = store
        .range_by_index(Prefix::Home, PROPOSAL_INDEX, &RangeQuery::all())
        .unwrap();
    let sequences: Vec<u64> = entries.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, (1..=TOTAL).collect::<Vec<_>>());
    let mut ids: Vec<ProposalId> = entries.iter().map(|e| e.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len() as u64, TOTAL);

    for sequence in 1..=TOTAL {
        let expected = if sequence % 2 == 0 {
            PENDING_TAG
        } else {
            UNSIGNED_TAG
        };
        assert_eq!(tags_of(&store, Prefix::Home, sequence), vec![expected]);
    }
    assert_eq!(store.get_count(Prefix::Foreign, PROPOSAL_INDEX).unwrap(), 0);
}

/// Runs every scenario against fresh stores made by `make`.
pub fn run_all<S: ProposalStore>(make: impl Fn() -> S) {
    append_on_empty_store(make());
    duplicate_append_is_a_noop(make());
    pagination_is_newest_first(make());
    move_tag_keeps_the_sequence(make());
    move_tag_fails_without_entry(make());
    ranges_respect_bounds_and_limits(make());
    unfinished_merges_buckets_oldest_first(make());
    cursor_never_moves_backwards(make());
    values_round_trip(make());
    concurrent_writers_keep_the_indices(make());
}
