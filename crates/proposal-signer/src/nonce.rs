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

use ethers::types::U256;
use parking_lot::Mutex;

/// Remembers the last nonce the relayer used, so transactions sent within a
/// tick, or while the node still reports an older pending count, never reuse
/// a nonce.
#[derive(Debug, Default)]
pub struct NonceTracker {
    last: Mutex<Option<U256>>,
}

impl NonceTracker {
    /// The nonce of the next transaction: the greater of the chain's
    /// `pending` count and the last used nonce plus one.
    pub fn next(&self, pending: U256) -> U256 {
        match *self.last.lock() {
            Some(last) => pending.max(last.saturating_add(U256::one())),
            None => pending,
        }
    }

    /// Records that `nonce` was used by a sent transaction.
    pub fn record(&self, nonce: U256) {
        let mut last = self.last.lock();
        *last = Some(last.map_or(nonce, |l| l.max(nonce)));
    }

    /// The last used nonce, if any.
    pub fn last(&self) -> Option<U256> {
        *self.last.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_the_chain_until_something_is_sent() {
        let tracker = NonceTracker::default();
        assert_eq!(tracker.next(U256::from(4u64)), U256::from(4u64));
        tracker.record(U256::from(4u64));
        // the node has not seen our transaction yet.
        assert_eq!(tracker.next(U256::from(4u64)), U256::from(5u64));
        // the node knows more than we do.
        assert_eq!(tracker.next(U256::from(9u64)), U256::from(9u64));
        tracker.record(U256::from(2u64));
        assert_eq!(tracker.last(), Some(U256::from(4u64)));
    }
}
