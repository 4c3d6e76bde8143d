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

use ethers::types::{Address, Bytes, H256, U256};

use bridge_chain_client::abi;
use bridge_relayer_store::Prefix;

/// What differs between the two directions of the bridge: which events are
/// watched and which call they turn into on the other chain.
pub trait Direction: Send + Sync {
    /// The store namespace of the proposals found by this direction.
    fn prefix(&self) -> Prefix;

    /// The call to run on the destination chain for `value` sent by `sender`.
    fn encode_call(&self, sender: Address, value: U256) -> Bytes;

    /// Topic filters of the watched event, by position.
    fn event_topics(&self) -> Vec<Option<H256>>;
}

/// Home to foreign: tokens transferred to the home multi-sign contract are
/// issued on the foreign chain.
#[derive(Debug, Clone, Copy)]
pub struct HomeBridge {
    multi_sign: Address,
}

impl HomeBridge {
    /// Watches transfers whose recipient is `multi_sign`.
    pub fn new(multi_sign: Address) -> Self {
        Self { multi_sign }
    }
}

impl Direction for HomeBridge {
    fn prefix(&self) -> Prefix {
        Prefix::Home
    }

    fn encode_call(&self, sender: Address, value: U256) -> Bytes {
        abi::issue_call(sender, value)
    }

    fn event_topics(&self) -> Vec<Option<H256>> {
        vec![
            Some(abi::event_topic(abi::TRANSFER_EVENT)),
            None,
            Some(abi::address_topic(self.multi_sign)),
        ]
    }
}

/// Foreign to home: tokens burned on the foreign chain are unlocked on the
/// home chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForeignBridge;

impl Direction for ForeignBridge {
    fn prefix(&self) -> Prefix {
        Prefix::Foreign
    }

    fn encode_call(&self, sender: Address, value: U256) -> Bytes {
        abi::unlock_call(sender, value)
    }

    fn event_topics(&self) -> Vec<Option<H256>> {
        vec![Some(abi::event_topic(abi::BURN_EVENT))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_only_watches_transfers_to_the_multi_sign() {
        let multi_sign = Address::from_low_u64_be(7);
        let topics = HomeBridge::new(multi_sign).event_topics();
        assert_eq!(topics.len(), 3);
        assert_eq!(topics[1], None);
        assert_eq!(topics[2], Some(abi::address_topic(multi_sign)));
    }

    #[test]
    fn directions_encode_opposite_calls() {
        let user = Address::from_low_u64_be(1);
        let value = U256::from(5u64);
        let home = HomeBridge::new(Address::zero());
        assert_eq!(home.prefix(), Prefix::Home);
        assert_eq!(home.encode_call(user, value), abi::issue_call(user, value));
        assert_eq!(ForeignBridge.prefix(), Prefix::Foreign);
        assert_eq!(
            ForeignBridge.encode_call(user, value),
            abi::unlock_call(user, value)
        );
    }
}
