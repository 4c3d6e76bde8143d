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

use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::keccak256;

use bridge_relayer_utils::Error;

/// `Transfer(address,address,uint256)`, watched on the home token.
pub const TRANSFER_EVENT: &str = "Transfer(address,address,uint256)";
/// `Burn(address,uint256)`, watched on the foreign token.
pub const BURN_EVENT: &str = "Burn(address,uint256)";
/// Mints the bridged token on the foreign chain.
pub const ISSUE_FUNCTION: &str = "issue(address,uint256)";
/// Releases the locked token on the home chain.
pub const UNLOCK_FUNCTION: &str = "unlock(address,uint256)";
/// Multi-sign contract entry point taking a source tx hash and a call.
pub const SUGGEST_FUNCTION: &str = "suggest(bytes32,bytes)";

/// keccak256 of `bytes`.
pub fn keccak_hash(bytes: &[u8]) -> H256 {
    H256::from(keccak256(bytes))
}

/// The topic of an event signature, like `Transfer(address,address,uint256)`.
pub fn event_topic(signature: &str) -> H256 {
    keccak_hash(signature.as_bytes())
}

/// An address as an indexed event parameter.
pub fn address_topic(address: Address) -> H256 {
    H256::from(address)
}

/// Decodes an indexed `address` parameter.
pub fn decode_address(topic: &H256) -> bridge_relayer_utils::Result<Address> {
    match abi::decode(&[ParamType::Address], topic.as_bytes())?.pop() {
        Some(Token::Address(address)) => Ok(address),
        _ => Err(Error::MalformedLog("expected an address topic".into())),
    }
}

/// Decodes a `uint256` from the first word of `data`.
pub fn decode_uint(data: &[u8]) -> bridge_relayer_utils::Result<U256> {
    match abi::decode(&[ParamType::Uint(256)], data)?.pop() {
        Some(Token::Uint(value)) => Ok(value),
        _ => Err(Error::MalformedLog("expected an uint256 in data".into())),
    }
}

/// Encodes a call: the 4 byte selector of `signature` followed by `args`.
pub fn encode_call(signature: &str, args: &[Token]) -> Bytes {
    let selector = &keccak256(signature.as_bytes())[..4];
    let mut data = selector.to_vec();
    data.extend(abi::encode(args));
    data.into()
}

/// `issue(user, value)` for the foreign chain.
pub fn issue_call(user: Address, value: U256) -> Bytes {
    encode_call(ISSUE_FUNCTION, &[Token::Address(user), Token::Uint(value)])
}

/// `unlock(user, value)` for the home chain.
pub fn unlock_call(user: Address, value: U256) -> Bytes {
    encode_call(UNLOCK_FUNCTION, &[Token::Address(user), Token::Uint(value)])
}

/// `suggest(source_tx, calldata)` for the multi-sign contract.
pub fn suggest_call(source_tx: H256, calldata: &Bytes) -> Bytes {
    encode_call(
        SUGGEST_FUNCTION,
        &[
            Token::FixedBytes(source_tx.as_bytes().to_vec()),
            Token::Bytes(calldata.to_vec()),
        ],
    )
}

/// The id of the proposal made from the event of `source_tx`:
/// `keccak256(source_tx ‖ calldata ‖ 0x00)`.
pub fn proposal_id(source_tx: H256, calldata: &[u8]) -> H256 {
    let mut preimage = Vec::with_capacity(32 + calldata.len() + 1);
    preimage.extend_from_slice(source_tx.as_bytes());
    preimage.extend_from_slice(calldata);
    preimage.push(0u8);
    keccak_hash(&preimage)
}
