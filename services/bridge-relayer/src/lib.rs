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

#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # Bridge Relayer Crate 🕸️
//!
//! Relays token transfers between two EVM chains, the *home* chain where the
//! token is locked and the *foreign* chain where its bridged twin is issued.
//!
//! ## Overview
//!
//! The relayer runs four workers on a shared cadence:
//!
//!   1. A watcher on each chain turns the bridge events into proposals: a
//!      deposit to the home multi-sign contract proposes an `issue` on the
//!      foreign chain, a burn on the foreign token proposes an `unlock` on
//!      the home chain.
//!   2. A signer on each chain suggests the proposals headed to it to the
//!      multi-sign contract of that chain and follows the suggestion until it
//!      is mined.
//!
//! Every proposal is persisted before anything is sent, so the relayer can be
//! restarted at any point without losing or duplicating work. A read only
//! HTTP API exposes the proposals, the watcher cursors and the metrics.

/// A module for starting the workers and the query API.
pub mod service;

pub use bridge_relayer_utils::{Error, Result};
