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

/// The query API listens on port `3000` by default.
pub const fn port() -> u16 {
    3000
}
/// Workers fire every `4` seconds.
pub const fn interval() -> u64 {
    4
}
/// A tick gets at most `20` seconds.
pub const fn tick_timeout() -> u64 {
    20
}
/// A signer looks at `30` proposals per tick.
pub const fn signer_batch() -> usize {
    30
}
/// Scanning starts at block `1` when no cursor is stored.
pub const fn from_height() -> u64 {
    1
}
/// The maximum blocks per step is set to `100` by default.
pub const fn max_blocks_per_step() -> u64 {
    100
}
/// Gas limit of a suggest transaction.
pub const fn gas_limit() -> u64 {
    300_000
}
/// The print progress interval is set to `600_000` (10 minutes) by default.
pub const fn print_progress_interval() -> u64 {
    600_000
}
/// Features are enabled unless turned off.
pub const fn enabled() -> bool {
    true
}
/// Networks are assumed to need finality buffering.
pub fn net_type() -> String {
    String::from(crate::ETH_NET_TYPE)
}
