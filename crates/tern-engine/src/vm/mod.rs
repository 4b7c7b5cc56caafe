// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The bytecode virtual machine.
//!
//! ## Structure
//!
//! - `interpreter` - The fetch-decode-execute loop
//! - `frame` - Call frame records
//! - `config` - Stack and frame limits
//! - `output` - A shared in-memory output sink

mod config;
mod frame;
mod interpreter;
mod output;

pub use config::{DEFAULT_MAX_FRAMES, DEFAULT_MAX_STACK, VmConfig};
pub use frame::Frame;
pub use interpreter::VM;
pub use output::SharedOutput;
