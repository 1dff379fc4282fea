// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Kagati Foundation

pub mod block;
pub mod schedule;
pub mod rpo;

pub use block::{BasicBlock, BlockId, Control};
pub use schedule::Schedule;
