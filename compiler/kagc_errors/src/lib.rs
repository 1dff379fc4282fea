// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Kagati Foundation

pub mod internal;

pub use internal::{InternalResult, InvariantViolation};
