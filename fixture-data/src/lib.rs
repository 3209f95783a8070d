// Copyright (c) The tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod models;
pub mod suite_tree;
