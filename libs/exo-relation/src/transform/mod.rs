// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Lowering of relations into the concrete SQL AST.

pub(crate) mod join_util;
pub(crate) mod mutation_transformer;
pub(crate) mod predicate_transformer;
pub(crate) mod select_transformer;
