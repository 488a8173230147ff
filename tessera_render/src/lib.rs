// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Draw quads from [`tessera_core`] tile coverage.
//!
//! This crate sits between the tiling core and a backend. For each active
//! layer it walks the layer's coverage and turns ready tiles into quads:
//!
//! - [`DrawQuad`] — a tile, picture, solid-color or checkerboard quad
//! - [`QuadList`] — the ordered quads of one frame, with their
//!   [`SharedQuadState`]
//! - [`append_quads`] — appends one layer and cleans up the tilings it did
//!   not use
//! - [`contents_resource`] — the single resource of a mask layer

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

mod append;
mod quad;

pub use append::{AppendQuadsData, AppendQuadsOptions, append_quads, contents_resource};
pub use quad::{
    CheckerboardQuad, DrawQuad, PictureQuad, QuadList, SharedQuadState, SolidColorQuad, TileQuad,
};
