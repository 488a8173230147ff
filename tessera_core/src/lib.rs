// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tiling, scale selection, and tile prioritization for picture-layer
//! compositing.
//!
//! `tessera_core` decides which rectangular tiles of a recorded picture
//! exist, at which contents scale, in which order they should be rastered or
//! evicted, and how tiling state moves between the pending, active, and
//! recycle trees of a double-buffered commit pipeline. It never touches
//! pixels: raster and upload happen elsewhere and report back through
//! [`TreeHost::notify_tile_ready`](tree::TreeHost::notify_tile_ready).
//!
//! It is `no_std` compatible (with `alloc`). Tiles live in a struct-of-arrays
//! registry addressed by generational handles, and layers on different
//! trees find each other by id through the host rather than by reference.
//!
//! # Architecture
//!
//! ```text
//!   commit(LayerUpdate…) ──► pending tree
//!                               │ update_tiles
//!                               ▼
//!          ideal scales ──► raster scales ──► TilingSet ──► tile priorities
//!                                                 │               │
//!                                   coverage ◄────┘               ▼
//!                                  (quad emission)        raster / eviction
//!                                                             iterators
//!   activate() ──► active tree ──► recycle tree ──► next commit
//! ```
//!
//! **[`layer`]** — [`PictureLayer`](layer::PictureLayer): the raster scale
//! state machine, cross-tree sync and tile readiness checks.
//!
//! **[`tiling_set`]** and **[`tiling`]** — Tilings sorted by scale, lazy tile
//! creation, priority rects (visible, skewport, soon border, eventually),
//! and coverage iteration that partitions a query rect across tilings.
//!
//! **[`tiling_data`]** — Grid math for one tiling.
//!
//! **[`tile`]** — The [`TileStore`](tile::TileStore) registry: draw state,
//! per-tree priorities and holder counts.
//!
//! **[`tree`]** — [`TreeHost`](tree::TreeHost): commit, activation, eviction
//! and twin resolution.
//!
//! **[`queue`]** — Raster and eviction iterators.
//!
//! **[`trace`]** — [`TraceSink`](trace::TraceSink) trait and event types,
//! with the zero-overhead [`Tracer`](trace::Tracer) wrapper.
//!
//! **[`settings`]**, **[`geometry`]**, **[`occlusion`]**,
//! **[`raster_source`]**, **[`time`]** — Configuration presets, rect helpers,
//! occlusion queries, recordings and host time.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-tiling and
//!   per-tile eviction events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod geometry;
pub mod layer;
pub mod occlusion;
pub mod queue;
pub mod raster_source;
pub mod settings;
pub mod tile;
pub mod tiling;
pub mod tiling_data;
pub mod tiling_set;
pub mod time;
pub mod trace;
pub mod tree;
