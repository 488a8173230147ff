// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for tiling decisions.
//!
//! This module provides a [`TraceSink`] trait with one method per event. The
//! tree host, layers and quad emission call these at each decision point:
//! raster-scale changes, priority updates, cross-tree syncs, activation and
//! checkerboarding. All method bodies default to no-ops, so implementing only
//! the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! # Crate features
//!
//! - `trace` — enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`) — gates [`TilingEvent`] and
//!   [`TileEvictedEvent`] plus the corresponding `TraceSink` methods.

use crate::layer::LayerId;
#[cfg(feature = "trace-rich")]
use crate::tile::{PriorityBin, TileResolution};
use crate::time::HostTime;
use crate::tree::TreeKind;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// What happened to a tiling.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TilingChange {
    /// A tiling was created.
    Added,
    /// A tiling and its tiles were dropped.
    Removed,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when a layer recalculates its raster scales.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RasterScaleEvent {
    /// Begin-frame time of the tree.
    pub frame_time: HostTime,
    /// Tree the layer lives on.
    pub tree: TreeKind,
    /// The layer.
    pub layer: LayerId,
    /// Raster contents scale before the change (zero if unset).
    pub old_contents_scale: f64,
    /// New raster contents scale.
    pub contents_scale: f64,
    /// New low-res companion scale.
    pub low_res_contents_scale: f64,
    /// Whether a pinch gesture was active.
    pub pinching: bool,
    /// Whether the screen-space transform was animating.
    pub animating: bool,
    /// Whether the source scale is pinned.
    pub source_scale_fixed: bool,
}

/// Per-layer bin counts after a priority update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TilePrioritiesEvent {
    /// Begin-frame time of the tree.
    pub frame_time: HostTime,
    /// Tree the layer lives on.
    pub tree: TreeKind,
    /// The layer.
    pub layer: LayerId,
    /// Tiles in the NOW bin.
    pub now: u32,
    /// Tiles in the SOON bin.
    pub soon: u32,
    /// Tiles in the EVENTUALLY bin.
    pub eventually: u32,
    /// Tiles blocking activation.
    pub required_for_activation: u32,
}

/// Emitted when a pending layer mirrors its active twin's tilings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyncEvent {
    /// Begin-frame time of the pending tree.
    pub frame_time: HostTime,
    /// The layer.
    pub layer: LayerId,
    /// Whether the twin's high-res tiling was mirrored.
    pub synced_high_res: bool,
    /// Tilings on the pending layer after the sync.
    pub num_tilings: u32,
}

/// Emitted when quad emission could not find tiles for visible content.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CheckerboardEvent {
    /// Begin-frame time of the active tree.
    pub frame_time: HostTime,
    /// The layer.
    pub layer: LayerId,
    /// Missing pieces inside the tile priority viewport.
    pub missing_tiles: u32,
    /// Picture-fallback tiles that could not be drawn on demand.
    pub on_demand_missing_tiles: u32,
}

/// Emitted when the pending tree is activated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActivationEvent {
    /// Begin-frame time of the new active tree.
    pub frame_time: HostTime,
    /// Commit that produced the activated tree.
    pub source_frame_number: u64,
    /// Layers on the new active tree.
    pub layer_count: u32,
}

/// A tiling was added to or removed from a layer.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TilingEvent {
    /// Begin-frame time of the tree.
    pub frame_time: HostTime,
    /// Tree the layer lives on.
    pub tree: TreeKind,
    /// The layer.
    pub layer: LayerId,
    /// Contents scale of the tiling.
    pub contents_scale: f64,
    /// Resolution at the time of the change.
    pub resolution: TileResolution,
    /// Added or removed.
    pub change: TilingChange,
}

/// A tile was evicted under memory pressure.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileEvictedEvent {
    /// Begin-frame time of the active tree.
    pub frame_time: HostTime,
    /// Owning layer.
    pub layer: LayerId,
    /// Contents scale of the tile.
    pub contents_scale: f64,
    /// Combined priority bin at eviction.
    pub bin: PriorityBin,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the tiling pipeline.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a layer recalculates its raster scales.
    fn on_raster_scale(&mut self, e: &RasterScaleEvent) {
        _ = e;
    }

    /// Called after a layer updates its tile priorities.
    fn on_tile_priorities(&mut self, e: &TilePrioritiesEvent) {
        _ = e;
    }

    /// Called after a pending layer syncs from its active twin.
    fn on_sync(&mut self, e: &SyncEvent) {
        _ = e;
    }

    /// Called when quad emission found missing tiles.
    fn on_checkerboard(&mut self, e: &CheckerboardEvent) {
        _ = e;
    }

    /// Called when the pending tree activates.
    fn on_activation(&mut self, e: &ActivationEvent) {
        _ = e;
    }

    /// Called when a tiling is added or removed (requires `trace-rich`).
    #[cfg(feature = "trace-rich")]
    fn on_tiling(&mut self, e: &TilingEvent) {
        _ = e;
    }

    /// Called when a tile is evicted (requires `trace-rich`).
    #[cfg(feature = "trace-rich")]
    fn on_tile_evicted(&mut self, e: &TileEvictedEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`RasterScaleEvent`].
    #[inline]
    pub fn raster_scale(&mut self, e: &RasterScaleEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_raster_scale(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`TilePrioritiesEvent`].
    #[inline]
    pub fn tile_priorities(&mut self, e: &TilePrioritiesEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_tile_priorities(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`SyncEvent`].
    #[inline]
    pub fn sync(&mut self, e: &SyncEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_sync(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`CheckerboardEvent`].
    #[inline]
    pub fn checkerboard(&mut self, e: &CheckerboardEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_checkerboard(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits an [`ActivationEvent`].
    #[inline]
    pub fn activation(&mut self, e: &ActivationEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_activation(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`TilingEvent`] (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn tiling(&mut self, e: &TilingEvent) {
        if let Some(s) = &mut self.sink {
            s.on_tiling(e);
        }
    }

    /// Emits a [`TileEvictedEvent`] (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn tile_evicted(&mut self, e: &TileEvictedEvent) {
        if let Some(s) = &mut self.sink {
            s.on_tile_evicted(e);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
