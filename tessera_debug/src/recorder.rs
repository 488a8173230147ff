// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`]. Scales are stored as raw `f64` bits.

use tessera_core::layer::LayerId;
use tessera_core::tile::{PriorityBin, TileResolution};
use tessera_core::time::HostTime;
use tessera_core::trace::{
    ActivationEvent, CheckerboardEvent, RasterScaleEvent, SyncEvent, TileEvictedEvent,
    TilePrioritiesEvent, TilingChange, TilingEvent, TraceSink,
};
use tessera_core::tree::TreeKind;

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_RASTER_SCALE: u8 = 1;
const TAG_TILE_PRIORITIES: u8 = 2;
const TAG_SYNC: u8 = 3;
const TAG_CHECKERBOARD: u8 = 4;
const TAG_ACTIVATION: u8 = 5;
const TAG_TILING: u8 = 6;
const TAG_TILE_EVICTED: u8 = 7;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.write_u64(v.to_bits());
    }

    fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    fn write_header(&mut self, tag: u8, frame_time: HostTime) {
        self.write_u8(tag);
        self.write_u64(frame_time.ticks());
    }

    fn write_tree(&mut self, tree: TreeKind) {
        self.write_u8(match tree {
            TreeKind::Pending => 0,
            TreeKind::Active => 1,
            TreeKind::Recycle => 2,
        });
    }

    fn write_resolution(&mut self, resolution: TileResolution) {
        self.write_u8(match resolution {
            TileResolution::High => 0,
            TileResolution::Low => 1,
            TileResolution::NonIdeal => 2,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_raster_scale(&mut self, e: &RasterScaleEvent) {
        self.write_header(TAG_RASTER_SCALE, e.frame_time);
        self.write_tree(e.tree);
        self.write_u32(e.layer.0);
        self.write_f64(e.old_contents_scale);
        self.write_f64(e.contents_scale);
        self.write_f64(e.low_res_contents_scale);
        self.write_bool(e.pinching);
        self.write_bool(e.animating);
        self.write_bool(e.source_scale_fixed);
    }

    fn on_tile_priorities(&mut self, e: &TilePrioritiesEvent) {
        self.write_header(TAG_TILE_PRIORITIES, e.frame_time);
        self.write_tree(e.tree);
        self.write_u32(e.layer.0);
        self.write_u32(e.now);
        self.write_u32(e.soon);
        self.write_u32(e.eventually);
        self.write_u32(e.required_for_activation);
    }

    fn on_sync(&mut self, e: &SyncEvent) {
        self.write_header(TAG_SYNC, e.frame_time);
        self.write_u32(e.layer.0);
        self.write_bool(e.synced_high_res);
        self.write_u32(e.num_tilings);
    }

    fn on_checkerboard(&mut self, e: &CheckerboardEvent) {
        self.write_header(TAG_CHECKERBOARD, e.frame_time);
        self.write_u32(e.layer.0);
        self.write_u32(e.missing_tiles);
        self.write_u32(e.on_demand_missing_tiles);
    }

    fn on_activation(&mut self, e: &ActivationEvent) {
        self.write_header(TAG_ACTIVATION, e.frame_time);
        self.write_u64(e.source_frame_number);
        self.write_u32(e.layer_count);
    }

    fn on_tiling(&mut self, e: &TilingEvent) {
        self.write_header(TAG_TILING, e.frame_time);
        self.write_tree(e.tree);
        self.write_u32(e.layer.0);
        self.write_f64(e.contents_scale);
        self.write_resolution(e.resolution);
        self.write_bool(e.change == TilingChange::Added);
    }

    fn on_tile_evicted(&mut self, e: &TileEvictedEvent) {
        self.write_header(TAG_TILE_EVICTED, e.frame_time);
        self.write_u32(e.layer.0);
        self.write_f64(e.contents_scale);
        self.write_u8(match e.bin {
            PriorityBin::Now => 0,
            PriorityBin::Soon => 1,
            PriorityBin::Eventually => 2,
        });
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedEvent {
    /// A [`RasterScaleEvent`].
    RasterScale(RasterScaleEvent),
    /// A [`TilePrioritiesEvent`].
    TilePriorities(TilePrioritiesEvent),
    /// A [`SyncEvent`].
    Sync(SyncEvent),
    /// A [`CheckerboardEvent`].
    Checkerboard(CheckerboardEvent),
    /// An [`ActivationEvent`].
    Activation(ActivationEvent),
    /// A [`TilingEvent`].
    Tiling(TilingEvent),
    /// A [`TileEvictedEvent`].
    TileEvicted(TileEvictedEvent),
}

impl RecordedEvent {
    /// Frame time of the tree that emitted the event.
    #[must_use]
    pub fn frame_time(&self) -> HostTime {
        match self {
            Self::RasterScale(e) => e.frame_time,
            Self::TilePriorities(e) => e.frame_time,
            Self::Sync(e) => e.frame_time,
            Self::Checkerboard(e) => e.frame_time,
            Self::Activation(e) => e.frame_time,
            Self::Tiling(e) => e.frame_time,
            Self::TileEvicted(e) => e.frame_time,
        }
    }
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
///
/// Stops at the first unknown tag or truncated record.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?.try_into().ok()?;
        self.pos += N;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[v]| v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_f64(&mut self) -> Option<f64> {
        self.read_u64().map(f64::from_bits)
    }

    fn read_bool(&mut self) -> Option<bool> {
        self.read_u8().map(|v| v != 0)
    }

    fn read_time(&mut self) -> Option<HostTime> {
        self.read_u64().map(HostTime)
    }

    fn read_layer(&mut self) -> Option<LayerId> {
        self.read_u32().map(LayerId)
    }

    fn read_tree(&mut self) -> Option<TreeKind> {
        Some(match self.read_u8()? {
            0 => TreeKind::Pending,
            1 => TreeKind::Active,
            _ => TreeKind::Recycle,
        })
    }

    fn read_resolution(&mut self) -> Option<TileResolution> {
        Some(match self.read_u8()? {
            0 => TileResolution::High,
            1 => TileResolution::Low,
            _ => TileResolution::NonIdeal,
        })
    }

    fn read_bin(&mut self) -> Option<PriorityBin> {
        Some(match self.read_u8()? {
            0 => PriorityBin::Now,
            1 => PriorityBin::Soon,
            _ => PriorityBin::Eventually,
        })
    }

    fn decode_raster_scale(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::RasterScale(RasterScaleEvent {
            frame_time: self.read_time()?,
            tree: self.read_tree()?,
            layer: self.read_layer()?,
            old_contents_scale: self.read_f64()?,
            contents_scale: self.read_f64()?,
            low_res_contents_scale: self.read_f64()?,
            pinching: self.read_bool()?,
            animating: self.read_bool()?,
            source_scale_fixed: self.read_bool()?,
        }))
    }

    fn decode_tile_priorities(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::TilePriorities(TilePrioritiesEvent {
            frame_time: self.read_time()?,
            tree: self.read_tree()?,
            layer: self.read_layer()?,
            now: self.read_u32()?,
            soon: self.read_u32()?,
            eventually: self.read_u32()?,
            required_for_activation: self.read_u32()?,
        }))
    }

    fn decode_sync(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Sync(SyncEvent {
            frame_time: self.read_time()?,
            layer: self.read_layer()?,
            synced_high_res: self.read_bool()?,
            num_tilings: self.read_u32()?,
        }))
    }

    fn decode_checkerboard(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Checkerboard(CheckerboardEvent {
            frame_time: self.read_time()?,
            layer: self.read_layer()?,
            missing_tiles: self.read_u32()?,
            on_demand_missing_tiles: self.read_u32()?,
        }))
    }

    fn decode_activation(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Activation(ActivationEvent {
            frame_time: self.read_time()?,
            source_frame_number: self.read_u64()?,
            layer_count: self.read_u32()?,
        }))
    }

    fn decode_tiling(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Tiling(TilingEvent {
            frame_time: self.read_time()?,
            tree: self.read_tree()?,
            layer: self.read_layer()?,
            contents_scale: self.read_f64()?,
            resolution: self.read_resolution()?,
            change: if self.read_bool()? {
                TilingChange::Added
            } else {
                TilingChange::Removed
            },
        }))
    }

    fn decode_tile_evicted(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::TileEvicted(TileEvictedEvent {
            frame_time: self.read_time()?,
            layer: self.read_layer()?,
            contents_scale: self.read_f64()?,
            bin: self.read_bin()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_RASTER_SCALE => self.decode_raster_scale(),
            TAG_TILE_PRIORITIES => self.decode_tile_priorities(),
            TAG_SYNC => self.decode_sync(),
            TAG_CHECKERBOARD => self.decode_checkerboard(),
            TAG_ACTIVATION => self.decode_activation(),
            TAG_TILING => self.decode_tiling(),
            TAG_TILE_EVICTED => self.decode_tile_evicted(),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
