// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Frame times
//! are converted to microseconds using a [`Timebase`].

use std::io::Write;

use tessera_core::time::{HostTime, Timebase};
use tessera_core::trace::{
    ActivationEvent, CheckerboardEvent, RasterScaleEvent, SyncEvent, TileEvictedEvent,
    TilePrioritiesEvent, TilingChange, TilingEvent, TraceSink,
};
use tessera_core::tree::TreeKind;

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    timebase: Timebase,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("timebase", &self.timebase)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr(timebase: Timebase) -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
            timebase,
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }

    /// Consumes the sink and returns its writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn host_us(&self, t: HostTime) -> f64 {
        t.to_nanos(self.timebase) as f64 / 1000.0
    }
}

fn tree_name(tree: TreeKind) -> &'static str {
    match tree {
        TreeKind::Pending => "pending",
        TreeKind::Active => "active",
        TreeKind::Recycle => "recycle",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_raster_scale(&mut self, e: &RasterScaleEvent) {
        let mut flags = String::new();
        for (set, name) in [
            (e.pinching, " pinch"),
            (e.animating, " anim"),
            (e.source_scale_fixed, " pinned"),
        ] {
            if set {
                flags.push_str(name);
            }
        }
        let _ = writeln!(
            self.writer,
            "[raster-scale] {:.1}µs {} {:?} {} -> {} low={}{flags}",
            self.host_us(e.frame_time),
            tree_name(e.tree),
            e.layer,
            e.old_contents_scale,
            e.contents_scale,
            e.low_res_contents_scale,
        );
    }

    fn on_tile_priorities(&mut self, e: &TilePrioritiesEvent) {
        let _ = writeln!(
            self.writer,
            "[priorities] {:.1}µs {} {:?} now={} soon={} eventually={} required={}",
            self.host_us(e.frame_time),
            tree_name(e.tree),
            e.layer,
            e.now,
            e.soon,
            e.eventually,
            e.required_for_activation,
        );
    }

    fn on_sync(&mut self, e: &SyncEvent) {
        let _ = writeln!(
            self.writer,
            "[sync] {:.1}µs {:?} tilings={} high_res={}",
            self.host_us(e.frame_time),
            e.layer,
            e.num_tilings,
            e.synced_high_res,
        );
    }

    fn on_checkerboard(&mut self, e: &CheckerboardEvent) {
        let _ = writeln!(
            self.writer,
            "[checkerboard] {:.1}µs {:?} missing={} on_demand={}",
            self.host_us(e.frame_time),
            e.layer,
            e.missing_tiles,
            e.on_demand_missing_tiles,
        );
    }

    fn on_activation(&mut self, e: &ActivationEvent) {
        let _ = writeln!(
            self.writer,
            "[activate] {:.1}µs source_frame={} layers={}",
            self.host_us(e.frame_time),
            e.source_frame_number,
            e.layer_count,
        );
    }

    fn on_tiling(&mut self, e: &TilingEvent) {
        let change = match e.change {
            TilingChange::Added => "+",
            TilingChange::Removed => "-",
        };
        let _ = writeln!(
            self.writer,
            "[tiling] {:.1}µs {} {:?} {change}{} {:?}",
            self.host_us(e.frame_time),
            tree_name(e.tree),
            e.layer,
            e.contents_scale,
            e.resolution,
        );
    }

    fn on_tile_evicted(&mut self, e: &TileEvictedEvent) {
        let _ = writeln!(
            self.writer,
            "[evict] {:.1}µs {:?} scale={} bin={:?}",
            self.host_us(e.frame_time),
            e.layer,
            e.contents_scale,
            e.bin,
        );
    }
}
