// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//! Every event is an instant event; the thread id is the layer id, so each
//! layer gets its own track.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use tessera_core::time::{HostTime, Timebase};
use tessera_core::trace::TilingChange;
use tessera_core::tree::TreeKind;

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Timestamps are converted to microseconds using the provided [`Timebase`].
pub fn export(bytes: &[u8], timebase: Timebase, writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();

    for recorded in decode(bytes) {
        let ts = host_us(recorded.frame_time(), timebase);
        let event = match recorded {
            RecordedEvent::RasterScale(e) => json!({
                "ph": "i",
                "name": "RasterScale",
                "cat": "Scale",
                "ts": ts,
                "pid": tree_pid(e.tree),
                "tid": e.layer.0,
                "s": "t",
                "args": {
                    "old_contents_scale": e.old_contents_scale,
                    "contents_scale": e.contents_scale,
                    "low_res_contents_scale": e.low_res_contents_scale,
                    "pinching": e.pinching,
                    "animating": e.animating,
                    "source_scale_fixed": e.source_scale_fixed,
                }
            }),
            RecordedEvent::TilePriorities(e) => json!({
                "ph": "i",
                "name": "TilePriorities",
                "cat": "Priority",
                "ts": ts,
                "pid": tree_pid(e.tree),
                "tid": e.layer.0,
                "s": "t",
                "args": {
                    "now": e.now,
                    "soon": e.soon,
                    "eventually": e.eventually,
                    "required_for_activation": e.required_for_activation,
                }
            }),
            RecordedEvent::Sync(e) => json!({
                "ph": "i",
                "name": "Sync",
                "cat": "Tree",
                "ts": ts,
                "pid": tree_pid(TreeKind::Pending),
                "tid": e.layer.0,
                "s": "t",
                "args": {
                    "synced_high_res": e.synced_high_res,
                    "num_tilings": e.num_tilings,
                }
            }),
            RecordedEvent::Checkerboard(e) => json!({
                "ph": "i",
                "name": "Checkerboard",
                "cat": "Draw",
                "ts": ts,
                "pid": tree_pid(TreeKind::Active),
                "tid": e.layer.0,
                "s": "t",
                "args": {
                    "missing_tiles": e.missing_tiles,
                    "on_demand_missing_tiles": e.on_demand_missing_tiles,
                }
            }),
            RecordedEvent::Activation(e) => json!({
                "ph": "i",
                "name": "Activation",
                "cat": "Tree",
                "ts": ts,
                "pid": tree_pid(TreeKind::Active),
                "tid": 0,
                "s": "g",
                "args": {
                    "source_frame_number": e.source_frame_number,
                    "layer_count": e.layer_count,
                }
            }),
            RecordedEvent::Tiling(e) => json!({
                "ph": "i",
                "name": match e.change {
                    TilingChange::Added => "TilingAdded",
                    TilingChange::Removed => "TilingRemoved",
                },
                "cat": "Rich",
                "ts": ts,
                "pid": tree_pid(e.tree),
                "tid": e.layer.0,
                "s": "t",
                "args": {
                    "contents_scale": e.contents_scale,
                    "resolution": format!("{:?}", e.resolution),
                }
            }),
            RecordedEvent::TileEvicted(e) => json!({
                "ph": "i",
                "name": "TileEvicted",
                "cat": "Rich",
                "ts": ts,
                "pid": tree_pid(TreeKind::Active),
                "tid": e.layer.0,
                "s": "t",
                "args": {
                    "contents_scale": e.contents_scale,
                    "bin": format!("{:?}", e.bin),
                }
            }),
        };
        events.push(event);
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn tree_pid(tree: TreeKind) -> u32 {
    match tree {
        TreeKind::Pending => 0,
        TreeKind::Active => 1,
        TreeKind::Recycle => 2,
    }
}

fn host_us(t: HostTime, timebase: Timebase) -> f64 {
    t.to_nanos(timebase) as f64 / 1000.0
}
