//! Handles the BPF to Rust raw event retrieval.

use std::time::Duration;

use anyhow::Result;
use log::{debug, error};

use crate::{core::events::RawEventSender, helpers::signals::Running};

/// Timeout when polling for new events from BPF.
const BPF_EVENTS_POLL_TIMEOUT_MS: u64 = 200;

/// Opens the perf buffer backing `map`. Every sample is copied as-is into
/// `tx`, decoding happens on the consumer side. This must be done before the
/// program emitting into `map` is attached, otherwise early samples are lost
/// without being accounted for.
///
/// `tx` lives as long as the returned buffer: dropping it closes the channel.
pub(crate) fn open_perf_buffer(
    map: &libbpf_rs::Map,
    tx: RawEventSender,
    pages: usize,
) -> Result<libbpf_rs::PerfBuffer<'static>> {
    let lost_tx = tx.clone();
    let perf = libbpf_rs::PerfBufferBuilder::new(map)
        .pages(pages)
        .sample_cb(move |_cpu: i32, data: &[u8]| {
            tx.push(data);
        })
        .lost_cb(move |cpu: i32, count: u64| lost_tx.lost(cpu, count))
        .build()?;

    debug!("Perf buffer opened ({pages} pages per cpu)");
    Ok(perf)
}

/// Polls `perf` until `run` says to stop. This runs in the calling thread.
pub(crate) fn poll_perf_events(perf: &libbpf_rs::PerfBuffer, run: &Running) {
    while run.running() {
        if let Err(e) = perf.poll(Duration::from_millis(BPF_EVENTS_POLL_TIMEOUT_MS)) {
            match e.kind() {
                // Received EINTR while polling the perf buffer, normally
                // triggered by an actual interruption (signal). The
                // termination, if any, is seen on the next iteration.
                libbpf_rs::ErrorKind::Interrupted => (),
                _ => error!("Unexpected error while polling ({e})"),
            }
        }
    }
}
