//! # Uretprobe
//!
//! Module to handle attaching the readline program to the return of an
//! exported function in a shared library. The program lives in two parts, the
//! Rust code (here) and the eBPF one (bpf/readline.bpf.c, compiled and
//! embedded at build time).
//!
//! Every return of the function, in every process mapping the library (or in
//! the configured one), emits one raw event in the `readline_events` perf
//! buffer.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use libbpf_rs::MapCore;
use log::{info, warn};

use crate::{
    config::ProbeConfig,
    core::{
        events::{open_perf_buffer, poll_perf_events, RawEventSender},
        inspect::collection_prerequisites,
        probe::{user::check_function, EventSource, ProbeAttachError},
    },
    helpers::signals::Running,
};

mod readline_bpf {
    include!(concat!(env!("OUT_DIR"), "/readline.rs"));
}

const READLINE_PROG: &str = "readline_return";
const READLINE_MAP: &str = "readline_events";

/// Where to attach the return probe.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct UretprobeTarget {
    pub(crate) library: PathBuf,
    pub(crate) symbol: String,
    /// -1 for all processes.
    pub(crate) pid: i32,
}

impl From<&ProbeConfig> for UretprobeTarget {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            library: config.library.clone(),
            symbol: config.symbol.clone(),
            pid: config.pid,
        }
    }
}

pub(crate) struct UretprobeBuilder {
    target: UretprobeTarget,
    perf_pages: usize,
    links: Vec<libbpf_rs::Link>,
    // Holds the event sender.
    perf: Option<libbpf_rs::PerfBuffer<'static>>,
    obj: Option<libbpf_rs::Object>,
}

impl UretprobeBuilder {
    pub(crate) fn new(target: UretprobeTarget, perf_pages: usize) -> Self {
        Self {
            target,
            perf_pages,
            links: Vec::new(),
            perf: None,
            obj: None,
        }
    }

    fn attach_err(&self, reason: String) -> ProbeAttachError {
        ProbeAttachError::Attach {
            symbol: self.target.symbol.clone(),
            path: self.target.library.clone(),
            reason,
        }
    }
}

impl EventSource for UretprobeBuilder {
    fn attach(&mut self, tx: RawEventSender) -> Result<(), ProbeAttachError> {
        if self.obj.is_some() {
            return Err(self.attach_err("already attached".to_string()));
        }

        collection_prerequisites()?;
        check_function(&self.target.library, &self.target.symbol)?;

        if readline_bpf::DATA.is_empty() {
            return Err(ProbeAttachError::Load(
                "the BPF object was not built (clang missing at build time?)".to_string(),
            ));
        }

        let open_obj = libbpf_rs::ObjectBuilder::default()
            .open_memory(readline_bpf::DATA)
            .map_err(|e| ProbeAttachError::Load(e.to_string()))?;
        let obj = open_obj
            .load()
            .map_err(|e| ProbeAttachError::Load(e.to_string()))?;

        // The perf buffer must be there before the probe fires.
        let perf = {
            let map = obj
                .maps()
                .find(|m| m.name() == READLINE_MAP)
                .ok_or_else(|| ProbeAttachError::Load(format!("couldn't get {READLINE_MAP} map")))?;
            open_perf_buffer(&map, tx, self.perf_pages)
                .map_err(|e| ProbeAttachError::Load(e.to_string()))?
        };

        // libbpf resolves the function offset itself from its name.
        let link = obj
            .progs_mut()
            .find(|p| p.name() == READLINE_PROG)
            .ok_or_else(|| ProbeAttachError::Load(format!("couldn't get {READLINE_PROG} program")))?
            .attach_uprobe_with_opts(
                self.target.pid,
                &self.target.library,
                0,
                libbpf_rs::UprobeOpts {
                    retprobe: true,
                    func_name: Some(self.target.symbol.clone()),
                    ..Default::default()
                },
            )
            .map_err(|e| self.attach_err(e.to_string()))?;

        self.links.push(link);
        self.perf = Some(perf);
        self.obj = Some(obj);

        info!(
            "Return probe attached to {} ({}){}",
            self.target.symbol,
            self.target.library.display(),
            match self.target.pid {
                -1 => String::new(),
                pid => format!(" for pid {pid}"),
            }
        );
        Ok(())
    }

    fn pump(&mut self, run: &Running) -> Result<()> {
        let perf = self
            .perf
            .as_ref()
            .ok_or_else(|| anyhow!("Can't pump events, return probe is not attached"))?;

        poll_perf_events(perf, run);
        Ok(())
    }

    fn detach(&mut self) -> Result<()> {
        let mut failed = 0;

        self.links.drain(..).for_each(|link| {
            if let Err(e) = link.detach() {
                warn!("Could not detach return probe: {e}");
                failed += 1;
            }
        });
        self.perf = None;
        self.obj = None;

        match failed {
            0 => Ok(()),
            n => Err(anyhow!("{n} link(s) could not be detached")),
        }
    }
}

impl Drop for UretprobeBuilder {
    fn drop(&mut self) {
        if !self.links.is_empty() {
            // Failures were already reported.
            let _ = self.detach();
        }
    }
}
