use std::{fs, os::unix::fs::MetadataExt};

use caps::{self, CapSet, Capability};
use log::warn;

use crate::core::probe::ProbeAttachError;

/// Check the capabilities needed to load and attach the BPF program are held,
/// allowing to bail out early and to explain what's missing to the user.
pub(crate) fn collection_prerequisites() -> Result<(), ProbeAttachError> {
    // Check if we're running in an unprivileged userns (container) as we'll
    // fail eventually in such case even if we have all the right capabilities.
    if fs::metadata("/proc").map(|m| m.uid() != 0).unwrap_or(false) {
        warn!("cmdtrail likely runs in an unprivileged userns, loading the BPF program might fail with -EPERM (-1) later.");
    }

    let has = |cap| {
        caps::has_cap(None, CapSet::Effective, cap)
            .map_err(|e| ProbeAttachError::Privilege(format!("can't read capabilities: {e}")))
    };

    // CAP_SYS_ADMIN covers everything on kernels predating CAP_BPF.
    if has(Capability::CAP_SYS_ADMIN)? {
        return Ok(());
    }

    if !has(Capability::CAP_BPF)? {
        return Err(ProbeAttachError::Privilege(
            "cmdtrail does not have CAP_BPF: can't load the BPF program".to_string(),
        ));
    }

    // Uprobes are perf events.
    if !has(Capability::CAP_PERFMON)? {
        return Err(ProbeAttachError::Privilege(
            "cmdtrail does not have CAP_PERFMON: can't attach the return probe".to_string(),
        ));
    }

    Ok(())
}
