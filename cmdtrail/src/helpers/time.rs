use anyhow::{bail, Result};
use nix::time::{clock_gettime, ClockId};

/// Returns the wall-clock timestamp, in nanoseconds since the Unix epoch.
pub(crate) fn realtime_timestamp() -> Result<u64> {
    let realtime = clock_gettime(ClockId::CLOCK_REALTIME)?;

    let ts = realtime.tv_sec() * 1000000000 + realtime.tv_nsec();
    if ts < 0 {
        bail!("Wall-clock timestamp is before the epoch: {ts}");
    }

    Ok(ts as u64)
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    #[test]
    fn realtime_is_wall_clock() {
        let before = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos() as u64;
        let ts = realtime_timestamp().unwrap();
        let after = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos() as u64;

        assert!(before <= ts && ts <= after);
    }
}
