/// Scheduling hint applied to every worker thread of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    Background,
    Utility,
    #[default]
    Default,
    UserInitiated,
    UserInteractive,
}

impl Priority {
    /// Unix nice value for this class.
    pub fn nice(self) -> i32 {
        match self {
            Priority::Background => 10,
            Priority::Utility => 5,
            Priority::Default => 0,
            Priority::UserInitiated => -5,
            Priority::UserInteractive => -10,
        }
    }

    /// Applies the hint to the calling thread. Best effort: raising priority
    /// usually needs privileges, so a refusal is logged and ignored.
    pub fn apply_to_current_thread(self) {
        if self == Priority::Default {
            return;
        }
        apply_nice(self.nice());
    }
}

// On Linux the nice value is per thread, and `who == 0` targets the caller.
#[cfg(target_os = "linux")]
fn apply_nice(nice: i32) {
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, nice) };
    if rc != 0 {
        tracing::debug!(
            nice,
            error = %std::io::Error::last_os_error(),
            "could not apply thread priority"
        );
    }
}

#[cfg(not(target_os = "linux"))]
fn apply_nice(nice: i32) {
    tracing::debug!(nice, "thread priority hints are not supported on this target");
}
