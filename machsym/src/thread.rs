//! Main thread identity
//!
//! Backtrace reports mark the frames of the process's main thread. Which
//! thread that is can only be observed from the thread itself, so `main`
//! captures it once at startup and hands the [`MainThread`] down to whatever
//! builds reports.

#![allow(unsafe_code)]

use serde::Serialize;

use crate::domain::ThreadId;

/// The thread that called [`MainThread::capture`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MainThread {
    id: ThreadId,
    /// Mach thread port (Apple only).
    mach_port: Option<u32>,
}

impl MainThread {
    /// Record the calling thread. Call this first thing in `main`.
    #[must_use]
    pub fn capture() -> Self {
        Self { id: current_thread_id(), mach_port: current_mach_port() }
    }

    #[must_use]
    pub fn id(&self) -> ThreadId {
        self.id
    }

    #[must_use]
    pub fn mach_port(&self) -> Option<u32> {
        self.mach_port
    }

    /// Check whether the calling thread is the captured one.
    #[must_use]
    pub fn is_current(&self) -> bool {
        current_thread_id() == self.id
    }

    /// Check whether `thread` is the captured one.
    #[must_use]
    pub fn is(&self, thread: ThreadId) -> bool {
        thread == self.id
    }
}

/// OS-level id of the calling thread.
#[cfg(target_vendor = "apple")]
#[must_use]
pub fn current_thread_id() -> ThreadId {
    let mut id = 0u64;
    // SAFETY: pthread_self() is always a valid handle for the calling thread.
    unsafe { libc::pthread_threadid_np(libc::pthread_self(), &mut id) };
    ThreadId(id)
}

/// OS-level id of the calling thread.
#[cfg(target_os = "linux")]
#[must_use]
pub fn current_thread_id() -> ThreadId {
    // SAFETY: gettid takes no arguments and cannot fail.
    let tid = unsafe { libc::syscall(libc::SYS_gettid) };
    ThreadId(u64::try_from(tid).unwrap_or_default())
}

/// OS-level id of the calling thread.
#[cfg(all(unix, not(target_vendor = "apple"), not(target_os = "linux")))]
#[must_use]
pub fn current_thread_id() -> ThreadId {
    // SAFETY: pthread_self has no preconditions.
    ThreadId(unsafe { libc::pthread_self() } as u64)
}

/// OS-level id of the calling thread.
#[cfg(not(unix))]
#[must_use]
pub fn current_thread_id() -> ThreadId {
    ThreadId(0)
}

#[cfg(target_vendor = "apple")]
fn current_mach_port() -> Option<u32> {
    // SAFETY: pthread_self() is always a valid handle for the calling thread.
    Some(unsafe { libc::pthread_mach_thread_np(libc::pthread_self()) })
}

#[cfg(not(target_vendor = "apple"))]
fn current_mach_port() -> Option<u32> {
    None
}
