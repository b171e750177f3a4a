//! Process-wide VFS name registry (§4.D, isolation invariant): every
//! session registers its own `sqlite3_vfs` under a name no other live
//! session can collide with, since libsqlite3's VFS table is a single
//! global namespace shared by the whole process.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rand::Rng;

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Guards the pool of names currently registered with libsqlite3, so a
/// name freed by one session's teardown can never be handed to another
/// session before the `sqlite3_vfs_unregister` call actually completes.
pub struct VfsNameRegistry {
    live: Mutex<std::collections::HashSet<String>>,
}

impl Default for VfsNameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl VfsNameRegistry {
    pub fn new() -> Self {
        Self {
            live: Mutex::new(std::collections::HashSet::new()),
        }
    }

    /// Reserve a name: `<prefix>-<counter>-<nonce>`, unique for the life
    /// of the process. `prefix` lets callers group VFS instances by
    /// purpose in diagnostics without risking a collision.
    pub fn reserve(&self, prefix: &str) -> String {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let nonce: u64 = rand::thread_rng().gen();
        let name = format!("{prefix}-{n:x}-{nonce:016x}");

        let mut live = self.live.lock();
        debug_assert!(
            !live.contains(&name),
            "VFS name collision despite process-wide counter"
        );
        live.insert(name.clone());
        name
    }

    /// Release a name previously returned by [`reserve`](Self::reserve).
    /// Must be called only after `sqlite3_vfs_unregister` has returned.
    pub fn release(&self, name: &str) {
        self.live.lock().remove(name);
    }

    /// Number of names currently checked out. Exposed for tests asserting
    /// teardown actually releases every registration.
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }
}
