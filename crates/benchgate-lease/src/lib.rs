//! benchgate-lease: the in-memory lease table.
//!
//! # Architecture
//!
//! ```text
//! Allocator
//!   ├── Mutex<LeaseTable>        one coarse lock, never held across I/O
//!   │   ├── products             immutable catalog
//!   │   └── benches              owner / expiry / aux token / queue depth
//!   ├── Clock                    injected time source
//!   └── Notifier                 receives cleanup commands after unlock
//! ```
//!
//! Every operation runs its scan-and-mutate sequence under the lock and
//! returns the downstream commands it produced. The allocator hands those to
//! the notifier only once the lock is released, so a slow bench never blocks
//! unrelated lease operations.
//!
//! Expired leases are reclaimed lazily: by the session resolver when the
//! owner comes back, or by the next allocation scan. There is no background
//! reaper.

pub mod allocator;
pub mod table;

pub use allocator::{ActiveLease, Allocator, LeaseGrant, LeaseResponse};
pub use table::{Bench, BenchStatus, LeaseTable};
