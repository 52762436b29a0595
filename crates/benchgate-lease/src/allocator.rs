//! The lease lifecycle service.
//!
//! Wraps the [`LeaseTable`] in a single mutex and implements session
//! resolution, lease acquisition and release on top of it. Cleanup commands
//! produced while the lock is held are dispatched after it is dropped.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use benchgate_core::{BenchSpec, Clock, Command, Notifier, Product};

use crate::table::{BenchStatus, LeaseTable};

/// The bench a session currently holds, copied out of the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveLease {
    pub index: usize,
    pub bench: BenchSpec,
    pub owner: String,
    pub aux_token: String,
    pub expiry_ms: u64,
}

/// Outcome of [`Allocator::acquire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseGrant {
    /// The session holds `bench` for another `remaining_secs`.
    Granted { bench: String, remaining_secs: u64 },
    /// Nothing free; `wait_secs` until the soonest bench frees up.
    Queued { wait_secs: u64, position: u32 },
}

impl LeaseGrant {
    pub fn to_response(&self) -> LeaseResponse {
        LeaseResponse::from(self)
    }
}

/// Wire form of a [`LeaseGrant`]. Every field is a string.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LeaseResponse {
    #[serde(rename = "Servername")]
    pub server_name: String,
    #[serde(rename = "Waittime")]
    pub wait_time: String,
    #[serde(rename = "Queue")]
    pub queue: String,
    #[serde(rename = "RemainingTime")]
    pub remaining_time: String,
}

impl From<&LeaseGrant> for LeaseResponse {
    fn from(grant: &LeaseGrant) -> Self {
        match grant {
            LeaseGrant::Granted {
                bench,
                remaining_secs,
            } => Self {
                server_name: bench.clone(),
                wait_time: "0".to_string(),
                queue: String::new(),
                remaining_time: remaining_secs.to_string(),
            },
            LeaseGrant::Queued {
                wait_secs,
                position,
            } => Self {
                server_name: String::new(),
                wait_time: wait_secs.to_string(),
                queue: position.to_string(),
                remaining_time: "0".to_string(),
            },
        }
    }
}

/// Owns the lease table and serializes every mutation of it.
pub struct Allocator {
    table: Mutex<LeaseTable>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    lease_ttl: Duration,
}

impl Allocator {
    pub fn new(
        products: Vec<Product>,
        benches: Vec<BenchSpec>,
        lease_ttl: Duration,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let table = LeaseTable::new(products, benches, clock.now_ms());
        Self {
            table: Mutex::new(table),
            clock,
            notifier,
            lease_ttl,
        }
    }

    /// Run `f` under the table lock, then dispatch the commands it returned.
    fn locked<R>(&self, f: impl FnOnce(&mut LeaseTable, u64) -> (R, Vec<Command>)) -> R {
        let (result, commands) = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            let now_ms = self.clock.now_ms();
            f(&mut table, now_ms)
        };
        if !commands.is_empty() {
            debug!(count = commands.len(), "dispatching cleanup");
            self.notifier.notify_all(commands);
        }
        result
    }

    /// Map a session cookie to the bench it holds.
    ///
    /// A lease found to have lapsed is reclaimed on the spot (bench powered
    /// off, compile companion cleaned) and the session gets `None`.
    pub fn resolve(&self, cookie: &str) -> Option<ActiveLease> {
        if cookie.is_empty() {
            return None;
        }
        self.locked(|table, now_ms| {
            let mut active = None;
            let mut commands = Vec::new();
            for index in 0..table.benches().len() {
                let Some(bench) = table.bench_mut(index) else {
                    continue;
                };
                if bench.owner() != cookie {
                    continue;
                }
                if bench.is_lapsed(now_ms) {
                    info!(bench = %bench.name(), "lease expired, reclaiming");
                    commands.extend(bench.reclaim(now_ms));
                } else if active.is_none() {
                    active = Some(ActiveLease {
                        index,
                        bench: bench.spec().clone(),
                        owner: bench.owner().to_string(),
                        aux_token: bench.aux_token().to_string(),
                        expiry_ms: bench.expiry_ms(),
                    });
                }
            }
            (active, commands)
        })
    }

    /// Lease a bench of `product` to `token`, or report where it would queue.
    ///
    /// Returns `None` for an empty token. A token that already holds a live
    /// lease gets that bench back whatever product it asked for.
    pub fn acquire(&self, product: &str, token: &str) -> Option<LeaseGrant> {
        if token.is_empty() {
            return None;
        }
        let ttl_ms = u64::try_from(self.lease_ttl.as_millis()).unwrap_or(u64::MAX);
        let grant = self.locked(|table, now_ms| {
            let mut commands = table.reap_lapsed(now_ms);
            let grant = allocate(table, product, token, now_ms, ttl_ms, &mut commands);
            (grant, commands)
        });
        Some(grant)
    }

    /// End `token`'s lease on `bench_name`. No-op unless `token` owns it.
    pub fn release(&self, bench_name: &str, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }
        self.locked(|table, now_ms| {
            let Some(bench) = table
                .position_by_name(bench_name)
                .and_then(|index| table.bench_mut(index))
            else {
                return (false, Vec::new());
            };
            if bench.owner() != token {
                debug!(bench = bench_name, "release by non-owner ignored");
                return (false, Vec::new());
            }
            info!(bench = bench_name, "bench released");
            (true, vec![bench.release(now_ms)])
        })
    }

    /// Store the owner's auxiliary token on its bench.
    ///
    /// Fails if the lease changed hands or lapsed since `lease` was resolved.
    pub fn set_aux_token(&self, lease: &ActiveLease, token: String) -> bool {
        self.locked(|table, now_ms| {
            let stored = match table.bench_mut(lease.index) {
                Some(bench) if bench.is_held_by(&lease.owner, now_ms) => {
                    bench.set_aux_token(token);
                    true
                }
                _ => false,
            };
            (stored, Vec::new())
        })
    }

    /// Products flagged active, in catalog order.
    pub fn active_products(&self) -> Vec<Product> {
        self.locked(|table, _| {
            let products = table
                .products()
                .iter()
                .filter(|p| p.active)
                .cloned()
                .collect();
            (products, Vec::new())
        })
    }

    /// Snapshot of every bench, in pool order.
    pub fn benches(&self) -> Vec<BenchStatus> {
        self.locked(|table, _| (table.status(), Vec::new()))
    }
}

fn allocate(
    table: &mut LeaseTable,
    product: &str,
    token: &str,
    now_ms: u64,
    ttl_ms: u64,
    commands: &mut Vec<Command>,
) -> LeaseGrant {
    if let Some(bench) = table
        .position_by_owner(token)
        .and_then(|index| table.bench_mut(index))
    {
        push_unique(commands, bench.reset_commands());
        bench.dequeue();
        debug!(bench = %bench.name(), "session re-entered its lease");
        return LeaseGrant::Granted {
            bench: bench.name().to_string(),
            remaining_secs: bench.expiry_ms().saturating_sub(now_ms) / 1_000,
        };
    }

    if let Some(bench) = table
        .first_available(product, now_ms)
        .and_then(|index| table.bench_mut(index))
    {
        bench.lease_to(token, now_ms.saturating_add(ttl_ms));
        push_unique(commands, bench.reset_commands());
        bench.dequeue();
        info!(bench = %bench.name(), product, "bench leased");
        return LeaseGrant::Granted {
            bench: bench.name().to_string(),
            remaining_secs: ttl_ms / 1_000,
        };
    }

    match table
        .soonest_to_free(product)
        .and_then(|index| table.bench_mut(index))
    {
        Some(bench) => {
            let wait_ms = bench.expiry_ms().saturating_sub(now_ms);
            let position = bench.enqueue();
            debug!(bench = %bench.name(), position, "no bench free, queued");
            LeaseGrant::Queued {
                wait_secs: wait_ms.saturating_add(500) / 1_000,
                position,
            }
        }
        None => {
            debug!(product, "no bench serves this product");
            LeaseGrant::Queued {
                wait_secs: 0,
                position: 0,
            }
        }
    }
}

fn push_unique(commands: &mut Vec<Command>, extra: [Command; 2]) {
    for command in extra {
        if !commands.contains(&command) {
            commands.push(command);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchgate_core::{ManualClock, RecordingNotifier};

    const TTL: Duration = Duration::from_secs(3600);

    fn spec(name: &str, product: &str) -> BenchSpec {
        BenchSpec {
            name: name.to_string(),
            control: format!("{name}-ctrl:8080"),
            compile_ip: format!("{name}-cc"),
            compile: format!("{name}-cc:9101"),
            bmc_ip: format!("{name}-bmc"),
            product: product.to_string(),
        }
    }

    fn product(name: &str, active: bool) -> Product {
        Product {
            name: name.to_string(),
            brand: "HPE".to_string(),
            active,
        }
    }

    struct Fixture {
        allocator: Allocator,
        clock: Arc<ManualClock>,
        notifier: Arc<RecordingNotifier>,
    }

    fn fixture(benches: Vec<BenchSpec>) -> Fixture {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let notifier = Arc::new(RecordingNotifier::new());
        let allocator = Allocator::new(
            vec![product("X", true), product("Y", false)],
            benches,
            TTL,
            clock.clone(),
            notifier.clone(),
        );
        Fixture {
            allocator,
            clock,
            notifier,
        }
    }

    fn granted(bench: &str, remaining_secs: u64) -> Option<LeaseGrant> {
        Some(LeaseGrant::Granted {
            bench: bench.to_string(),
            remaining_secs,
        })
    }

    fn queued(wait_secs: u64, position: u32) -> Option<LeaseGrant> {
        Some(LeaseGrant::Queued {
            wait_secs,
            position,
        })
    }

    #[test]
    fn scenarios_a_through_e() {
        let f = fixture(vec![spec("bench-a", "X"), spec("bench-b", "X")]);
        {
            let mut table = f.allocator.table.lock().unwrap();
            table.bench_mut(1).unwrap().lease_to("tokB", 1_000_000 + 100_000);
        }

        // A: the free bench is granted for a full lease
        assert_eq!(f.allocator.acquire("X", "tok1"), granted("bench-a", 3600));

        // B: nothing free, queue behind the bench that frees first
        assert_eq!(f.allocator.acquire("X", "tok2"), queued(100, 0));
        assert_eq!(f.allocator.benches()[1].queue_depth, 1);

        // C: next waiter gets the next position
        assert_eq!(f.allocator.acquire("X", "tok3"), queued(100, 1));
        assert_eq!(f.allocator.benches()[1].queue_depth, 2);

        // D: once bench-b lapses, the next caller gets it
        f.clock.advance(Duration::from_millis(100_001));
        assert_eq!(f.allocator.acquire("X", "tok2"), granted("bench-b", 3600));
        assert_eq!(f.allocator.benches()[1].queue_depth, 1);

        // E: a stranger cannot stop someone else's bench
        assert!(!f.allocator.release("bench-b", "tok3"));
        assert_eq!(f.allocator.resolve("tok2").unwrap().bench.name, "bench-b");
    }

    #[test]
    fn fresh_allocation_resets_the_bench() {
        let f = fixture(vec![spec("a", "X")]);

        assert_eq!(f.allocator.acquire("X", "tok1"), granted("a", 3600));
        assert_eq!(
            f.notifier.urls(),
            vec!["http://a-ctrl:8080/poweroff", "http://a-cc:9101/cleanUp"]
        );

        let lease = f.allocator.resolve("tok1").unwrap();
        assert_eq!(lease.bench.name, "a");
        assert_eq!(lease.expiry_ms, 1_000_000 + 3_600_000);
    }

    #[test]
    fn second_session_queues_behind_the_holder() {
        let f = fixture(vec![spec("a", "X")]);
        f.allocator.acquire("X", "tok1");
        f.clock.advance(Duration::from_secs(600));

        assert_eq!(f.allocator.acquire("X", "tok2"), queued(3000, 0));
        assert_eq!(f.allocator.acquire("X", "tok3"), queued(3000, 1));
        assert_eq!(f.allocator.benches()[0].queue_depth, 2);
    }

    #[test]
    fn reentry_returns_the_same_bench_with_remaining_time() {
        let f = fixture(vec![spec("a", "X"), spec("b", "X")]);
        f.allocator.acquire("X", "tok1");
        f.notifier.take();
        f.clock.advance(Duration::from_millis(100_900));

        assert_eq!(f.allocator.acquire("X", "tok1"), granted("a", 3499));
        assert_eq!(f.notifier.take().len(), 2);
        // the requested product is ignored on re-entry
        assert_eq!(f.allocator.acquire("Y", "tok1"), granted("a", 3499));
        assert!(f.allocator.benches()[1].expiry_ms <= 1_000_000);
        assert!(!f.allocator.benches()[1].leased);
    }

    #[test]
    fn explicit_release_frees_the_bench() {
        let f = fixture(vec![spec("a", "X")]);
        f.allocator.acquire("X", "tok1");
        f.notifier.take();
        f.clock.advance(Duration::from_secs(10));

        assert!(!f.allocator.release("a", "tok2"));
        assert!(f.notifier.take().is_empty());

        assert!(f.allocator.release("a", "tok1"));
        assert_eq!(f.notifier.urls(), vec!["http://a-cc:9101/cleanUp"]);
        assert!(f.allocator.resolve("tok1").is_none());
        assert_eq!(f.allocator.acquire("X", "tok2"), granted("a", 3600));
    }

    #[test]
    fn lapsed_lease_is_reclaimed_on_resolve() {
        let f = fixture(vec![spec("a", "X")]);
        f.allocator.acquire("X", "tok1");
        f.notifier.take();
        f.clock.advance(TTL);

        assert!(f.allocator.resolve("tok1").is_none());
        assert_eq!(
            f.notifier.urls(),
            vec!["http://a-ctrl:8080/poweroff", "http://a-cc:9101/cleanUp"]
        );
        assert!(!f.allocator.benches()[0].leased);
    }

    #[test]
    fn allocation_scan_reclaims_lapsed_leases() {
        let f = fixture(vec![spec("a", "X")]);
        f.allocator.acquire("X", "tok1");
        f.clock.advance(TTL + Duration::from_secs(1));
        f.notifier.take();

        assert_eq!(f.allocator.acquire("X", "tok2"), granted("a", 3600));
        // reclaim and fresh lease target the same bench, so commands are not doubled
        assert_eq!(f.notifier.take().len(), 2);
        assert!(f.allocator.resolve("tok1").is_none());
    }

    #[test]
    fn unknown_product_queues_without_mutation() {
        let f = fixture(vec![spec("a", "X")]);
        assert_eq!(f.allocator.acquire("Nope", "tok1"), queued(0, 0));
        assert_eq!(f.allocator.acquire("Y", "tok1"), queued(0, 0));
        assert!(f.notifier.take().is_empty());
        assert!(f.allocator.benches().iter().all(|b| !b.leased && b.queue_depth == 0));
    }

    #[test]
    fn empty_token_is_refused() {
        let f = fixture(vec![spec("a", "X")]);
        assert_eq!(f.allocator.acquire("X", ""), None);
        assert!(f.allocator.resolve("").is_none());
        assert!(!f.allocator.release("a", ""));
        assert!(f.notifier.take().is_empty());
    }

    #[test]
    fn queue_depth_drops_on_the_benchs_own_allocation() {
        let f = fixture(vec![spec("a", "X")]);
        f.allocator.acquire("X", "tok1");
        f.allocator.acquire("X", "tok2");
        f.allocator.acquire("X", "tok3");
        assert_eq!(f.allocator.benches()[0].queue_depth, 2);

        f.allocator.release("a", "tok1");
        f.allocator.acquire("X", "tok2");
        assert_eq!(f.allocator.benches()[0].queue_depth, 1);
    }

    #[test]
    fn aux_token_requires_a_live_lease() {
        let f = fixture(vec![spec("a", "X")]);
        f.allocator.acquire("X", "tok1");
        let lease = f.allocator.resolve("tok1").unwrap();

        assert!(f.allocator.set_aux_token(&lease, "ghp_123".to_string()));
        assert_eq!(f.allocator.resolve("tok1").unwrap().aux_token, "ghp_123");

        f.allocator.release("a", "tok1");
        assert!(!f.allocator.set_aux_token(&lease, "ghp_456".to_string()));
    }

    #[test]
    fn active_products_filters_inactive() {
        let f = fixture(Vec::new());
        let names: Vec<_> = f
            .allocator
            .active_products()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["X"]);
    }

    #[test]
    fn wire_form_uses_string_fields() {
        let grant = LeaseGrant::Granted {
            bench: "a".to_string(),
            remaining_secs: 3600,
        };
        assert_eq!(
            serde_json::to_value(grant.to_response()).unwrap(),
            serde_json::json!({
                "Servername": "a",
                "Waittime": "0",
                "Queue": "",
                "RemainingTime": "3600",
            })
        );

        let grant = LeaseGrant::Queued {
            wait_secs: 42,
            position: 3,
        };
        assert_eq!(
            serde_json::to_value(grant.to_response()).unwrap(),
            serde_json::json!({
                "Servername": "",
                "Waittime": "42",
                "Queue": "3",
                "RemainingTime": "0",
            })
        );
    }
}
