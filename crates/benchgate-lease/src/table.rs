//! Lease table: benches, their lease state, and the product catalog.
//!
//! The table is plain data. Locking and time are the [`Allocator`]'s job;
//! every method here takes `now_ms` explicitly and returns the downstream
//! commands a transition requires instead of sending them.
//!
//! [`Allocator`]: crate::Allocator

use serde::Serialize;

use benchgate_core::{BenchSpec, Command, Product};

/// One bench plus its current lease state.
#[derive(Debug, Clone)]
pub struct Bench {
    spec: BenchSpec,
    /// Session token of the holder, empty when unleased.
    owner: String,
    /// Lease end while owned; time of release otherwise.
    expiry_ms: u64,
    /// Opaque token handed over by the owner for build forwarding.
    aux_token: String,
    /// Heuristic count of waiters pointed at this bench.
    queue_depth: u32,
}

impl Bench {
    fn new(spec: BenchSpec, now_ms: u64) -> Self {
        Self {
            spec,
            owner: String::new(),
            expiry_ms: now_ms,
            aux_token: String::new(),
            queue_depth: 0,
        }
    }

    pub fn spec(&self) -> &BenchSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn expiry_ms(&self) -> u64 {
        self.expiry_ms
    }

    pub fn aux_token(&self) -> &str {
        &self.aux_token
    }

    pub fn queue_depth(&self) -> u32 {
        self.queue_depth
    }

    pub fn is_available(&self, now_ms: u64) -> bool {
        self.owner.is_empty() && now_ms >= self.expiry_ms
    }

    /// Owned, but the lease has run out and nobody reclaimed it yet.
    pub fn is_lapsed(&self, now_ms: u64) -> bool {
        !self.owner.is_empty() && now_ms >= self.expiry_ms
    }

    pub fn is_held_by(&self, token: &str, now_ms: u64) -> bool {
        !token.is_empty() && self.owner == token && now_ms < self.expiry_ms
    }

    fn clear(&mut self, now_ms: u64) {
        self.owner.clear();
        self.aux_token.clear();
        self.expiry_ms = now_ms;
    }

    /// Passive reclamation of a lapsed lease: power the bench down and wipe
    /// the compile companion.
    pub(crate) fn reclaim(&mut self, now_ms: u64) -> [Command; 2] {
        self.clear(now_ms);
        self.reset_commands()
    }

    /// Power-off plus compile cleanup, sent whenever a bench changes hands.
    pub fn reset_commands(&self) -> [Command; 2] {
        [self.spec.power_off(), self.spec.clean_up()]
    }

    /// Explicit stop by the owner. Only the compile side is cleaned.
    pub(crate) fn release(&mut self, now_ms: u64) -> Command {
        self.clear(now_ms);
        self.spec.clean_up()
    }

    pub(crate) fn lease_to(&mut self, token: &str, expiry_ms: u64) {
        self.owner = token.to_string();
        self.aux_token.clear();
        self.expiry_ms = expiry_ms;
    }

    pub(crate) fn set_aux_token(&mut self, token: String) {
        self.aux_token = token;
    }

    pub(crate) fn enqueue(&mut self) -> u32 {
        let position = self.queue_depth;
        self.queue_depth = self.queue_depth.saturating_add(1);
        position
    }

    pub(crate) fn dequeue(&mut self) {
        self.queue_depth = self.queue_depth.saturating_sub(1);
    }
}

/// Read-only view of a bench for logs and inspection.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BenchStatus {
    pub name: String,
    pub product: String,
    pub leased: bool,
    pub expiry_ms: u64,
    pub queue_depth: u32,
}

/// The whole pool: products plus benches, fixed at startup.
#[derive(Debug, Clone)]
pub struct LeaseTable {
    products: Vec<Product>,
    benches: Vec<Bench>,
}

impl LeaseTable {
    /// Build a table where every bench is free as of `now_ms`.
    pub fn new(products: Vec<Product>, specs: Vec<BenchSpec>, now_ms: u64) -> Self {
        let benches = specs
            .into_iter()
            .map(|spec| Bench::new(spec, now_ms))
            .collect();
        Self { products, benches }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn benches(&self) -> &[Bench] {
        &self.benches
    }

    pub(crate) fn bench_mut(&mut self, index: usize) -> Option<&mut Bench> {
        self.benches.get_mut(index)
    }

    pub fn position_by_name(&self, name: &str) -> Option<usize> {
        self.benches.iter().position(|b| b.name() == name)
    }

    pub fn position_by_owner(&self, token: &str) -> Option<usize> {
        if token.is_empty() {
            return None;
        }
        self.benches.iter().position(|b| b.owner == token)
    }

    /// Reclaim every lapsed lease, returning the cleanup commands.
    pub(crate) fn reap_lapsed(&mut self, now_ms: u64) -> Vec<Command> {
        let mut commands = Vec::new();
        for bench in self.benches.iter_mut().filter(|b| b.is_lapsed(now_ms)) {
            commands.extend(bench.reclaim(now_ms));
        }
        commands
    }

    /// First free bench of the given product.
    pub(crate) fn first_available(&self, product: &str, now_ms: u64) -> Option<usize> {
        self.benches
            .iter()
            .position(|b| b.spec.product == product && b.is_available(now_ms))
    }

    /// Bench of the given product that frees up soonest; ties go to the first.
    pub(crate) fn soonest_to_free(&self, product: &str) -> Option<usize> {
        self.benches
            .iter()
            .enumerate()
            .filter(|(_, b)| b.spec.product == product)
            .min_by_key(|(i, b)| (b.expiry_ms, *i))
            .map(|(i, _)| i)
    }

    pub fn status(&self) -> Vec<BenchStatus> {
        self.benches
            .iter()
            .map(|b| BenchStatus {
                name: b.spec.name.clone(),
                product: b.spec.product.clone(),
                leased: !b.owner.is_empty(),
                expiry_ms: b.expiry_ms,
                queue_depth: b.queue_depth,
            })
            .collect()
    }
}
