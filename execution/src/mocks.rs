//! Test fixtures: a manual clock, a failure-injecting gateway, and
//! pre-wired engine builders.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use gridstake_types::account::Pool;
use gridstake_types::store::StoreKey;

use crate::gateway::{GatewayError, Memory, PersistenceGateway};
use crate::orchestrator::{Clock, SessionOrchestrator};

/// Fixed epoch the manual clock starts from.
pub const TEST_EPOCH: u64 = 1_700_000_000;

/// Clock advanced explicitly by tests.
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Gateway that rejects writes to one key until healed. Reads always
/// succeed, exposing partially-written state to the test.
pub struct FlakyGateway {
    inner: Memory,
    fail_on: Mutex<Option<StoreKey>>,
    failures: AtomicUsize,
}

impl FlakyGateway {
    pub fn failing(fail_on: StoreKey) -> Self {
        Self {
            inner: Memory::default(),
            fail_on: Mutex::new(Some(fail_on)),
            failures: AtomicUsize::new(0),
        }
    }

    /// Stop injecting failures.
    pub fn heal(&self) {
        let mut fail_on = self
            .fail_on
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *fail_on = None;
    }

    /// Number of writes rejected so far.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

impl PersistenceGateway for FlakyGateway {
    fn get(&self, key: &StoreKey) -> Result<Option<Vec<u8>>, GatewayError> {
        self.inner.get(key)
    }

    fn put(&self, key: &StoreKey, bytes: Vec<u8>) -> Result<(), GatewayError> {
        let fail_on = self
            .fail_on
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if fail_on.as_ref() == Some(key) {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(GatewayError("injected write failure".to_string()));
        }
        drop(fail_on);
        self.inner.put(key, bytes)
    }
}

/// Orchestrator over in-memory persistence with a manual clock and a fixed
/// RNG seed.
pub fn test_orchestrator(seed: u64) -> (SessionOrchestrator<Memory>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(TEST_EPOCH));
    let orchestrator = SessionOrchestrator::new(Arc::new(Memory::default()), clock.clone(), seed);
    (orchestrator, clock)
}

/// Orchestrator over an arbitrary gateway with a manual clock.
pub fn test_orchestrator_with<G: PersistenceGateway>(
    gateway: Arc<G>,
    seed: u64,
) -> (SessionOrchestrator<G>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(TEST_EPOCH));
    let orchestrator = SessionOrchestrator::new(gateway, clock.clone(), seed);
    (orchestrator, clock)
}

/// Register `account` (granting the practice starting balance) and
/// optionally top up the real pool.
pub fn fund_account<G: PersistenceGateway>(
    orchestrator: &SessionOrchestrator<G>,
    account: u64,
    real: u64,
) {
    orchestrator
        .register_account(account, &format!("player-{account}"))
        .expect("registration failed");
    if real > 0 {
        orchestrator
            .credit_deposit(account, Pool::Real, real)
            .expect("deposit failed");
    }
}
