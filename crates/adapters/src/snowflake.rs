use std::sync::Mutex;
use std::thread;

use gallery_ingest_application::{ApplicationError, Clock, IdGenerator};
use gallery_ingest_domain::{DomainError, PhotoId};
use tracing::warn;

/// 2023-01-01T00:00:00Z.
pub const ID_EPOCH_MILLIS: i64 = 1_672_531_200_000;
pub const MAX_NODE_ID: u64 = 31;

const SEQUENCE_BITS: u32 = 12;
const MACHINE_SHIFT: u32 = SEQUENCE_BITS;
const DATACENTER_SHIFT: u32 = SEQUENCE_BITS + 5;
const TIMESTAMP_SHIFT: u32 = DATACENTER_SHIFT + 5;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

struct SequenceState {
    last_millis: i64,
    sequence: u64,
}

/// Time-ordered 64-bit ids: milliseconds since [`ID_EPOCH_MILLIS`], then
/// datacenter id, machine id and a 12-bit per-millisecond sequence.
pub struct SnowflakeIdGenerator {
    machine_id: u64,
    datacenter_id: u64,
    clock: Box<dyn Clock>,
    state: Mutex<SequenceState>,
}

impl SnowflakeIdGenerator {
    pub fn new(
        machine_id: u64,
        datacenter_id: u64,
        clock: Box<dyn Clock>,
    ) -> Result<Self, ApplicationError> {
        check_node_id("machine_id", machine_id)?;
        check_node_id("datacenter_id", datacenter_id)?;
        Ok(Self {
            machine_id,
            datacenter_id,
            clock,
            state: Mutex::new(SequenceState {
                last_millis: -1,
                sequence: 0,
            }),
        })
    }

    fn wait_for_next_millis(&self, last_millis: i64) -> i64 {
        let mut now = self.clock.now_millis();
        while now <= last_millis {
            thread::yield_now();
            now = self.clock.now_millis();
        }
        now
    }

    fn compose(&self, millis: i64, sequence: u64) -> Result<PhotoId, ApplicationError> {
        let elapsed = u64::try_from(millis - ID_EPOCH_MILLIS).map_err(|_| {
            ApplicationError::Configuration(format!("clock reads {millis}ms, before the id epoch"))
        })?;
        let id = (elapsed << TIMESTAMP_SHIFT)
            | (self.datacenter_id << DATACENTER_SHIFT)
            | (self.machine_id << MACHINE_SHIFT)
            | sequence;
        Ok(PhotoId::new(id)?)
    }
}

fn check_node_id(field: &'static str, value: u64) -> Result<(), ApplicationError> {
    if value > MAX_NODE_ID {
        let error = DomainError::OutOfRange {
            field,
            value,
            max: MAX_NODE_ID,
        };
        return Err(ApplicationError::Configuration(error.to_string()));
    }
    Ok(())
}

impl IdGenerator for SnowflakeIdGenerator {
    fn next_id(&self) -> Result<PhotoId, ApplicationError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ApplicationError::Io("id generator lock poisoned".to_string()))?;

        let mut now = self.clock.now_millis();
        if now < state.last_millis {
            let drift_ms = state.last_millis - now;
            warn!(drift_ms, "clock moved backwards, refusing to issue ids");
            return Err(ApplicationError::ClockRollback { drift_ms });
        }

        if now == state.last_millis {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                now = self.wait_for_next_millis(state.last_millis);
            }
        } else {
            state.sequence = 0;
        }
        state.last_millis = now;

        self.compose(now, state.sequence)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::SystemClock;

    struct FixedClock(AtomicI64);

    impl Clock for FixedClock {
        fn now_millis(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    struct SharedClock(Arc<FixedClock>);

    impl Clock for SharedClock {
        fn now_millis(&self) -> i64 {
            self.0.now_millis()
        }
    }

    /// Reports `base` for the first `frozen_calls` reads, then `base + 1`.
    struct StallingClock {
        calls: AtomicU64,
        frozen_calls: u64,
        base: i64,
    }

    impl Clock for StallingClock {
        fn now_millis(&self) -> i64 {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.frozen_calls {
                self.base
            } else {
                self.base + 1
            }
        }
    }

    fn fixed(millis: i64) -> Arc<FixedClock> {
        Arc::new(FixedClock(AtomicI64::new(millis)))
    }

    #[test]
    fn rejects_node_ids_outside_five_bits() {
        assert!(matches!(
            SnowflakeIdGenerator::new(32, 0, Box::new(SystemClock)),
            Err(ApplicationError::Configuration(_))
        ));
        assert!(matches!(
            SnowflakeIdGenerator::new(0, 32, Box::new(SystemClock)),
            Err(ApplicationError::Configuration(_))
        ));
        assert!(SnowflakeIdGenerator::new(31, 31, Box::new(SystemClock)).is_ok());
    }

    #[test]
    fn packs_timestamp_datacenter_machine_and_sequence() {
        let clock = fixed(ID_EPOCH_MILLIS + 1);
        let ids = SnowflakeIdGenerator::new(1, 1, Box::new(SharedClock(clock))).expect("ids");

        let first = ids.next_id().expect("id").get();
        let second = ids.next_id().expect("id").get();

        assert_eq!(first, (1 << 22) | (1 << 17) | (1 << 12));
        assert_eq!(second, first + 1);
    }

    #[test]
    fn later_millisecond_yields_larger_id() {
        let clock = fixed(ID_EPOCH_MILLIS + 10_000);
        let ids =
            SnowflakeIdGenerator::new(3, 7, Box::new(SharedClock(Arc::clone(&clock)))).expect("ids");

        let mut earlier = 0;
        for _ in 0..50 {
            earlier = ids.next_id().expect("id").get();
        }
        clock.0.fetch_add(1, Ordering::SeqCst);
        let later = ids.next_id().expect("id").get();

        assert!(later > earlier);
        assert_eq!(later & SEQUENCE_MASK, 0);
    }

    #[test]
    fn backwards_clock_is_a_rollback_error() {
        let clock = fixed(ID_EPOCH_MILLIS + 5_000);
        let ids =
            SnowflakeIdGenerator::new(1, 1, Box::new(SharedClock(Arc::clone(&clock)))).expect("ids");
        ids.next_id().expect("id");

        clock.0.store(ID_EPOCH_MILLIS + 4_998, Ordering::SeqCst);

        assert!(matches!(
            ids.next_id(),
            Err(ApplicationError::ClockRollback { drift_ms: 2 })
        ));
    }

    #[test]
    fn sequence_overflow_waits_for_the_next_millisecond() {
        let base = ID_EPOCH_MILLIS + 42;
        let clock = StallingClock {
            calls: AtomicU64::new(0),
            frozen_calls: 4097,
            base,
        };
        let ids = SnowflakeIdGenerator::new(0, 0, Box::new(clock)).expect("ids");

        let mut seen = HashSet::new();
        let mut last = 0;
        for _ in 0..4097 {
            last = ids.next_id().expect("id").get();
            assert!(seen.insert(last));
        }

        assert_eq!(last >> TIMESTAMP_SHIFT, 43);
        assert_eq!(last & SEQUENCE_MASK, 0);
        assert!(seen.iter().all(|id| *id <= last));
    }

    #[test]
    fn concurrent_callers_never_share_an_id() {
        let ids = Arc::new(SnowflakeIdGenerator::new(2, 4, Box::new(SystemClock)).expect("ids"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                thread::spawn(move || {
                    (0..2_000)
                        .map(|_| ids.next_id().expect("id").get())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().expect("join") {
                assert!(all.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(all.len(), 16_000);
    }
}
