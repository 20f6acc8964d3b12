//! Injectable randomness for demos and tests.
//!
//! Core routing never rolls dice. Transient-failure simulation and the final
//! gate's subtle-quality sampling live here, behind seams the caller wires
//! in explicitly.

use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{AssessContext, Assessor, AssessorError, StructuredResult};

/// Wraps an assessor and fails a configurable fraction of calls with a
/// transient error, alternating between timeouts and unavailability.
pub struct FaultInjector<A> {
    inner: A,
    rate: f64,
    rng: Mutex<StdRng>,
}

impl<A> FaultInjector<A> {
    pub fn new(inner: A, rate: f64, seed: u64) -> Self {
        Self {
            inner,
            rate,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl<A: Assessor> Assessor for FaultInjector<A> {
    async fn assess(
        &self,
        content: &str,
        ctx: &AssessContext,
    ) -> Result<StructuredResult, AssessorError> {
        let injected = {
            let mut rng = self.rng.lock().expect("fault rng poisoned");
            if rng.random::<f64>() < self.rate {
                Some(rng.random::<bool>())
            } else {
                None
            }
        };
        match injected {
            Some(true) => Err(AssessorError::Timeout),
            Some(false) => Err(AssessorError::ServiceUnavailable(
                "injected outage".to_string(),
            )),
            None => self.inner.assess(content, ctx).await,
        }
    }
}

/// Final-gate sampling seam for the "gut feeling" quality concern.
pub trait QualityProbe: Send + Sync {
    fn flag_subtle_issue(&self, task_id: &str) -> bool;
}

/// Production default: never flags anything.
pub struct NeverFlag;

impl QualityProbe for NeverFlag {
    fn flag_subtle_issue(&self, _task_id: &str) -> bool {
        false
    }
}

/// Demo probe flagging a configurable fraction of reviews.
pub struct RandomProbe {
    rate: f64,
    rng: Mutex<StdRng>,
}

impl RandomProbe {
    pub fn new(rate: f64, seed: u64) -> Self {
        Self {
            rate,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl QualityProbe for RandomProbe {
    fn flag_subtle_issue(&self, _task_id: &str) -> bool {
        let mut rng = self.rng.lock().expect("probe rng poisoned");
        rng.random::<f64>() < self.rate
    }
}
