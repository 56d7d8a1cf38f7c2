//! Session registry - maps session ids to simulation sessions.
//!
//! The registry is the only shared mutable state in the service. Each session
//! sits behind its own mutex so two requests against the same session are
//! applied one after the other, never interleaved; requests against different
//! sessions proceed independently.
//!
//! The number of live sessions is capped. A new session only enters the map
//! after its first initialize succeeds; when the map is full the least recently
//! used session is evicted.

use crate::context::SeedContext;
use crate::error::ServiceError;
use crate::types::{
    InitializeRequest, InitializeResponse, SessionId, StatePayload, StepRequest, StepResponse,
};
use crate::validation::ParameterBounds;

use epinet_core::{InitialConditions, MetricsMode, SimulationSession, TransitionRates};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Configuration for the service layer.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address the HTTP server binds to
    pub bind_addr: String,

    /// Policy bounds applied to every request
    pub bounds: ParameterBounds,

    /// Metrics mode for newly created sessions
    pub metrics_mode: MetricsMode,

    /// Most sessions kept alive at once (at least 1)
    pub max_sessions: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
            bounds: ParameterBounds::default(),
            metrics_mode: MetricsMode::Recompute,
            max_sessions: 256,
        }
    }
}

type SharedSession = Arc<Mutex<SimulationSession>>;

struct SessionSlot {
    session: SharedSession,
    last_used: u64,
}

/// Owns every live session.
pub struct SessionRegistry<C: SeedContext> {
    context: C,
    bounds: ParameterBounds,
    metrics_mode: MetricsMode,
    max_sessions: usize,

    /// Monotonic use counter for LRU eviction
    clock: AtomicU64,

    sessions: Mutex<HashMap<SessionId, SessionSlot>>,
}

/// Recovers a guard from a poisoned mutex.
///
/// Sessions are only mutated through whole core calls, which either complete
/// or leave the previous state untouched.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<C: SeedContext> SessionRegistry<C> {
    /// Creates an empty registry.
    pub fn new(context: C, config: &ServiceConfig) -> Self {
        Self {
            context,
            bounds: config.bounds.clone(),
            metrics_mode: config.metrics_mode,
            max_sessions: config.max_sessions.max(1),
            clock: AtomicU64::new(0),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Policy bounds in force.
    pub fn bounds(&self) -> &ParameterBounds {
        &self.bounds
    }

    /// Number of live (initialized) sessions.
    pub fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }

    /// Drops a session. Returns true if it existed.
    pub fn remove(&self, id: SessionId) -> bool {
        lock(&self.sessions).remove(&id).is_some()
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Looks up a session and marks it as used.
    fn get(&self, id: SessionId) -> Option<SharedSession> {
        let tick = self.tick();
        let mut sessions = lock(&self.sessions);
        sessions.get_mut(&id).map(|slot| {
            slot.last_used = tick;
            Arc::clone(&slot.session)
        })
    }

    /// Adds an initialized session, evicting the least recently used one if full.
    fn insert(&self, id: SessionId, session: SimulationSession) {
        let tick = self.tick();
        let mut sessions = lock(&self.sessions);
        if !sessions.contains_key(&id) && sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(&oldest, _)| oldest);
            if let Some(oldest) = oldest {
                sessions.remove(&oldest);
                info!(session = %oldest, "session evicted");
            }
        }
        sessions.insert(
            id,
            SessionSlot {
                session: Arc::new(Mutex::new(session)),
                last_used: tick,
            },
        );
    }

    /// Validates and applies an initialize request.
    ///
    /// An existing session is re-initialized in place. An unknown id gets a
    /// fresh session, registered only once its initialize succeeds.
    pub fn initialize(
        &self,
        id: SessionId,
        request: &InitializeRequest,
    ) -> Result<InitializeResponse, ServiceError> {
        self.bounds.check_initialize(request)?;
        let conditions = InitialConditions {
            node_count: request.num_nodes,
            initial_infected: request.initial_infected,
            edge_probability: request.edge_probability,
        };

        let response = match self.get(id) {
            Some(session) => initialize_session(&mut lock(&session), id, &conditions)?,
            None => {
                let seed = self.context.next_session_seed();
                debug!(session = %id, seed, "session created");
                let mut session =
                    SimulationSession::new(seed).with_metrics_mode(self.metrics_mode);
                let response = initialize_session(&mut session, id, &conditions)?;
                self.insert(id, session);
                response
            }
        };

        info!(
            session = %id,
            nodes = request.num_nodes,
            links = response.network.links.len(),
            "initialize served"
        );
        Ok(response)
    }

    /// Validates and applies a step request.
    pub fn step(&self, id: SessionId, request: &StepRequest) -> Result<StepResponse, ServiceError> {
        self.bounds.check_step(request)?;
        let rates = TransitionRates::new(request.infection_rate, request.recovery_rate)?;

        let session = self.get(id).ok_or(ServiceError::NotInitialized)?;
        let mut session = lock(&session);
        let state = StatePayload::from(session.step(rates)?);

        debug!(
            session = %id,
            time = state.time,
            infected = state.infected.len(),
            recovered = state.recovered.len(),
            "step served"
        );

        Ok(StepResponse {
            session_id: id,
            state,
        })
    }

    /// Parses, validates and applies a raw initialize body.
    pub fn initialize_json(
        &self,
        id: SessionId,
        body: &Value,
    ) -> Result<InitializeResponse, ServiceError> {
        let request = self.bounds.parse_initialize(body)?;
        self.initialize(id, &request)
    }

    /// Parses, validates and applies a raw step body.
    pub fn step_json(&self, id: SessionId, body: &Value) -> Result<StepResponse, ServiceError> {
        let request = self.bounds.parse_step(body)?;
        self.step(id, &request)
    }
}

fn initialize_session(
    session: &mut SimulationSession,
    id: SessionId,
    conditions: &InitialConditions,
) -> Result<InitializeResponse, ServiceError> {
    let state = StatePayload::from(session.initialize(conditions)?);
    let network = session
        .topology()
        .ok_or_else(|| ServiceError::internal("session lost its graph after initialize"))?;
    Ok(InitializeResponse {
        session_id: id,
        state,
        network,
    })
}
