use crate::{
    catalog::{
        Country,
        CountryId,
    },
    eligibility::{
        pick_one,
        pick_without_replacement,
    },
};
use rand::{
    Rng,
    SeedableRng,
    rngs::StdRng,
};
use std::{
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
};

/// Tick cadence of a spin. Delays grow geometrically from `initial_delay` until
/// either `max_ticks` ticks ran or the delay reached `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpinConfig {
    pub initial_delay: Duration,
    pub growth_factor: f64,
    pub max_ticks: u32,
    pub max_delay: Duration,
    /// Two countries are highlighted per tick while the delay is below this, one after.
    pub highlight_delay_threshold: Duration,
}

impl Default for SpinConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(60),
            growth_factor: 1.1,
            max_ticks: 50,
            max_delay: Duration::from_millis(400),
            highlight_delay_threshold: Duration::from_millis(150),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpinEvent {
    SpinStarted,
    HighlightChanged(Vec<CountryId>),
    /// Terminal event of a cycle; the highlight set is empty from here on.
    SpinFinished { id: CountryId, name: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpinState {
    pub is_spinning: bool,
    pub highlight: Vec<CountryId>,
    pub final_selection: Option<CountryId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Publish `highlight`, then wait `delay` before the next tick.
    Continue {
        highlight: Vec<CountryId>,
        delay: Duration,
    },
    /// Publish `highlight`; the cycle is over and a winner must be chosen.
    Complete { highlight: Vec<CountryId> },
}

/// One spin, as a synchronous step machine over a fixed eligible pool.
#[derive(Debug, Clone)]
pub struct SpinCycle {
    config: SpinConfig,
    pool: Vec<Country>,
    tick_count: u32,
    delay: Duration,
}

impl SpinCycle {
    /// `None` when there is nothing to spin over.
    pub fn new(config: SpinConfig, pool: Vec<Country>) -> Option<Self> {
        if pool.is_empty() {
            return None;
        }
        let delay = config.initial_delay;
        Some(Self {
            config,
            pool,
            tick_count: 0,
            delay,
        })
    }

    pub fn pool(&self) -> &[Country] {
        &self.pool
    }

    pub fn tick_count(&self) -> u32 {
        self.tick_count
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn highlight_count(&self) -> usize {
        if self.delay < self.config.highlight_delay_threshold {
            2
        } else {
            1
        }
    }

    pub fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R) -> TickOutcome {
        let highlight = pick_without_replacement(&self.pool, self.highlight_count(), rng)
            .into_iter()
            .map(|country| country.id)
            .collect();
        self.tick_count += 1;
        // a growth that leaves the representable range ends the cycle
        self.delay = Duration::try_from_secs_f64(
            self.delay.as_secs_f64() * self.config.growth_factor,
        )
        .unwrap_or(Duration::MAX);
        if self.tick_count >= self.config.max_ticks || self.delay >= self.config.max_delay {
            TickOutcome::Complete { highlight }
        } else {
            TickOutcome::Continue {
                highlight,
                delay: self.delay,
            }
        }
    }

    /// The winner is drawn from the whole pool, independently of the last highlight,
    /// unless `predetermined` names a country of the pool.
    pub fn choose_winner<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        predetermined: Option<&CountryId>,
    ) -> Option<Country> {
        let forced = predetermined
            .and_then(|id| self.pool.iter().find(|country| &country.id == id));
        match forced {
            Some(country) => Some(country.clone()),
            None => pick_one(&self.pool, rng),
        }
    }
}

struct Shared {
    state: SpinState,
    predetermined: Option<CountryId>,
    rng: StdRng,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives spin cycles on the tokio timer and reports progress as [`SpinEvent`]s.
///
/// At most one cycle runs at a time. Dropping the engine cancels a running cycle.
pub struct SpinEngine {
    config: SpinConfig,
    shared: Arc<Mutex<Shared>>,
    events: mpsc::UnboundedSender<SpinEvent>,
    task: Option<JoinHandle<()>>,
}

impl SpinEngine {
    pub fn new(config: SpinConfig, events: mpsc::UnboundedSender<SpinEvent>) -> Self {
        Self::with_rng(config, StdRng::from_os_rng(), events)
    }

    pub fn with_rng(
        config: SpinConfig,
        rng: StdRng,
        events: mpsc::UnboundedSender<SpinEvent>,
    ) -> Self {
        let shared = Shared {
            state: SpinState::default(),
            predetermined: None,
            rng,
        };
        Self {
            config,
            shared: Arc::new(Mutex::new(shared)),
            events,
            task: None,
        }
    }

    pub fn channel(config: SpinConfig) -> (Self, mpsc::UnboundedReceiver<SpinEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(config, sender), receiver)
    }

    pub fn config(&self) -> &SpinConfig {
        &self.config
    }

    pub fn state(&self) -> SpinState {
        lock(&self.shared).state.clone()
    }

    pub fn is_spinning(&self) -> bool {
        lock(&self.shared).state.is_spinning
    }

    pub fn predetermined(&self) -> Option<CountryId> {
        lock(&self.shared).predetermined.clone()
    }

    /// Forces the winner of the next spin to start, if that country is still eligible.
    pub fn set_predetermined(&self, id: Option<CountryId>) {
        lock(&self.shared).predetermined = id;
    }

    /// Starts a cycle over `pool`. Returns `false`, changing nothing, when a cycle is
    /// already running or the pool is empty.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, pool: Vec<Country>) -> bool {
        let mut shared = lock(&self.shared);
        if shared.state.is_spinning {
            tracing::debug!("spin requested while spinning; ignoring");
            return false;
        }
        let Some(cycle) = SpinCycle::new(self.config.clone(), pool) else {
            tracing::debug!("spin requested with no eligible countries; ignoring");
            return false;
        };
        tracing::info!(eligible = cycle.pool().len(), "starting spin");
        shared.state = SpinState {
            is_spinning: true,
            highlight: Vec::new(),
            final_selection: None,
        };
        let predetermined = shared.predetermined.clone();
        drop(shared);

        let _ = self.events.send(SpinEvent::SpinStarted);
        let task = tokio::spawn(run_cycle(
            cycle,
            predetermined,
            Arc::clone(&self.shared),
            self.events.clone(),
        ));
        self.task = Some(task);
        true
    }

    /// Aborts a running cycle. No further events are emitted for it and the
    /// predetermined selection is kept for the next spin.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        let mut shared = lock(&self.shared);
        if shared.state.is_spinning {
            tracing::info!("spin cancelled");
            shared.state.is_spinning = false;
            shared.state.highlight.clear();
        }
    }
}

impl Drop for SpinEngine {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// `predetermined` is the override captured when the cycle started; one set while
/// the cycle runs is left for the next spin.
async fn run_cycle(
    mut cycle: SpinCycle,
    predetermined: Option<CountryId>,
    shared: Arc<Mutex<Shared>>,
    events: mpsc::UnboundedSender<SpinEvent>,
) {
    loop {
        let outcome = {
            let mut guard = lock(&shared);
            let outcome = cycle.tick(&mut guard.rng);
            let highlight = match &outcome {
                TickOutcome::Continue { highlight, .. }
                | TickOutcome::Complete { highlight } => highlight.clone(),
            };
            guard.state.highlight = highlight.clone();
            let _ = events.send(SpinEvent::HighlightChanged(highlight));
            outcome
        };
        match outcome {
            TickOutcome::Continue { delay, .. } => tokio::time::sleep(delay).await,
            TickOutcome::Complete { .. } => break,
        }
    }

    let winner = {
        let mut guard = lock(&shared);
        let Shared {
            state,
            predetermined: pending,
            rng,
        } = &mut *guard;
        let winner = cycle.choose_winner(rng, predetermined.as_ref());
        if *pending == predetermined {
            *pending = None;
        }
        *state = SpinState {
            is_spinning: false,
            highlight: Vec::new(),
            final_selection: winner.as_ref().map(|country| country.id.clone()),
        };
        winner
    };

    if let Some(country) = winner {
        tracing::info!(
            id = %country.id,
            name = %country.name,
            ticks = cycle.tick_count(),
            "spin finished"
        );
        let _ = events.send(SpinEvent::SpinFinished {
            id: country.id,
            name: country.name,
        });
    }
}
