use crate::{
    api_client::SelectionClient,
    ui,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use roulette::{
    Catalog,
    Country,
    CountryId,
    Position,
    SelectionStore,
    SpinConfig,
    SpinEngine,
    SpinEvent,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};
use tokio::{
    sync::mpsc,
    time::{
        self,
        Instant,
        MissedTickBehavior,
    },
};
use tracing::{
    info,
    warn,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_MAP_CENTER: (f64, f64) = (0.0, 20.0);
pub const DEFAULT_MAP_SCALE: f64 = 147.0;
pub const ZOOMED_MAP_SCALE: f64 = 400.0;
/// How long the map stays on the winner before returning to the world view.
pub const ZOOM_HOLD: Duration = Duration::from_millis(5000);
const REDRAW_INTERVAL: Duration = Duration::from_millis(100);
const LOG_FILE_PREFIX: &str = "country-roulette.log";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_url: String,
    pub geojson: PathBuf,
    pub device_id: String,
}

/// Where the map canvas looks. `scale` follows the web map convention where 147
/// shows the whole world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapView {
    pub center: Position,
    pub scale: f64,
}

impl Default for MapView {
    fn default() -> Self {
        let (lng, lat) = DEFAULT_MAP_CENTER;
        Self {
            center: Position::new(lng, lat),
            scale: DEFAULT_MAP_SCALE,
        }
    }
}

impl MapView {
    pub fn zoomed_on(center: Position) -> Self {
        Self {
            center,
            scale: ZOOMED_MAP_SCALE,
        }
    }

    /// Canvas bounds as `(x_bounds, y_bounds)` in degrees.
    pub fn bounds(&self) -> ([f64; 2], [f64; 2]) {
        let lng_span = 360.0 * DEFAULT_MAP_SCALE / self.scale;
        let lat_span = lng_span / 2.0;
        (
            [
                self.center.lng - lng_span / 2.0,
                self.center.lng + lng_span / 2.0,
            ],
            [
                self.center.lat - lat_span / 2.0,
                self.center.lat + lat_span / 2.0,
            ],
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct Zoom {
    view: MapView,
    until: Instant,
}

/// Everything the UI needs for one frame, borrowed from the controller.
#[derive(Debug)]
pub struct AppSnapshot<'a> {
    pub catalog: &'a Catalog,
    pub used: &'a [CountryId],
    pub highlight: &'a [CountryId],
    pub selection: Option<&'a Country>,
    pub predetermined: Option<&'a Country>,
    pub is_spinning: bool,
    pub all_used: bool,
    pub view: MapView,
    pub status: &'a str,
}

/// Session controller: owns the visit history and the spin engine, and is the only
/// place where a spin result turns into a history entry.
pub struct AppController {
    catalog: Catalog,
    store: SelectionStore,
    engine: SpinEngine,
    highlight: Vec<CountryId>,
    selection: Option<CountryId>,
    zoom: Option<Zoom>,
    status: String,
}

impl AppController {
    pub fn new(catalog: Catalog, store: SelectionStore, engine: SpinEngine) -> Self {
        Self {
            catalog,
            store,
            engine,
            highlight: Vec::new(),
            selection: None,
            zoom: None,
            status: String::from("Press SPIN to start!"),
        }
    }

    /// Loads the catalog and the device's history, and wires a fresh spin engine.
    pub async fn connect(
        config: &AppConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SpinEvent>)> {
        let catalog = load_catalog(&config.geojson)?;
        let client = SelectionClient::new(config.server_url.clone())?;
        info!(
            server = client.base_url(),
            device_id = %config.device_id,
            "loading used countries"
        );
        let store = SelectionStore::load(config.device_id.clone(), client).await;
        let (engine, spin_events) = SpinEngine::channel(SpinConfig::default());
        Ok((Self::new(catalog, store, engine), spin_events))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn used(&self) -> &[CountryId] {
        self.store.used()
    }

    pub fn selection(&self) -> Option<&CountryId> {
        self.selection.as_ref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_spinning(&self) -> bool {
        self.engine.is_spinning()
    }

    pub fn all_used(&self) -> bool {
        self.catalog.all_used(self.store.used())
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    /// Starts a spin over the countries not yet visited. Returns whether one started.
    pub fn spin(&mut self) -> bool {
        if self.engine.is_spinning() {
            return false;
        }
        let eligible = self.catalog.eligible_countries(self.store.used());
        if eligible.is_empty() {
            self.set_status("Every country has been visited");
            return false;
        }
        if !self.engine.start(eligible) {
            return false;
        }
        self.selection = None;
        self.highlight.clear();
        self.set_status("Spinning...");
        true
    }

    pub fn handle_spin_event(&mut self, event: SpinEvent, now: Instant) {
        match event {
            SpinEvent::SpinStarted => {
                self.selection = None;
                self.highlight.clear();
            }
            SpinEvent::HighlightChanged(ids) => self.highlight = ids,
            SpinEvent::SpinFinished { id, name } => {
                self.highlight.clear();
                if !self.store.append(id.clone()) {
                    warn!(%id, "spin returned an already used country");
                }
                let centroid = self
                    .catalog
                    .coordinates(&id)
                    .and_then(|outline| outline.centroid());
                match centroid {
                    Some(center) => {
                        self.zoom = Some(Zoom {
                            view: MapView::zoomed_on(center),
                            until: now + ZOOM_HOLD,
                        });
                    }
                    None => warn!(%id, "no geometry to center on"),
                }
                self.set_status(format!("Next stop: {name}"));
                self.selection = Some(id);
            }
        }
    }

    fn refuse_while_spinning(&mut self, action: &str) -> bool {
        if self.engine.is_spinning() {
            self.set_status(format!("Cannot {action} while spinning"));
            return true;
        }
        false
    }

    pub fn undo(&mut self) -> Option<CountryId> {
        if self.refuse_while_spinning("undo") {
            return None;
        }
        let removed = self.store.undo_last()?;
        self.clear_selection_if(&removed);
        self.set_status(format!("Undid {}", self.display_name(&removed)));
        Some(removed)
    }

    pub fn remove(&mut self, id: &CountryId) -> bool {
        if self.refuse_while_spinning("remove") {
            return false;
        }
        if !self.store.remove(id) {
            return false;
        }
        self.clear_selection_if(id);
        self.set_status(format!("Removed {}", self.display_name(id)));
        true
    }

    pub fn reset(&mut self) -> bool {
        if self.refuse_while_spinning("reset") {
            return false;
        }
        self.store.reset();
        self.selection = None;
        self.set_status("All countries reset");
        true
    }

    pub fn set_predetermined(&mut self, id: Option<CountryId>) {
        let message = match &id {
            Some(id) => format!("Next spin lands on {}", self.display_name(id)),
            None => String::from("Next spin is random"),
        };
        self.engine.set_predetermined(id);
        self.set_status(message);
    }

    fn clear_selection_if(&mut self, id: &CountryId) {
        if self.selection.as_ref() == Some(id) {
            self.selection = None;
        }
    }

    fn display_name(&self, id: &CountryId) -> String {
        self.catalog
            .get(id)
            .map(|country| country.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn view(&self, now: Instant) -> MapView {
        match self.zoom {
            Some(zoom) if now < zoom.until => zoom.view,
            _ => MapView::default(),
        }
    }

    /// Drops an elapsed zoom. Returns `true` when the view changed.
    pub fn expire_zoom(&mut self, now: Instant) -> bool {
        match self.zoom {
            Some(zoom) if now >= zoom.until => {
                self.zoom = None;
                true
            }
            _ => false,
        }
    }

    pub fn snapshot(&self, now: Instant) -> AppSnapshot<'_> {
        AppSnapshot {
            catalog: &self.catalog,
            used: self.store.used(),
            highlight: &self.highlight,
            selection: self.selection.as_ref().and_then(|id| self.catalog.get(id)),
            predetermined: self
                .engine
                .predetermined()
                .and_then(|id| self.catalog.get(&id)),
            is_spinning: self.engine.is_spinning(),
            all_used: self.all_used(),
            view: self.view(now),
            status: &self.status,
        }
    }

    /// Cancels a running spin and waits for pending saves.
    pub async fn shutdown(&mut self) {
        self.engine.cancel();
        self.store.flush().await;
    }
}

fn load_catalog(path: &Path) -> Result<Catalog> {
    let catalog = Catalog::from_geojson_path(path)
        .map_err(|err| eyre!("{err:#}"))
        .wrap_err_with(|| format!("loading countries from {}", path.display()))?;
    if catalog.is_empty() {
        return Err(eyre!("{} contains no countries", path.display()));
    }
    info!(countries = catalog.len(), "catalog ready");
    Ok(catalog)
}

/// Routes logs to a daily file under `log_dir`; the terminal belongs to the UI.
pub fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|err| eyre!("failed to install log subscriber: {err}"))?;
    Ok(guard)
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let (mut controller, spin_events) = AppController::connect(&config).await?;
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(&mut controller, spin_events, &mut ui_state, &mut input_events).await;
    let exit = ui::terminal_exit();
    close_session(&mut controller, res).await.and(exit)
}

/// Cancels a running spin and waits for queued saves, however the loop ended.
async fn close_session(controller: &mut AppController, outcome: Result<()>) -> Result<()> {
    if let Err(err) = &outcome {
        warn!(?err, "app loop failed");
    }
    info!("Shutting down");
    controller.shutdown().await;
    outcome
}

fn redraw(ui_state: &mut ui::UiState, controller: &AppController, context: &str) -> Result<()> {
    ui::draw(ui_state, &controller.snapshot(Instant::now()))
        .wrap_err_with(|| format!("draw after {context} failed"))
}

async fn run_loop(
    controller: &mut AppController,
    mut spin_events: mpsc::UnboundedReceiver<SpinEvent>,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    info!("Running app loop");
    let mut ticker = time::interval(REDRAW_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    redraw(ui_state, controller, "startup")?;

    loop {
        tokio::select! {
            maybe_event = spin_events.recv() => {
                let Some(event) = maybe_event else {
                    warn!("spin event channel closed");
                    break;
                };
                controller.handle_spin_event(event, Instant::now());
                redraw(ui_state, controller, "spin event")?;
            }
            _ = ticker.tick() => {
                if controller.expire_zoom(Instant::now()) {
                    redraw(ui_state, controller, "zoom reset")?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Spin => {
                        controller.spin();
                    }
                    ui::UserEvent::Undo => {
                        controller.undo();
                    }
                    ui::UserEvent::ConfirmReset => {
                        controller.reset();
                    }
                    ui::UserEvent::Remove(id) => {
                        controller.remove(&id);
                    }
                    ui::UserEvent::SetPredetermined(id) => {
                        controller.set_predetermined(id);
                    }
                    ui::UserEvent::Redraw => {}
                }
                redraw(ui_state, controller, "input")?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests;
