#![allow(non_snake_case)]

use super::*;
use rand::{
    SeedableRng,
    rngs::StdRng,
};
use roulette::SelectionBackend;
use std::sync::{
    Arc,
    Mutex,
};

#[derive(Clone, Default)]
struct FakeBackend {
    saved: Arc<Mutex<Vec<CountryId>>>,
}

impl SelectionBackend for FakeBackend {
    async fn load(&self, _device_id: &str) -> roulette::Result<Vec<CountryId>> {
        Ok(self.saved.lock().unwrap().clone())
    }

    async fn save(&self, _device_id: &str, countries: &[CountryId]) -> roulette::Result<()> {
        *self.saved.lock().unwrap() = countries.to_vec();
        Ok(())
    }
}

const CATALOG: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    { "type": "Feature", "properties": { "ISO_A3": "FRA", "NAME": "France" },
      "geometry": { "type": "Polygon", "coordinates": [[[0, 40], [0, 50], [10, 50], [10, 40]]] } },
    { "type": "Feature", "properties": { "ISO_A3": "JPN", "NAME": "Japan" },
      "geometry": { "type": "Polygon", "coordinates": [[[130, 30], [140, 40]]] } },
    { "type": "Feature", "properties": { "ISO_A3": "ATA", "NAME": "Nowhere" },
      "geometry": null }
  ]
}"#;

fn id(raw: &str) -> CountryId {
    CountryId::from(raw)
}

fn controller_with(
    used: &[&str],
    seed: u64,
) -> (
    AppController,
    mpsc::UnboundedReceiver<SpinEvent>,
    FakeBackend,
) {
    let catalog = Catalog::from_geojson_str(CATALOG).unwrap();
    let backend = FakeBackend::default();
    let store = SelectionStore::with_used(
        "device",
        backend.clone(),
        used.iter().map(|raw| id(raw)).collect(),
    );
    let (sender, receiver) = mpsc::unbounded_channel();
    let engine = SpinEngine::with_rng(
        SpinConfig::default(),
        StdRng::seed_from_u64(seed),
        sender,
    );
    (AppController::new(catalog, store, engine), receiver, backend)
}

async fn finish_spin(
    controller: &mut AppController,
    receiver: &mut mpsc::UnboundedReceiver<SpinEvent>,
) -> CountryId {
    loop {
        let event = receiver.recv().await.expect("engine alive");
        let winner = match &event {
            SpinEvent::SpinFinished { id, .. } => Some(id.clone()),
            _ => None,
        };
        controller.handle_spin_event(event, Instant::now());
        if let Some(winner) = winner {
            return winner;
        }
    }
}

#[test]
fn map_view__default_shows_the_whole_world() {
    let view = MapView::default();

    let (x, y) = view.bounds();

    assert_eq!(x, [-180.0, 180.0]);
    assert_eq!(y, [-70.0, 110.0]);
}

#[test]
fn map_view__zoom_narrows_around_the_center() {
    let view = MapView::zoomed_on(Position::new(10.0, 45.0));

    let (x, y) = view.bounds();

    let width = x[1] - x[0];
    assert!((width - 360.0 * 147.0 / 400.0).abs() < 1e-9);
    assert!(((x[0] + x[1]) / 2.0 - 10.0).abs() < 1e-9);
    assert!(((y[0] + y[1]) / 2.0 - 45.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn spin__winner_is_recorded_selected_and_zoomed() {
    // given
    let (mut controller, mut receiver, backend) = controller_with(&[], 3);
    controller.set_predetermined(Some(id("FRA")));

    // when
    assert!(controller.spin());
    assert!(controller.is_spinning());
    let winner = finish_spin(&mut controller, &mut receiver).await;
    controller.shutdown().await;

    // then
    assert_eq!(winner, id("FRA"));
    assert_eq!(controller.used(), &[id("FRA")]);
    assert_eq!(controller.selection(), Some(&id("FRA")));
    assert_eq!(*backend.saved.lock().unwrap(), vec![id("FRA")]);
    let view = controller.view(Instant::now());
    assert_eq!(view, MapView::zoomed_on(Position::new(5.0, 45.0)));
    assert_eq!(controller.status(), "Next stop: France");
}

#[tokio::test(start_paused = true)]
async fn zoom__reverts_to_the_world_after_five_seconds() {
    // given
    let (mut controller, mut receiver, _) = controller_with(&[], 4);
    controller.set_predetermined(Some(id("JPN")));
    controller.spin();
    finish_spin(&mut controller, &mut receiver).await;
    let finished_at = Instant::now();

    // when
    time::advance(Duration::from_millis(4999)).await;
    let before = controller.expire_zoom(Instant::now());
    let zoomed = controller.view(Instant::now());
    time::advance(Duration::from_millis(1)).await;
    let after = controller.expire_zoom(Instant::now());

    // then
    assert!(!before);
    assert_eq!(zoomed.scale, ZOOMED_MAP_SCALE);
    assert!(after);
    assert_eq!(controller.view(finished_at + ZOOM_HOLD), MapView::default());
}

#[tokio::test(start_paused = true)]
async fn spin__winner_without_geometry_keeps_the_world_view() {
    // given
    let (mut controller, mut receiver, _) = controller_with(&["FRA", "JPN"], 5);

    // when
    controller.spin();
    let winner = finish_spin(&mut controller, &mut receiver).await;

    // then
    assert_eq!(winner, id("ATA"));
    assert_eq!(controller.view(Instant::now()), MapView::default());
    assert!(controller.all_used());
}

#[tokio::test(start_paused = true)]
async fn spin__refused_when_everything_is_used() {
    let (mut controller, mut receiver, _) = controller_with(&["FRA", "JPN", "ATA"], 6);

    let started = controller.spin();

    assert!(!started);
    assert!(receiver.try_recv().is_err());
    assert_eq!(controller.status(), "Every country has been visited");
}

#[tokio::test(start_paused = true)]
async fn undo__clears_the_displayed_selection() {
    // given
    let (mut controller, mut receiver, _) = controller_with(&["JPN"], 7);
    controller.set_predetermined(Some(id("FRA")));
    controller.spin();
    finish_spin(&mut controller, &mut receiver).await;

    // when
    let removed = controller.undo();

    // then
    assert_eq!(removed, Some(id("FRA")));
    assert_eq!(controller.selection(), None);
    assert_eq!(controller.used(), &[id("JPN")]);
}

#[tokio::test(start_paused = true)]
async fn remove__other_entry_keeps_the_selection() {
    // given
    let (mut controller, mut receiver, _) = controller_with(&["JPN"], 8);
    controller.set_predetermined(Some(id("FRA")));
    controller.spin();
    finish_spin(&mut controller, &mut receiver).await;

    // when
    let removed = controller.remove(&id("JPN"));

    // then
    assert!(removed);
    assert_eq!(controller.selection(), Some(&id("FRA")));
    assert_eq!(controller.used(), &[id("FRA")]);
}

#[tokio::test(start_paused = true)]
async fn history_changes__are_refused_while_spinning() {
    // given
    let (mut controller, _receiver, _) = controller_with(&["JPN"], 9);
    assert!(controller.spin());

    // when
    let undone = controller.undo();
    let removed = controller.remove(&id("JPN"));
    let reset = controller.reset();

    // then
    assert_eq!(undone, None);
    assert!(!removed);
    assert!(!reset);
    assert_eq!(controller.used(), &[id("JPN")]);
    assert_eq!(controller.status(), "Cannot reset while spinning");
}

#[tokio::test(start_paused = true)]
async fn reset__empties_history_and_persists() {
    // given
    let (mut controller, _receiver, backend) = controller_with(&["FRA", "JPN"], 10);

    // when
    assert!(controller.reset());
    controller.shutdown().await;

    // then
    assert!(controller.used().is_empty());
    assert!(backend.saved.lock().unwrap().is_empty());
    assert!(!controller.all_used());
}

#[tokio::test(start_paused = true)]
async fn shutdown__cancels_a_running_spin() {
    // given
    let (mut controller, mut receiver, _) = controller_with(&[], 11);
    controller.spin();

    // when
    controller.shutdown().await;
    time::advance(Duration::from_secs(10)).await;

    // then
    assert!(!controller.is_spinning());
    while let Ok(event) = receiver.try_recv() {
        assert!(!matches!(event, SpinEvent::SpinFinished { .. }));
    }
    assert!(controller.used().is_empty());
}

#[tokio::test(start_paused = true)]
async fn snapshot__resolves_selection_and_predetermined() {
    // given
    let (mut controller, _receiver, _) = controller_with(&["FRA"], 12);
    controller.set_predetermined(Some(id("JPN")));

    // when
    let snapshot = controller.snapshot(Instant::now());

    // then
    assert_eq!(snapshot.used, &[id("FRA")]);
    assert_eq!(snapshot.predetermined.map(|c| c.name.as_str()), Some("Japan"));
    assert!(snapshot.selection.is_none());
    assert!(!snapshot.is_spinning);
    assert!(!snapshot.all_used);
    assert_eq!(snapshot.status, "Next spin lands on Japan");
}

#[tokio::test(start_paused = true)]
async fn close_session__failed_loop_still_flushes_saves_and_stops_the_spin() {
    // given
    let (mut controller, _receiver, backend) = controller_with(&["FRA", "JPN"], 13);
    assert!(controller.remove(&id("JPN")));
    assert!(controller.spin());

    // when
    let outcome = close_session(&mut controller, Err(eyre!("terminal input stream closed"))).await;

    // then
    let err = outcome.unwrap_err();
    assert_eq!(err.to_string(), "terminal input stream closed");
    assert_eq!(*backend.saved.lock().unwrap(), vec![id("FRA")]);
    assert!(!controller.is_spinning());
}
