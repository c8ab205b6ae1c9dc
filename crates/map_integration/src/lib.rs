//! Boundary to the map rendering library.
//!
//! Only the handful of operations the address picker needs are exposed. A
//! browser build implements [`MapBackend`] over its mapping widget; this crate
//! ships a headless implementation and one for contexts with no surface.

use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::geo::{GeoPoint, RawLatLng};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapViewOptions {
    pub attribution_control: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerIcon {
    pub url: String,
    pub size: (u32, u32),
    pub anchor: (u32, u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerOptions {
    pub draggable: bool,
    pub icon: MarkerIcon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interaction {
    Dragging,
    TouchZoom,
    DoubleClickZoom,
    ScrollWheelZoom,
    BoxZoom,
    Keyboard,
    Tap,
    ClickToPlace,
}

impl Interaction {
    pub const ALL: [Interaction; 8] = [
        Interaction::Dragging,
        Interaction::TouchZoom,
        Interaction::DoubleClickZoom,
        Interaction::ScrollWheelZoom,
        Interaction::BoxZoom,
        Interaction::Keyboard,
        Interaction::Tap,
        Interaction::ClickToPlace,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MapEvent {
    Clicked(RawLatLng),
    MarkerDragEnded(RawLatLng),
}

pub trait MapView: Send + Sync {
    fn set_view(&self, center: GeoPoint, zoom: u8);
    fn add_tile_layer(&self, url_template: &str);
    /// Creates the marker. Callers move an existing marker with
    /// [`MapView::move_marker`] instead of placing a second one.
    fn place_marker(&self, at: GeoPoint, options: &MarkerOptions);
    fn move_marker(&self, at: GeoPoint);
    fn set_marker_draggable(&self, draggable: bool);
    fn disable_interaction(&self, interaction: Interaction);
    fn subscribe_events(&self) -> broadcast::Receiver<MapEvent>;
}

#[async_trait]
pub trait MapBackend: Send + Sync {
    /// Builds a map view. `Ok(None)` means there is no rendering surface in
    /// this execution context.
    async fn create_view(
        &self,
        options: MapViewOptions,
    ) -> anyhow::Result<Option<Arc<dyn MapView>>>;
}

pub struct NoSurfaceBackend;

#[async_trait]
impl MapBackend for NoSurfaceBackend {
    async fn create_view(
        &self,
        _options: MapViewOptions,
    ) -> anyhow::Result<Option<Arc<dyn MapView>>> {
        Ok(None)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerState {
    pub position: GeoPoint,
    pub draggable: bool,
    pub icon_url: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeadlessMapState {
    pub attribution_control: bool,
    pub center: Option<GeoPoint>,
    pub zoom: Option<u8>,
    pub tile_layers: Vec<String>,
    pub marker: Option<MarkerState>,
    pub disabled: BTreeSet<Interaction>,
    pub markers_placed: usize,
}

/// In-memory map view. Keeps what a real widget would render and lets callers
/// inject the user gestures a real widget would report.
pub struct HeadlessMapView {
    state: Mutex<HeadlessMapState>,
    events: broadcast::Sender<MapEvent>,
}

impl HeadlessMapView {
    pub fn new(options: &MapViewOptions) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(HeadlessMapState {
                attribution_control: options.attribution_control,
                ..HeadlessMapState::default()
            }),
            events,
        }
    }

    pub fn snapshot(&self) -> HeadlessMapState {
        self.state().clone()
    }

    /// Simulates a click. Dropped once click-to-place has been disabled.
    pub fn click(&self, at: RawLatLng) -> bool {
        if self.state().disabled.contains(&Interaction::ClickToPlace) {
            return false;
        }
        self.events.send(MapEvent::Clicked(at)).is_ok()
    }

    /// Simulates dragging the marker to `at`. Only a draggable marker moves.
    pub fn drag_marker_to(&self, at: GeoPoint) -> bool {
        {
            let mut state = self.state();
            match state.marker.as_mut() {
                Some(marker) if marker.draggable => marker.position = at,
                _ => return false,
            }
        }
        self.events
            .send(MapEvent::MarkerDragEnded(RawLatLng::from(at)))
            .is_ok()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, HeadlessMapState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MapView for HeadlessMapView {
    fn set_view(&self, center: GeoPoint, zoom: u8) {
        let mut state = self.state();
        state.center = Some(center);
        state.zoom = Some(zoom);
    }

    fn add_tile_layer(&self, url_template: &str) {
        self.state().tile_layers.push(url_template.to_string());
    }

    fn place_marker(&self, at: GeoPoint, options: &MarkerOptions) {
        let mut state = self.state();
        state.marker = Some(MarkerState {
            position: at,
            draggable: options.draggable,
            icon_url: options.icon.url.clone(),
        });
        state.markers_placed += 1;
    }

    fn move_marker(&self, at: GeoPoint) {
        if let Some(marker) = self.state().marker.as_mut() {
            marker.position = at;
        }
    }

    fn set_marker_draggable(&self, draggable: bool) {
        if let Some(marker) = self.state().marker.as_mut() {
            marker.draggable = draggable;
        }
    }

    fn disable_interaction(&self, interaction: Interaction) {
        self.state().disabled.insert(interaction);
    }

    fn subscribe_events(&self) -> broadcast::Receiver<MapEvent> {
        self.events.subscribe()
    }
}

#[derive(Default)]
pub struct HeadlessMapBackend {
    views: Mutex<Vec<Arc<HeadlessMapView>>>,
}

impl HeadlessMapBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_view(&self) -> Option<Arc<HeadlessMapView>> {
        self.views
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn views_created(&self) -> usize {
        self.views
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl MapBackend for HeadlessMapBackend {
    async fn create_view(
        &self,
        options: MapViewOptions,
    ) -> anyhow::Result<Option<Arc<dyn MapView>>> {
        let view = Arc::new(HeadlessMapView::new(&options));
        self.views
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(view.clone());
        Ok(Some(view as Arc<dyn MapView>))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn icon() -> MarkerIcon {
        MarkerIcon {
            url: "marker.png".into(),
            size: (42, 42),
            anchor: (21, 42),
        }
    }

    #[tokio::test]
    async fn no_surface_backend_yields_no_view() {
        let view = NoSurfaceBackend
            .create_view(MapViewOptions {
                attribution_control: false,
            })
            .await
            .expect("create");
        assert!(view.is_none());
    }

    #[tokio::test]
    async fn clicks_stop_after_click_to_place_is_disabled() {
        let view = HeadlessMapView::new(&MapViewOptions {
            attribution_control: false,
        });
        let mut events = view.subscribe_events();

        assert!(view.click(RawLatLng::new(1.0, 2.0)));
        assert_eq!(
            events.recv().await.expect("event"),
            MapEvent::Clicked(RawLatLng::new(1.0, 2.0))
        );

        view.disable_interaction(Interaction::ClickToPlace);
        assert!(!view.click(RawLatLng::new(3.0, 4.0)));
    }

    #[test]
    fn only_draggable_marker_can_be_dragged() {
        let view = HeadlessMapView::new(&MapViewOptions {
            attribution_control: false,
        });
        let _events = view.subscribe_events();
        assert!(!view.drag_marker_to(GeoPoint::new(1.0, 1.0)));

        view.place_marker(
            GeoPoint::new(0.0, 0.0),
            &MarkerOptions {
                draggable: false,
                icon: icon(),
            },
        );
        assert!(!view.drag_marker_to(GeoPoint::new(1.0, 1.0)));

        view.set_marker_draggable(true);
        assert!(view.drag_marker_to(GeoPoint::new(1.0, 1.0)));
        assert_eq!(
            view.snapshot().marker.map(|m| m.position),
            Some(GeoPoint::new(1.0, 1.0))
        );
    }

    #[test]
    fn map_event_wire_shape() {
        let json = serde_json::to_value(MapEvent::Clicked(RawLatLng::new(1.5, 2.5)))
            .expect("encode");
        assert_eq!(json["type"], "clicked");
        assert_eq!(json["payload"]["lat"], 1.5);
    }
}
