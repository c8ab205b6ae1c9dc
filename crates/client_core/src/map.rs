//! Delivery address picker on top of a [`MapBackend`].
//!
//! The picker owns the map view and a single marker; the coordinate itself
//! lives on the caller's [`Order`], and only `address_lat_lng` is ever
//! written.

use std::sync::Arc;

use map_integration::{
    Interaction, MapBackend, MapEvent, MapView, MapViewOptions, MarkerIcon, MarkerOptions,
};
use shared::{
    domain::Order,
    geo::{GeoPoint, RawLatLng},
};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

use crate::LocationProvider;

pub const DEFAULT_LATLNG: GeoPoint = GeoPoint::new(13.75, 21.62);
pub const DEFAULT_ZOOM_LEVEL: u8 = 1;
pub const MARKER_ZOOM_LEVEL: u8 = 16;
pub const TILE_LAYER_URL: &str = "https://{s}.tile.osm.org/{z}/{x}/{y}.png";
pub const MARKER_ICON_URL: &str =
    "https://res.cloudinary.com/foodmine/image/upload/v1638842791/map/marker_kbua9q.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapPickerState {
    Uninitialized,
    Initialized { readonly: bool },
}

pub struct MapPicker {
    backend: Arc<dyn MapBackend>,
    location: Arc<dyn LocationProvider>,
    readonly: bool,
    view: Option<Arc<dyn MapView>>,
    events: Option<broadcast::Receiver<MapEvent>>,
    marker_placed: bool,
}

impl MapPicker {
    pub fn new(backend: Arc<dyn MapBackend>, location: Arc<dyn LocationProvider>) -> Self {
        Self {
            backend,
            location,
            readonly: false,
            view: None,
            events: None,
            marker_placed: false,
        }
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    pub fn set_readonly(&mut self, readonly: bool) {
        self.readonly = readonly;
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn state(&self) -> MapPickerState {
        match self.view {
            Some(_) => MapPickerState::Initialized {
                readonly: self.readonly,
            },
            None => MapPickerState::Uninitialized,
        }
    }

    /// Builds the map on first call, then applies read-only display when
    /// asked for and the order already carries a coordinate. Safe to call
    /// again whenever the inputs change.
    pub async fn activate(&mut self, order: &mut Order) {
        if self.view.is_none() {
            self.initialize().await;
        }
        if self.readonly && order.address_lat_lng.is_some() {
            self.show_readonly(order);
        }
    }

    async fn initialize(&mut self) {
        let options = MapViewOptions {
            attribution_control: false,
        };
        match self.backend.create_view(options).await {
            Ok(Some(view)) => {
                view.set_view(DEFAULT_LATLNG, DEFAULT_ZOOM_LEVEL);
                view.add_tile_layer(TILE_LAYER_URL);
                self.events = Some(view.subscribe_events());
                self.view = Some(view);
                debug!("map: view initialized");
            }
            Ok(None) => debug!("map: no rendering surface, map stays inactive"),
            Err(err) => warn!("map: failed to load map view: {err:#}"),
        }
    }

    fn show_readonly(&mut self, order: &mut Order) {
        let Some(view) = self.view.clone() else {
            return;
        };
        let Some(point) = order.address_lat_lng else {
            return;
        };
        let Some(point) = self.set_marker(order, &RawLatLng::from(point)) else {
            return;
        };
        view.set_view(point, MARKER_ZOOM_LEVEL);
        for interaction in Interaction::ALL {
            view.disable_interaction(interaction);
        }
        view.set_marker_draggable(false);
    }

    pub fn handle_event(&mut self, order: &mut Order, event: MapEvent) {
        match event {
            MapEvent::Clicked(at) => {
                if self.readonly {
                    debug!("map: click ignored in read-only mode");
                    return;
                }
                self.set_marker(order, &at);
            }
            MapEvent::MarkerDragEnded(at) => {
                self.set_address(order, &at);
            }
        }
    }

    /// Applies every event the view has queued so far. Returns how many were
    /// handled.
    pub fn drain_events(&mut self, order: &mut Order) -> usize {
        let mut handled = 0;
        loop {
            let Some(events) = self.events.as_mut() else {
                return handled;
            };
            let event = match events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("map: dropped {skipped} queued map events");
                    continue;
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return handled,
            };
            self.handle_event(order, event);
            handled += 1;
        }
    }

    /// Moves the map and marker to the device location. Failures leave the
    /// picker as it was.
    pub async fn find_my_location(&mut self, order: &mut Order) {
        let Some(view) = self.view.clone() else {
            debug!("map: no view, location lookup skipped");
            return;
        };
        match self.location.current_location().await {
            Ok(point) => {
                view.set_view(point, MARKER_ZOOM_LEVEL);
                self.set_marker(order, &RawLatLng::from(point));
            }
            Err(err) => warn!("map: current location unavailable: {err:#}"),
        }
    }

    /// Places the marker on first use and moves it afterwards. Malformed
    /// coordinates leave both the marker and the order untouched.
    fn set_marker(&mut self, order: &mut Order, at: &RawLatLng) -> Option<GeoPoint> {
        let view = self.view.clone()?;
        let point = self.set_address(order, at)?;
        if self.marker_placed {
            view.move_marker(point);
        } else {
            view.place_marker(
                point,
                &MarkerOptions {
                    draggable: !self.readonly,
                    icon: marker_icon(),
                },
            );
            self.marker_placed = true;
        }
        Some(point)
    }

    /// The single write path into the order: validates, rounds, stores.
    pub fn set_address(&self, order: &mut Order, at: &RawLatLng) -> Option<GeoPoint> {
        let Some(point) = GeoPoint::from_raw(at) else {
            debug!(lat = %at.lat, lng = %at.lng, "map: malformed coordinate dropped");
            return None;
        };
        order.address_lat_lng = Some(point);
        Some(point)
    }
}

fn marker_icon() -> MarkerIcon {
    MarkerIcon {
        url: MARKER_ICON_URL.to_string(),
        size: (42, 42),
        anchor: (21, 42),
    }
}

#[cfg(test)]
#[path = "tests/map_tests.rs"]
mod tests;
