//! Interaction dispatcher.
//!
//! [`TrajectoryViewer`] ties the pieces together: it owns the map surface, the journeys,
//! the render set and the proximity session, and turns [`MapEvent`]s into panel updates.
//! Events are plain messages; the host forwards whatever its map library reports.

use log::{debug, info, warn};

use crate::content::synthesize;
use crate::extract::{extract, Selection};
use crate::model::Journey;
use crate::proximity::{PanelCommand, ProximitySession};
use crate::render::{LayerRole, PathId, RenderSet};
use crate::surface::{EventTarget, LayerId, ListenerId, MapSurface};
use crate::{GpsPoint, ViewerConfig};

/// Pointer events reported by the map surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MapEvent {
    /// Pointer moved anywhere on the map
    PointerMove { position: GpsPoint },
    LayerEnter { layer: LayerId, position: GpsPoint },
    LayerMove { layer: LayerId, position: GpsPoint },
    LayerLeave { layer: LayerId },
}

/// Trajectory rendering and hover engine over a [`MapSurface`].
pub struct TrajectoryViewer<S: MapSurface> {
    surface: S,
    journeys: Vec<Journey>,
    config: ViewerConfig,
    render_set: RenderSet,
    session: ProximitySession,
    pointer_listener: Option<ListenerId>,
}

impl<S: MapSurface> TrajectoryViewer<S> {
    pub fn new(surface: S, journeys: Vec<Journey>, config: ViewerConfig) -> Self {
        let session = ProximitySession::new(config.proximity.clone());
        Self {
            surface,
            journeys,
            config,
            render_set: RenderSet::new(),
            session,
            pointer_listener: None,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn journeys(&self) -> &[Journey] {
        &self.journeys
    }

    pub fn session(&self) -> &ProximitySession {
        &self.session
    }

    pub fn render_set(&self) -> &RenderSet {
        &self.render_set
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn into_surface(mut self) -> S {
        self.clear();
        self.surface
    }

    /// Replace the journey collection. The map is cleared; call [`Self::rebuild`] to draw.
    pub fn set_journeys(&mut self, journeys: Vec<Journey>) {
        self.clear();
        self.journeys = journeys;
    }

    /// Redraw the map for `selection`, replacing whatever was drawn before.
    pub fn rebuild(&mut self, selection: &Selection) {
        self.clear();

        let extracted = extract(&self.journeys, selection);
        if extracted.is_empty() {
            debug!("[Viewer] nothing to draw for {} selected journeys", selection.len());
            return;
        }

        self.render_set.rebuild(&extracted, &mut self.surface, &self.config);
        if self.render_set.path_count() == 0 {
            return;
        }

        match self.surface.subscribe(EventTarget::Map) {
            Ok(listener) => self.pointer_listener = Some(listener),
            Err(err) => warn!("[Viewer] pointer watcher unavailable: {}", err),
        }
        info!(
            "[Viewer] showing {} journeys as {} paths",
            selection.len(),
            self.render_set.path_count()
        );
    }

    /// Remove everything from the map. Safe to call at any time.
    pub fn clear(&mut self) {
        // Deactivate first so nothing can target a path that is about to go away
        self.session.reset();
        if let Some(listener) = self.pointer_listener.take() {
            self.surface.unsubscribe(listener);
        }
        self.render_set.clear(&mut self.surface);
    }

    /// Process one pointer event.
    pub fn handle_event(&mut self, event: MapEvent) {
        let command = match event {
            MapEvent::PointerMove { position } => {
                if !self.session.is_active() {
                    return;
                }
                let nearest = self.render_set.nearest_hit(
                    &position,
                    &self.surface,
                    self.config.snap,
                    self.config.proximity.deactivation_threshold_m,
                );
                self.session.on_pointer_move(nearest)
            }
            MapEvent::LayerEnter { layer, position } => match self.resolve(layer) {
                Some(LayerRole::Path(path)) => self.session.on_path_enter(path, position),
                Some(LayerRole::JourneyEndMarker(_)) => self.session.on_terminal_hover(),
                Some(LayerRole::EndpointMarker(_)) | None => return,
            },
            MapEvent::LayerMove { layer, position } => match self.resolve(layer) {
                Some(LayerRole::Path(path)) => {
                    let hit = self.render_set.hit_on_path(path, &position, &self.surface);
                    self.session.on_path_move(path, hit)
                }
                _ => return,
            },
            MapEvent::LayerLeave { layer } => match self.resolve(layer) {
                Some(LayerRole::Path(path)) => self.session.on_path_leave(path),
                _ => return,
            },
        };
        self.apply(command);
    }

    fn resolve(&self, layer: LayerId) -> Option<LayerRole> {
        let role = self.render_set.role_of(layer);
        if role.is_none() {
            debug!("[Viewer] event for unknown layer {:?} ignored", layer);
        }
        role
    }

    fn apply(&mut self, command: PanelCommand) {
        match command {
            PanelCommand::Present { path, point } => self.present(path, point),
            PanelCommand::Dismiss => self.render_set.dismiss_panel(&mut self.surface),
            PanelCommand::Hold | PanelCommand::Ignore => {}
        }
    }

    fn present(&mut self, path: PathId, point: GpsPoint) {
        let Some(rendered) = self.render_set.path(path) else {
            debug!("[Viewer] {:?} no longer rendered", path);
            return;
        };
        let payload = synthesize(rendered, &point, &self.surface, &self.config);
        self.render_set.present_panel(&payload, point, &mut self.surface);
    }
}
