//! Map surface capability.
//!
//! The engine never talks to a concrete map widget. Everything it needs from the canvas
//! (distance in meters, drawing styled paths and markers, tooltips, viewport framing, event
//! subscriptions) goes through [`MapSurface`]. Hosts implement it over their map library;
//! [`MemorySurface`] is a headless implementation that records every call.

use std::collections::BTreeMap;

use log::debug;
use thiserror::Error;

use crate::content::{DisplayPayload, TerminalSummary};
use crate::geo_utils::haversine_distance;
use crate::{Bounds, GpsPoint};

/// Handle to a path or marker layer on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(pub u64);

/// Handle to an event subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

/// Handle to an open floating tooltip (the info panel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TooltipId(pub u64);

/// What an event subscription listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTarget {
    /// Pointer moves anywhere on the map
    Map,
    /// Pointer enter/move/leave over one layer
    Layer(LayerId),
}

/// Errors raised by a map surface while building primitives.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurfaceError {
    #[error("layer rejected by map surface: {0}")]
    LayerRejected(String),
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("unknown layer {0:?}")]
    UnknownLayer(LayerId),
    #[error("map surface unavailable")]
    Unavailable,
}

/// Stroke style of a rendered path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathStyle {
    /// CSS hex color
    pub color: String,
    pub weight: f64,
    pub opacity: f64,
}

/// Role of a circle marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    IntervalStart,
    IntervalEnd,
    /// Final position of a complete journey
    JourneyEnd,
}

/// Style of a circle marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerStyle {
    pub kind: MarkerKind,
    pub radius: f64,
    pub fill_color: String,
    pub stroke_color: String,
    pub weight: f64,
    pub opacity: f64,
    pub fill_opacity: f64,
}

/// Capability surface of the underlying map canvas.
pub trait MapSurface {
    /// Distance in meters between two geographic points.
    fn distance(&self, a: &GpsPoint, b: &GpsPoint) -> f64;

    fn render_path(
        &mut self,
        points: &[GpsPoint],
        style: &PathStyle,
    ) -> Result<LayerId, SurfaceError>;

    fn render_marker(
        &mut self,
        point: GpsPoint,
        style: &MarkerStyle,
    ) -> Result<LayerId, SurfaceError>;

    /// Attach a static hover tooltip to a layer.
    fn bind_tooltip(
        &mut self,
        layer: LayerId,
        summary: &TerminalSummary,
    ) -> Result<(), SurfaceError>;

    /// Remove a layer and anything bound to it. Unknown layers are ignored.
    fn remove_layer(&mut self, layer: LayerId);

    fn subscribe(&mut self, target: EventTarget) -> Result<ListenerId, SurfaceError>;

    /// Drop a subscription. Unknown listeners are ignored.
    fn unsubscribe(&mut self, listener: ListenerId);

    /// Frame the viewport on `bounds` grown by `padding` (a ratio of the span).
    fn fit_to_bounds(&mut self, bounds: Bounds, padding: f64);

    fn show_tooltip(
        &mut self,
        content: &DisplayPayload,
        position: GpsPoint,
    ) -> Result<TooltipId, SurfaceError>;

    /// Replace content and position of an open tooltip in place.
    fn update_tooltip(&mut self, tooltip: TooltipId, content: &DisplayPayload, position: GpsPoint);

    fn close_tooltip(&mut self, tooltip: TooltipId);
}

// ============================================================================
// In-memory surface
// ============================================================================

/// A layer recorded by [`MemorySurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryLayer {
    Path {
        points: Vec<GpsPoint>,
        style: PathStyle,
    },
    Marker {
        point: GpsPoint,
        style: MarkerStyle,
        tooltip: Option<TerminalSummary>,
    },
}

/// The floating tooltip currently open on a [`MemorySurface`].
#[derive(Debug, Clone, PartialEq)]
pub struct OpenTooltip {
    pub id: TooltipId,
    pub content: DisplayPayload,
    pub position: GpsPoint,
}

/// Headless [`MapSurface`] that keeps every primitive in memory.
///
/// Distances are haversine. Render calls can be made to fail on demand to exercise
/// best-effort rendering, and the whole surface can be detached, as when the host map is
/// torn down while the engine still holds it.
#[derive(Debug, Default)]
pub struct MemorySurface {
    layers: BTreeMap<LayerId, MemoryLayer>,
    listeners: BTreeMap<ListenerId, EventTarget>,
    tooltip: Option<OpenTooltip>,
    fitted: Option<(Bounds, f64)>,
    next_id: u64,
    render_calls: usize,
    failing_calls: Vec<usize>,
    tooltips_shown: usize,
    tooltip_updates: usize,
    detached: bool,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `n`-th render call (0-based, paths and markers counted together) fail.
    pub fn fail_render_call(&mut self, n: usize) {
        self.failing_calls.push(n);
    }

    /// Fail every fallible call with [`SurfaceError::Unavailable`] from now on.
    pub fn detach(&mut self) {
        self.detached = true;
    }

    pub fn layers(&self) -> &BTreeMap<LayerId, MemoryLayer> {
        &self.layers
    }

    pub fn layer(&self, id: LayerId) -> Option<&MemoryLayer> {
        self.layers.get(&id)
    }

    pub fn path_count(&self) -> usize {
        self.layers
            .values()
            .filter(|l| matches!(l, MemoryLayer::Path { .. }))
            .count()
    }

    pub fn marker_count(&self) -> usize {
        self.layers.len() - self.path_count()
    }

    pub fn markers_of_kind(&self, kind: MarkerKind) -> usize {
        self.layers
            .values()
            .filter(|l| matches!(l, MemoryLayer::Marker { style, .. } if style.kind == kind))
            .count()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn map_listener_count(&self) -> usize {
        self.listeners
            .values()
            .filter(|t| **t == EventTarget::Map)
            .count()
    }

    pub fn open_tooltip(&self) -> Option<&OpenTooltip> {
        self.tooltip.as_ref()
    }

    /// Number of times a tooltip was created (not updated).
    pub fn tooltips_shown(&self) -> usize {
        self.tooltips_shown
    }

    pub fn tooltip_updates(&self) -> usize {
        self.tooltip_updates
    }

    pub fn fitted_bounds(&self) -> Option<(Bounds, f64)> {
        self.fitted
    }

    /// Area shown after the last fit: the fitted bounds grown by the padding ratio.
    pub fn viewport(&self) -> Option<Bounds> {
        self.fitted.map(|(bounds, padding)| bounds.pad(padding))
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_attached(&self) -> Result<(), SurfaceError> {
        if self.detached {
            return Err(SurfaceError::Unavailable);
        }
        Ok(())
    }

    fn check_render_call(&mut self) -> Result<(), SurfaceError> {
        self.check_attached()?;
        let call = self.render_calls;
        self.render_calls += 1;
        if self.failing_calls.contains(&call) {
            return Err(SurfaceError::LayerRejected(format!("injected failure on call {}", call)));
        }
        Ok(())
    }
}

impl MapSurface for MemorySurface {
    fn distance(&self, a: &GpsPoint, b: &GpsPoint) -> f64 {
        haversine_distance(a, b)
    }

    fn render_path(
        &mut self,
        points: &[GpsPoint],
        style: &PathStyle,
    ) -> Result<LayerId, SurfaceError> {
        self.check_render_call()?;
        if points.len() < 2 {
            return Err(SurfaceError::InvalidGeometry(format!(
                "path needs at least 2 points, got {}",
                points.len()
            )));
        }
        let id = LayerId(self.allocate());
        self.layers.insert(
            id,
            MemoryLayer::Path {
                points: points.to_vec(),
                style: style.clone(),
            },
        );
        Ok(id)
    }

    fn render_marker(
        &mut self,
        point: GpsPoint,
        style: &MarkerStyle,
    ) -> Result<LayerId, SurfaceError> {
        self.check_render_call()?;
        let id = LayerId(self.allocate());
        self.layers.insert(
            id,
            MemoryLayer::Marker {
                point,
                style: style.clone(),
                tooltip: None,
            },
        );
        Ok(id)
    }

    fn bind_tooltip(
        &mut self,
        layer: LayerId,
        summary: &TerminalSummary,
    ) -> Result<(), SurfaceError> {
        self.check_attached()?;
        match self.layers.get_mut(&layer) {
            Some(MemoryLayer::Marker { tooltip, .. }) => {
                *tooltip = Some(summary.clone());
                Ok(())
            }
            Some(MemoryLayer::Path { .. }) => Err(SurfaceError::LayerRejected(
                "static tooltips bind to markers only".to_string(),
            )),
            None => Err(SurfaceError::UnknownLayer(layer)),
        }
    }

    fn remove_layer(&mut self, layer: LayerId) {
        if self.layers.remove(&layer).is_none() {
            debug!("[MemorySurface] remove_layer: {:?} already gone", layer);
        }
        self.listeners.retain(|_, t| *t != EventTarget::Layer(layer));
    }

    fn subscribe(&mut self, target: EventTarget) -> Result<ListenerId, SurfaceError> {
        self.check_attached()?;
        if let EventTarget::Layer(layer) = target {
            if !self.layers.contains_key(&layer) {
                return Err(SurfaceError::UnknownLayer(layer));
            }
        }
        let id = ListenerId(self.allocate());
        self.listeners.insert(id, target);
        Ok(id)
    }

    fn unsubscribe(&mut self, listener: ListenerId) {
        self.listeners.remove(&listener);
    }

    fn fit_to_bounds(&mut self, bounds: Bounds, padding: f64) {
        self.fitted = Some((bounds, padding));
    }

    fn show_tooltip(
        &mut self,
        content: &DisplayPayload,
        position: GpsPoint,
    ) -> Result<TooltipId, SurfaceError> {
        self.check_attached()?;
        let id = TooltipId(self.allocate());
        self.tooltip = Some(OpenTooltip {
            id,
            content: content.clone(),
            position,
        });
        self.tooltips_shown += 1;
        Ok(id)
    }

    fn update_tooltip(&mut self, tooltip: TooltipId, content: &DisplayPayload, position: GpsPoint) {
        match self.tooltip.as_mut() {
            Some(open) if open.id == tooltip => {
                open.content = content.clone();
                open.position = position;
                self.tooltip_updates += 1;
            }
            _ => debug!("[MemorySurface] update_tooltip: {:?} is not open", tooltip),
        }
    }

    fn close_tooltip(&mut self, tooltip: TooltipId) {
        if self.tooltip.as_ref().is_some_and(|open| open.id == tooltip) {
            self.tooltip = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> PathStyle {
        PathStyle {
            color: "#3B82F6".to_string(),
            weight: 3.0,
            opacity: 0.8,
        }
    }

    #[test]
    fn test_render_path_rejects_single_point() {
        let mut surface = MemorySurface::new();
        let err = surface
            .render_path(&[GpsPoint::new(36.0, -5.4)], &style())
            .unwrap_err();
        assert!(matches!(err, SurfaceError::InvalidGeometry(_)));
        assert_eq!(surface.path_count(), 0);
    }

    #[test]
    fn test_injected_failure_hits_only_that_call() {
        let mut surface = MemorySurface::new();
        surface.fail_render_call(1);
        let pts = [GpsPoint::new(36.0, -5.4), GpsPoint::new(36.01, -5.41)];
        assert!(surface.render_path(&pts, &style()).is_ok());
        assert!(surface.render_path(&pts, &style()).is_err());
        assert!(surface.render_path(&pts, &style()).is_ok());
        assert_eq!(surface.path_count(), 2);
    }

    #[test]
    fn test_remove_layer_drops_its_listeners() {
        let mut surface = MemorySurface::new();
        let pts = [GpsPoint::new(36.0, -5.4), GpsPoint::new(36.01, -5.41)];
        let layer = surface.render_path(&pts, &style()).unwrap();
        surface.subscribe(EventTarget::Layer(layer)).unwrap();
        surface.subscribe(EventTarget::Map).unwrap();
        assert_eq!(surface.listener_count(), 2);

        surface.remove_layer(layer);
        surface.remove_layer(layer);
        assert_eq!(surface.listener_count(), 1);
        assert_eq!(surface.map_listener_count(), 1);
        assert!(matches!(
            surface.subscribe(EventTarget::Layer(layer)),
            Err(SurfaceError::UnknownLayer(_))
        ));
    }

    #[test]
    fn test_detached_surface_is_unavailable() {
        let mut surface = MemorySurface::new();
        let pts = [GpsPoint::new(36.0, -5.4), GpsPoint::new(36.01, -5.41)];
        let layer = surface.render_path(&pts, &style()).unwrap();
        surface.detach();

        assert_eq!(surface.render_path(&pts, &style()), Err(SurfaceError::Unavailable));
        assert_eq!(surface.subscribe(EventTarget::Layer(layer)), Err(SurfaceError::Unavailable));
        assert_eq!(surface.subscribe(EventTarget::Map), Err(SurfaceError::Unavailable));
        // Teardown still works
        surface.remove_layer(layer);
        assert!(surface.layers().is_empty());
    }

    #[test]
    fn test_viewport_is_padded_fit() {
        let mut surface = MemorySurface::new();
        assert!(surface.viewport().is_none());
        let bounds = Bounds { min_lat: 36.0, max_lat: 37.0, min_lng: -6.0, max_lng: -5.0 };
        surface.fit_to_bounds(bounds, 0.1);
        let viewport = surface.viewport().unwrap();
        assert!((viewport.min_lat - 35.9).abs() < 1e-9);
        assert!((viewport.max_lat - 37.1).abs() < 1e-9);
        assert!((viewport.min_lng - (-6.1)).abs() < 1e-9);
        assert!((viewport.max_lng - (-4.9)).abs() < 1e-9);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(SurfaceError::Unavailable.to_string(), "map surface unavailable");
        assert_eq!(
            SurfaceError::UnknownLayer(LayerId(7)).to_string(),
            "unknown layer LayerId(7)"
        );
    }
}
