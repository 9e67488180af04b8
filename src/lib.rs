//! # Trajectory Viewer
//!
//! Rendering and hover-interaction engine for vessel trajectories.
//!
//! This library provides:
//! - Extraction of renderable intervals from a journey selection
//! - Path and marker lifecycle management against a pluggable map surface
//! - Perpendicular segment projection to find the closest point on any visible path
//! - A hover/proximity state machine with hysteresis
//! - Interpolated info-panel content (time, speed, progress) at arbitrary points
//!
//! ## Features
//!
//! - **`serde`** - Derive `Serialize`/`Deserialize` on the journey model
//!
//! ## Quick Start
//!
//! ```rust
//! use std::collections::BTreeSet;
//! use trajectory_viewer::{
//!     CoordinatePoint, GpsPoint, Interval, Journey, MapEvent, MemorySurface,
//!     TrajectoryViewer, ViewerConfig,
//! };
//!
//! let mut interval = Interval::new(1, 1);
//! interval.coordinate_points = vec![
//!     CoordinatePoint::new(36.00, -5.40),
//!     CoordinatePoint::new(36.01, -5.41),
//! ];
//! let journey = Journey::new(1, vec![interval]);
//!
//! let config = ViewerConfig::default();
//! let mut viewer = TrajectoryViewer::new(MemorySurface::new(), vec![journey], config);
//! viewer.rebuild(&BTreeSet::from([1]));
//! assert_eq!(viewer.render_set().path_count(), 1);
//!
//! // Hovering the path opens the info panel
//! let layer = viewer.render_set().paths()[0].layer;
//! viewer.handle_event(MapEvent::LayerEnter { layer, position: GpsPoint::new(36.005, -5.405) });
//! assert!(viewer.session().is_active());
//! assert!(viewer.surface().open_tooltip().is_some());
//! ```

use chrono::{FixedOffset, Local, Offset, Utc};

pub mod content;
pub mod extract;
pub mod geo_utils;
pub mod model;
pub mod proximity;
pub mod render;
pub mod surface;
pub mod viewer;

pub use content::{
    format_duration, synthesize, DisplayPayload, JourneyEndPayload, SpeedReading,
    StandardPayload, TerminalSummary,
};
pub use extract::{extract, ExtractedInterval, Selection};
pub use model::{CoordinatePoint, Interval, Journey, JourneyMetadata, TrackSample};
pub use proximity::{Hit, PanelCommand, ProximitySession, ProximityState};
pub use render::{journey_color, LayerRole, PathId, RenderSet, RenderedMarker, RenderedPath};
pub use surface::{
    EventTarget, LayerId, ListenerId, MapSurface, MarkerKind, MarkerStyle, MemorySurface,
    PathStyle, SurfaceError, TooltipId,
};
pub use viewer::{MapEvent, TrajectoryViewer};

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use trajectory_viewer::GpsPoint;
/// let point = GpsPoint::new(36.1408, -5.3536); // Gibraltar
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Round both coordinates to `decimals` decimal places.
    pub fn rounded(&self, decimals: i32) -> Self {
        let factor = 10f64.powi(decimals);
        Self {
            latitude: (self.latitude * factor).round() / factor,
            longitude: (self.longitude * factor).round() / factor,
        }
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Smallest bounds enclosing both `self` and `other`.
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_lat: self.min_lat.min(other.min_lat),
            max_lat: self.max_lat.max(other.max_lat),
            min_lng: self.min_lng.min(other.min_lng),
            max_lng: self.max_lng.max(other.max_lng),
        }
    }

    /// Grow every side by `ratio` times the span on that axis.
    ///
    /// ```
    /// use trajectory_viewer::Bounds;
    ///
    /// let b = Bounds { min_lat: 36.0, max_lat: 37.0, min_lng: -6.0, max_lng: -5.0 };
    /// let padded = b.pad(0.1);
    /// assert!((padded.min_lat - 35.9).abs() < 1e-9);
    /// assert!((padded.max_lng - (-4.9)).abs() < 1e-9);
    /// ```
    pub fn pad(&self, ratio: f64) -> Bounds {
        let lat_buffer = (self.max_lat - self.min_lat).abs() * ratio;
        let lng_buffer = (self.max_lng - self.min_lng).abs() * ratio;
        Bounds {
            min_lat: self.min_lat - lat_buffer,
            max_lat: self.max_lat + lat_buffer,
            min_lng: self.min_lng - lng_buffer,
            max_lng: self.max_lng + lng_buffer,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// How the global pointer watcher snaps the cursor onto rendered paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapMode {
    /// Snap to the nearest sample vertex of any path.
    #[default]
    Vertex,
    /// Snap to the perpendicular projection onto the nearest segment.
    Segment,
}

/// Distance gates for the hover/proximity state machine.
#[derive(Debug, Clone)]
pub struct ProximityConfig {
    /// Gate for path-level hover refinement, evaluated on the focused path only.
    /// Default: 150.0 meters
    pub entry_threshold_m: f64,

    /// Gate for the global pointer watcher to refocus and update the panel.
    /// Default: 500.0 meters
    pub display_threshold_m: f64,

    /// Beyond this distance from every path the session deactivates.
    /// Between `display_threshold_m` and this value the panel holds its content.
    /// Default: 800.0 meters
    pub deactivation_threshold_m: f64,

    /// Progress (0-100) at which the terminal interval reports journey end.
    /// Default: 98.0
    pub completion_progress_pct: f64,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            entry_threshold_m: 150.0,
            display_threshold_m: 500.0,
            deactivation_threshold_m: 800.0,
            completion_progress_pct: 98.0,
        }
    }
}

/// Configuration for the trajectory viewer.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Proximity thresholds.
    pub proximity: ProximityConfig,

    /// Snapping policy of the global pointer watcher.
    /// Default: [`SnapMode::Vertex`]
    pub snap: SnapMode,

    /// Padding ratio applied to the rendered bounds when framing the viewport.
    /// Default: 0.1
    pub fit_padding: f64,

    /// Offset used to display timestamps as local clock time.
    /// Default: UTC
    pub utc_offset: FixedOffset,

    /// Path stroke weight in pixels. Default: 3.0
    pub path_weight: f64,

    /// Path stroke opacity. Default: 0.8
    pub path_opacity: f64,

    /// Endpoint marker radius in pixels. Default: 6.0
    pub marker_radius: f64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            proximity: ProximityConfig::default(),
            snap: SnapMode::default(),
            fit_padding: 0.1,
            utc_offset: Utc.fix(),
            path_weight: 3.0,
            path_opacity: 0.8,
            marker_radius: 6.0,
        }
    }
}

impl ViewerConfig {
    /// Default configuration displaying times in the host's current UTC offset.
    pub fn with_local_offset() -> Self {
        Self {
            utc_offset: *Local::now().offset(),
            ..Self::default()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounded_to_six_decimals() {
        let p = GpsPoint::new(36.123456789, -5.987654321).rounded(6);
        assert_eq!(p.latitude, 36.123457);
        assert_eq!(p.longitude, -5.987654);
    }

    #[test]
    fn test_bounds_union() {
        let a = Bounds { min_lat: 36.0, max_lat: 36.1, min_lng: -5.5, max_lng: -5.4 };
        let b = Bounds { min_lat: 35.9, max_lat: 36.05, min_lng: -5.45, max_lng: -5.3 };
        let u = a.union(&b);
        assert_eq!(u.min_lat, 35.9);
        assert_eq!(u.max_lat, 36.1);
        assert_eq!(u.min_lng, -5.5);
        assert_eq!(u.max_lng, -5.3);
    }

    #[test]
    fn test_default_thresholds() {
        let config = ViewerConfig::default();
        assert_eq!(config.proximity.entry_threshold_m, 150.0);
        assert_eq!(config.proximity.display_threshold_m, 500.0);
        assert_eq!(config.proximity.deactivation_threshold_m, 800.0);
        assert_eq!(config.snap, SnapMode::Vertex);
        assert_eq!(config.utc_offset.local_minus_utc(), 0);
    }
}
