//! Render set: the cohort of paths, markers and the info panel for the current selection.
//!
//! Everything drawn on the surface is created and destroyed here, as one unit. A rebuild
//! always starts from a clean slate, and a failure while drawing one interval never
//! prevents the others from being drawn.

use std::collections::HashMap;

use log::{debug, info, warn};
use rstar::{RTree, RTreeObject, AABB};

use crate::content::{DisplayPayload, TerminalSummary};
use crate::extract::ExtractedInterval;
use crate::geo_utils::{
    compute_bounds, meters_to_degrees, nearest_point_on_polyline, nearest_vertex,
};
use crate::model::{Interval, TrackSample};
use crate::proximity::Hit;
use crate::surface::{
    EventTarget, LayerId, ListenerId, MapSurface, MarkerKind, MarkerStyle, PathStyle, SurfaceError,
    TooltipId,
};
use crate::{Bounds, GpsPoint, SnapMode, ViewerConfig};

/// Palette cycled by journey index.
const JOURNEY_PALETTE: [&str; 10] = [
    "#3B82F6", "#EF4444", "#10B981", "#F59E0B", "#8B5CF6", "#EC4899", "#14B8A6", "#F97316",
    "#6366F1", "#84CC16",
];

const MARKER_STROKE: &str = "#FFFFFF";

/// Growth factor on the envelope search radius. `meters_to_degrees` uses a slightly larger
/// meters-per-degree than the haversine earth radius, and hosts may measure with other
/// metrics; hits beyond the radius are discarded after exact measurement anyway.
const SEARCH_MARGIN: f64 = 1.05;

/// Display color of a journey.
pub fn journey_color(journey_index: u32) -> &'static str {
    JOURNEY_PALETTE[journey_index as usize % JOURNEY_PALETTE.len()]
}

/// Position of a path in the current cohort. Invalidated by the next rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathId(pub usize);

/// One interval drawn on the surface.
#[derive(Debug, Clone)]
pub struct RenderedPath {
    pub id: PathId,
    pub layer: LayerId,
    /// Source interval
    pub interval: Interval,
    /// Usable samples, at least 2
    pub samples: Vec<TrackSample>,
    /// Sample positions, as drawn
    pub points: Vec<GpsPoint>,
    pub color: &'static str,
    pub terminal: bool,
    pub bounds: Bounds,
    listener: Option<ListenerId>,
}

impl RenderedPath {
    pub fn new(
        id: PathId,
        layer: LayerId,
        interval: Interval,
        samples: Vec<TrackSample>,
        terminal: bool,
    ) -> Self {
        let points: Vec<GpsPoint> = samples.iter().map(|s| s.point).collect();
        Self {
            id,
            layer,
            color: journey_color(interval.journey_index),
            bounds: compute_bounds(&points),
            interval,
            samples,
            points,
            terminal,
            listener: None,
        }
    }
}

/// A circle marker attached to a rendered path.
#[derive(Debug, Clone)]
pub struct RenderedMarker {
    pub layer: LayerId,
    pub kind: MarkerKind,
    pub path: PathId,
    listener: Option<ListenerId>,
}

/// What a surface layer is, from the engine's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerRole {
    Path(PathId),
    JourneyEndMarker(PathId),
    EndpointMarker(PathId),
}

/// Envelope entry of the path index
#[derive(Debug, Clone)]
struct PathEnvelope {
    id: PathId,
    bounds: Bounds,
}

impl RTreeObject for PathEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bounds.min_lng, self.bounds.min_lat],
            [self.bounds.max_lng, self.bounds.max_lat],
        )
    }
}

/// Owner of every primitive drawn for the current selection.
#[derive(Debug)]
pub struct RenderSet {
    paths: Vec<RenderedPath>,
    markers: Vec<RenderedMarker>,
    roles: HashMap<LayerId, LayerRole>,
    index: RTree<PathEnvelope>,
    panel: Option<TooltipId>,
}

impl Default for RenderSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSet {
    pub fn new() -> Self {
        Self {
            paths: Vec::new(),
            markers: Vec::new(),
            roles: HashMap::new(),
            index: RTree::new(),
            panel: None,
        }
    }

    pub fn paths(&self) -> &[RenderedPath] {
        &self.paths
    }

    pub fn markers(&self) -> &[RenderedMarker] {
        &self.markers
    }

    pub fn path(&self, id: PathId) -> Option<&RenderedPath> {
        self.paths.get(id.0)
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.markers.is_empty()
    }

    /// The open info panel, if any.
    pub fn panel(&self) -> Option<TooltipId> {
        self.panel
    }

    pub fn role_of(&self, layer: LayerId) -> Option<LayerRole> {
        self.roles.get(&layer).copied()
    }

    /// Bounds enclosing every rendered path.
    pub fn bounds(&self) -> Option<Bounds> {
        self.paths
            .iter()
            .map(|p| p.bounds)
            .reduce(|acc, b| acc.union(&b))
    }

    /// Replace the cohort with primitives for `extracted`.
    ///
    /// Starts with [`RenderSet::clear`]. Intervals whose primitives fail to build are
    /// logged and skipped; whatever was created for them is removed again.
    pub fn rebuild<S>(
        &mut self,
        extracted: &[ExtractedInterval<'_>],
        surface: &mut S,
        config: &ViewerConfig,
    ) where
        S: MapSurface + ?Sized,
    {
        self.clear(surface);

        for item in extracted {
            let id = PathId(self.paths.len());
            let mut created = Vec::new();
            let mut listeners = Vec::new();

            match stage_interval(item, id, surface, config, &mut created, &mut listeners) {
                Ok((path, markers)) => {
                    self.roles.insert(path.layer, LayerRole::Path(id));
                    for m in &markers {
                        let role = match m.kind {
                            MarkerKind::JourneyEnd => LayerRole::JourneyEndMarker(id),
                            MarkerKind::IntervalStart | MarkerKind::IntervalEnd => {
                                LayerRole::EndpointMarker(id)
                            }
                        };
                        self.roles.insert(m.layer, role);
                    }
                    self.paths.push(path);
                    self.markers.extend(markers);
                }
                Err(err) => {
                    warn!(
                        "[RenderSet] failed to draw interval {} of journey {}: {}",
                        item.interval.interval_number, item.interval.journey_index, err
                    );
                    for listener in listeners {
                        surface.unsubscribe(listener);
                    }
                    for layer in created {
                        surface.remove_layer(layer);
                    }
                }
            }
        }

        if let Some(bounds) = self.bounds() {
            surface.fit_to_bounds(bounds, config.fit_padding);
        }

        self.index = RTree::bulk_load(
            self.paths
                .iter()
                .map(|p| PathEnvelope { id: p.id, bounds: p.bounds })
                .collect(),
        );

        info!(
            "[RenderSet] drew {} of {} intervals, {} markers",
            self.paths.len(),
            extracted.len(),
            self.markers.len()
        );
    }

    /// Remove every primitive and the info panel. Safe to call at any time.
    pub fn clear<S>(&mut self, surface: &mut S)
    where
        S: MapSurface + ?Sized,
    {
        self.dismiss_panel(surface);

        if self.is_empty() {
            return;
        }
        debug!(
            "[RenderSet] clearing {} paths and {} markers",
            self.paths.len(),
            self.markers.len()
        );

        for marker in self.markers.drain(..) {
            if let Some(listener) = marker.listener {
                surface.unsubscribe(listener);
            }
            surface.remove_layer(marker.layer);
        }
        for path in self.paths.drain(..) {
            if let Some(listener) = path.listener {
                surface.unsubscribe(listener);
            }
            surface.remove_layer(path.layer);
        }
        self.roles.clear();
        self.index = RTree::new();
    }

    /// Show the info panel, or update the open one in place.
    pub fn present_panel<S>(
        &mut self,
        payload: &DisplayPayload,
        position: GpsPoint,
        surface: &mut S,
    ) where
        S: MapSurface + ?Sized,
    {
        match self.panel {
            Some(tooltip) => surface.update_tooltip(tooltip, payload, position),
            None => match surface.show_tooltip(payload, position) {
                Ok(tooltip) => self.panel = Some(tooltip),
                Err(err) => warn!("[RenderSet] could not open info panel: {}", err),
            },
        }
    }

    pub fn dismiss_panel<S>(&mut self, surface: &mut S)
    where
        S: MapSurface + ?Sized,
    {
        if let Some(tooltip) = self.panel.take() {
            surface.close_tooltip(tooltip);
        }
    }

    /// Nearest point over all rendered paths within `max_distance_m` of `query`.
    ///
    /// Paths are pre-filtered by envelope, then scanned in cohort order; on exact ties the
    /// earlier path wins. Hits farther than `max_distance_m` are discarded.
    pub fn nearest_hit<S>(
        &self,
        query: &GpsPoint,
        surface: &S,
        snap: SnapMode,
        max_distance_m: f64,
    ) -> Option<Hit>
    where
        S: MapSurface + ?Sized,
    {
        let buffer = meters_to_degrees(max_distance_m, query.latitude) * SEARCH_MARGIN;
        let search = AABB::from_corners(
            [query.longitude - buffer, query.latitude - buffer],
            [query.longitude + buffer, query.latitude + buffer],
        );
        let mut candidates: Vec<PathId> = self
            .index
            .locate_in_envelope_intersecting(&search)
            .map(|e| e.id)
            .collect();
        candidates.sort();

        let mut best: Option<Hit> = None;
        for id in candidates {
            let Some(path) = self.path(id) else { continue };
            let hit = match snap {
                SnapMode::Vertex => vertex_hit(path, query, surface),
                SnapMode::Segment => self.hit_on_path(id, query, surface),
            };
            match (hit, &best) {
                (Some(h), _) if h.distance > max_distance_m => {}
                (Some(h), Some(b)) if h.distance >= b.distance => {}
                (Some(h), _) => best = Some(h),
                (None, _) => {}
            }
        }
        best
    }

    /// Projection of `query` onto a single path, falling back to its nearest vertex when
    /// every segment is degenerate.
    pub fn hit_on_path<S>(&self, id: PathId, query: &GpsPoint, surface: &S) -> Option<Hit>
    where
        S: MapSurface + ?Sized,
    {
        let path = self.path(id)?;
        match nearest_point_on_polyline(query, &path.points, |a, b| surface.distance(a, b)) {
            Some(hit) => Some(Hit {
                path: id,
                point: hit.point,
                distance: hit.distance,
            }),
            None => vertex_hit(path, query, surface),
        }
    }
}

fn vertex_hit<S>(path: &RenderedPath, query: &GpsPoint, surface: &S) -> Option<Hit>
where
    S: MapSurface + ?Sized,
{
    nearest_vertex(query, &path.points, |a, b| surface.distance(a, b)).map(|v| Hit {
        path: path.id,
        point: v.point,
        distance: v.distance,
    })
}

fn marker_style(kind: MarkerKind, color: &str, config: &ViewerConfig) -> MarkerStyle {
    MarkerStyle {
        kind,
        radius: config.marker_radius,
        fill_color: color.to_string(),
        stroke_color: MARKER_STROKE.to_string(),
        weight: 2.0,
        opacity: 1.0,
        fill_opacity: 0.8,
    }
}

/// Draw one interval. Every layer and listener created is recorded so the caller can undo
/// a partial build.
fn stage_interval<S>(
    item: &ExtractedInterval<'_>,
    id: PathId,
    surface: &mut S,
    config: &ViewerConfig,
    created: &mut Vec<LayerId>,
    listeners: &mut Vec<ListenerId>,
) -> Result<(RenderedPath, Vec<RenderedMarker>), SurfaceError>
where
    S: MapSurface + ?Sized,
{
    let color = journey_color(item.interval.journey_index);
    let points: Vec<GpsPoint> = item.samples.iter().map(|s| s.point).collect();
    let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
        return Err(SurfaceError::InvalidGeometry("interval has no samples".to_string()));
    };

    let layer = surface.render_path(
        &points,
        &PathStyle {
            color: color.to_string(),
            weight: config.path_weight,
            opacity: config.path_opacity,
        },
    )?;
    created.push(layer);

    let mut path = RenderedPath::new(
        id,
        layer,
        item.interval.clone(),
        item.samples.clone(),
        item.terminal,
    );
    let listener = surface.subscribe(EventTarget::Layer(layer))?;
    listeners.push(listener);
    path.listener = Some(listener);

    let mut markers = Vec::with_capacity(3);
    for (kind, point) in [(MarkerKind::IntervalStart, first), (MarkerKind::IntervalEnd, last)] {
        let marker = surface.render_marker(point, &marker_style(kind, color, config))?;
        created.push(marker);
        markers.push(RenderedMarker {
            layer: marker,
            kind,
            path: id,
            listener: None,
        });
    }

    if item.terminal {
        let style = marker_style(MarkerKind::JourneyEnd, color, config);
        let marker = surface.render_marker(last, &style)?;
        created.push(marker);
        surface.bind_tooltip(marker, &TerminalSummary::for_path(&path, config))?;
        let listener = surface.subscribe(EventTarget::Layer(marker))?;
        listeners.push(listener);
        markers.push(RenderedMarker {
            layer: marker,
            kind: MarkerKind::JourneyEnd,
            path: id,
            listener: Some(listener),
        });
    }

    Ok((path, markers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;
    use crate::model::{CoordinatePoint, Journey};
    use crate::surface::{MemoryLayer, MemorySurface};
    use std::collections::BTreeSet;

    fn interval(journey: u32, number: u32, points: &[(f64, f64)]) -> Interval {
        let mut interval = Interval::new(journey, number);
        interval.coordinate_points = points
            .iter()
            .map(|&(lat, lon)| CoordinatePoint::new(lat, lon))
            .collect();
        interval
    }

    fn fleet() -> Vec<Journey> {
        vec![
            Journey::new(
                1,
                vec![
                    interval(1, 1, &[(36.00, -5.40), (36.01, -5.41)]),
                    interval(1, 2, &[(36.01, -5.41), (36.02, -5.42), (36.03, -5.42)]),
                ],
            ),
            Journey::new(2, vec![interval(2, 1, &[(35.90, -5.30), (35.91, -5.31)])]).incomplete(),
        ]
    }

    fn build(surface: &mut MemorySurface, journeys: &[Journey], selected: &[u32]) -> RenderSet {
        let selection: BTreeSet<u32> = selected.iter().copied().collect();
        let extracted = extract(journeys, &selection);
        let mut set = RenderSet::new();
        set.rebuild(&extracted, surface, &ViewerConfig::default());
        set
    }

    #[test]
    fn test_rebuild_draws_paths_and_markers() {
        let mut surface = MemorySurface::new();
        let set = build(&mut surface, &fleet(), &[1, 2]);

        assert_eq!(set.path_count(), 3);
        // Two endpoints per path, plus one journey-end marker for complete journey 1
        assert_eq!(set.marker_count(), 7);
        assert_eq!(surface.path_count(), 3);
        assert_eq!(surface.markers_of_kind(MarkerKind::JourneyEnd), 1);
        // One listener per path, one per journey-end marker
        assert_eq!(surface.listener_count(), 4);
    }

    #[test]
    fn test_path_style_uses_journey_color() {
        let mut surface = MemorySurface::new();
        let set = build(&mut surface, &fleet(), &[2]);
        match surface.layer(set.paths()[0].layer) {
            Some(MemoryLayer::Path { style, .. }) => {
                assert_eq!(style.color, journey_color(2));
                assert_eq!(style.weight, 3.0);
                assert_eq!(style.opacity, 0.8);
            }
            other => panic!("expected path layer, got {:?}", other),
        }
    }

    #[test]
    fn test_journey_end_marker_carries_static_tooltip() {
        let mut surface = MemorySurface::new();
        let set = build(&mut surface, &fleet(), &[1]);
        let marker = set
            .markers()
            .iter()
            .find(|m| m.kind == MarkerKind::JourneyEnd)
            .unwrap();
        assert_eq!(set.role_of(marker.layer), Some(LayerRole::JourneyEndMarker(PathId(1))));
        match surface.layer(marker.layer) {
            Some(MemoryLayer::Marker { point, tooltip, .. }) => {
                assert_eq!(*point, GpsPoint::new(36.03, -5.42));
                assert_eq!(tooltip.as_ref().unwrap().journey_index, 1);
            }
            other => panic!("expected marker layer, got {:?}", other),
        }
    }

    #[test]
    fn test_rebuild_same_selection_does_not_accumulate() {
        let journeys = fleet();
        let selection: BTreeSet<u32> = [1, 2].into_iter().collect();
        let extracted = extract(&journeys, &selection);
        let mut surface = MemorySurface::new();
        let mut set = RenderSet::new();

        set.rebuild(&extracted, &mut surface, &ViewerConfig::default());
        let (paths, markers) = (set.path_count(), set.marker_count());
        let layers = surface.layers().len();
        set.rebuild(&extracted, &mut surface, &ViewerConfig::default());

        assert_eq!(set.path_count(), paths);
        assert_eq!(set.marker_count(), markers);
        assert_eq!(surface.layers().len(), layers);
        assert_eq!(surface.listener_count(), 4);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut surface = MemorySurface::new();
        let mut set = build(&mut surface, &fleet(), &[1, 2]);
        set.clear(&mut surface);
        set.clear(&mut surface);
        assert!(set.is_empty());
        assert!(surface.layers().is_empty());
        assert_eq!(surface.listener_count(), 0);

        let mut fresh = RenderSet::new();
        fresh.clear(&mut surface);
    }

    #[test]
    fn test_failed_interval_is_rolled_back_and_others_drawn() {
        let mut surface = MemorySurface::new();
        // Render calls: path, start, end for the first interval; the 5th call is the
        // start marker of the second interval
        surface.fail_render_call(4);
        let set = build(&mut surface, &fleet(), &[1, 2]);

        assert_eq!(set.path_count(), 2);
        let drawn: Vec<(u32, u32)> = set
            .paths()
            .iter()
            .map(|p| (p.interval.journey_index, p.interval.interval_number))
            .collect();
        assert_eq!(drawn, vec![(1, 1), (2, 1)]);
        // Ids stay dense after a failure
        assert_eq!(set.paths()[1].id, PathId(1));
        // The half-built path layer was removed
        assert_eq!(surface.path_count(), 2);
        assert_eq!(surface.marker_count(), 4);
        assert_eq!(surface.listener_count(), 2);
    }

    #[test]
    fn test_viewport_framed_on_all_paths() {
        let mut surface = MemorySurface::new();
        build(&mut surface, &fleet(), &[1, 2]);
        let (bounds, padding) = surface.fitted_bounds().unwrap();
        assert_eq!(padding, 0.1);
        assert_eq!(bounds.min_lat, 35.90);
        assert_eq!(bounds.max_lat, 36.03);
        assert_eq!(bounds.min_lng, -5.42);
        assert_eq!(bounds.max_lng, -5.30);
        let viewport = surface.viewport().unwrap();
        assert!(viewport.min_lat < bounds.min_lat && viewport.max_lng > bounds.max_lng);
    }

    #[test]
    fn test_no_fit_without_paths() {
        let mut surface = MemorySurface::new();
        let set = build(&mut surface, &fleet(), &[]);
        assert!(set.is_empty());
        assert!(surface.fitted_bounds().is_none());
    }

    #[test]
    fn test_panel_updates_in_place() {
        let mut surface = MemorySurface::new();
        let mut set = build(&mut surface, &fleet(), &[1]);
        let payload = DisplayPayload::JourneyEnd(crate::content::JourneyEndPayload {
            journey_index: 1,
            end_time: None,
            speed: crate::content::SpeedReading::Unavailable,
        });

        set.present_panel(&payload, GpsPoint::new(36.0, -5.4), &mut surface);
        let first = set.panel();
        set.present_panel(&payload, GpsPoint::new(36.01, -5.41), &mut surface);
        assert_eq!(set.panel(), first);
        assert_eq!(surface.tooltips_shown(), 1);
        assert_eq!(surface.tooltip_updates(), 1);
        assert_eq!(surface.open_tooltip().unwrap().position, GpsPoint::new(36.01, -5.41));

        set.clear(&mut surface);
        assert!(set.panel().is_none());
        assert!(surface.open_tooltip().is_none());
    }

    #[test]
    fn test_nearest_hit_tie_prefers_lower_journey() {
        // Two journeys sailing the exact same track
        let track = [(36.0, -5.41), (36.0, -5.39)];
        let journeys = vec![
            Journey::new(7, vec![interval(7, 1, &track)]),
            Journey::new(4, vec![interval(4, 1, &track)]),
        ];
        let mut surface = MemorySurface::new();
        let set = build(&mut surface, &journeys, &[7, 4]);
        let query = GpsPoint::new(36.001, -5.40);

        for snap in [SnapMode::Vertex, SnapMode::Segment] {
            let hit = set.nearest_hit(&query, &surface, snap, 2_000.0).unwrap();
            assert_eq!(hit.path, PathId(0));
            assert_eq!(set.path(hit.path).unwrap().interval.journey_index, 4);
        }
    }

    #[test]
    fn test_nearest_hit_vertex_vs_segment() {
        let journeys = vec![Journey::new(1, vec![interval(1, 1, &[(36.0, -5.40), (36.0, -5.37)])])];
        let mut surface = MemorySurface::new();
        let set = build(&mut surface, &journeys, &[1]);
        let query = GpsPoint::new(36.0005, -5.388);

        let on_segment = set.nearest_hit(&query, &surface, SnapMode::Segment, 800.0).unwrap();
        assert!(on_segment.distance < 60.0);
        assert!((on_segment.point.longitude - (-5.388)).abs() < 1e-9);

        // Nearest vertex is ~1 km away
        assert!(set.nearest_hit(&query, &surface, SnapMode::Vertex, 800.0).is_none());
        let vertex = set.nearest_hit(&query, &surface, SnapMode::Vertex, 2_000.0).unwrap();
        assert!(vertex.distance > 800.0);
        assert_eq!(vertex.point, GpsPoint::new(36.0, -5.40));
    }

    #[test]
    fn test_nearest_hit_none_when_far_or_empty() {
        let mut surface = MemorySurface::new();
        let set = build(&mut surface, &fleet(), &[1]);
        let far = GpsPoint::new(37.0, -4.0);
        assert!(set.nearest_hit(&far, &surface, SnapMode::Vertex, 800.0).is_none());
        assert!(RenderSet::new()
            .nearest_hit(&far, &surface, SnapMode::Segment, 800.0)
            .is_none());
    }
}
