//! Hover/proximity state machine.
//!
//! The session decides *whether* the info panel should be shown and for which path; it
//! never touches the surface. Every input is a transition returning a [`PanelCommand`]
//! that the viewer carries out.
//!
//! ```text
//!              enter path                     pointer < display
//!  Inactive ──────────────► Active(focus) ◄────────────────────┐
//!     ▲                        │   │                           │
//!     │  pointer > deactivate  │   └───────────────────────────┘
//!     └────────────────────────┘       (refocus, present)
//!     ▲   or terminal hover
//! ```
//!
//! Between the display and deactivation thresholds the session holds: it stays active and
//! the panel keeps its last content.

use log::debug;

use crate::render::PathId;
use crate::{GpsPoint, ProximityConfig};

/// A point on a rendered path near the cursor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub path: PathId,
    /// Snapped point on the path
    pub point: GpsPoint,
    /// Distance from the cursor in meters
    pub distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ProximityState {
    #[default]
    Inactive,
    Active {
        /// Path the panel currently describes
        focus: PathId,
        /// Point the panel was last computed at
        last_point: GpsPoint,
    },
}

/// What the viewer should do with the info panel after a transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PanelCommand {
    /// Compute content for `path` at `point` and show it there.
    Present { path: PathId, point: GpsPoint },
    /// Keep the panel as it is.
    Hold,
    /// Close the panel.
    Dismiss,
    /// The input does not concern the session.
    Ignore,
}

/// Proximity session for one rendered cohort.
#[derive(Debug, Clone, Default)]
pub struct ProximitySession {
    state: ProximityState,
    config: ProximityConfig,
}

impl ProximitySession {
    pub fn new(config: ProximityConfig) -> Self {
        Self {
            state: ProximityState::Inactive,
            config,
        }
    }

    pub fn state(&self) -> ProximityState {
        self.state
    }

    pub fn config(&self) -> &ProximityConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, ProximityState::Active { .. })
    }

    pub fn focus(&self) -> Option<PathId> {
        match self.state {
            ProximityState::Active { focus, .. } => Some(focus),
            ProximityState::Inactive => None,
        }
    }

    /// The cursor entered a path layer. Always activates and focuses that path.
    pub fn on_path_enter(&mut self, path: PathId, point: GpsPoint) -> PanelCommand {
        if !self.is_active() {
            debug!("[Proximity] activated on {:?}", path);
        }
        self.present(path, point)
    }

    /// The cursor moved over a path layer. `hit` is the projection onto that path.
    pub fn on_path_move(&mut self, path: PathId, hit: Option<Hit>) -> PanelCommand {
        if self.focus() != Some(path) {
            return PanelCommand::Ignore;
        }
        match hit {
            Some(hit) if hit.distance < self.config.entry_threshold_m => {
                self.present(path, hit.point)
            }
            _ => PanelCommand::Hold,
        }
    }

    /// The cursor moved anywhere on the map. `nearest` is the nearest point over all
    /// rendered paths, or `None` when there is none in range.
    pub fn on_pointer_move(&mut self, nearest: Option<Hit>) -> PanelCommand {
        if !self.is_active() {
            return PanelCommand::Ignore;
        }
        match nearest {
            Some(hit) if hit.distance < self.config.display_threshold_m => {
                self.present(hit.path, hit.point)
            }
            Some(hit) if hit.distance <= self.config.deactivation_threshold_m => PanelCommand::Hold,
            Some(hit) => {
                debug!("[Proximity] deactivated, nearest path {:.0} m away", hit.distance);
                self.deactivate()
            }
            None => {
                debug!("[Proximity] deactivated, no path in range");
                self.deactivate()
            }
        }
    }

    /// The cursor left a path layer. Leaving alone never deactivates.
    pub fn on_path_leave(&self, _path: PathId) -> PanelCommand {
        PanelCommand::Ignore
    }

    /// The cursor entered a journey-end marker, which carries its own static tooltip.
    pub fn on_terminal_hover(&mut self) -> PanelCommand {
        if self.is_active() {
            debug!("[Proximity] deactivated by journey-end marker");
        }
        self.deactivate()
    }

    /// Back to inactive without a command. Used when the cohort is torn down.
    pub fn reset(&mut self) {
        self.state = ProximityState::Inactive;
    }

    fn present(&mut self, path: PathId, point: GpsPoint) -> PanelCommand {
        self.state = ProximityState::Active {
            focus: path,
            last_point: point,
        };
        PanelCommand::Present { path, point }
    }

    fn deactivate(&mut self) -> PanelCommand {
        self.state = ProximityState::Inactive;
        PanelCommand::Dismiss
    }
}
