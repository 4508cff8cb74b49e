//! Waypoint routes, consumed front to back.

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// One point on a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// World-space position.
    pub position: DVec3,
    /// Whether the construct has reached it.
    #[serde(default)]
    pub visited: bool,
}

impl Waypoint {
    /// Unvisited waypoint at `position`.
    #[must_use]
    pub fn new(position: DVec3) -> Self {
        Self {
            position,
            visited: false,
        }
    }
}

/// Ordered list of waypoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaypointRoute {
    points: Vec<Waypoint>,
}

impl WaypointRoute {
    /// Route through `positions` in order.
    #[must_use]
    pub fn new(positions: impl IntoIterator<Item = DVec3>) -> Self {
        Self {
            points: positions.into_iter().map(Waypoint::new).collect(),
        }
    }

    /// First waypoint not yet visited.
    #[must_use]
    pub fn next(&self) -> Option<&Waypoint> {
        self.points.iter().find(|w| !w.visited)
    }

    /// Mark the current waypoint visited and return it.
    pub fn mark_next_visited(&mut self) -> Option<Waypoint> {
        let w = self.points.iter_mut().find(|w| !w.visited)?;
        w.visited = true;
        Some(*w)
    }

    /// Whether every waypoint has been visited (true for an empty route).
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.points.iter().all(|w| w.visited)
    }

    /// Clear every visited flag.
    pub fn reset(&mut self) {
        for w in &mut self.points {
            w.visited = false;
        }
    }

    /// All waypoints.
    #[must_use]
    pub fn points(&self) -> &[Waypoint] {
        &self.points
    }

    /// Number of waypoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the route has no waypoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
