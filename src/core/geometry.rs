/// One of the two reservoirs / gate sides of the dumbbell domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Both sides, in the fixed left-then-right processing order.
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    /// Index into per-side arrays (left = 0, right = 1).
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }

    /// Orientation sign of the side along the x-axis: -1 left, +1 right.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
        }
    }

    /// Side of the mid-line a position falls on (`x < 0` is left).
    #[inline]
    pub fn of_position(x: f64) -> Side {
        if x < 0.0 {
            Side::Left
        } else {
            Side::Right
        }
    }
}

/// The dumbbell domain: two circular reservoirs of radius `circle_radius`
/// centered on the x-axis, joined by a rectangular bridge of height
/// `bridge_height`. Constant after construction.
///
/// The bridge is coupled to the circles at construction time: its flat rails
/// are extended until they intersect the reservoir arcs, so the domain has
/// no gaps (see [`Geometry::new`]).
#[derive(Debug, Clone)]
pub struct Geometry {
    pub circle_radius: f64,
    /// Gap between the circle edges along the x-axis. May differ from the
    /// nominal input when `distance_as_channel_length` is set.
    pub circle_distance: f64,
    pub bridge_height: f64,
    /// Coupled bridge length (x-extent of the rails).
    pub bridge_length: f64,
    pub left_center_x: f64,
    pub right_center_x: f64,
    /// Conservative upper bound on any single-event travel distance; used as
    /// the "no hit" sentinel by the planner.
    pub max_path: f64,
    pub gate_is_flat: bool,
}

impl Geometry {
    /// Build the domain from the nominal parameters, coupling the bridge to
    /// the reservoir arcs.
    ///
    /// The rails at `y = ±h/2` meet the circle of radius `R` a little inside
    /// its widest point, so a bridge of nominal length `D` would leave gaps.
    /// The coupling discrepancy `δ = 2·√(R² − (h/2)²) − 2R` (negative) is
    /// absorbed either by lengthening the bridge (`L = D − δ`, default) or,
    /// when `distance_as_channel_length` is set, by keeping `L = D` and
    /// pulling the circles inward (`D := D + δ`).
    ///
    /// Derived quantities are computed unconditionally; the geometric
    /// preconditions (`h < 2R`, channel-length mode requiring a flat gate)
    /// are checked when the simulation starts.
    pub fn new(
        circle_radius: f64,
        circle_distance: f64,
        bridge_height: f64,
        gate_is_flat: bool,
        distance_as_channel_length: bool,
    ) -> Self {
        let discrepancy = 2.0 * (circle_radius.powi(2) - bridge_height.powi(2) / 4.0).sqrt()
            - 2.0 * circle_radius;
        let (circle_distance, bridge_length) = if distance_as_channel_length {
            (circle_distance + discrepancy, circle_distance)
        } else {
            (circle_distance, circle_distance - discrepancy)
        };

        let left_center_x = -circle_distance / 2.0 - circle_radius;
        let right_center_x = circle_distance / 2.0 + circle_radius;
        let max_path = circle_distance + bridge_height + circle_radius * 4.0;

        Self {
            circle_radius,
            circle_distance,
            bridge_height,
            bridge_length,
            left_center_x,
            right_center_x,
            max_path,
            gate_is_flat,
        }
    }

    /// Center x-coordinate of the reservoir on `side`.
    #[inline]
    pub fn center_x(&self, side: Side) -> f64 {
        match side {
            Side::Left => self.left_center_x,
            Side::Right => self.right_center_x,
        }
    }

    /// Strictly inside the reservoir circle on `side`.
    #[inline]
    pub fn in_circle(&self, x: f64, y: f64, side: Side) -> bool {
        let dx = x - self.center_x(side);
        dx * dx + y * y < self.circle_radius * self.circle_radius
    }

    /// Inside the bridge rectangle (closed). Not mutually exclusive with the
    /// circles: the coupled bridge overlaps both arcs near its ends.
    #[inline]
    pub fn in_bridge(&self, x: f64, y: f64) -> bool {
        x.abs() <= self.bridge_length / 2.0 && y.abs() <= self.bridge_height / 2.0
    }

    /// Inside the simulation domain: the bridge or the circle on the point's
    /// own side of the mid-line.
    #[inline]
    pub fn in_domain(&self, x: f64, y: f64) -> bool {
        self.in_bridge(x, y) || self.in_circle(x, y, Side::of_position(x))
    }

    /// Inside the capacity-limited gate region on `side`.
    ///
    /// Flat gate: the half of the vertical slab `|x| ≤ L/2` on that side.
    /// Arc gate: that side's half-plane minus its reservoir circle, i.e. the
    /// cap of the bridge rectangle carved out of the circle.
    #[inline]
    pub fn in_gate(&self, x: f64, y: f64, side: Side) -> bool {
        if self.gate_is_flat {
            side.sign() * x >= 0.0 && x.abs() <= self.bridge_length / 2.0
        } else {
            side.sign() * x >= 0.0 && !self.in_circle(x, y, side)
        }
    }
}
