use crate::types::{Point, Value, Vector};

/// Half the side of the unit volume cube. Faces sit at `±HALF_EXTENT` on every axis.
pub const HALF_EXTENT: Value = 0.5;

/// Returns `true` when `p` lies inside or on the unit cube.
#[inline]
pub fn contains(p: &Point) -> bool {
    p.iter().all(|c| c.abs() <= HALF_EXTENT)
}

/// Distance from `entrance` along `direction` to the first face plane the ray heads toward.
///
/// Each axis only constrains the ray through the face on the side it is moving to; an axis
/// with a zero component contributes nothing. With no constraint at all the result is
/// [`Value::INFINITY`].
#[inline]
pub fn exit_distance(entrance: &Point, direction: &Vector) -> Value {
    let mut shortest = Value::INFINITY;
    for axis in 0..3 {
        let d = direction[axis];
        if d > 0.0 {
            shortest = shortest.min((HALF_EXTENT - entrance[axis]) / d);
        } else if d < 0.0 {
            shortest = shortest.min((-HALF_EXTENT - entrance[axis]) / d);
        }
    }
    shortest
}

/// The part of a camera ray that is integrated, in volume-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaySegment {
    pub start: Point,
    pub end: Point,
}

impl RaySegment {
    pub fn length(&self) -> Value {
        (self.end - self.start).norm()
    }
}

/// Finds the segment integrated for a fragment at `surface` seen from `camera`.
///
/// ```text
/// camera outside:  camera ····> surface ====> exit face     (start = surface)
/// camera inside:   camera ====> surface                     (start = camera)
/// ```
///
/// The stretch between an outside camera and the cube is never marched. A ray with no exit
/// (zero direction) yields an empty segment at `surface`.
pub fn ray_segment(camera: &Point, surface: &Point) -> RaySegment {
    if contains(camera) {
        return RaySegment {
            start: *camera,
            end: *surface,
        };
    }

    let direction = (surface - camera).normalize();
    let t = exit_distance(surface, &direction);
    if !t.is_finite() {
        return RaySegment {
            start: *surface,
            end: *surface,
        };
    }

    RaySegment {
        start: *surface,
        end: surface + direction * t,
    }
}

/// Slab test against the unit cube: returns `(t_near, t_far)` with `t_near` clamped to `0`,
/// or `None` when the ray misses the cube or the cube lies behind it.
pub fn cube_interval(origin: &Point, direction: &Vector) -> Option<(Value, Value)> {
    let mut t_near: Value = 0.0;
    let mut t_far = Value::INFINITY;
    for axis in 0..3 {
        let o = origin[axis];
        let d = direction[axis];
        if d.abs() < 1e-12 {
            if o.abs() > HALF_EXTENT {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let mut t0 = (-HALF_EXTENT - o) * inv;
        let mut t1 = (HALF_EXTENT - o) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_near = t_near.max(t0);
        t_far = t_far.min(t1);
        if t_far < t_near {
            return None;
        }
    }
    Some((t_near, t_far))
}
