use nalgebra::Vector3;

use crate::pose::Landmark;

fn to_vector(lm: &Landmark) -> Vector3<f32> {
    Vector3::new(lm.x, lm.y, lm.z)
}

/// Angle at `vertex` between vertex→a and vertex→b, in degrees [0, 180].
///
/// `None` when either arm has zero length or a coordinate is not finite.
pub fn angle_at_vertex(a: &Landmark, vertex: &Landmark, b: &Landmark) -> Option<f32> {
    let v = to_vector(vertex);
    angle_between(&(to_vector(a) - v), &(to_vector(b) - v))
}

/// Angle between two vectors in degrees [0, 180]
pub fn angle_between(u: &Vector3<f32>, w: &Vector3<f32>) -> Option<f32> {
    let nu = u.norm();
    let nw = w.norm();
    if !(nu > f32::EPSILON && nw > f32::EPSILON) {
        return None;
    }
    let cos = u.dot(w) / (nu * nw);
    if !cos.is_finite() {
        return None;
    }
    // rounding can push |cos| slightly past 1
    Some(cos.clamp(-1.0, 1.0).acos().to_degrees())
}
