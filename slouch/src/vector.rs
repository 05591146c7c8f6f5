use micromath::vector::F32x3;
#[allow(unused_imports)]
use micromath::F32Ext;

/// Norms below this are treated as "no direction".
pub const MIN_NORM: f32 = 1e-6;

pub fn dot(a: F32x3, b: F32x3) -> f32 {
    a.x * b.x + a.y * b.y + a.z * b.z
}

pub fn norm(v: F32x3) -> f32 {
    dot(v, v).sqrt()
}

/// Scale `v` to unit length. Degenerate input comes back as the zero vector,
/// which callers must read as "undefined direction".
pub fn normalize(v: F32x3) -> F32x3 {
    let m = norm(v);
    if m < MIN_NORM {
        return F32x3::default();
    }

    F32x3 {
        x: v.x / m,
        y: v.y / m,
        z: v.z / m,
    }
}

pub fn is_zero(v: F32x3) -> bool {
    v.x == 0.0 && v.y == 0.0 && v.z == 0.0
}

/// Angle in degrees between two unit vectors, in [0, 180].
pub fn angle_between(a: F32x3, b: F32x3) -> f32 {
    // Rounding can push the dot product of unit vectors just past ±1.
    dot(a, b).clamp(-1.0, 1.0).acos().to_degrees()
}
