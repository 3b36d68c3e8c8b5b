use crate::types::Value;

// linearly map a number from one range to another
pub fn remap(s: Value, range_in: [Value; 2], range_out: [Value; 2]) -> Value {
    range_out[0] + (s - range_in[0]) * (range_out[1] - range_out[0]) / (range_in[1] - range_in[0])
}

// Linear interpolation, `a·(1 - t) + b·t` like GLSL `mix`
#[inline]
pub fn lerp(a: Value, b: Value, t: Value) -> Value {
    a * (1.0 - t) + b * t
}

// Channel-wise lerp of two RGBA samples
#[inline]
pub fn mix(a: [Value; 4], b: [Value; 4], t: Value) -> [Value; 4] {
    [
        lerp(a[0], b[0], t),
        lerp(a[1], b[1], t),
        lerp(a[2], b[2], t),
        lerp(a[3], b[3], t),
    ]
}
