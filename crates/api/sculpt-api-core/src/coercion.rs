//! Coercion helpers between Value kinds.
//! Scalar<->vector broadcasting and bool->float, used by built-in node computations.

use crate::Value;

/// Attempt to coerce a Value into a scalar f32.
/// Rules:
/// - Float -> its value
/// - Bool -> 1.0 / 0.0
/// - Vec2/3/4, Color -> first component
/// - List -> first element or 0.0 if empty
pub fn to_float(v: &Value) -> f32 {
    match v {
        Value::Float(f) => *f,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Vec2(a) => a[0],
        Value::Vec3(a) => a[0],
        Value::Vec4(a) | Value::Color(a) => a[0],
        Value::List(items) => items.first().map(to_float).unwrap_or(0.0),
        Value::Record(_) | Value::Text(_) | Value::File(_) => 0.0,
    }
}

/// Convert a Value into a flat list of components.
pub fn to_vector(v: &Value) -> Vec<f32> {
    match v {
        Value::Float(f) => vec![*f],
        Value::Bool(b) => vec![if *b { 1.0 } else { 0.0 }],
        Value::Vec2(a) => a.to_vec(),
        Value::Vec3(a) => a.to_vec(),
        Value::Vec4(a) | Value::Color(a) => a.to_vec(),
        Value::List(items) => items.iter().flat_map(to_vector).collect(),
        Value::Record(_) | Value::Text(_) | Value::File(_) => vec![],
    }
}

/// Coerce a Value into a Vec3, broadcasting scalars as `[s, s, s]`.
pub fn to_vec3(v: &Value) -> [f32; 3] {
    match v {
        Value::Vec3(a) => *a,
        Value::Vec2(a) => [a[0], a[1], 0.0],
        Value::Vec4(a) | Value::Color(a) => [a[0], a[1], a[2]],
        Value::Float(f) => [*f, *f, *f],
        Value::Bool(b) => {
            let s = if *b { 1.0 } else { 0.0 };
            [s, s, s]
        }
        Value::List(items) => {
            let mut out = [0.0f32; 3];
            let mut iter = items.iter().flat_map(to_vector);
            for slot in out.iter_mut() {
                *slot = iter.next().unwrap_or(0.0);
            }
            out
        }
        _ => [0.0, 0.0, 0.0],
    }
}

/// Truthiness: non-zero numeric components or non-empty text.
pub fn to_bool(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Text(s) | Value::File(s) => !s.is_empty(),
        Value::Record(map) => !map.is_empty(),
        _ => to_vector(v).iter().any(|x| *x != 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_broadcasts_to_vec3() {
        assert_eq!(to_vec3(&Value::f(2.0)), [2.0, 2.0, 2.0]);
        assert_eq!(to_vec3(&Value::Vec2([1.0, 2.0])), [1.0, 2.0, 0.0]);
    }

    #[test]
    fn list_flattens_components() {
        let list = Value::List(vec![Value::f(1.0), Value::Vec2([2.0, 3.0])]);
        assert_eq!(to_vector(&list), vec![1.0, 2.0, 3.0]);
        assert_eq!(to_float(&list), 1.0);
    }

    #[test]
    fn truthiness() {
        assert!(to_bool(&Value::text("x")));
        assert!(!to_bool(&Value::Vec3([0.0, 0.0, 0.0])));
        assert!(to_bool(&Value::f(-1.0)));
    }
}
