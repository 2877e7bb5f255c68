//! Unit conversions and compact serialization helpers
//!
//! Flight data is stored in SI units (meters, meters per second) with
//! attitudes in degrees and timestamps in milliseconds. Floats serialize
//! with 4 decimal places to keep persisted recordings small.
//!
//! Vectors and rotations are persisted as named-component objects
//! (`{x, y, z}` and `{x, y, z, w}`) rather than nalgebra's array layout;
//! use [`vec3`] and [`rotation`] with `#[serde(with = ...)]`.

/// Milliseconds per second
pub const MS_PER_SECOND: f64 = 1000.0;

/// Round f32 to 4 decimal places for compact JSON serialization
pub fn round4<S: serde::Serializer>(val: &f32, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f32(round4_value(*val))
}

/// Round each element of a 4-wide array (motor RPM) to 4 decimal places
pub fn round4_array<S: serde::Serializer>(vals: &[f32; 4], s: S) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeTuple;
    let mut tup = s.serialize_tuple(4)?;
    for v in vals {
        tup.serialize_element(&round4_value(*v))?;
    }
    tup.end()
}

fn round4_value(val: f32) -> f32 {
    (val * 10000.0).round() / 10000.0
}

/// `{x, y, z}` wire form for `Vector3<f32>`
pub mod vec3 {
    use super::round4;
    use nalgebra::Vector3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Wire {
        #[serde(serialize_with = "round4")]
        x: f32,
        #[serde(serialize_with = "round4")]
        y: f32,
        #[serde(serialize_with = "round4")]
        z: f32,
    }

    pub fn serialize<S: Serializer>(v: &Vector3<f32>, s: S) -> Result<S::Ok, S::Error> {
        Wire {
            x: v.x,
            y: v.y,
            z: v.z,
        }
        .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vector3<f32>, D::Error> {
        let w = Wire::deserialize(d)?;
        Ok(Vector3::new(w.x, w.y, w.z))
    }
}

/// `{x, y, z, w}` wire form for `UnitQuaternion<f32>`. Deserialized values
/// are renormalized.
pub mod rotation {
    use super::round4;
    use nalgebra::{Quaternion, UnitQuaternion};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Wire {
        #[serde(serialize_with = "round4")]
        x: f32,
        #[serde(serialize_with = "round4")]
        y: f32,
        #[serde(serialize_with = "round4")]
        z: f32,
        #[serde(serialize_with = "round4")]
        w: f32,
    }

    pub fn serialize<S: Serializer>(q: &UnitQuaternion<f32>, s: S) -> Result<S::Ok, S::Error> {
        Wire {
            x: q.i,
            y: q.j,
            z: q.k,
            w: q.w,
        }
        .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<UnitQuaternion<f32>, D::Error> {
        let w = Wire::deserialize(d)?;
        let q = Quaternion::new(w.w, w.x, w.y, w.z);
        if q.norm() <= f32::EPSILON {
            return Ok(UnitQuaternion::identity());
        }
        Ok(UnitQuaternion::from_quaternion(q))
    }
}

pub fn secs_to_ms(secs: f64) -> f64 {
    secs * MS_PER_SECOND
}

pub fn ms_to_secs(ms: f64) -> f64 {
    ms / MS_PER_SECOND
}
