// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframes, easing curves and value interpolation.

use crate::element::PropertyValue;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Shape of the easing curve between two keyframes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EasingStyle {
    /// Hold the left value until the next keyframe
    Constant,
    /// Linear interpolation
    #[default]
    Linear,
    /// Sinusoidal
    Sine,
    /// Quadratic
    Quad,
    /// Cubic
    Cubic,
    /// Quartic
    Quart,
    /// Quintic
    Quint,
    /// Exponential
    Exponential,
    /// Circular
    Circular,
    /// Overshooting
    Back,
    /// Bouncing
    Bounce,
    /// Spring-like oscillation
    Elastic,
}

/// Which end of the curve the easing applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EasingDirection {
    /// Ease at the start
    #[default]
    In,
    /// Ease at the end
    Out,
    /// Ease at both ends
    InOut,
}

/// Easing applied from a keyframe to the next one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Easing {
    /// Curve shape
    #[serde(default)]
    pub style: EasingStyle,
    /// Curve direction
    #[serde(default)]
    pub direction: EasingDirection,
}

impl Easing {
    /// Step easing
    pub const CONSTANT: Self = Self::new(EasingStyle::Constant, EasingDirection::In);
    /// Linear easing
    pub const LINEAR: Self = Self::new(EasingStyle::Linear, EasingDirection::In);

    /// Create an easing
    pub const fn new(style: EasingStyle, direction: EasingDirection) -> Self {
        Self { style, direction }
    }

    /// Whether this easing holds the left value
    pub fn is_step(&self) -> bool {
        self.style == EasingStyle::Constant
    }

    /// Map normalized segment time `t` to eased progress.
    ///
    /// Exact at both endpoints. `Back` and `Elastic` overshoot in between.
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        if t <= 0.0 {
            return 0.0;
        }
        if t >= 1.0 {
            return 1.0;
        }
        match self.direction {
            EasingDirection::In => ease_in(self.style, t),
            EasingDirection::Out => 1.0 - ease_in(self.style, 1.0 - t),
            EasingDirection::InOut => {
                if t < 0.5 {
                    ease_in(self.style, 2.0 * t) / 2.0
                } else {
                    1.0 - ease_in(self.style, 2.0 - 2.0 * t) / 2.0
                }
            }
        }
    }
}

/// Ease-in form of every style; the other directions are derived from it.
fn ease_in(style: EasingStyle, t: f32) -> f32 {
    match style {
        EasingStyle::Constant => 0.0,
        EasingStyle::Linear => t,
        EasingStyle::Sine => 1.0 - (t * PI / 2.0).cos(),
        EasingStyle::Quad => t * t,
        EasingStyle::Cubic => t * t * t,
        EasingStyle::Quart => t.powi(4),
        EasingStyle::Quint => t.powi(5),
        EasingStyle::Exponential => 2f32.powf(10.0 * t - 10.0),
        EasingStyle::Circular => 1.0 - (1.0 - t * t).max(0.0).sqrt(),
        EasingStyle::Back => {
            const C1: f32 = 1.70158;
            const C3: f32 = C1 + 1.0;
            C3 * t * t * t - C1 * t * t
        }
        EasingStyle::Bounce => 1.0 - bounce_out(1.0 - t),
        EasingStyle::Elastic => {
            const C4: f32 = 2.0 * PI / 3.0;
            -(2f32.powf(10.0 * t - 10.0)) * ((t * 10.0 - 10.75) * C4).sin()
        }
    }
}

fn bounce_out(t: f32) -> f32 {
    const N1: f32 = 7.5625;
    const D1: f32 = 2.75;
    if t < 1.0 / D1 {
        N1 * t * t
    } else if t < 2.0 / D1 {
        let t = t - 1.5 / D1;
        N1 * t * t + 0.75
    } else if t < 2.5 / D1 {
        let t = t - 2.25 / D1;
        N1 * t * t + 0.9375
    } else {
        let t = t - 2.625 / D1;
        N1 * t * t + 0.984_375
    }
}

/// A keyframe in a property timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Time in seconds
    pub time: f32,
    /// Value at this keyframe
    pub value: PropertyValue,
    /// Easing towards the next keyframe
    pub easing: Easing,
}

impl Keyframe {
    /// Create a linear keyframe
    pub fn new(time: f32, value: PropertyValue) -> Self {
        Self {
            time,
            value,
            easing: Easing::LINEAR,
        }
    }

    /// Set easing
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }
}

/// Interpolation utilities
pub struct Interpolation;

impl Interpolation {
    /// Linear interpolation between two floats
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Interpolate Vec2
    pub fn lerp_vec2(a: [f32; 2], b: [f32; 2], t: f32) -> [f32; 2] {
        [Self::lerp(a[0], b[0], t), Self::lerp(a[1], b[1], t)]
    }

    /// Interpolate Vec3
    pub fn lerp_vec3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
        [
            Self::lerp(a[0], b[0], t),
            Self::lerp(a[1], b[1], t),
            Self::lerp(a[2], b[2], t),
        ]
    }

    fn lerp_vec4(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
        [
            Self::lerp(a[0], b[0], t),
            Self::lerp(a[1], b[1], t),
            Self::lerp(a[2], b[2], t),
            Self::lerp(a[3], b[3], t),
        ]
    }

    /// Spherical linear interpolation for quaternions
    pub fn slerp(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
        let mut dot = a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3];

        // Take the shortest arc
        let mut b = b;
        if dot < 0.0 {
            b = [-b[0], -b[1], -b[2], -b[3]];
            dot = -dot;
        }

        if dot > 0.9995 {
            let result = Self::lerp_vec4(a, b, t);
            let len = (result[0] * result[0]
                + result[1] * result[1]
                + result[2] * result[2]
                + result[3] * result[3])
                .sqrt();
            if len <= f32::EPSILON {
                return a;
            }
            return [result[0] / len, result[1] / len, result[2] / len, result[3] / len];
        }

        let theta_0 = dot.acos();
        let theta = theta_0 * t;
        let sin_theta = theta.sin();
        let sin_theta_0 = theta_0.sin();

        let s0 = theta.cos() - dot * sin_theta / sin_theta_0;
        let s1 = sin_theta / sin_theta_0;

        [
            a[0] * s0 + b[0] * s1,
            a[1] * s0 + b[1] * s1,
            a[2] * s0 + b[2] * s1,
            a[3] * s0 + b[3] * s1,
        ]
    }
}

impl PropertyValue {
    /// Interpolate towards `other` by eased progress `alpha`.
    ///
    /// `Bool` and `Text` hold `self`. Returns `None` for mismatched kinds.
    pub fn interpolate(&self, other: &PropertyValue, alpha: f32) -> Option<PropertyValue> {
        match (self, other) {
            (PropertyValue::Number(a), PropertyValue::Number(b)) => {
                Some(PropertyValue::Number(Interpolation::lerp(*a, *b, alpha)))
            }
            (PropertyValue::Vector2(a), PropertyValue::Vector2(b)) => {
                Some(PropertyValue::Vector2(Interpolation::lerp_vec2(*a, *b, alpha)))
            }
            (PropertyValue::Vector3(a), PropertyValue::Vector3(b)) => {
                Some(PropertyValue::Vector3(Interpolation::lerp_vec3(*a, *b, alpha)))
            }
            (PropertyValue::Color3(a), PropertyValue::Color3(b)) => {
                Some(PropertyValue::Color3(Interpolation::lerp_vec3(*a, *b, alpha)))
            }
            (
                PropertyValue::CFrame { position: pa, rotation: ra },
                PropertyValue::CFrame { position: pb, rotation: rb },
            ) => Some(PropertyValue::CFrame {
                position: Interpolation::lerp_vec3(*pa, *pb, alpha),
                rotation: Interpolation::slerp(*ra, *rb, alpha),
            }),
            (PropertyValue::Bool(_), PropertyValue::Bool(_))
            | (PropertyValue::Text(_), PropertyValue::Text(_)) => Some(self.clone()),
            _ => None,
        }
    }
}
