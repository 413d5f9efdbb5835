//! Easing curves, colour values and per-property tween plans.
//!
//! A [`TweenPlan`] is computed once when a tween starts by comparing the
//! entity's current properties with the targets:
//! - numbers blend linearly through the eased progress,
//! - colour strings (`#rrggbb`, `rgb(..)`, `rgba(..)`) blend per channel,
//!   rounded and clamped,
//! - anything else is set-only: it keeps the source value until progress
//!   reaches exactly 1, then snaps to the target.
//!
//! See [`crate::systems::tween`] for the tick-driven driver.

use log::warn;
use serde_json::{Map, Value};

use crate::components::entity::Entity;

/// Easing functions for smooth interpolation.
///
/// These functions transform a linear `t` value (0.0 to 1.0) to create
/// different acceleration/deceleration curves.
#[derive(Copy, Clone, Debug, Default)]
pub enum Easing {
    /// Constant speed (no easing).
    #[default]
    Linear,
    /// `t³`.
    Cubic,
    /// Fast start, slow end (cubic).
    In,
    /// Cubic ease out.
    Out,
    /// Bounces against the end value.
    OutBounce,
    /// Shoots past 1 and settles back.
    Overshoot,
    /// Goes to 1 at the midpoint and back to 0.
    Rebound,
    /// Starts slow, accelerates (quadratic).
    QuadIn,
    /// Starts fast, decelerates (quadratic).
    QuadOut,
    /// Slow start and end (quadratic).
    QuadInOut,
    /// Starts slow, accelerates (cubic).
    CubicIn,
    /// Starts fast, decelerates (cubic).
    CubicOut,
    /// Slow start and end (cubic).
    CubicInOut,
    Custom(fn(f32) -> f32),
}

impl Easing {
    /// Apply the curve to a normalized progress value.
    pub fn apply(self, t: f32) -> f32 {
        match self {
            Easing::Linear => t,
            Easing::Cubic | Easing::CubicIn => t * t * t,
            Easing::In => {
                let p = 1.0 - t;
                1.0 - p * p * p
            }
            Easing::Out | Easing::CubicOut => {
                let p = t - 1.0;
                p * p * p + 1.0
            }
            Easing::OutBounce => {
                const N: f32 = 7.5625;
                const D: f32 = 2.75;
                if t < 1.0 / D {
                    N * t * t
                } else if t < 2.0 / D {
                    let p = t - 1.5 / D;
                    N * p * p + 0.75
                } else if t < 2.5 / D {
                    let p = t - 2.25 / D;
                    N * p * p + 0.9375
                } else {
                    let p = t - 2.625 / D;
                    N * p * p + 0.984375
                }
            }
            Easing::Overshoot => -t * (t - 1.4) * 2.5,
            Easing::Rebound => {
                let p = 2.0 * t - 1.0;
                1.0 - p * p
            }
            Easing::QuadIn => t * t,
            Easing::QuadOut => t * (2.0 - t),
            Easing::QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Easing::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let p = 2.0 * t - 2.0;
                    0.5 * p * p * p + 1.0
                }
            }
            Easing::Custom(f) => f(t),
        }
    }

    /// Look up a curve by its lower-case name (`"outBounce"`, `"quad-in"`, ...).
    pub fn from_name(name: &str) -> Option<Easing> {
        let key: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Some(match key.as_str() {
            "linear" => Easing::Linear,
            "cubic" => Easing::Cubic,
            "in" => Easing::In,
            "out" => Easing::Out,
            "outbounce" => Easing::OutBounce,
            "overshoot" => Easing::Overshoot,
            "rebound" => Easing::Rebound,
            "quadin" => Easing::QuadIn,
            "quadout" => Easing::QuadOut,
            "quadinout" => Easing::QuadInOut,
            "cubicin" => Easing::CubicIn,
            "cubicout" => Easing::CubicOut,
            "cubicinout" => Easing::CubicInOut,
            _ => return None,
        })
    }
}

/// RGBA colour, channels 0..=255 and alpha 0..=1.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };

    /// Parse `#rrggbb`, `rgb(r, g, b)` or `rgba(r, g, b, a)`.
    pub fn parse(text: &str) -> Option<Rgba> {
        let text = text.trim();
        if let Some(hex) = text.strip_prefix('#') {
            if hex.len() != 6 || !hex.is_ascii() {
                return None;
            }
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok().map(f64::from);
            return Some(Rgba {
                r: channel(0)?,
                g: channel(2)?,
                b: channel(4)?,
                a: 1.0,
            });
        }
        let lower = text.to_ascii_lowercase();
        let (body, expected) = if let Some(body) = lower.strip_prefix("rgba(") {
            (body, 4)
        } else if let Some(body) = lower.strip_prefix("rgb(") {
            (body, 3)
        } else {
            return None;
        };
        let body = body.strip_suffix(')')?;
        let parts: Vec<f64> = body
            .split(',')
            .map(|p| p.trim().parse::<f64>().ok())
            .collect::<Option<_>>()?;
        if parts.len() != expected {
            return None;
        }
        Some(Rgba {
            r: parts[0],
            g: parts[1],
            b: parts[2],
            a: parts.get(3).copied().unwrap_or(1.0),
        })
    }

    /// Blend towards `other`; channels are rounded and clamped.
    pub fn mix(&self, other: &Rgba, amount: f64) -> Rgba {
        let blend = |a: f64, b: f64| a * (1.0 - amount) + b * amount;
        let channel = |a: f64, b: f64| blend(a, b).round().clamp(0.0, 255.0);
        Rgba {
            r: channel(self.r, other.r),
            g: channel(self.g, other.g),
            b: channel(self.b, other.b),
            a: blend(self.a, other.a).clamp(0.0, 1.0),
        }
    }

    /// CSS form, always `rgba(..)`.
    pub fn to_css(&self) -> String {
        format!("rgba({},{},{},{})", self.r, self.g, self.b, self.a)
    }
}

/// How one property is driven.
#[derive(Clone, Debug, PartialEq)]
pub enum TweenAction {
    Numeric {
        key: String,
        source: f64,
        dest: f64,
    },
    Color {
        key: String,
        source: Rgba,
        dest: Rgba,
    },
    /// `source` is `None` when the property did not exist.
    Set {
        key: String,
        source: Option<Value>,
        dest: Value,
    },
}

impl TweenAction {
    pub fn key(&self) -> &str {
        match self {
            TweenAction::Numeric { key, .. }
            | TweenAction::Color { key, .. }
            | TweenAction::Set { key, .. } => key,
        }
    }
}

fn numeric_source(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        _ => 0.0,
    }
}

/// Equality that treats `10` and `10.0` as the same number.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Actions for every target that differs from the current value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TweenPlan {
    actions: Vec<TweenAction>,
}

impl TweenPlan {
    pub fn new(entity: &Entity, targets: &Map<String, Value>) -> Self {
        let mut actions = Vec::new();
        for (key, dest) in targets {
            let source = entity.get_property(key);
            if source.as_ref().is_some_and(|s| same_value(s, dest)) {
                continue;
            }
            let action = match dest {
                Value::Number(n) => TweenAction::Numeric {
                    key: key.clone(),
                    source: numeric_source(source.as_ref()),
                    dest: n.as_f64().unwrap_or(0.0),
                },
                Value::String(s) => match Rgba::parse(s) {
                    Some(dest) => TweenAction::Color {
                        key: key.clone(),
                        source: source
                            .as_ref()
                            .and_then(Value::as_str)
                            .and_then(Rgba::parse)
                            .unwrap_or(Rgba::BLACK),
                        dest,
                    },
                    None => {
                        if s.starts_with('#') || s.starts_with("rgb") {
                            warn!("Unparsable colour {s:?} for {key}, snapping at the end");
                        }
                        TweenAction::Set {
                            key: key.clone(),
                            source,
                            dest: dest.clone(),
                        }
                    }
                },
                _ => TweenAction::Set {
                    key: key.clone(),
                    source,
                    dest: dest.clone(),
                },
            };
            actions.push(action);
        }
        TweenPlan { actions }
    }

    pub fn actions(&self) -> &[TweenAction] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Write every property at `progress` (0..=1) shaped by `easing`.
    ///
    /// Set-only actions look at the raw progress, so they land on their
    /// target at the end whatever the curve returns there.
    pub fn apply(&self, entity: &mut Entity, progress: f32, easing: Easing) {
        let amount = f64::from(easing.apply(progress));
        for action in &self.actions {
            match action {
                TweenAction::Numeric { key, source, dest } => {
                    let value = source * (1.0 - amount) + dest * amount;
                    entity.set_property(key, Value::from(value));
                }
                TweenAction::Color { key, source, dest } => {
                    entity.set_property(key, Value::String(source.mix(dest, amount).to_css()));
                }
                TweenAction::Set { key, source, dest } => {
                    if progress >= 1.0 {
                        entity.set_property(key, dest.clone());
                    } else {
                        match source {
                            Some(value) => {
                                entity.set_property(key, value.clone());
                            }
                            None => entity.unset_property(key),
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::resources::ids::EntityId;

    const EPSILON: f32 = 1e-5;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn targets(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    // ==================== EASING FUNCTION TESTS ====================

    #[test]
    fn test_standard_curves_hit_both_ends() {
        let types = [
            Easing::Linear,
            Easing::Cubic,
            Easing::In,
            Easing::Out,
            Easing::OutBounce,
            Easing::QuadIn,
            Easing::QuadOut,
            Easing::QuadInOut,
            Easing::CubicIn,
            Easing::CubicOut,
            Easing::CubicInOut,
        ];
        for easing in types {
            assert!(approx_eq(easing.apply(0.0), 0.0), "{easing:?} at 0");
            assert!(approx_eq(easing.apply(1.0), 1.0), "{easing:?} at 1");
        }
    }

    #[test]
    fn test_overshoot_peaks_above_one() {
        assert!(Easing::Overshoot.apply(0.7) > 1.0);
        assert!(approx_eq(Easing::Overshoot.apply(1.0), 1.0));
    }

    #[test]
    fn test_rebound_returns_to_start() {
        assert!(approx_eq(Easing::Rebound.apply(0.0), 0.0));
        assert!(approx_eq(Easing::Rebound.apply(0.5), 1.0));
        assert!(approx_eq(Easing::Rebound.apply(1.0), 0.0));
    }

    #[test]
    fn test_custom_curve() {
        fn half(t: f32) -> f32 {
            t * 0.5
        }
        assert!(approx_eq(Easing::Custom(half).apply(1.0), 0.5));
    }

    #[test]
    fn test_from_name() {
        assert!(matches!(Easing::from_name("outBounce"), Some(Easing::OutBounce)));
        assert!(matches!(Easing::from_name("quad-in-out"), Some(Easing::QuadInOut)));
        assert!(Easing::from_name("wobble").is_none());
    }

    // ==================== COLOURS ====================

    #[test]
    fn test_parse_colours() {
        assert_eq!(
            Rgba::parse("#ff8000"),
            Some(Rgba {
                r: 255.0,
                g: 128.0,
                b: 0.0,
                a: 1.0
            })
        );
        assert_eq!(
            Rgba::parse("rgba(1, 2, 3, 0.5)"),
            Some(Rgba {
                r: 1.0,
                g: 2.0,
                b: 3.0,
                a: 0.5
            })
        );
        assert_eq!(Rgba::parse("rgb(1,2,3)").map(|c| c.a), Some(1.0));
        assert_eq!(Rgba::parse("#fff"), None);
        assert_eq!(Rgba::parse("rgb(1,2)"), None);
        assert_eq!(Rgba::parse("rgb(a,b,c)"), None);
        assert_eq!(Rgba::parse("red"), None);
    }

    #[test]
    fn test_mix_rounds_and_clamps() {
        let black = Rgba::BLACK;
        let white = Rgba::parse("#ffffff").unwrap();
        assert_eq!(black.mix(&white, 0.5).to_css(), "rgba(128,128,128,1)");
        assert_eq!(black.mix(&white, 1.5).to_css(), "rgba(255,255,255,1)");
    }

    // ==================== PLANS ====================

    #[test]
    fn test_plan_classifies_targets() {
        let mut e = Entity::new(EntityId::from_raw(1));
        e.set_property("x", json!(10));
        e.set_property("fill", json!("#000000"));
        let plan = TweenPlan::new(
            &e,
            &targets(json!({
                "x": 10,
                "y": 50,
                "fill": "#ffffff",
                "label": "done",
                "visible": true
            })),
        );
        let mut kinds: Vec<(&str, &str)> = plan
            .actions()
            .iter()
            .map(|a| {
                let kind = match a {
                    TweenAction::Numeric { .. } => "numeric",
                    TweenAction::Color { .. } => "color",
                    TweenAction::Set { .. } => "set",
                };
                (a.key(), kind)
            })
            .collect();
        kinds.sort_unstable();
        assert_eq!(
            kinds,
            vec![
                ("fill", "color"),
                ("label", "set"),
                ("visible", "set"),
                ("y", "numeric")
            ]
        );
    }

    #[test]
    fn test_apply_blends_and_snaps() {
        let mut e = Entity::new(EntityId::from_raw(1));
        e.set_property("label", json!("start"));
        let plan = TweenPlan::new(&e, &targets(json!({"x": 100, "label": "end", "badge": 1.5})));

        plan.apply(&mut e, 0.25, Easing::Linear);
        assert!(approx_eq(e.x, 25.0));
        assert_eq!(e.get_property("label"), Some(json!("start")));

        plan.apply(&mut e, 1.0, Easing::Linear);
        assert!(approx_eq(e.x, 100.0));
        assert_eq!(e.get_property("label"), Some(json!("end")));
        assert_eq!(e.get_property("badge"), Some(json!(1.5)));
    }

    #[test]
    fn test_set_only_snaps_even_when_curve_ends_at_zero() {
        let mut e = Entity::new(EntityId::from_raw(1));
        let plan = TweenPlan::new(&e, &targets(json!({"x": 10, "mode": "done"})));
        plan.apply(&mut e, 1.0, Easing::Rebound);
        assert!(approx_eq(e.x, 0.0));
        assert_eq!(e.get_property("mode"), Some(json!("done")));
    }

    #[test]
    fn test_equal_numbers_are_skipped() {
        let mut e = Entity::new(EntityId::from_raw(1));
        e.set_property("x", json!(10));
        let plan = TweenPlan::new(&e, &targets(json!({"x": 10.0})));
        assert!(plan.is_empty());
    }

    #[test]
    fn test_set_only_missing_source_stays_missing() {
        let mut e = Entity::new(EntityId::from_raw(1));
        let plan = TweenPlan::new(&e, &targets(json!({"mode": "fast"})));
        plan.apply(&mut e, 0.5, Easing::Linear);
        assert!(!e.has_property("mode"));
        plan.apply(&mut e, 1.0, Easing::Linear);
        assert_eq!(e.get_property("mode"), Some(json!("fast")));
    }
}
