//! Scene-graph node data.
//!
//! An [`Entity`] is a plain record stored in the [`World`] arena. It holds:
//!
//! - a typed core: position, velocity, flags, and sparse transform extras,
//! - a dynamic property bag for everything behaviours add,
//! - a capability table of named methods (see [`MethodSlot`]),
//! - its own [`EventBus`],
//! - scene-graph links (parent id and ordered child ids) plus the queues
//!   that defer child mutations while the entity is ticking.
//!
//! Properties are addressed by their camel-case names (`x`, `scaleX`,
//! `compositeOperation`, ...) through [`get_property`](Entity::get_property)
//! and friends, which is what defaults and tweens go through.
//!
//! [`World`]: crate::resources::world::World

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use serde_json::{Map, Value};
use smallvec::SmallVec;

use crate::components::behaviour::{Method, same_method};
use crate::events::bus::{EventBus, Listener, listener};
use crate::events::{Event, Response};
use crate::resources::ids::EntityId;
use crate::resources::world::Context;

/// Optional render transform. `None` fields are at their neutral value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transform2D {
    /// Radians.
    pub rotation: Option<f32>,
    pub scale_x: Option<f32>,
    pub scale_y: Option<f32>,
    /// Pivot for rotation and scale, also subtracted from the bounding box.
    pub center_x: Option<f32>,
    pub center_y: Option<f32>,
    /// Multiplied with the ancestors' alpha.
    pub alpha: Option<f32>,
    pub composite_operation: Option<String>,
}

impl Transform2D {
    /// Whether rendering needs a save/transform/restore around this entity.
    pub fn is_identity(&self) -> bool {
        self.rotation.is_none_or(|r| r == 0.0)
            && self.scale_x.is_none_or(|s| s == 1.0)
            && self.scale_y.is_none_or(|s| s == 1.0)
            && self.alpha.is_none_or(|a| a == 1.0)
            && self.composite_operation.is_none()
    }
}

/// Per-frame collision result. Rebuilt from scratch every step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionState {
    pub collided: bool,
    pub collisions: SmallVec<[EntityId; 4]>,
}

impl CollisionState {
    pub fn clear(&mut self) {
        self.collided = false;
        self.collisions.clear();
    }

    pub fn is_colliding_with(&self, other: EntityId) -> bool {
        self.collisions.contains(&other)
    }
}

/// Axis-aligned box in parent space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        BoundingBox {
            x,
            y,
            width,
            height,
        }
    }

    /// Inclusive point test.
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }

    pub fn corners(&self) -> [(f32, f32); 4] {
        let right = self.x + self.width;
        let bottom = self.y + self.height;
        [
            (self.x, self.y),
            (right, self.y),
            (self.x, bottom),
            (right, bottom),
        ]
    }
}

/// Capability table entry.
#[derive(Clone)]
pub struct MethodSlot {
    /// Behaviour that installed the method; `None` for entity-own methods.
    pub owner: Option<String>,
    pub method: Method,
}

/// Integer truncation used for positions in layout and hit testing.
pub(crate) fn trunc(value: f32) -> f32 {
    if value.is_finite() { value.trunc() } else { 0.0 }
}

fn number(value: f32) -> Value {
    Value::from(f64::from(value))
}

fn as_f32(value: &Value) -> Option<f32> {
    value.as_f64().map(|v| v as f32)
}

/// A node in the scene graph.
pub struct Entity {
    id: EntityId,
    pub tag: Option<String>,
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    /// Sort key among siblings when the parent has `sort_on_tick`.
    pub z: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    /// Scroll offset applied to children.
    pub offset_x: Option<f32>,
    pub offset_y: Option<f32>,
    pub transform: Transform2D,
    /// Inactive entities are skipped by their parent's tick.
    pub active: bool,
    /// Disabled entities ignore touches, including their children's.
    pub disabled: bool,
    /// Clip rendering to `width`/`height` and cull children vertically.
    pub clip: bool,
    pub sort_on_tick: bool,
    pub collision: CollisionState,

    pub(crate) parent: Option<EntityId>,
    pub(crate) children: Vec<EntityId>,
    /// Attached behaviour names, in attach order.
    pub(crate) behaviours: Vec<String>,
    pub(crate) methods: FxHashMap<String, MethodSlot>,
    /// `"behaviour.event"` keys already bound on this entity.
    pub(crate) bound_listeners: FxHashSet<String>,
    /// Property keys each behaviour filled in from its defaults.
    pub(crate) applied_defaults: FxHashMap<String, Vec<String>>,
    /// Construction-time properties, the target of `ease_to_defaults`.
    pub(crate) saved_defaults: Map<String, Value>,
    pub(crate) events: EventBus,
    pub(crate) properties: FxHashMap<String, Value>,
    pub(crate) pending_adds: Vec<(EntityId, Option<usize>)>,
    pub(crate) pending_removes: Vec<(EntityId, bool)>,
    pub(crate) updating: bool,
    pub(crate) attached: bool,
}

impl Entity {
    pub(crate) fn new(id: EntityId) -> Self {
        Entity {
            id,
            tag: None,
            x: 0.0,
            y: 0.0,
            dx: 0.0,
            dy: 0.0,
            z: None,
            width: None,
            height: None,
            offset_x: None,
            offset_y: None,
            transform: Transform2D::default(),
            active: true,
            disabled: false,
            clip: false,
            sort_on_tick: false,
            collision: CollisionState::default(),
            parent: None,
            children: Vec::new(),
            behaviours: Vec::new(),
            methods: FxHashMap::default(),
            bound_listeners: FxHashSet::default(),
            applied_defaults: FxHashMap::default(),
            saved_defaults: Map::new(),
            events: EventBus::new(),
            properties: FxHashMap::default(),
            pending_adds: Vec::new(),
            pending_removes: Vec::new(),
            updating: false,
            attached: false,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    pub fn behaviours(&self) -> &[String] {
        &self.behaviours
    }

    pub fn has_behaviour(&self, name: &str) -> bool {
        self.behaviours.iter().any(|b| b == name)
    }

    /// Reachable from the engine root.
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Whether the entity is in the middle of its own tick.
    pub fn is_updating(&self) -> bool {
        self.updating
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tag = Some(tag.into());
    }

    /// The tag if set, otherwise the id.
    pub fn tag_or_id(&self) -> String {
        self.tag.clone().unwrap_or_else(|| self.id.to_string())
    }

    /// Box in parent space, shifted by the pivot.
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox {
            x: trunc(self.x) - trunc(self.transform.center_x.unwrap_or(0.0)),
            y: trunc(self.y) - trunc(self.transform.center_y.unwrap_or(0.0)),
            width: self.width.unwrap_or(0.0),
            height: self.height.unwrap_or(0.0),
        }
    }

    // ==================== CAPABILITIES ====================

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name).map(|slot| &slot.method)
    }

    /// Behaviour owning a method slot. `Some(None)` for entity-own methods.
    pub fn method_owner(&self, name: &str) -> Option<Option<&str>> {
        self.methods.get(name).map(|slot| slot.owner.as_deref())
    }

    /// Install unless the name is taken.
    pub(crate) fn install_method(&mut self, name: &str, owner: Option<&str>, method: Method) -> bool {
        if self.methods.contains_key(name) {
            return false;
        }
        self.methods.insert(
            name.to_string(),
            MethodSlot {
                owner: owner.map(str::to_string),
                method,
            },
        );
        true
    }

    /// Remove only if the slot still holds this exact method.
    pub(crate) fn uninstall_method(&mut self, name: &str, method: &Method) -> bool {
        let owned = self
            .methods
            .get(name)
            .is_some_and(|slot| same_method(&slot.method, method));
        if owned {
            self.methods.remove(name);
        }
        owned
    }

    // ==================== PROPERTIES ====================

    fn scalar(&self, key: &str) -> Option<f32> {
        match key {
            "x" => Some(self.x),
            "y" => Some(self.y),
            "dx" => Some(self.dx),
            "dy" => Some(self.dy),
            _ => None,
        }
    }

    fn scalar_mut(&mut self, key: &str) -> Option<&mut f32> {
        match key {
            "x" => Some(&mut self.x),
            "y" => Some(&mut self.y),
            "dx" => Some(&mut self.dx),
            "dy" => Some(&mut self.dy),
            _ => None,
        }
    }

    fn sparse(&self, key: &str) -> Option<Option<f32>> {
        let t = &self.transform;
        match key {
            "z" => Some(self.z),
            "width" => Some(self.width),
            "height" => Some(self.height),
            "offsetX" => Some(self.offset_x),
            "offsetY" => Some(self.offset_y),
            "rotation" => Some(t.rotation),
            "scaleX" => Some(t.scale_x),
            "scaleY" => Some(t.scale_y),
            "centerX" => Some(t.center_x),
            "centerY" => Some(t.center_y),
            "alpha" => Some(t.alpha),
            _ => None,
        }
    }

    fn sparse_mut(&mut self, key: &str) -> Option<&mut Option<f32>> {
        let t = &mut self.transform;
        match key {
            "z" => Some(&mut self.z),
            "width" => Some(&mut self.width),
            "height" => Some(&mut self.height),
            "offsetX" => Some(&mut self.offset_x),
            "offsetY" => Some(&mut self.offset_y),
            "rotation" => Some(&mut t.rotation),
            "scaleX" => Some(&mut t.scale_x),
            "scaleY" => Some(&mut t.scale_y),
            "centerX" => Some(&mut t.center_x),
            "centerY" => Some(&mut t.center_y),
            "alpha" => Some(&mut t.alpha),
            _ => None,
        }
    }

    fn flag_mut(&mut self, key: &str) -> Option<&mut bool> {
        match key {
            "active" => Some(&mut self.active),
            "disabled" => Some(&mut self.disabled),
            "clip" => Some(&mut self.clip),
            "sortOnTick" => Some(&mut self.sort_on_tick),
            _ => None,
        }
    }

    fn text_mut(&mut self, key: &str) -> Option<&mut Option<String>> {
        match key {
            "tag" => Some(&mut self.tag),
            "compositeOperation" => Some(&mut self.transform.composite_operation),
            _ => None,
        }
    }

    /// Read a property by name.
    pub fn get_property(&self, key: &str) -> Option<Value> {
        if let Some(v) = self.scalar(key) {
            return Some(number(v));
        }
        if let Some(v) = self.sparse(key) {
            return v.map(number);
        }
        match key {
            "active" => Some(Value::Bool(self.active)),
            "disabled" => Some(Value::Bool(self.disabled)),
            "clip" => Some(Value::Bool(self.clip)),
            "sortOnTick" => Some(Value::Bool(self.sort_on_tick)),
            "tag" => self.tag.clone().map(Value::String),
            "compositeOperation" => self
                .transform
                .composite_operation
                .clone()
                .map(Value::String),
            _ => self.properties.get(key).cloned(),
        }
    }

    /// Numeric view of a property.
    pub fn property_f32(&self, key: &str) -> Option<f32> {
        match self.scalar(key) {
            Some(v) => Some(v),
            None => self.get_property(key).as_ref().and_then(as_f32),
        }
    }

    /// Whether the entity has its own value for `key`.
    ///
    /// Position and velocity always exist, as do the boolean flags.
    pub fn has_property(&self, key: &str) -> bool {
        self.get_property(key).is_some()
    }

    /// Write a property. Typed fields reject values of the wrong type and
    /// return `false`; `null` clears optional fields.
    pub fn set_property(&mut self, key: &str, value: Value) -> bool {
        if let Some(slot) = self.scalar_mut(key) {
            return match as_f32(&value) {
                Some(v) => {
                    *slot = v;
                    true
                }
                None => false,
            };
        }
        if let Some(slot) = self.sparse_mut(key) {
            return match value {
                Value::Null => {
                    *slot = None;
                    true
                }
                other => match as_f32(&other) {
                    Some(v) => {
                        *slot = Some(v);
                        true
                    }
                    None => false,
                },
            };
        }
        if let Some(slot) = self.flag_mut(key) {
            return match value.as_bool() {
                Some(b) => {
                    *slot = b;
                    true
                }
                None => false,
            };
        }
        if let Some(slot) = self.text_mut(key) {
            return match value {
                Value::Null => {
                    *slot = None;
                    true
                }
                Value::String(s) => {
                    *slot = Some(s);
                    true
                }
                _ => false,
            };
        }
        self.properties.insert(key.to_string(), value);
        true
    }

    /// Remove a property. Typed fields go back to their neutral value.
    pub fn unset_property(&mut self, key: &str) {
        if let Some(slot) = self.scalar_mut(key) {
            *slot = 0.0;
        } else if let Some(slot) = self.sparse_mut(key) {
            *slot = None;
        } else if let Some(slot) = self.text_mut(key) {
            *slot = None;
        } else {
            match key {
                "active" => self.active = true,
                "disabled" => self.disabled = false,
                "clip" => self.clip = false,
                "sortOnTick" => self.sort_on_tick = false,
                _ => {
                    self.properties.remove(key);
                }
            }
        }
    }

    /// Names of the bag properties, sorted.
    pub fn property_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.properties.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("x", &self.x)
            .field("y", &self.y)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("behaviours", &self.behaviours)
            .finish_non_exhaustive()
    }
}

/// Recipe for a new entity.
///
/// Applied in order: properties, entity-own listeners and methods, then
/// behaviours (with their `init`), then the builder's own `init`.
#[derive(Default)]
pub struct EntityBuilder {
    pub(crate) tag: Option<String>,
    pub(crate) behaviours: Vec<String>,
    pub(crate) properties: Vec<(String, Value)>,
    pub(crate) listeners: Vec<(String, Listener)>,
    pub(crate) methods: Vec<(String, Method)>,
    pub(crate) init: Option<Box<dyn FnOnce(&mut Context<'_>)>>,
}

impl EntityBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn behaviour(mut self, name: impl Into<String>) -> Self {
        self.behaviours.push(name.into());
        self
    }

    pub fn behaviours<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.behaviours.extend(names.into_iter().map(Into::into));
        self
    }

    /// Initial value for any property.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.push((key.into(), value));
        self
    }

    pub fn at(self, x: f32, y: f32) -> Self {
        self.with("x", number(x)).with("y", number(y))
    }

    pub fn size(self, width: f32, height: f32) -> Self {
        self.with("width", number(width))
            .with("height", number(height))
    }

    pub fn velocity(self, dx: f32, dy: f32) -> Self {
        self.with("dx", number(dx)).with("dy", number(dy))
    }

    /// Every key/value of a JSON object as initial properties.
    pub fn properties(mut self, values: Map<String, Value>) -> Self {
        self.properties.extend(values);
        self
    }

    /// Entity-own listener.
    pub fn on<F, R>(mut self, event: &str, f: F) -> Self
    where
        F: Fn(&mut Context<'_>, &mut Event<'_>) -> R + 'static,
        R: Into<Response>,
    {
        self.listeners.push((event.to_string(), listener(f)));
        self
    }

    /// Entity-own method; takes precedence over behaviour methods.
    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Context<'_>, &[Value]) -> Value + 'static,
    {
        self.methods
            .push((name.into(), crate::components::behaviour::method(f)));
        self
    }

    /// Run once after every behaviour was attached.
    pub fn init<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut Context<'_>) + 'static,
    {
        self.init = Some(Box::new(f));
        self
    }
}
