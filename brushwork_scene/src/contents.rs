// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-variant node payloads.
//!
//! Contents are plain values: swapping a node's contents is how geometry and property edits are
//! applied and undone.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use alloc::format;

use glam::{DMat4, DVec3, Vec3};

use crate::bounds::{BBox3, NodeBounds};
use crate::types::{NodeKind, PersistentId};

/// Half extent of a point entity without definition bounds.
pub const DEFAULT_ENTITY_HALF_EXTENT: f64 = 8.0;

/// A key/value pair on an entity or on the world.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityProperty {
    /// Property key.
    pub key: String,
    /// Property value.
    pub value: String,
}

impl EntityProperty {
    /// Create a property.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

fn property<'a>(properties: &'a [EntityProperty], key: &str) -> Option<&'a str> {
    properties
        .iter()
        .find(|p| p.key == key)
        .map(|p| p.value.as_str())
}

fn set_property(properties: &mut Vec<EntityProperty>, key: &str, value: String) {
    if let Some(p) = properties.iter_mut().find(|p| p.key == key) {
        p.value = value;
    } else {
        properties.push(EntityProperty::new(key, value));
    }
}

/// Worldspawn data held by the root.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorldData {
    /// Worldspawn properties.
    pub properties: Vec<EntityProperty>,
}

/// An ordered, named top-level container.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    /// Display name.
    pub name: String,
    /// Display order. The default layer uses [`Layer::DEFAULT_SORT_INDEX`].
    pub sort_index: i32,
    /// Optional display color.
    pub color: Option<Vec3>,
    /// Whether the layer is skipped on export.
    pub omit_from_export: bool,
}

impl Layer {
    /// Sort index of the default layer, lower than any user layer.
    pub const DEFAULT_SORT_INDEX: i32 = -1;
    /// Marker for a layer whose sort index has not been assigned.
    pub const INVALID_SORT_INDEX: i32 = i32::MAX;

    /// A user layer with an unassigned sort index.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sort_index: Self::INVALID_SORT_INDEX,
            color: None,
            omit_from_export: false,
        }
    }
}

/// A container with an accumulated transformation.
///
/// Children are stored in world space; `transformation` records how the group was placed so
/// linked instances can replay edits relative to each other.
#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    /// Display name.
    pub name: String,
    /// Accumulated placement transformation.
    pub transformation: DMat4,
    /// Names the link set durably; set on the primary member.
    pub shared_persistent_id: Option<PersistentId>,
}

impl Group {
    /// A group with identity transformation.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transformation: DMat4::IDENTITY,
            shared_persistent_id: None,
        }
    }
}

/// A point entity, or a container of brushes and patches.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Entity {
    /// Ordered properties.
    pub properties: Vec<EntityProperty>,
    /// Keys whose values are kept per instance when linked groups are updated.
    pub protected_properties: Vec<String>,
    /// Definition box relative to the origin; `None` uses the default cube.
    pub definition_bounds: Option<BBox3>,
    /// Model extent relative to the origin, if a model is attached.
    pub model_bounds: Option<BBox3>,
}

impl Entity {
    /// Entity with a `classname`.
    pub fn with_classname(classname: &str) -> Self {
        Self {
            properties: alloc::vec![EntityProperty::new("classname", classname)],
            ..Self::default()
        }
    }

    /// Value of `key`, if present.
    pub fn property(&self, key: &str) -> Option<&str> {
        property(&self.properties, key)
    }

    /// Set `key` to `value`, appending when absent.
    pub fn set_property(&mut self, key: &str, value: impl Into<String>) {
        set_property(&mut self.properties, key, value.into());
    }

    /// Remove `key`. Returns the old value.
    pub fn remove_property(&mut self, key: &str) -> Option<String> {
        let i = self.properties.iter().position(|p| p.key == key)?;
        Some(self.properties.remove(i).value)
    }

    /// Parsed `origin` property, or zero when absent or malformed.
    pub fn origin(&self) -> DVec3 {
        self.property("origin")
            .and_then(parse_vec3)
            .unwrap_or(DVec3::ZERO)
    }

    /// Store `origin` as an `"x y z"` property.
    pub fn set_origin(&mut self, origin: DVec3) {
        self.set_property("origin", format_vec3(origin));
    }

    /// Bounds of the entity as a point entity placed at its origin.
    pub fn point_bounds(&self) -> NodeBounds {
        let origin = self.origin();
        let logical = self
            .definition_bounds
            .unwrap_or_else(|| BBox3::cube(DEFAULT_ENTITY_HALF_EXTENT))
            .translate(origin);
        let physical = match self.model_bounds {
            Some(model) => logical.union(model.translate(origin)),
            None => logical,
        };
        NodeBounds { logical, physical }
    }
}

/// Parse `"x y z"`.
pub fn parse_vec3(s: &str) -> Option<DVec3> {
    let mut it = s.split_whitespace().map(|c| c.parse::<f64>());
    let v = DVec3::new(it.next()?.ok()?, it.next()?.ok()?, it.next()?.ok()?);
    it.next().is_none().then_some(v)
}

/// Format as `"x y z"`.
pub fn format_vec3(v: DVec3) -> String {
    format!("{} {} {}", v.x, v.y, v.z)
}

/// A convex solid, held as its vertex set.
///
/// Face construction and CSG live outside this crate; the scene only needs the hull extent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Brush {
    /// Hull vertices in world space.
    pub vertices: Vec<DVec3>,
    /// Material applied to all faces.
    pub material: String,
}

impl Brush {
    /// An axis-aligned cuboid spanning `bounds`.
    pub fn cuboid(bounds: BBox3, material: impl Into<String>) -> Self {
        Self {
            vertices: bounds.corners().to_vec(),
            material: material.into(),
        }
    }

    /// Hull extent, or the zero box for an empty vertex set.
    pub fn bounds(&self) -> BBox3 {
        BBox3::from_points(self.vertices.iter().copied()).unwrap_or(BBox3::ZERO)
    }
}

/// A Bezier surface held as a row-major control grid.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Patch {
    /// Number of control point rows.
    pub rows: usize,
    /// Number of control point columns.
    pub columns: usize,
    /// `rows * columns` control points, row-major.
    pub control_points: Vec<DVec3>,
    /// Surface material.
    pub material: String,
}

impl Patch {
    /// Hull of the control grid, or the zero box when empty.
    pub fn bounds(&self) -> BBox3 {
        BBox3::from_points(self.control_points.iter().copied()).unwrap_or(BBox3::ZERO)
    }

    /// Control point at `(row, column)`.
    pub fn control_point(&self, row: usize, column: usize) -> Option<DVec3> {
        if column >= self.columns {
            return None;
        }
        self.control_points.get(row * self.columns + column).copied()
    }
}

/// The closed set of node variants.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeContents {
    /// The root.
    World(WorldData),
    /// A layer.
    Layer(Layer),
    /// A group.
    Group(Group),
    /// An entity.
    Entity(Entity),
    /// A brush.
    Brush(Brush),
    /// A patch.
    Patch(Patch),
}

impl NodeContents {
    /// The variant tag.
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::World(_) => NodeKind::World,
            Self::Layer(_) => NodeKind::Layer,
            Self::Group(_) => NodeKind::Group,
            Self::Entity(_) => NodeKind::Entity,
            Self::Brush(_) => NodeKind::Brush,
            Self::Patch(_) => NodeKind::Patch,
        }
    }

    /// Display name for layers, groups and entities (the classname).
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Layer(l) => Some(&l.name),
            Self::Group(g) => Some(&g.name),
            Self::Entity(e) => e.property("classname"),
            _ => None,
        }
    }

    /// Bounds derived from the contents alone, for leaf variants.
    ///
    /// Containers (and entities with children) derive bounds from their children instead.
    pub fn leaf_bounds(&self) -> Option<NodeBounds> {
        match self {
            Self::Entity(e) => Some(e.point_bounds()),
            Self::Brush(b) => Some(NodeBounds::uniform(b.bounds())),
            Self::Patch(p) => Some(NodeBounds::uniform(p.bounds())),
            _ => None,
        }
    }

    /// Apply `m` to the geometry held by these contents.
    ///
    /// Groups accumulate the transformation; entities move their origin when they have one;
    /// brushes and patches transform their points. Worlds and layers are unaffected.
    pub fn transform(&mut self, m: &DMat4) {
        match self {
            Self::World(_) | Self::Layer(_) => {}
            Self::Group(g) => g.transformation = *m * g.transformation,
            Self::Entity(e) => {
                if let Some(origin) = e.property("origin").and_then(parse_vec3) {
                    e.set_origin(m.transform_point3(origin));
                }
            }
            Self::Brush(b) => {
                for v in &mut b.vertices {
                    *v = m.transform_point3(*v);
                }
            }
            Self::Patch(p) => {
                for v in &mut p.control_points {
                    *v = m.transform_point3(*v);
                }
            }
        }
    }

    /// A transformed copy.
    pub fn transformed(&self, m: &DMat4) -> Self {
        let mut c = self.clone();
        c.transform(m);
        c
    }
}

impl From<Layer> for NodeContents {
    fn from(v: Layer) -> Self {
        Self::Layer(v)
    }
}

impl From<Group> for NodeContents {
    fn from(v: Group) -> Self {
        Self::Group(v)
    }
}

impl From<Entity> for NodeContents {
    fn from(v: Entity) -> Self {
        Self::Entity(v)
    }
}

impl From<Brush> for NodeContents {
    fn from(v: Brush) -> Self {
        Self::Brush(v)
    }
}

impl From<Patch> for NodeContents {
    fn from(v: Patch) -> Self {
        Self::Patch(v)
    }
}

/// Name helper used by linked group updates when instance names must survive a replace.
pub(crate) fn rename_group(contents: &mut NodeContents, name: &str) {
    if let NodeContents::Group(g) = contents {
        g.name = name.to_string();
    }
}
