use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};

pub type EntityId = u64;

/// Position and orientation of anything placed in the scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::at(Vector3::zeros())
    }
}

impl Transform {
    pub fn new(position: Vector3<f32>, rotation: UnitQuaternion<f32>) -> Self {
        Self { position, rotation }
    }

    pub fn at(position: Vector3<f32>) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
        }
    }

    pub fn to_isometry(self) -> Isometry3<f32> {
        Isometry3::from_parts(Translation3::from(self.position), self.rotation)
    }

    pub fn from_isometry(iso: &Isometry3<f32>) -> Self {
        Self {
            position: iso.translation.vector,
            rotation: iso.rotation,
        }
    }

    /// Maps a point from local space into the parent space.
    pub fn apply(&self, local: Vector3<f32>) -> Vector3<f32> {
        self.position + self.rotation * local
    }

    /// Local +Y after rotation. Used to tell upright glyphs from tumbled ones.
    pub fn up(&self) -> Vector3<f32> {
        self.rotation * Vector3::y()
    }
}

/// Rotation from XYZ-ordered Euler angles (radians), i.e. `Rx * Ry * Rz`.
pub fn euler_xyz(x: f32, y: f32, z: f32) -> UnitQuaternion<f32> {
    UnitQuaternion::from_axis_angle(&Vector3::x_axis(), x)
        * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), y)
        * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), z)
}

/// Axis-aligned bounding box in local or world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl Aabb {
    pub fn new(min: Vector3<f32>, max: Vector3<f32>) -> Self {
        Self { min, max }
    }

    /// Smallest box around `points`. `None` when there are no points.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Vector3<f32>>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut aabb = Aabb::new(first, first);
        for p in iter {
            aabb.min = aabb.min.inf(&p);
            aabb.max = aabb.max.sup(&p);
        }
        Some(aabb)
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    pub fn center(&self) -> Vector3<f32> {
        (self.min + self.max) * 0.5
    }

    /// Half of the box dimensions, i.e. the half extents of a box collider
    /// that circumscribes this box.
    pub fn half_extents(&self) -> Vector3<f32> {
        self.size() * 0.5
    }

    pub fn grown(&self, xy: f32, z: f32) -> Self {
        let pad = Vector3::new(xy, xy, z);
        Aabb::new(self.min - pad, self.max + pad)
    }

    /// Same box translated so its center sits on the origin.
    pub fn centered(&self) -> Self {
        let offset = self.center();
        Aabb::new(self.min - offset, self.max - offset)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorId {
    White,
    Cyan,
    Blue,
    Yellow,
    Magenta,
    Gray,
    Floor,
    Prop,
}
