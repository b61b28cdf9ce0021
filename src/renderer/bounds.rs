use glam::Vec2;

/// Axis-aligned XY bounds of the geometry written since the last reset, plus
/// the depth spanned by the slots that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshBounds {
    pub min: Vec2,
    pub max: Vec2,
    pub thickness: f32,
}

impl MeshBounds {
    pub const EMPTY: Self = Self {
        min: Vec2::INFINITY,
        max: Vec2::NEG_INFINITY,
        thickness: 0.0,
    };

    pub fn reset(&mut self) {
        *self = Self::EMPTY;
    }

    /// No vertex has been included since the last reset.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    /// Branchless min/max. Starting from infinite sentinels, the first point
    /// sets both corners.
    #[inline]
    pub fn include(&mut self, point: Vec2) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn scale(&mut self, factor: f32) {
        self.min *= factor;
        self.max *= factor;
        self.thickness *= factor;
    }
}

impl Default for MeshBounds {
    fn default() -> Self {
        Self::EMPTY
    }
}
