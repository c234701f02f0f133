use std::ops::{Index, IndexMut};

/// The scalar fields stored in every cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Density,
    PrevDensity,
    VelocityX,
    PrevVelocityX,
    VelocityY,
    PrevVelocityY,
}

impl Field {
    pub const COUNT: usize = 6;

    pub const ALL: [Field; Field::COUNT] = [
        Field::Density,
        Field::PrevDensity,
        Field::VelocityX,
        Field::PrevVelocityX,
        Field::VelocityY,
        Field::PrevVelocityY,
    ];
}

/// The six field samples held by a leaf cell.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Fields([f32; Field::COUNT]);

impl Fields {
    pub const ZERO: Fields = Fields([0.0; Field::COUNT]);

    /// Arithmetic mean of four cells, summed pairwise so four equal values average back exactly.
    pub fn mean4(cells: [&Fields; 4]) -> Fields {
        let [a, b, c, d] = cells;
        Fields(std::array::from_fn(|k| 0.25 * ((a.0[k] + b.0[k]) + (c.0[k] + d.0[k]))))
    }
}

impl Index<Field> for Fields {
    type Output = f32;

    #[inline]
    fn index(&self, field: Field) -> &f32 {
        &self.0[field as usize]
    }
}

impl IndexMut<Field> for Fields {
    #[inline]
    fn index_mut(&mut self, field: Field) -> &mut f32 {
        &mut self.0[field as usize]
    }
}
