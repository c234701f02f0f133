use glam::IVec2;
use quadflow_fluids::region::Region;

pub trait AsBytes<const N: usize> {
    fn from_bytes(b: [u8; N]) -> Self;

    fn to_bytes(self) -> [u8; N];
}

/// Copies `M` bytes of `b` starting at `offset`.
#[inline]
fn chunk<const M: usize>(b: &[u8], offset: usize) -> [u8; M] {
    std::array::from_fn(|k| b[offset + k])
}

impl AsBytes<4> for f32 {
    fn from_bytes(b: [u8; 4]) -> Self {
        f32::from_ne_bytes(b)
    }

    fn to_bytes(self) -> [u8; 4] {
        self.to_ne_bytes()
    }
}

impl AsBytes<4> for i32 {
    fn from_bytes(b: [u8; 4]) -> Self {
        i32::from_ne_bytes(b)
    }

    fn to_bytes(self) -> [u8; 4] {
        self.to_ne_bytes()
    }
}

impl AsBytes<4> for u32 {
    fn from_bytes(b: [u8; 4]) -> Self {
        u32::from_ne_bytes(b)
    }

    fn to_bytes(self) -> [u8; 4] {
        self.to_ne_bytes()
    }
}

impl AsBytes<8> for u64 {
    fn from_bytes(b: [u8; 8]) -> Self {
        u64::from_ne_bytes(b)
    }

    fn to_bytes(self) -> [u8; 8] {
        self.to_ne_bytes()
    }
}

impl AsBytes<8> for IVec2 {
    fn from_bytes(b: [u8; 8]) -> Self {
        IVec2::new(i32::from_bytes(chunk(&b, 0)), i32::from_bytes(chunk(&b, 4)))
    }

    fn to_bytes(self) -> [u8; 8] {
        let bytes = [self.x.to_bytes(), self.y.to_bytes()].concat();
        chunk(&bytes, 0)
    }
}

/// Stored as `start.x, start.y, end.x, end.y`.
impl AsBytes<16> for Region {
    fn from_bytes(b: [u8; 16]) -> Self {
        Region {
            start: IVec2::from_bytes(chunk(&b, 0)),
            end: IVec2::from_bytes(chunk(&b, 8)),
        }
    }

    fn to_bytes(self) -> [u8; 16] {
        let bytes = [self.start.to_bytes(), self.end.to_bytes()].concat();
        chunk(&bytes, 0)
    }
}
