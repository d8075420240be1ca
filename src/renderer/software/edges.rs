//! Edge-table generation.
//!
//! A polygon's outline is walked once; every edge going down the screen
//! writes the right-hand end of each scanline it covers, every edge going up
//! writes the left-hand end. Front-facing polygons wind clockwise, so this
//! leaves one `(left, right)` pair per scanline.
//!
//! The attribute payload is an `[f32; N]`: nothing for flat fills, shade for
//! gouraud, shade/u/v for affine, shade/u·rhw/v·rhw/rhw for perspective.

/// One end of a scanline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgePoint<const N: usize> {
    pub x: f32,
    pub a: [f32; N],
}

impl<const N: usize> EdgePoint<N> {
    fn zero() -> Self {
        Self { x: 0.0, a: [0.0; N] }
    }
}

/// Corner fed to [`EdgeTable::build`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeVertex<const N: usize> {
    pub x: i32,
    pub y: i32,
    pub a: [f32; N],
}

pub struct EdgeTable<const N: usize> {
    left: Vec<EdgePoint<N>>,
    right: Vec<EdgePoint<N>>,
}

impl<const N: usize> EdgeTable<N> {
    pub fn new(height: usize) -> Self {
        Self {
            left: vec![EdgePoint::zero(); height],
            right: vec![EdgePoint::zero(); height],
        }
    }

    pub fn height(&self) -> usize {
        self.left.len()
    }

    /// Walk the outline and return the covered scanlines `[y0, y1)`, limited
    /// to `[top, bottom)`. `None` when nothing is left (flat or offscreen).
    pub fn build(&mut self, verts: &[EdgeVertex<N>], top: i32, bottom: i32) -> Option<(i32, i32)> {
        let top = top.max(0);
        let bottom = bottom.min(self.height() as i32);
        let mut y_min = i32::MAX;
        let mut y_max = i32::MIN;

        for (i, a) in verts.iter().enumerate() {
            let b = &verts[(i + 1) % verts.len()];
            if a.y == b.y {
                continue;
            }
            let (from, to, side) = if b.y > a.y {
                (a, b, &mut self.right)
            } else {
                (b, a, &mut self.left)
            };
            y_min = y_min.min(from.y);
            y_max = y_max.max(to.y);

            let dy = (to.y - from.y) as f32;
            let dx = (to.x - from.x) as f32 / dy;
            let mut da = [0.0f32; N];
            for k in 0..N {
                da[k] = (to.a[k] - from.a[k]) / dy;
            }

            let y0 = from.y.max(top);
            let y1 = to.y.min(bottom);
            for y in y0..y1 {
                let t = (y - from.y) as f32;
                let p = &mut side[y as usize];
                p.x = from.x as f32 + dx * t;
                for k in 0..N {
                    p.a[k] = from.a[k] + da[k] * t;
                }
            }
        }

        let y0 = y_min.max(top);
        let y1 = y_max.min(bottom);
        (y0 < y1).then_some((y0, y1))
    }

    #[inline]
    pub fn span(&self, y: i32) -> (&EdgePoint<N>, &EdgePoint<N>) {
        (&self.left[y as usize], &self.right[y as usize])
    }
}
