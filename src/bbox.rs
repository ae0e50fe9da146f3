use serde_derive::{Deserialize, Serialize};
use std::marker::PhantomData;

pub trait BBoxFormat: std::fmt::Debug + Copy + PartialEq {}

/// Left-top-width-height format, contains left top corner and width-height
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct Ltwh;
impl BBoxFormat for Ltwh {}

/// Left-top-right-bottom format, contains left top and right bottom corners
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct Ltrb;
impl BBoxFormat for Ltrb {}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct BBox<F: BBoxFormat>([f32; 4], PhantomData<F>);

impl<F: BBoxFormat> BBox<F> {
    #[inline]
    pub fn as_slice(&self) -> &[f32; 4] {
        &self.0
    }
}

impl BBox<Ltwh> {
    #[inline]
    pub fn ltwh(x1: f32, x2: f32, x3: f32, x4: f32) -> Self {
        BBox([x1, x2, x3, x4], PhantomData)
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.0[3]
    }

    #[inline]
    pub fn as_ltrb(&self) -> BBox<Ltrb> {
        self.into()
    }
}

impl BBox<Ltrb> {
    #[inline]
    pub fn ltrb(x1: f32, x2: f32, x3: f32, x4: f32) -> Self {
        BBox([x1, x2, x3, x4], PhantomData)
    }

    #[inline]
    pub fn as_ltwh(&self) -> BBox<Ltwh> {
        self.into()
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.0[3]
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.0[2] - self.0[0]
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.0[3] - self.0[1]
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Clamps every edge into `[0, w - 1] x [0, h - 1]`.
    pub fn clamped(&self, w: u32, h: u32) -> Self {
        let max_x = (w as f32 - 1.0).max(0.0);
        let max_y = (h as f32 - 1.0).max(0.0);

        BBox::ltrb(
            self.0[0].clamp(0.0, max_x),
            self.0[1].clamp(0.0, max_y),
            self.0[2].clamp(0.0, max_x),
            self.0[3].clamp(0.0, max_y),
        )
    }

    /// Integer pixel corners, truncated toward zero.
    #[inline]
    pub fn to_pixels(&self) -> [i32; 4] {
        [
            self.0[0] as i32,
            self.0[1] as i32,
            self.0[2] as i32,
            self.0[3] as i32,
        ]
    }
}

impl From<&BBox<Ltwh>> for BBox<Ltrb> {
    #[inline]
    fn from(b: &BBox<Ltwh>) -> Self {
        BBox::ltrb(b.left(), b.top(), b.left() + b.width(), b.top() + b.height())
    }
}

impl From<&BBox<Ltrb>> for BBox<Ltwh> {
    #[inline]
    fn from(b: &BBox<Ltrb>) -> Self {
        BBox::ltwh(b.left(), b.top(), b.width(), b.height())
    }
}
