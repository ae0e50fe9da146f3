use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};

/// Contains left-top (x1,y1) and right-bottom (x2,y2) corners of bbox in image pixels
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    #[serde(rename = "p")]
    pub confidence: f32,
}

impl Detection {
    #[inline]
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
        }
    }

    #[inline(always)]
    pub fn bbox(&self) -> BBox<Ltrb> {
        BBox::ltrb(self.x1, self.y1, self.x2, self.y2)
    }

    #[inline(always)]
    pub fn cx(&self) -> f32 {
        (self.x1 + self.x2) / 2.
    }

    #[inline(always)]
    pub fn cy(&self) -> f32 {
        (self.y1 + self.y2) / 2.
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.bbox().area()
    }
}

impl From<(f32, f32, f32, f32, f32)> for Detection {
    fn from((x1, y1, x2, y2, confidence): (f32, f32, f32, f32, f32)) -> Self {
        Self::new(x1, y1, x2, y2, confidence)
    }
}
