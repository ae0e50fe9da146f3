use serde_derive::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Track {
    pub track_id: u64,

    // (x1, y1, x2, y2) in px
    pub bbox: [i32; 4],

    // last matched centroid, see `MatchSpace` for the coordinate space
    pub world_position: (f64, f64),

    pub confidence: f32,

    // updates since the last successful match
    pub age: u32,

    pub confirmed: bool,
}

impl Track {
    pub fn new(track_id: u64, bbox: [i32; 4], world_position: (f64, f64), confidence: f32) -> Self {
        Self {
            track_id,
            bbox,
            world_position,
            confidence,
            age: 0,
            confirmed: true,
        }
    }
}
