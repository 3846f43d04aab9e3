mod homography;
mod rect;

pub use homography::{Homography, WorldPoint};
pub use rect::Rect;
