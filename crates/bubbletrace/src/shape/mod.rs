//! Shape primitives: circle transform, contour measurement, corner response.

pub mod contour;
pub mod harris;
pub mod hough;

pub use contour::{trace_shapes, ContourShape};
pub use harris::{harris_response, max_response, ResponseMap};
pub use hough::{hough_circles, HoughCircle, HoughPass};
