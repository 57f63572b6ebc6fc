//! Visibility math: bounding spheres, frusta and oriented boxes.
//!
//! Conventions follow `glam`: column vectors, translation in `w_axis`,
//! basis vectors in `x_axis`/`y_axis`/`z_axis`.

mod bounds;
mod frustum;
mod oriented_box;

pub use bounds::{
    bounding_radius, max_axis_scale, BoundingSphere, Containment, NormalMatrix,
    DETERMINANT_EPSILON,
};
pub use frustum::{Frustum, Plane};
pub use oriented_box::OrientedBox;
