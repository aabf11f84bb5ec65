use super::{FloatType, Ray, WorldBox};

pub trait RayIntersectionExt {
    /// Calculate first and last ray intersection with the box.
    fn intersect(&self, ray: &Ray) -> Option<(FloatType, FloatType)>;
}

impl RayIntersectionExt for WorldBox {
    /// Calculates ray intersection with the box using the slab method.
    /// Returns the entry and exit distance along the ray, entry is clamped to the ray origin.
    /// Returns None if the intersection is empty or lies entirely behind the ray origin.
    fn intersect(&self, ray: &Ray) -> Option<(FloatType, FloatType)> {
        // Componentwise distances along the ray to the box's min and max corners
        // The multiplication is NAN if the ray is starting inside the slab bounding plane
        // and is parallel to it. In this case we blend to +-infinity, so that the range becomes infinite
        let to_box_min = (self.min - ray.origin)
            .component_mul(&ray.inv_direction)
            .map(|x| if x.is_nan() { FloatType::NEG_INFINITY } else { x });
        let to_box_max = (self.max - ray.origin)
            .component_mul(&ray.inv_direction)
            .map(|x| if x.is_nan() { FloatType::INFINITY } else { x });

        // Correctly ordered (min_t <= max_t)
        let componentwise_min_t = to_box_min.zip_map(&to_box_max, FloatType::min);
        let componentwise_max_t = to_box_min.zip_map(&to_box_max, FloatType::max);

        let min_t = componentwise_min_t.max().max(0.0);
        let max_t = componentwise_max_t.min();

        (min_t <= max_t).then_some((min_t, max_t))
    }
}
