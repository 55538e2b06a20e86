use bevy::prelude::*;

pub fn ray_sphere_intersect(
    ray_start: Vec3,
    ray_direction: Vec3,
    sphere_center: Vec3,
    sphere_radius: f32,
) -> Option<(f32, f32)> {
    let m = sphere_center - ray_start;
    let a = ray_direction.dot(ray_direction);
    let b = m.dot(ray_direction);
    let c = m.dot(m) - sphere_radius * sphere_radius;

    let delta = b * b - a * c;
    if delta < 0.0 {
        return None;
    }
    let inv_a = 1.0 / a;
    let delta_root = delta.sqrt();
    Some((inv_a * (b - delta_root), inv_a * (b + delta_root)))
}
