use glam::{Mat4, Vec3};

/// Slowly orbiting camera framing the visualization volume. The cage's
/// origin corner is the world origin; the camera circles the volume center
/// looking slightly down at the terrain.
pub struct OrbitCamera {
    pub target: Vec3,
    pub radius: f32,
    pub height: f32,
    /// Radians per second; 0 gives a fixed viewpoint.
    pub orbit_speed: f32,
    pub fov_degrees: f32,
}

impl OrbitCamera {
    pub fn around_volume(volume_size: f32, orbit_speed: f32) -> Self {
        Self {
            target: Vec3::new(volume_size * 0.5, volume_size * 0.3, volume_size * 0.5),
            radius: volume_size * 1.7,
            height: volume_size * 1.1,
            orbit_speed,
            fov_degrees: 45.0,
        }
    }

    pub fn view_proj(&self, time_s: f32, aspect: f32) -> Mat4 {
        let angle = time_s * self.orbit_speed + std::f32::consts::FRAC_PI_4;
        let eye = Vec3::new(
            self.target.x + angle.cos() * self.radius,
            self.height,
            self.target.z + angle.sin() * self.radius,
        );

        let view = Mat4::look_at_rh(eye, self.target, Vec3::Y);
        let proj = Mat4::perspective_rh(
            self.fov_degrees.to_radians(),
            aspect,
            0.1,
            self.radius * 10.0,
        );
        proj * view
    }
}

/// Map a world-space point to pixel coordinates. None when the point is
/// behind the camera or outside the viewport.
pub fn project_to_screen(
    view_proj: Mat4,
    world: Vec3,
    width: u32,
    height: u32,
) -> Option<(u32, u32)> {
    let clip = view_proj * world.extend(1.0);
    if clip.w <= 0.0 {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    if !(-1.0..=1.0).contains(&ndc.x) || !(-1.0..=1.0).contains(&ndc.y) {
        return None;
    }
    let x = ((ndc.x * 0.5 + 0.5) * width as f32) as u32;
    let y = ((1.0 - (ndc.y * 0.5 + 0.5)) * height as f32) as u32;
    Some((x.min(width - 1), y.min(height - 1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_proj_is_a_real_transform() {
        let camera = OrbitCamera::around_volume(10.0, 0.05);
        let vp = camera.view_proj(0.0, 16.0 / 9.0);
        assert_ne!(vp, Mat4::IDENTITY);
        assert!(vp.to_cols_array().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn target_projects_near_screen_center() {
        let camera = OrbitCamera::around_volume(10.0, 0.0);
        let vp = camera.view_proj(0.0, 1.0);
        let (x, y) = project_to_screen(vp, camera.target, 1000, 1000).unwrap();
        assert!((400..600).contains(&x));
        assert!((400..600).contains(&y));
    }

    #[test]
    fn points_behind_the_camera_do_not_project() {
        let camera = OrbitCamera::around_volume(10.0, 0.0);
        let vp = camera.view_proj(0.0, 1.0);
        // Far behind the eye, opposite the target.
        let behind = camera.target + Vec3::new(100.0, 0.0, 100.0);
        assert!(project_to_screen(vp, behind, 1000, 1000).is_none());
    }

    #[test]
    fn orbit_moves_the_eye_over_time() {
        let camera = OrbitCamera::around_volume(10.0, 0.5);
        let a = camera.view_proj(0.0, 1.0);
        let b = camera.view_proj(3.0, 1.0);
        assert_ne!(a, b);
    }
}
