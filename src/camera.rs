//! Per-frame transforms: spin angle, camera placement, and the M/MV/MVP
//! matrices handed to pass 1.

use glam::{Mat4, Vec3};

/// Spin rate in radians per second.
const SPIN_RATE: f32 = 0.3;

/// Initial eye distance, in bounding-sphere radii.
const INIT_EYE_DISTANCE: f32 = 5.0;

/// Everything pass 1 and pass 3 need for one frame.
pub struct FrameTransforms {
    pub m: Mat4,
    pub mv: Mat4,
    pub mvp: Mat4,
    /// Normalized light direction in view space: above, to the right, and
    /// slightly behind the eye.
    pub light_dir: Vec3,
}

/// Camera and spin state. The eye looks down -Z toward the origin; the mesh
/// is re-centred by the model transform.
pub struct Camera {
    pub theta: f32,
    pub eye: Vec3,
    pub fovy: f32,
    pub paused: bool,
    centre: Vec3,
    radius: f32,
    upright_fix: bool,
}

impl Camera {
    /// Place the eye so the mesh's bounding sphere fills the frame.
    pub fn new(centre: Vec3, radius: f32, upright_fix: bool) -> Self {
        Self {
            theta: 0.0,
            eye: Vec3::new(0.0, 0.0, INIT_EYE_DISTANCE * radius),
            fovy: 2.0 * f32::atan2(1.0, INIT_EYE_DISTANCE),
            paused: false,
            centre,
            radius,
            upright_fix,
        }
    }

    /// Advance the spin by `SPIN_RATE * dt`, unless paused.
    pub fn advance(&mut self, dt: f32) {
        if !self.paused {
            self.theta += SPIN_RATE * dt;
        }
    }

    /// Dolly out (scale > 1) or in (scale < 1).
    pub fn dolly(&mut self, scale: f32) {
        self.eye *= scale;
    }

    /// Zoom out (scale > 1) or in (scale < 1).
    pub fn zoom(&mut self, scale: f32) {
        self.fovy *= scale;
    }

    /// Build this frame's transforms for the given aspect ratio.
    ///
    /// Near and far are pinned tightly to the bounding sphere, which spreads
    /// the depth image over its full range for the Laplacian pass.
    pub fn frame(&self, aspect: f32) -> FrameTransforms {
        let m = if self.upright_fix {
            Mat4::from_rotation_y(self.theta)
                * Mat4::from_rotation_x(-std::f32::consts::FRAC_PI_2)
                * Mat4::from_translation(-self.centre)
        } else {
            Mat4::from_axis_angle(Vec3::new(0.5, 2.0, 0.0).normalize(), self.theta)
                * Mat4::from_translation(-self.centre)
        };

        let mv = Mat4::from_translation(-self.eye) * m;

        let distance = (self.eye - self.centre).length();
        let far = distance + self.radius;
        let near = (distance - self.radius).max(far * 1e-3);
        let mvp = Mat4::perspective_rh(self.fovy, aspect, near, far) * mv;

        FrameTransforms {
            m,
            mv,
            mvp,
            light_dir: Vec3::new(1.0, 1.0, 0.2).normalize(),
        }
    }
}
