//! Quaternion orbit camera for the sphere engine: arcball drag, inertia
//! after release, and smoothed zoom.
//!
//! Globe space has radius 1 and y up. The eye sits at
//! `orientation * (0, 0, distance)` looking at the origin. All timing comes
//! from the caller, so the camera replays deterministically.

use std::collections::VecDeque;

use foundation::{EARTH_RADIUS_KM, LngLat, Time, Vec3, lng_lat_to_unit, unit_to_lng_lat};
use scene::{Ray, ray_sphere_hit_t};

use crate::camera::{MAX_DIST, MIN_DIST};

/// Angular velocity decay (per second).
const ANGULAR_DAMPING: f64 = 4.0;

/// Rotation angle (radians per frame) below which inertia stops.
const ANGULAR_VELOCITY_THRESHOLD: f64 = 0.001;

/// Zoom smoothing factor (higher is snappier).
const ZOOM_SMOOTHING: f64 = 8.0;

const VELOCITY_HISTORY_SIZE: usize = 5;

pub const FOV_Y_RAD: f64 = std::f64::consts::FRAC_PI_4;

const IDENTITY: [f64; 4] = [0.0, 0.0, 0.0, 1.0];

#[derive(Debug, Clone, Copy)]
struct VelocitySample {
    delta_quat: [f64; 4],
    dt: f64,
}

#[derive(Debug, Clone)]
pub struct OrbitCamera {
    /// Unit quaternion `[x, y, z, w]`.
    orientation: [f64; 4],
    distance: f64,
    target_distance: f64,
    angular_velocity: [f64; 4],
    inertia_active: bool,
    viewport_px: [f64; 2],
    dragging: bool,
    arcball_last_unit: Option<Vec3>,
    velocity_history: VecDeque<VelocitySample>,
    last_velocity_time: Time,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        let mut cam = Self {
            orientation: IDENTITY,
            distance: MAX_DIST,
            target_distance: MAX_DIST,
            angular_velocity: IDENTITY,
            inertia_active: false,
            viewport_px: [1280.0, 720.0],
            dragging: false,
            arcball_last_unit: None,
            velocity_history: VecDeque::with_capacity(VELOCITY_HISTORY_SIZE),
            last_velocity_time: Time::ZERO,
        };
        cam.look_at(LngLat::new(10.0, 20.0));
        cam
    }
}

impl OrbitCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_viewport(&mut self, width_px: f64, height_px: f64) {
        self.viewport_px = [width_px.max(1.0), height_px.max(1.0)];
    }

    pub fn viewport_px(&self) -> [f64; 2] {
        self.viewport_px
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn target_distance(&self) -> f64 {
        self.target_distance
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn is_inertia_active(&self) -> bool {
        self.inertia_active
    }

    /// Turns the globe so `p` faces the camera with north up. Stops inertia.
    pub fn look_at(&mut self, p: LngLat) {
        if !p.is_finite() {
            return;
        }
        let yaw = (p.lng + 90.0).to_radians();
        let pitch = (-p.lat.clamp(-89.999, 89.999)).to_radians();
        self.orientation = quat_from_yaw_pitch(yaw, pitch);
        self.stop_inertia();
    }

    /// Snaps both current and target distance.
    pub fn set_distance(&mut self, distance: f64) {
        if !distance.is_finite() {
            return;
        }
        let d = distance.clamp(MIN_DIST, MAX_DIST);
        self.distance = d;
        self.target_distance = d;
    }

    /// Zooms smoothly toward `distance`.
    pub fn set_target_distance(&mut self, distance: f64) {
        if distance.is_finite() {
            self.target_distance = distance.clamp(MIN_DIST, MAX_DIST);
        }
    }

    pub fn eye(&self) -> Vec3 {
        quat_rotate(self.orientation, Vec3::new(0.0, 0.0, self.distance))
    }

    /// Unit vector from the globe centre toward the eye.
    pub fn view_dir(&self) -> Vec3 {
        quat_rotate(self.orientation, Vec3::new(0.0, 0.0, 1.0))
    }

    /// Point on the globe under the screen centre.
    pub fn center(&self) -> Option<LngLat> {
        unit_to_lng_lat(self.view_dir())
    }

    fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let f = self.view_dir().scale(-1.0);
        let up = quat_rotate(self.orientation, Vec3::new(0.0, 1.0, 0.0));
        let s = f.cross(up).normalized().unwrap_or(Vec3::new(1.0, 0.0, 0.0));
        let u = s.cross(f);
        (f, s, u)
    }

    fn aspect(&self) -> f64 {
        self.viewport_px[0] / self.viewport_px[1]
    }

    /// Screen position of a globe-space point, or `None` when it is behind
    /// the camera or hidden by the globe.
    pub fn project_point(&self, p: Vec3) -> Option<[f64; 2]> {
        let eye = self.eye();
        if p.dot(eye) <= p.dot(p) {
            return None;
        }
        let (f, s, u) = self.basis();
        let v = p - eye;
        let z = v.dot(f);
        if z <= 1e-9 {
            return None;
        }
        let tan_half = (FOV_Y_RAD * 0.5).tan();
        let x_ndc = v.dot(s) / (z * tan_half * self.aspect());
        let y_ndc = v.dot(u) / (z * tan_half);
        let [w, h] = self.viewport_px;
        let px = [(x_ndc + 1.0) * 0.5 * w, (1.0 - y_ndc) * 0.5 * h];
        (px[0].is_finite() && px[1].is_finite()).then_some(px)
    }

    pub fn project(&self, p: LngLat) -> Option<[f64; 2]> {
        self.project_point(lng_lat_to_unit(p))
    }

    pub fn ray(&self, px: [f64; 2]) -> Ray {
        let [w, h] = self.viewport_px;
        let x_ndc = 2.0 * px[0] / w - 1.0;
        let y_ndc = 1.0 - 2.0 * px[1] / h;
        let tan_half = (FOV_Y_RAD * 0.5).tan();
        let (f, s, u) = self.basis();
        let dir = f + s.scale(x_ndc * tan_half * self.aspect()) + u.scale(y_ndc * tan_half);
        Ray::new(self.eye(), dir)
    }

    /// Geographic point under `px`, if the ray hits the globe.
    pub fn ray_hit(&self, px: [f64; 2]) -> Option<LngLat> {
        let ray = self.ray(px);
        let t = ray_sphere_hit_t(ray, 1.0)?;
        unit_to_lng_lat(ray.at(t))
    }

    /// Ground metres per screen pixel at the screen centre.
    pub fn meters_per_pixel(&self) -> f64 {
        let altitude = (self.distance - 1.0).max(0.0);
        let visible = 2.0 * altitude * (FOV_Y_RAD * 0.5).tan();
        visible * EARTH_RADIUS_KM * 1000.0 / self.viewport_px[1]
    }

    pub fn on_pointer_down(&mut self, pos_px: [f64; 2], now: Time) {
        self.stop_inertia();
        self.dragging = true;
        self.last_velocity_time = now;
        self.arcball_last_unit = Some(self.screen_to_arcball(pos_px));
    }

    pub fn on_pointer_move(&mut self, pos_px: [f64; 2], now: Time) {
        if !self.dragging {
            return;
        }
        let dt = (now.millis_since(self.last_velocity_time) / 1000.0).max(1e-6);
        self.last_velocity_time = now;

        let next_unit = self.screen_to_arcball(pos_px);
        if let Some(prev_unit) = self.arcball_last_unit {
            // Grab-to-rotate: turn the camera the opposite way the cursor went.
            let delta_q = quat_from_unit_vectors(next_unit, prev_unit);
            self.orientation = quat_normalize(quat_mul(self.orientation, delta_q));

            self.velocity_history.push_back(VelocitySample { delta_quat: delta_q, dt });
            if self.velocity_history.len() > VELOCITY_HISTORY_SIZE {
                self.velocity_history.pop_front();
            }
        }
        self.arcball_last_unit = Some(next_unit);
    }

    pub fn on_pointer_up(&mut self) {
        if !self.dragging {
            return;
        }
        self.angular_velocity = self.estimate_angular_velocity();
        self.inertia_active = quat_angle(self.angular_velocity) > ANGULAR_VELOCITY_THRESHOLD;
        self.dragging = false;
        self.arcball_last_unit = None;
        self.velocity_history.clear();
    }

    pub fn stop_inertia(&mut self) {
        self.inertia_active = false;
        self.angular_velocity = IDENTITY;
        self.velocity_history.clear();
    }

    /// Advances inertia and zoom smoothing. Returns `true` if the
    /// orientation moved.
    pub fn update(&mut self, dt_s: f64) -> bool {
        let dt = dt_s.clamp(0.0, 0.1);
        let mut rotated = false;

        if self.inertia_active && !self.dragging {
            let step = quat_slerp(IDENTITY, self.angular_velocity, dt * 60.0);
            self.orientation = quat_normalize(quat_mul(self.orientation, step));
            rotated = true;

            let decay = (-ANGULAR_DAMPING * dt).exp();
            self.angular_velocity = quat_slerp(IDENTITY, self.angular_velocity, decay);
            if quat_angle(self.angular_velocity) < ANGULAR_VELOCITY_THRESHOLD {
                self.inertia_active = false;
                self.angular_velocity = IDENTITY;
            }
        }

        let zoom_alpha = 1.0 - (-ZOOM_SMOOTHING * dt).exp();
        self.distance += (self.target_distance - self.distance) * zoom_alpha;
        self.distance = self.distance.clamp(MIN_DIST, MAX_DIST);

        rotated
    }

    fn screen_to_arcball(&self, pos_px: [f64; 2]) -> Vec3 {
        let [w, h] = self.viewport_px;
        let min_dim = w.min(h).max(1.0);
        let nx = (2.0 * pos_px[0] - w) / min_dim;
        let ny = (h - 2.0 * pos_px[1]) / min_dim;

        let r2 = nx * nx + ny * ny;
        let v = if r2 <= 1.0 {
            Vec3::new(nx, ny, (1.0 - r2).sqrt())
        } else {
            let inv_r = 1.0 / r2.sqrt();
            Vec3::new(nx * inv_r, ny * inv_r, 0.0)
        };
        v.normalized().unwrap_or(Vec3::new(0.0, 0.0, 1.0))
    }

    fn estimate_angular_velocity(&self) -> [f64; 4] {
        if self.velocity_history.is_empty() {
            return IDENTITY;
        }
        let mut total_dt = 0.0;
        let mut accumulated = IDENTITY;
        for sample in &self.velocity_history {
            if sample.dt > 0.0 {
                let rate = 1.0 / sample.dt;
                accumulated = quat_mul(quat_slerp(IDENTITY, sample.delta_quat, rate * 0.016), accumulated);
                total_dt += sample.dt;
            }
        }
        if total_dt > 0.0 {
            let avg_dt = total_dt / self.velocity_history.len() as f64;
            quat_slerp(IDENTITY, accumulated, avg_dt)
        } else {
            IDENTITY
        }
    }
}

// Quaternion helpers, `[x, y, z, w]`.

fn quat_from_yaw_pitch(yaw_rad: f64, pitch_rad: f64) -> [f64; 4] {
    let (sy, cy) = (yaw_rad * 0.5).sin_cos();
    let (sp, cp) = (pitch_rad * 0.5).sin_cos();
    // yaw about Y, then pitch about X
    [cy * sp, sy * cp, -sy * sp, cy * cp]
}

fn quat_mul(a: [f64; 4], b: [f64; 4]) -> [f64; 4] {
    [
        a[3] * b[0] + a[0] * b[3] + a[1] * b[2] - a[2] * b[1],
        a[3] * b[1] - a[0] * b[2] + a[1] * b[3] + a[2] * b[0],
        a[3] * b[2] + a[0] * b[1] - a[1] * b[0] + a[2] * b[3],
        a[3] * b[3] - a[0] * b[0] - a[1] * b[1] - a[2] * b[2],
    ]
}

fn quat_normalize(q: [f64; 4]) -> [f64; 4] {
    let n = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
    if n > 1e-10 {
        [q[0] / n, q[1] / n, q[2] / n, q[3] / n]
    } else {
        IDENTITY
    }
}

fn quat_rotate(q: [f64; 4], v: Vec3) -> Vec3 {
    let qv = Vec3::new(q[0], q[1], q[2]);
    let t = qv.cross(v).scale(2.0);
    v + t.scale(q[3]) + qv.cross(t)
}

fn quat_slerp(a: [f64; 4], b: [f64; 4], t: f64) -> [f64; 4] {
    let mut dot = a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3];
    let mut b = b;
    if dot < 0.0 {
        b = [-b[0], -b[1], -b[2], -b[3]];
        dot = -dot;
    }
    if dot > 0.9995 {
        return quat_normalize([
            a[0] + t * (b[0] - a[0]),
            a[1] + t * (b[1] - a[1]),
            a[2] + t * (b[2] - a[2]),
            a[3] + t * (b[3] - a[3]),
        ]);
    }
    let theta_0 = dot.clamp(-1.0, 1.0).acos();
    let theta = theta_0 * t;
    let sin_theta_0 = theta_0.sin();
    let s0 = theta.cos() - dot * theta.sin() / sin_theta_0;
    let s1 = theta.sin() / sin_theta_0;
    [
        s0 * a[0] + s1 * b[0],
        s0 * a[1] + s1 * b[1],
        s0 * a[2] + s1 * b[2],
        s0 * a[3] + s1 * b[3],
    ]
}

fn quat_angle(q: [f64; 4]) -> f64 {
    2.0 * q[3].abs().clamp(-1.0, 1.0).acos()
}

fn quat_from_unit_vectors(a: Vec3, b: Vec3) -> [f64; 4] {
    let dot = a.dot(b).clamp(-1.0, 1.0);
    if dot < -0.999_999 {
        let mut axis = Vec3::new(1.0, 0.0, 0.0).cross(a);
        if axis.dot(axis) < 1e-12 {
            axis = Vec3::new(0.0, 1.0, 0.0).cross(a);
        }
        let axis = axis.normalized().unwrap_or(Vec3::new(0.0, 1.0, 0.0));
        return [axis.x, axis.y, axis.z, 0.0];
    }
    if dot > 0.999_999 {
        return IDENTITY;
    }
    let axis = a.cross(b);
    quat_normalize([axis.x, axis.y, axis.z, 1.0 + dot])
}
