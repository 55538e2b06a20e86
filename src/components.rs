use bevy::prelude::*;

/// Fraction-per-sixtieth-of-a-second interpretation of the string damping
/// factor, so 0.92 means the same thing at any sub-step count.
const DRAG_RATE: f32 = 60.0;

/// Highest spring rate the sub-step can integrate without blowing up.
pub fn stable_stiffness(stiffness: f32, mass: f32, dt: f32) -> f32 {
    let limit = mass * (0.5 / dt) * (0.5 / dt);
    stiffness.min(limit)
}

/// A rigid sphere body. Positions live on the [`Transform`], everything else
/// lives here so the simulation owns its own state.
#[derive(Reflect, Component, Default)]
#[reflect(Component)]
pub struct Ball {
    pub radius: f32,
    pub mass: f32,
    pub restitution: f32,
    pub friction: f32,
    pub linear_damping: f32,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl Ball {
    pub fn begin_step(&mut self, gravity: Vec3, dt: f32) {
        self.velocity += gravity * dt;
    }

    pub fn end_step(&mut self, trans: &mut Transform, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let keep = (1.0 - self.linear_damping * dt).max(0.0);
        self.velocity *= keep;
        self.angular_velocity *= keep;
        trans.translation += self.velocity * dt;
        if self.angular_velocity != Vec3::ZERO {
            trans.rotate(Quat::from_scaled_axis(self.angular_velocity * dt));
        }
    }
}

/// The damped spring holding a ball to its fixed anchor. Pulls only while
/// stretched past the rest length, a slack string pushes nothing.
#[derive(Reflect, Component, Default)]
#[reflect(Component)]
pub struct Tether {
    pub anchor: Vec3,
    pub rest_length: f32,
    pub stiffness: f32,
    pub damping: f32,
}

impl Tether {
    pub fn apply(&self, ball: &mut Ball, trans: &Transform, dt: f32) {
        let offset = trans.translation - self.anchor;
        let len = offset.length();
        if len <= f32::EPSILON || len < self.rest_length {
            return;
        }
        let dir = offset / len;
        let k = stable_stiffness(self.stiffness, ball.mass, dt);
        let omega = (k / ball.mass).sqrt();
        let along = ball.velocity.dot(dir);
        let accel = -k * (len - self.rest_length) / ball.mass - 2.0 * self.damping * omega * along;
        ball.velocity += dir * accel * dt;
        // string damping also bleeds energy from the swing as a whole,
        // the exponent keeps the rate frame independent
        ball.velocity *= self.damping.powf(dt * DRAG_RATE);
    }

    /// Where the ball settles once everything stops moving, spring sag
    /// included.
    pub fn rest_pose(&self, ball: &Ball, gravity: Vec3) -> Vec3 {
        let sag = ball.mass * gravity.length() / self.stiffness.max(f32::EPSILON);
        self.anchor - Vec3::Y * (self.rest_length + sag)
    }

    /// Straight-down point at exactly rest length, the respawn target when a
    /// ball's state stops being representable.
    pub fn hang_point(&self) -> Vec3 {
        self.anchor - Vec3::Y * self.rest_length
    }
}

/// Tags a string visual with the ball it hangs with.
#[derive(Component)]
pub struct StringOf(pub Entity);
