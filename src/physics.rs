use bevy::prelude::*;

use crate::{components::*, grabber::Grabbed, resources::*, state::AppState};

/// Simulation tick, decoupled from the render rate.
pub const PHYSICS_DT: f32 = 1.0 / 60.0;

pub struct PhysicsPlugin;

impl Plugin for PhysicsPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(FixedTime::new_from_secs(PHYSICS_DT))
            .add_system(
                simulate
                    .run_if(in_state(AppState::Playing))
                    .in_schedule(CoreSchedule::FixedUpdate),
            );
    }
}

pub fn simulate(
    mut query: Query<(Entity, &mut Ball, &Tether, &mut Transform)>,
    config: Res<SimConfig>,
    gravity: Res<Gravity>,
    grabbed: Res<Grabbed>,
    fixed_time: Res<FixedTime>,
) {
    let sub_steps = config.sub_steps.max(1);
    let sdt = fixed_time.period.as_secs_f32() / sub_steps as f32;
    for _ in 0..sub_steps {
        for (entity, mut ball, tether, mut trans) in query.iter_mut() {
            if grabbed.entity == Some(entity) {
                continue;
            }
            step_ball(&mut ball, tether, &mut trans, gravity.0, sdt);
        }
        let mut pairs = query.iter_combinations_mut();
        while let Some([(_, mut b1, _, mut t1), (_, mut b2, _, mut t2)]) = pairs.fetch_next() {
            handle_ball_ball_collision(&mut b1, &mut t1, &mut b2, &mut t2);
        }
        for (entity, mut ball, _, mut trans) in query.iter_mut() {
            if grabbed.entity == Some(entity) {
                continue;
            }
            handle_bounds_collision(&mut ball, &mut trans, &config);
        }
    }
    for (_, mut ball, tether, mut trans) in query.iter_mut() {
        recover_lost_ball(&mut ball, tether, &mut trans);
    }
}

/// One sub-step for one ball: gravity in, string forces, damped integrate.
pub fn step_ball(ball: &mut Ball, tether: &Tether, trans: &mut Transform, gravity: Vec3, dt: f32) {
    ball.begin_step(gravity, dt);
    tether.apply(ball, trans, dt);
    ball.end_step(trans, dt);
}

pub fn handle_ball_ball_collision(
    a: &mut Ball,
    trans_a: &mut Transform,
    b: &mut Ball,
    trans_b: &mut Transform,
) {
    // NaN compares false on every test below, so a lost ball would pass the
    // distance guard and smear non-finite state over its partner
    if !trans_a.translation.is_finite()
        || !trans_b.translation.is_finite()
        || !a.velocity.is_finite()
        || !b.velocity.is_finite()
    {
        return;
    }
    let mut dir = trans_b.translation - trans_a.translation;
    let d = dir.length();
    if d == 0.0 || d > a.radius + b.radius {
        return;
    }
    dir *= 1.0 / d;

    let corr = (a.radius + b.radius - d) / 2.0;
    trans_a.translation += dir * -corr;
    trans_b.translation += dir * corr;

    // the softer partner decides how lively the bounce is
    let restitution = a.restitution.min(b.restitution);
    let v1 = a.velocity.dot(dir);
    let v2 = b.velocity.dot(dir);
    let (m1, m2) = (a.mass, b.mass);
    let new_v1 = (m1 * v1 + m2 * v2 - m2 * (v1 - v2) * restitution) / (m1 + m2);
    let new_v2 = (m1 * v1 + m2 * v2 - m1 * (v2 - v1) * restitution) / (m1 + m2);
    a.velocity += dir * (new_v1 - v1);
    b.velocity += dir * (new_v2 - v2);

    // friction scrubs the slide across the contact and spins the pair
    let friction = a.friction.min(b.friction);
    if friction > 0.0 {
        let rel = b.velocity - a.velocity;
        let tangent = rel - dir * rel.dot(dir);
        let w1 = 1.0 / m1;
        let w2 = 1.0 / m2;
        a.velocity += tangent * (friction * w1 / (w1 + w2));
        b.velocity -= tangent * (friction * w2 / (w1 + w2));
        a.angular_velocity = a
            .angular_velocity
            .lerp(dir.cross(tangent) / a.radius, friction);
        b.angular_velocity = b
            .angular_velocity
            .lerp(dir.cross(tangent) / b.radius, friction);
    }
}

pub fn handle_bounds_collision(ball: &mut Ball, trans: &mut Transform, config: &SimConfig) {
    let floor = config.ground_height + ball.radius;
    if trans.translation.y < floor {
        trans.translation.y = floor;
        if ball.velocity.y < 0.0 {
            ball.velocity.y = -ball.velocity.y * ball.restitution;
        }
        scrub_contact(ball, Vec3::Y);
    }
    let limit = config.half_extent - ball.radius;
    if trans.translation.x < -limit {
        trans.translation.x = -limit;
        ball.velocity.x = ball.velocity.x.abs() * ball.restitution;
        scrub_contact(ball, Vec3::X);
    } else if trans.translation.x > limit {
        trans.translation.x = limit;
        ball.velocity.x = -ball.velocity.x.abs() * ball.restitution;
        scrub_contact(ball, Vec3::NEG_X);
    }
    if trans.translation.z < -limit {
        trans.translation.z = -limit;
        ball.velocity.z = ball.velocity.z.abs() * ball.restitution;
        scrub_contact(ball, Vec3::Z);
    } else if trans.translation.z > limit {
        trans.translation.z = limit;
        ball.velocity.z = -ball.velocity.z.abs() * ball.restitution;
        scrub_contact(ball, Vec3::NEG_Z);
    }
}

/// Contact friction scrubs the slide across the surface and rolls the ball.
/// The normal points from the surface into the ball.
fn scrub_contact(ball: &mut Ball, normal: Vec3) {
    let tangent = ball.velocity - normal * ball.velocity.dot(normal);
    ball.velocity -= tangent * ball.friction;
    ball.angular_velocity = ball
        .angular_velocity
        .lerp(normal.cross(tangent) / ball.radius, ball.friction);
}

/// A ball whose state stops being representable snaps back to its hang point
/// instead of vanishing from the scene.
pub fn recover_lost_ball(ball: &mut Ball, tether: &Tether, trans: &mut Transform) {
    if trans.translation.is_finite()
        && trans.rotation.is_finite()
        && ball.velocity.is_finite()
        && ball.angular_velocity.is_finite()
    {
        return;
    }
    warn!("ball state went non-finite, snapping back to rest");
    trans.translation = tether.hang_point();
    trans.rotation = Quat::IDENTITY;
    ball.velocity = Vec3::ZERO;
    ball.angular_velocity = Vec3::ZERO;
}
