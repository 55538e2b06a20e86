use bevy::prelude::*;

use crate::{components::Ball, intersect::ray_sphere_intersect};

/// The fixed viewing camera, also the source of pick rays.
#[derive(Component)]
pub struct SceneCamera;

pub struct GrabberPlugin;

impl Plugin for GrabberPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Grabbed>()
            .add_state::<GrabState>()
            .add_system(handle_grab_none.in_set(OnUpdate(GrabState::None)))
            .add_system(handle_grab_start.in_schedule(OnEnter(GrabState::Moving)))
            .add_system(handle_grab_move.in_set(OnUpdate(GrabState::Moving)))
            .add_system(handle_grab_end.in_schedule(OnExit(GrabState::Moving)));
    }
}

/// A held ball is kinematic: the cursor drives it and the integrator skips it,
/// so everything else still reacts to where it gets shoved.
#[derive(Resource)]
pub struct Grabbed {
    pub entity: Option<Entity>,
    pub mouse_grab: MouseButton,
    pub distance: f32,
    pub time: f32,
    pub prev_pos: Vec3,
    pub offset: Vec3,
}

impl Default for Grabbed {
    fn default() -> Self {
        Self {
            entity: None,
            mouse_grab: MouseButton::Left,
            distance: 0.,
            time: 0.,
            prev_pos: Vec3::ZERO,
            offset: Vec3::ZERO,
        }
    }
}

#[derive(States, PartialEq, Eq, Debug, Clone, Hash, Default)]
pub enum GrabState {
    #[default]
    None,
    Moving,
}

fn handle_grab_none(
    grabbed: Res<Grabbed>,
    mouse_input: Res<Input<MouseButton>>,
    mut grab_next_state: ResMut<NextState<GrabState>>,
) {
    if mouse_input.just_pressed(grabbed.mouse_grab) {
        grab_next_state.set(GrabState::Moving);
    }
}

fn handle_grab_start(
    mut grabbed: ResMut<Grabbed>,
    window_query: Query<&Window>,
    camera_query: Query<(&GlobalTransform, &Camera), With<SceneCamera>>,
    mut grab_next_state: ResMut<NextState<GrabState>>,
    mut balls: Query<(Entity, &Transform, &mut Ball)>,
) {
    grabbed.time = 0.;

    let window = window_query.single();
    let (camera_trans, camera) = camera_query.single();
    if let Some(cursor_pos) = window.cursor_position() {
        if let Some(ray) = camera.viewport_to_world(camera_trans, cursor_pos) {
            let mut closest = f32::MAX;
            let mut closest_entity = None;
            let mut closest_offset = Vec3::ZERO;
            let mut closest_pos = Vec3::ZERO;
            for (e, trans, ball) in balls.iter() {
                if let Some((t0, t1)) =
                    ray_sphere_intersect(ray.origin, ray.direction, trans.translation, ball.radius)
                {
                    let t = t0.min(t1).max(0.0);
                    if t < closest {
                        closest_entity = Some(e);
                        closest = t;
                        closest_pos = ray.origin + ray.direction * closest;
                        closest_offset = trans.translation - closest_pos;
                    }
                }
            }

            if let Some(entity) = closest_entity {
                grabbed.entity = Some(entity);
                grabbed.distance = closest;
                grabbed.prev_pos = closest_pos;
                grabbed.offset = closest_offset;
                if let Ok((_, _, mut ball)) = balls.get_mut(entity) {
                    ball.velocity = Vec3::ZERO;
                    ball.angular_velocity = Vec3::ZERO;
                }
            } else {
                grabbed.entity = None;
                grab_next_state.set(GrabState::None);
            }
        } else {
            grab_next_state.set(GrabState::None);
        }
    } else {
        grab_next_state.set(GrabState::None);
    }
}

fn handle_grab_move(
    mouse_input: Res<Input<MouseButton>>,
    mut grabbed: ResMut<Grabbed>,
    mut grab_next_state: ResMut<NextState<GrabState>>,
    time: Res<Time>,
    mut balls: Query<(&mut Transform, &mut Ball)>,
    window_query: Query<&Window>,
    camera_query: Query<(&GlobalTransform, &Camera), With<SceneCamera>>,
) {
    if mouse_input.just_released(grabbed.mouse_grab) || grabbed.entity.is_none() {
        grab_next_state.set(GrabState::None);
        return;
    }

    grabbed.time += time.delta_seconds();

    let window = window_query.single();
    let (camera_trans, camera) = camera_query.single();
    if let Some(cursor_pos) = window.cursor_position() {
        if let Some(ray) = camera.viewport_to_world(camera_trans, cursor_pos) {
            if let Ok((mut trans, mut ball)) = balls.get_mut(grabbed.entity.unwrap()) {
                let pos = ray.origin + ray.direction * grabbed.distance;
                // cursor speed becomes the throw velocity on release
                ball.velocity = if grabbed.time > 0. {
                    (pos - grabbed.prev_pos) / grabbed.time
                } else {
                    Vec3::ZERO
                };
                grabbed.prev_pos = pos;
                grabbed.time = 0.0;
                trans.translation = pos + grabbed.offset;
            } else {
                // the ball was rebuilt away mid drag
                grabbed.entity = None;
            }
        }
    }
}

fn handle_grab_end(mut grabbed: ResMut<Grabbed>) {
    grabbed.entity = None;
}
