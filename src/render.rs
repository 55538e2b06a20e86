use bevy::{prelude::*, transform::TransformSystem};
use bevy_prototype_debug_lines::DebugLines;

use crate::{components::*, hanging::SettingsState, resources::*, state::DebugState};

pub struct VisualSyncPlugin;

impl Plugin for VisualSyncPlugin {
    fn build(&self, app: &mut App) {
        app.add_system(apply_materials.in_set(OnUpdate(SettingsState::Applying)))
            // after the Update writers like the grabber, before bevy builds
            // the GlobalTransform the renderer reads
            .add_system(
                sync_strings
                    .in_base_set(CoreSet::PostUpdate)
                    .before(TransformSystem::TransformPropagate),
            )
            .add_system(debug_draw.in_set(OnUpdate(DebugState::On)));
    }
}

/// Pose for a unit cylinder so it spans anchor to ball: midpoint translation,
/// Y axis rotated onto the span, length and thickness in the scale.
pub fn string_transform(anchor: Vec3, ball_pos: Vec3, thickness: f32) -> Transform {
    let span = ball_pos - anchor;
    let len = span.length();
    let rotation = if len > 1e-6 {
        Quat::from_rotation_arc(Vec3::Y, span / len)
    } else {
        Quat::IDENTITY
    };
    Transform {
        translation: anchor + span * 0.5,
        rotation,
        scale: Vec3::new(thickness, len, thickness),
    }
}

pub fn sync_strings(
    settings: Res<Settings>,
    balls: Query<(&Transform, &Tether), With<Ball>>,
    mut strings: Query<(&mut Transform, &StringOf), Without<Ball>>,
) {
    let thickness = settings.sanitized().string.thickness;
    for (mut trans, string_of) in strings.iter_mut() {
        if let Ok((ball_trans, tether)) = balls.get(string_of.0) {
            *trans = string_transform(tether.anchor, ball_trans.translation, thickness);
        }
    }
}

/// Every sphere shares one material and every string another, so pushing a
/// settings snapshot is two asset writes, not a per-entity walk.
pub fn apply_materials(
    settings: Res<Settings>,
    assets: Res<SceneAssets>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let s = settings.sanitized();
    if let Some(material) = materials.get_mut(&assets.ball_material) {
        *material = s.ball_material();
    }
    if let Some(material) = materials.get_mut(&assets.string_material) {
        *material = s.string_material();
    }
}

pub fn debug_draw(mut lines: ResMut<DebugLines>, query: Query<(&Transform, &Ball, &Tether)>) {
    for (trans, ball, tether) in query.iter() {
        let pos = trans.translation;
        let taut = pos.distance(tether.anchor) >= tether.rest_length;
        let color = if taut { Color::YELLOW } else { Color::GRAY };
        lines.line_colored(tether.anchor, pos, 0.0, color);
        lines.line_colored(
            tether.anchor,
            tether.hang_point(),
            0.0,
            Color::rgba(1.0, 1.0, 1.0, 0.25),
        );
        lines.line_colored(pos, pos + ball.velocity * 0.25, 0.0, Color::GREEN);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_stretches_between_anchor_and_ball() {
        let anchor = Vec3::new(1.0, 2.0, 0.0);
        let ball_pos = Vec3::new(2.0, -1.0, 0.5);
        let t = string_transform(anchor, ball_pos, 0.02);
        assert!((t.translation - (anchor + ball_pos) / 2.0).length() < 1e-6);
        let span = ball_pos - anchor;
        assert!((t.scale.y - span.length()).abs() < 1e-5);
        assert_eq!(t.scale.x, 0.02);
        assert_eq!(t.scale.z, 0.02);
        let axis = t.rotation * Vec3::Y;
        assert!(
            (axis - span.normalize()).length() < 1e-5,
            "cylinder axis should track the string"
        );
    }

    #[test]
    fn degenerate_string_keeps_identity_rotation() {
        let t = string_transform(Vec3::ZERO, Vec3::ZERO, 0.02);
        assert_eq!(t.rotation, Quat::IDENTITY);
        assert_eq!(t.scale.y, 0.0);
    }

    #[test]
    fn strings_keep_up_with_a_ball_moved_this_frame() {
        fn shove(mut balls: Query<&mut Transform, With<Ball>>) {
            for mut trans in balls.iter_mut() {
                trans.translation += Vec3::new(0.4, 0.0, 0.1);
            }
        }
        let mut app = App::new();
        app.add_state::<SettingsState>()
            .add_state::<DebugState>()
            .init_resource::<Settings>()
            .add_plugin(VisualSyncPlugin)
            .add_system(shove);
        let anchor = Vec3::new(0.0, 2.0, 0.0);
        let ball = app
            .world
            .spawn((
                Transform::from_xyz(0.0, -0.5, 0.0),
                Ball::default(),
                Tether {
                    anchor,
                    rest_length: 2.5,
                    stiffness: 800.0,
                    damping: 0.92,
                },
            ))
            .id();
        let string = app.world.spawn((Transform::default(), StringOf(ball))).id();
        for _ in 0..2 {
            app.update();
            let ball_pos = app.world.get::<Transform>(ball).unwrap().translation;
            let string_trans = *app.world.get::<Transform>(string).unwrap();
            assert_eq!(
                string_trans,
                string_transform(anchor, ball_pos, 0.018),
                "the string should track the ball within the same frame"
            );
        }
    }
}
