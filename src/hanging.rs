use bevy::prelude::*;
use thiserror::Error;

use crate::{components::*, render::string_transform, resources::*, state::AppState};

pub struct HangingPlugin;

impl Plugin for HangingPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<LastBuilt>()
            .init_resource::<Gravity>()
            .add_state::<SettingsState>()
            .add_system(spawn_hanging_spheres.in_schedule(OnEnter(AppState::Playing)))
            .add_system(refresh_rail.in_schedule(OnEnter(AppState::Playing)))
            .add_system(watch_settings.in_set(OnUpdate(SettingsState::Idle)))
            .add_system(apply_settings.in_set(OnUpdate(SettingsState::Applying)));
    }
}

/// Settings edits funnel through here: `Idle` watches for a change, `Applying`
/// takes one snapshot and pushes it out, then drops back to `Idle`. The
/// simulation itself never reads the raw resource mid-edit.
#[derive(States, PartialEq, Eq, Debug, Clone, Hash, Default)]
pub enum SettingsState {
    #[default]
    Idle,
    Applying,
}

/// Clearance between neighbouring spheres hanging at rest.
pub const ANCHOR_MARGIN: f32 = 0.2;

#[derive(Error, Debug, PartialEq)]
pub enum LayoutError {
    #[error("{count} spheres of radius {radius} need more rail than {span} (room for {capacity})")]
    Overcrowded {
        count: u32,
        radius: f32,
        span: f32,
        capacity: u32,
    },
}

/// Evenly spaced anchor points centered on the rail. Zero spheres is a valid
/// scene; a rail too short for the request is an error, not a panic.
pub fn anchor_positions(
    count: u32,
    radius: f32,
    config: &SimConfig,
) -> Result<Vec<Vec3>, LayoutError> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let spacing = 2.0 * radius + ANCHOR_MARGIN;
    let width = (count - 1) as f32 * spacing;
    if width > config.anchor_span {
        return Err(LayoutError::Overcrowded {
            count,
            radius,
            span: config.anchor_span,
            capacity: (config.anchor_span / spacing) as u32 + 1,
        });
    }
    Ok((0..count)
        .map(|i| Vec3::new(i as f32 * spacing - width * 0.5, config.anchor_height, 0.0))
        .collect())
}

/// Marks the rail visual so a rebuild can restretch it.
#[derive(Component)]
pub struct Rail;

/// The rail is a unit box, so following a config edit is a transform write
/// rather than a fresh mesh.
pub fn rail_transform(config: &SimConfig) -> Transform {
    Transform::from_xyz(0.0, config.anchor_height, 0.0)
        .with_scale(Vec3::new(config.anchor_span + 1.0, 0.08, 0.08))
}

pub fn refresh_rail(config: Res<SimConfig>, mut rails: Query<&mut Transform, With<Rail>>) {
    for mut trans in rails.iter_mut() {
        *trans = rail_transform(&config);
    }
}

pub fn spawn_hanging_spheres(
    mut commands: Commands,
    settings: Res<Settings>,
    config: Res<SimConfig>,
    assets: Res<SceneAssets>,
    mut last_built: ResMut<LastBuilt>,
    existing: Query<(), With<Ball>>,
) {
    // unpausing re-enters Playing with the bodies still alive
    if !existing.is_empty() {
        return;
    }
    let s = settings.sanitized();
    last_built.0 = Some(StructuralKey::of(&s, config.ball_count));
    let anchors = match anchor_positions(config.ball_count, s.ball.radius, &config) {
        Ok(anchors) => anchors,
        Err(err) => {
            error!("cannot lay out the scene: {}", err);
            return;
        }
    };
    for (i, anchor) in anchors.iter().enumerate() {
        let hang = *anchor - Vec3::Y * s.string.length;
        let ball = commands
            .spawn((
                PbrBundle {
                    mesh: assets.ball_mesh.clone(),
                    material: assets.ball_material.clone(),
                    transform: Transform {
                        translation: hang,
                        scale: Vec3::splat(s.ball.radius),
                        ..default()
                    },
                    ..default()
                },
                Ball {
                    radius: s.ball.radius,
                    mass: s.physics.mass,
                    restitution: s.physics.restitution,
                    friction: s.physics.friction,
                    linear_damping: s.physics.linear_damping,
                    ..default()
                },
                Tether {
                    anchor: *anchor,
                    rest_length: s.string.length,
                    stiffness: s.physics.spring_strength,
                    damping: s.string.damping,
                },
                Name::new(format!("Ball {}", i)),
            ))
            .id();
        commands.spawn((
            PbrBundle {
                mesh: assets.string_mesh.clone(),
                material: assets.string_material.clone(),
                transform: string_transform(*anchor, hang, s.string.thickness),
                ..default()
            },
            StringOf(ball),
            Name::new(format!("String {}", i)),
        ));
    }
    if !anchors.is_empty() {
        info!("spawned {} hanging spheres", anchors.len());
    }
}

pub fn watch_settings(
    settings: Res<Settings>,
    config: Res<SimConfig>,
    mut settings_state: ResMut<NextState<SettingsState>>,
) {
    let settings_edited = settings.is_changed() && !settings.is_added();
    let config_edited = config.is_changed() && !config.is_added();
    if settings_edited || config_edited {
        settings_state.set(SettingsState::Applying);
    }
}

/// One snapshot of the settings goes out to the world. Dynamic fields land on
/// the live bodies without touching their motion; a structural change routes
/// through the reset state for a clean rebuild.
pub fn apply_settings(
    settings: Res<Settings>,
    config: Res<SimConfig>,
    last_built: Res<LastBuilt>,
    mut gravity: ResMut<Gravity>,
    mut balls: Query<(&mut Ball, &mut Tether)>,
    mut settings_state: ResMut<NextState<SettingsState>>,
    mut app_state: ResMut<NextState<AppState>>,
) {
    let s = settings.sanitized();
    gravity.0 = Vec3::new(0.0, s.physics.gravity, 0.0);
    for (mut ball, mut tether) in balls.iter_mut() {
        ball.mass = s.physics.mass;
        ball.restitution = s.physics.restitution;
        ball.friction = s.physics.friction;
        ball.linear_damping = s.physics.linear_damping;
        tether.stiffness = s.physics.spring_strength;
        tether.damping = s.string.damping;
    }
    let key = StructuralKey::of(&s, config.ball_count);
    if last_built.0 != Some(key) {
        info!("structural settings changed, rebuilding");
        app_state.set(AppState::Reset);
    }
    settings_state.set(SettingsState::Idle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors_spread_evenly_and_centered() {
        let config = SimConfig::default();
        let anchors = anchor_positions(3, 0.35, &config).unwrap();
        assert_eq!(anchors.len(), 3);
        let spacing = anchors[1].x - anchors[0].x;
        assert!((spacing - 0.9).abs() < 1e-6, "spacing is two radii plus margin");
        assert!((anchors[2].x - anchors[1].x - spacing).abs() < 1e-6);
        let center: f32 = anchors.iter().map(|a| a.x).sum();
        assert!(center.abs() < 1e-6, "row should be centered on the rail");
        assert!(anchors
            .iter()
            .all(|a| a.y == config.anchor_height && a.z == 0.0));
    }

    #[test]
    fn single_anchor_sits_at_the_middle() {
        let config = SimConfig::default();
        let anchors = anchor_positions(1, 0.8, &config).unwrap();
        assert_eq!(anchors, vec![Vec3::new(0.0, config.anchor_height, 0.0)]);
    }

    #[test]
    fn zero_spheres_is_a_valid_layout() {
        let config = SimConfig::default();
        assert_eq!(anchor_positions(0, 0.35, &config), Ok(Vec::new()));
    }

    #[test]
    fn rail_capacity_is_reported_when_exceeded() {
        let config = SimConfig::default();
        // default radius fits six across, seven tips over
        assert!(anchor_positions(6, 0.35, &config).is_ok());
        let err = anchor_positions(7, 0.35, &config).unwrap_err();
        match err {
            LayoutError::Overcrowded { count, capacity, .. } => {
                assert_eq!(count, 7);
                assert_eq!(capacity, 6);
            }
        }
        // fat spheres crowd out much sooner
        let err = anchor_positions(8, 0.8, &config).unwrap_err();
        match err {
            LayoutError::Overcrowded { capacity, .. } => assert_eq!(capacity, 3),
        }
    }

    fn test_app() -> App {
        let mut app = App::new();
        app.add_state::<AppState>()
            .add_state::<SettingsState>()
            .init_resource::<Settings>()
            .init_resource::<SimConfig>()
            .init_resource::<Gravity>()
            .init_resource::<LastBuilt>()
            .insert_resource(SceneAssets::placeholder())
            .add_system(spawn_hanging_spheres.in_schedule(OnEnter(AppState::Playing)))
            .add_system(refresh_rail.in_schedule(OnEnter(AppState::Playing)))
            .add_system(watch_settings.in_set(OnUpdate(SettingsState::Idle)))
            .add_system(apply_settings.in_set(OnUpdate(SettingsState::Applying)))
            .add_system(crate::state::reset.in_set(OnUpdate(AppState::Reset)));
        app
    }

    fn ball_count(app: &mut App) -> usize {
        let mut q = app.world.query::<&Ball>();
        q.iter(&app.world).count()
    }

    fn ball_entities(app: &mut App) -> Vec<Entity> {
        let mut q = app.world.query_filtered::<Entity, With<Ball>>();
        let mut entities: Vec<Entity> = q.iter(&app.world).collect();
        entities.sort();
        entities
    }

    fn ball_positions(app: &mut App) -> Vec<(Entity, Vec3)> {
        let mut q = app.world.query::<(Entity, &Transform, &Ball)>();
        let mut positions: Vec<(Entity, Vec3)> = q
            .iter(&app.world)
            .map(|(e, t, _)| (e, t.translation))
            .collect();
        positions.sort_by_key(|(e, _)| *e);
        positions
    }

    #[test]
    fn first_update_builds_the_default_scene() {
        let mut app = test_app();
        app.update();
        assert_eq!(ball_count(&mut app), 3);
        let mut strings = app.world.query::<&StringOf>();
        assert_eq!(strings.iter(&app.world).count(), 3, "one string per ball");
        assert_eq!(
            app.world.resource::<LastBuilt>().0,
            Some(StructuralKey::of(&Settings::default(), 3))
        );
    }

    #[test]
    fn an_empty_scene_is_legal() {
        let mut app = test_app();
        app.world.resource_mut::<SimConfig>().ball_count = 0;
        app.update();
        assert_eq!(ball_count(&mut app), 0);
    }

    #[test]
    fn radius_change_rebuilds_with_fresh_bodies() {
        let mut app = test_app();
        app.update();
        let before = ball_entities(&mut app);
        app.world.resource_mut::<Settings>().ball.radius = 0.5;
        for _ in 0..6 {
            app.update();
        }
        let after = ball_entities(&mut app);
        assert_eq!(after.len(), 3);
        assert!(
            before.iter().all(|e| !after.contains(e)),
            "a rebuild replaces the bodies"
        );
        let mut q = app.world.query::<(&Ball, &Transform)>();
        for (ball, trans) in q.iter(&app.world) {
            assert_eq!(ball.radius, 0.5);
            assert_eq!(trans.scale, Vec3::splat(0.5));
        }
    }

    #[test]
    fn string_length_change_rebuilds() {
        let mut app = test_app();
        app.update();
        let before = ball_entities(&mut app);
        app.world.resource_mut::<Settings>().string.length = 4.0;
        for _ in 0..6 {
            app.update();
        }
        let after = ball_entities(&mut app);
        assert!(
            before.iter().all(|e| !after.contains(e)),
            "a longer string means a rebuilt unit"
        );
        let mut q = app.world.query::<(&Tether, &Transform)>();
        for (tether, trans) in q.iter(&app.world) {
            assert_eq!(tether.rest_length, 4.0);
            assert_eq!(trans.translation.y, tether.anchor.y - 4.0);
        }
    }

    #[test]
    fn count_change_rebuilds_to_the_new_count() {
        let mut app = test_app();
        app.update();
        assert_eq!(ball_count(&mut app), 3);
        app.world.resource_mut::<SimConfig>().ball_count = 5;
        for _ in 0..6 {
            app.update();
        }
        assert_eq!(ball_count(&mut app), 5);
        let mut strings = app.world.query::<&StringOf>();
        assert_eq!(strings.iter(&app.world).count(), 5);
    }

    #[test]
    fn cosmetic_change_leaves_bodies_untouched() {
        let mut app = test_app();
        app.update();
        {
            let mut q = app.world.query::<&mut Ball>();
            for mut ball in q.iter_mut(&mut app.world) {
                ball.velocity = Vec3::new(0.3, 0.0, 0.1);
            }
        }
        let entities = ball_entities(&mut app);
        let positions = ball_positions(&mut app);
        app.world.resource_mut::<Settings>().ball.color = Color::rgb(0.9, 0.2, 0.3);
        for _ in 0..6 {
            app.update();
        }
        assert_eq!(ball_entities(&mut app), entities, "no rebuild for a color edit");
        assert_eq!(ball_positions(&mut app), positions);
        let mut q = app.world.query::<&Ball>();
        for ball in q.iter(&app.world) {
            assert_eq!(ball.velocity, Vec3::new(0.3, 0.0, 0.1));
        }
    }

    #[test]
    fn physics_change_applies_in_place() {
        let mut app = test_app();
        app.update();
        let entities = ball_entities(&mut app);
        {
            let mut settings = app.world.resource_mut::<Settings>();
            settings.physics.mass = 2.0;
            settings.physics.spring_strength = 1200.0;
            settings.physics.gravity = -30.0;
        }
        for _ in 0..6 {
            app.update();
        }
        assert_eq!(ball_entities(&mut app), entities, "dynamic edits keep the bodies");
        let mut q = app.world.query::<(&Ball, &Tether)>();
        for (ball, tether) in q.iter(&app.world) {
            assert_eq!(ball.mass, 2.0);
            assert_eq!(tether.stiffness, 1200.0);
        }
        assert_eq!(app.world.resource::<Gravity>().0, Vec3::new(0.0, -30.0, 0.0));
    }

    #[test]
    fn rail_restretches_when_a_reset_follows_a_config_edit() {
        let mut app = test_app();
        app.world
            .spawn((rail_transform(&SimConfig::default()), Rail, crate::state::Keep));
        app.update();
        {
            let mut config = app.world.resource_mut::<SimConfig>();
            config.anchor_span = 7.0;
            config.anchor_height = 3.0;
        }
        app.world
            .resource_mut::<NextState<AppState>>()
            .set(AppState::Reset);
        for _ in 0..6 {
            app.update();
        }
        let mut q = app.world.query_filtered::<&Transform, With<Rail>>();
        let trans = *q.single(&app.world);
        assert_eq!(trans.scale.x, 8.0, "the rail stretches over the widened span");
        assert_eq!(trans.translation.y, 3.0, "the rail sits at the new anchor height");
        assert_eq!(trans, rail_transform(app.world.resource::<SimConfig>()));
    }

    #[test]
    fn overcrowded_settings_empty_the_scene_and_recover() {
        let mut app = test_app();
        app.update();
        assert_eq!(ball_count(&mut app), 3);
        app.world.resource_mut::<Settings>().ball.radius = 0.8;
        app.world.resource_mut::<SimConfig>().ball_count = 8;
        for _ in 0..6 {
            app.update();
        }
        assert_eq!(ball_count(&mut app), 0, "impossible layout empties the scene");
        app.world.resource_mut::<SimConfig>().ball_count = 3;
        for _ in 0..6 {
            app.update();
        }
        assert_eq!(ball_count(&mut app), 3, "a fitting request builds again");
    }
}
