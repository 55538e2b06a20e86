mod components;
mod grabber;
mod hanging;
mod intersect;
mod physics;
mod render;
mod resources;
mod state;

use components::*;
use grabber::*;
use hanging::*;
use physics::*;
use render::*;
use resources::*;
use state::*;

use bevy::prelude::*;
use bevy_inspector_egui::quick::{ResourceInspectorPlugin, WorldInspectorPlugin};
use bevy_prototype_debug_lines::DebugLinesPlugin;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins)
        .add_plugin(WorldInspectorPlugin::new())
        .insert_resource(ClearColor(Color::rgb(0.94, 0.94, 0.93)))
        .init_resource::<Settings>()
        .init_resource::<SimConfig>()
        .init_resource::<SceneAssets>()
        .add_plugin(ResourceInspectorPlugin::<Settings>::default())
        .add_plugin(ResourceInspectorPlugin::<SimConfig>::default())
        .add_plugin(DebugLinesPlugin::default())
        .add_plugin(StatePlugin)
        .add_plugin(HangingPlugin)
        .add_plugin(PhysicsPlugin)
        .add_plugin(VisualSyncPlugin)
        .add_plugin(GrabberPlugin)
        .add_startup_system(setup)
        .add_system(preset_listen)
        .add_system(nudge_listen.in_set(OnUpdate(AppState::Playing)))
        .add_system(bevy::window::close_on_esc)
        .register_type::<Settings>()
        .register_type::<BallSettings>()
        .register_type::<PhysicsSettings>()
        .register_type::<StringSettings>()
        .register_type::<SimConfig>()
        .register_type::<Ball>()
        .register_type::<Tether>()
        .run();
}

fn setup(
    mut commands: Commands,
    config: Res<SimConfig>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    commands.spawn((
        Camera3dBundle {
            transform: Transform::from_xyz(0., 0., 7.),
            ..Default::default()
        },
        SceneCamera,
        Keep,
    ));

    commands.insert_resource(AmbientLight {
        color: Color::WHITE,
        brightness: 0.3,
    });

    // light
    commands.spawn((
        DirectionalLightBundle {
            transform: Transform::from_xyz(5.0, 8.0, 5.0).looking_at(Vec3::ZERO, Vec3::Y),
            directional_light: DirectionalLight {
                shadows_enabled: true,
                ..default()
            },
            ..default()
        },
        Keep,
    ));

    // ground
    commands.spawn((
        PbrBundle {
            mesh: meshes.add(Mesh::from(shape::Plane {
                size: config.half_extent * 2.0,
                ..default()
            })),
            material: materials.add(StandardMaterial {
                base_color: Color::rgb(0.176, 0.353, 0.153),
                perceptual_roughness: 0.95,
                ..default()
            }),
            transform: Transform::from_xyz(0.0, config.ground_height, 0.0),
            ..default()
        },
        Name::new("Ground"),
        Keep,
    ));

    // rail the strings hang from, restretched on every rebuild
    commands.spawn((
        PbrBundle {
            mesh: meshes.add(Mesh::from(shape::Box::new(1.0, 1.0, 1.0))),
            material: materials.add(StandardMaterial {
                base_color: Color::rgb(0.1, 0.1, 0.1),
                metallic: 0.8,
                perceptual_roughness: 0.3,
                ..default()
            }),
            transform: rail_transform(&config),
            ..default()
        },
        Rail,
        Name::new("Rail"),
        Keep,
    ));

    info!("Press 'R' to reset");
    info!("Press 'Space' to pause");
    info!("Press 'F1' to toggle debug lines");
    info!("Press '1'-'4' for material presets");
    info!("Press 'N' to nudge the spheres");
    info!("Drag a sphere with the left mouse button");
}

fn preset_listen(keys: Res<Input<KeyCode>>, mut settings: ResMut<Settings>) {
    let preset = if keys.just_pressed(KeyCode::Key1) {
        Preset::CottonBalls
    } else if keys.just_pressed(KeyCode::Key2) {
        Preset::ChromeSpheres
    } else if keys.just_pressed(KeyCode::Key3) {
        Preset::RubberBalls
    } else if keys.just_pressed(KeyCode::Key4) {
        Preset::BoxingGloves
    } else {
        return;
    };
    preset.apply(&mut settings);
    info!("applied preset: {}", preset.name());
}

fn nudge_listen(keys: Res<Input<KeyCode>>, mut balls: Query<&mut Ball>) {
    if !keys.just_pressed(KeyCode::N) {
        return;
    }
    for mut ball in balls.iter_mut() {
        let kick = Vec3::new(
            fastrand::f32() * 2.0 - 1.0,
            fastrand::f32() * 0.5,
            fastrand::f32() * 2.0 - 1.0,
        );
        ball.velocity += kick * 4.0;
    }
}
