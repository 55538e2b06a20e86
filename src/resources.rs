use bevy::prelude::*;
use bevy_inspector_egui::{prelude::ReflectInspectorOptions, InspectorOptions};

/// Live-tunable scene settings, grouped the way the tuning panel shows them.
///
/// The inspector edits this resource directly. Readers never consume it raw:
/// they go through [`Settings::sanitized`] so an out-of-range or non-finite
/// edit can never reach the simulation.
#[derive(Reflect, Resource, Clone, InspectorOptions)]
#[reflect(Resource, InspectorOptions)]
pub struct Settings {
    pub ball: BallSettings,
    pub physics: PhysicsSettings,
    pub string: StringSettings,
}

#[derive(Reflect, Clone, InspectorOptions)]
#[reflect(InspectorOptions)]
pub struct BallSettings {
    pub color: Color,
    #[inspector(min = 0.0, max = 1.0)]
    pub metalness: f32,
    #[inspector(min = 0.0, max = 1.0)]
    pub roughness: f32,
    #[inspector(min = 0.0, max = 2.0)]
    pub env_map_intensity: f32,
    #[inspector(min = 0.1, max = 0.8)]
    pub radius: f32,
}

#[derive(Reflect, Clone, InspectorOptions)]
#[reflect(InspectorOptions)]
pub struct PhysicsSettings {
    #[inspector(min = 0.1, max = 5.0)]
    pub mass: f32,
    #[inspector(min = 0.0, max = 1.0)]
    pub restitution: f32,
    #[inspector(min = 0.0, max = 1.0)]
    pub friction: f32,
    #[inspector(min = 0.0, max = 2.0)]
    pub linear_damping: f32,
    #[inspector(min = -100.0, max = -10.0)]
    pub gravity: f32,
    #[inspector(min = 100.0, max = 2000.0)]
    pub spring_strength: f32,
}

#[derive(Reflect, Clone, InspectorOptions)]
#[reflect(InspectorOptions)]
pub struct StringSettings {
    #[inspector(min = 1.0, max = 5.0)]
    pub length: f32,
    #[inspector(min = 0.005, max = 0.05)]
    pub thickness: f32,
    pub color: Color,
    #[inspector(min = 0.5, max = 0.99)]
    pub damping: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ball: BallSettings {
                color: Color::rgb(0.961, 0.961, 0.961),
                metalness: 0.0,
                roughness: 1.0,
                env_map_intensity: 0.3,
                radius: 0.35,
            },
            physics: PhysicsSettings {
                mass: 0.8,
                restitution: 0.2,
                friction: 0.3,
                linear_damping: 0.8,
                gravity: -60.0,
                spring_strength: 800.0,
            },
            string: StringSettings {
                length: 2.5,
                thickness: 0.018,
                color: Color::rgb(0.910, 0.894, 0.863),
                damping: 0.92,
            },
        }
    }
}

fn finite_clamp(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

impl Settings {
    /// A copy with every numeric field forced back into its documented range.
    /// The resource itself is left exactly as the user set it.
    pub fn sanitized(&self) -> Settings {
        let d = Settings::default();
        let mut s = self.clone();
        s.ball.metalness = finite_clamp(s.ball.metalness, 0.0, 1.0, d.ball.metalness);
        s.ball.roughness = finite_clamp(s.ball.roughness, 0.0, 1.0, d.ball.roughness);
        s.ball.env_map_intensity =
            finite_clamp(s.ball.env_map_intensity, 0.0, 2.0, d.ball.env_map_intensity);
        s.ball.radius = finite_clamp(s.ball.radius, 0.1, 0.8, d.ball.radius);
        s.physics.mass = finite_clamp(s.physics.mass, 0.1, 5.0, d.physics.mass);
        s.physics.restitution = finite_clamp(s.physics.restitution, 0.0, 1.0, d.physics.restitution);
        s.physics.friction = finite_clamp(s.physics.friction, 0.0, 1.0, d.physics.friction);
        s.physics.linear_damping =
            finite_clamp(s.physics.linear_damping, 0.0, 2.0, d.physics.linear_damping);
        s.physics.gravity = finite_clamp(s.physics.gravity, -100.0, -10.0, d.physics.gravity);
        s.physics.spring_strength =
            finite_clamp(s.physics.spring_strength, 100.0, 2000.0, d.physics.spring_strength);
        s.string.length = finite_clamp(s.string.length, 1.0, 5.0, d.string.length);
        s.string.thickness = finite_clamp(s.string.thickness, 0.005, 0.05, d.string.thickness);
        s.string.damping = finite_clamp(s.string.damping, 0.5, 0.99, d.string.damping);
        s
    }

    pub fn ball_material(&self) -> StandardMaterial {
        StandardMaterial {
            base_color: self.ball.color,
            metallic: self.ball.metalness,
            perceptual_roughness: self.ball.roughness,
            // no environment map is loaded, reflectance is the nearest knob
            reflectance: (self.ball.env_map_intensity * 0.5).clamp(0.0, 1.0),
            ..default()
        }
    }

    pub fn string_material(&self) -> StandardMaterial {
        StandardMaterial {
            base_color: self.string.color,
            perceptual_roughness: 0.9,
            ..default()
        }
    }
}

/// Scene knobs owned by the embedding app rather than the tuning panel.
#[derive(Reflect, Resource, InspectorOptions)]
#[reflect(Resource, InspectorOptions)]
pub struct SimConfig {
    #[inspector(min = 0, max = 8)]
    pub ball_count: u32,
    #[inspector(min = 1, max = 32)]
    pub sub_steps: u32,
    pub anchor_height: f32,
    pub anchor_span: f32,
    pub ground_height: f32,
    pub half_extent: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ball_count: 3,
            sub_steps: 8,
            anchor_height: 2.0,
            anchor_span: 4.8,
            ground_height: -2.0,
            half_extent: 6.0,
        }
    }
}

/// World gravity vector, refreshed whenever a settings snapshot is applied.
#[derive(Resource, Debug)]
pub struct Gravity(pub Vec3);

impl Default for Gravity {
    fn default() -> Self {
        Self(Vec3::new(0.0, Settings::default().physics.gravity, 0.0))
    }
}

/// The parameters that force a rebuild when they change. Everything else is
/// applied to live bodies in place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StructuralKey {
    pub count: u32,
    pub radius: f32,
    pub length: f32,
}

impl StructuralKey {
    pub fn of(settings: &Settings, count: u32) -> Self {
        Self {
            count,
            radius: settings.ball.radius,
            length: settings.string.length,
        }
    }
}

/// Key of the last build, `None` before the first spawn.
#[derive(Resource, Default)]
pub struct LastBuilt(pub Option<StructuralKey>);

/// Shared meshes and materials. Meshes are unit sized and scaled per entity,
/// so radius and thickness changes never touch mesh data; material edits go
/// through the two shared handles and reach every sphere and string at once.
#[derive(Resource)]
pub struct SceneAssets {
    pub ball_mesh: Handle<Mesh>,
    pub string_mesh: Handle<Mesh>,
    pub ball_material: Handle<StandardMaterial>,
    pub string_material: Handle<StandardMaterial>,
}

impl FromWorld for SceneAssets {
    fn from_world(world: &mut World) -> Self {
        let settings = world.resource::<Settings>().sanitized();
        let mut meshes = world.resource_mut::<Assets<Mesh>>();
        let ball_mesh = meshes.add(Mesh::from(shape::UVSphere {
            radius: 1.0,
            sectors: 32,
            stacks: 18,
        }));
        let string_mesh = meshes.add(Mesh::from(shape::Cylinder {
            radius: 1.0,
            height: 1.0,
            ..default()
        }));
        let mut materials = world.resource_mut::<Assets<StandardMaterial>>();
        let ball_material = materials.add(settings.ball_material());
        let string_material = materials.add(settings.string_material());
        Self {
            ball_mesh,
            string_mesh,
            ball_material,
            string_material,
        }
    }
}

#[cfg(test)]
impl SceneAssets {
    pub fn placeholder() -> Self {
        Self {
            ball_mesh: Handle::default(),
            string_mesh: Handle::default(),
            ball_material: Handle::default(),
            string_material: Handle::default(),
        }
    }
}

/// Named material looks. Applying one is a plain multi-field settings edit,
/// nothing downstream can tell it apart from the same fields being dragged
/// by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    CottonBalls,
    ChromeSpheres,
    RubberBalls,
    BoxingGloves,
}

impl Preset {
    pub fn name(&self) -> &'static str {
        match self {
            Preset::CottonBalls => "Cotton Balls",
            Preset::ChromeSpheres => "Chrome Spheres",
            Preset::RubberBalls => "Rubber Balls",
            Preset::BoxingGloves => "Boxing Gloves",
        }
    }

    pub fn apply(&self, settings: &mut Settings) {
        let (color, metalness, roughness, env, mass, restitution, damping, string_color) =
            match self {
                Preset::CottonBalls => (
                    Color::rgb(0.961, 0.961, 0.961),
                    0.0,
                    1.0,
                    0.3,
                    0.8,
                    0.2,
                    0.8,
                    Color::rgb(0.910, 0.894, 0.863),
                ),
                Preset::ChromeSpheres => (
                    Color::rgb(0.753, 0.753, 0.753),
                    0.95,
                    0.05,
                    1.5,
                    2.0,
                    0.3,
                    0.6,
                    Color::rgb(0.2, 0.2, 0.2),
                ),
                Preset::RubberBalls => (
                    Color::rgb(0.902, 0.224, 0.275),
                    0.0,
                    0.8,
                    0.2,
                    1.2,
                    0.5,
                    0.5,
                    Color::rgb(0.102, 0.102, 0.102),
                ),
                Preset::BoxingGloves => (
                    Color::rgb(0.545, 0.0, 0.0),
                    0.1,
                    0.6,
                    0.4,
                    3.0,
                    0.1,
                    1.0,
                    Color::rgb(0.831, 0.647, 0.455),
                ),
            };
        settings.ball.color = color;
        settings.ball.metalness = metalness;
        settings.ball.roughness = roughness;
        settings.ball.env_map_intensity = env;
        settings.physics.mass = mass;
        settings.physics.restitution = restitution;
        settings.physics.linear_damping = damping;
        settings.string.color = string_color;
    }
}
