use glam::{Quat, Vec3};
use mirrorfloor_common::Transform;

/// Mesh a drawable is rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshKind {
    /// Unit cube, scaled into a pillar.
    Pillar,
    /// Unit sphere.
    Orb,
    /// Unit quad in the XY plane facing +Z; drawn with the reflector material.
    Floor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawableId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Drawable {
    pub mesh: MeshKind,
    pub transform: Transform,
    pub color: [f32; 4],
    pub visible: bool,
}

/// Flat list of drawables. Ids stay valid for the lifetime of the scene.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    drawables: Vec<Drawable>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, drawable: Drawable) -> DrawableId {
        self.drawables.push(drawable);
        DrawableId(self.drawables.len() - 1)
    }

    pub fn get(&self, id: DrawableId) -> Option<&Drawable> {
        self.drawables.get(id.0)
    }

    pub fn get_mut(&mut self, id: DrawableId) -> Option<&mut Drawable> {
        self.drawables.get_mut(id.0)
    }

    /// Returns false if the id is unknown.
    pub fn set_visible(&mut self, id: DrawableId, visible: bool) -> bool {
        match self.drawables.get_mut(id.0) {
            Some(d) => {
                d.visible = visible;
                true
            }
            None => false,
        }
    }

    pub fn is_visible(&self, id: DrawableId) -> bool {
        self.get(id).is_some_and(|d| d.visible)
    }

    pub fn visible(&self) -> impl Iterator<Item = &Drawable> {
        self.drawables.iter().filter(|d| d.visible)
    }

    pub fn len(&self) -> usize {
        self.drawables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drawables.is_empty()
    }
}

const TOTEM_COLOR: [f32; 4] = [0.78, 0.8, 0.85, 1.0];
const FLOOR_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// A pillar with an orb circling it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Totem {
    pub origin: Vec3,
    pub phase: f32,
    pub pillar: DrawableId,
    pub orb: DrawableId,
}

impl Totem {
    pub const ORB_RADIUS: f32 = 0.2;
    pub const ORBIT_RADIUS: f32 = 1.4;

    pub fn spawn(scene: &mut Scene, origin: Vec3, phase: f32) -> Self {
        let pillar = scene.add(Drawable {
            mesh: MeshKind::Pillar,
            transform: Transform {
                position: origin,
                scale: Vec3::new(1.0, 6.0, 1.0),
                ..Transform::default()
            },
            color: TOTEM_COLOR,
            visible: true,
        });
        let orb = scene.add(Drawable {
            mesh: MeshKind::Orb,
            transform: Transform {
                position: origin + Self::orb_offset(phase, 0.0),
                scale: Vec3::splat(Self::ORB_RADIUS),
                ..Transform::default()
            },
            color: TOTEM_COLOR,
            visible: true,
        });
        Self {
            origin,
            phase,
            pillar,
            orb,
        }
    }

    /// Orb position relative to the pillar at `time` seconds.
    pub fn orb_offset(phase: f32, time: f32) -> Vec3 {
        let slow = (phase + time / 4.0).sin();
        let fast = phase + time * 2.0;
        Vec3::new(
            Self::ORBIT_RADIUS * fast.sin(),
            1.0 + slow,
            Self::ORBIT_RADIUS * fast.cos(),
        )
    }

    pub fn animate(&self, scene: &mut Scene, time: f32) {
        if let Some(orb) = scene.get_mut(self.orb) {
            orb.transform.position = self.origin + Self::orb_offset(self.phase, time);
        }
    }
}

/// The reference layout: three totems above a wide reflective floor.
#[derive(Debug, Clone)]
pub struct DemoScene {
    pub scene: Scene,
    pub totems: Vec<Totem>,
    pub floor: DrawableId,
}

impl DemoScene {
    pub const GROUP_OFFSET: Vec3 = Vec3::new(0.0, 0.0, -5.0);
    pub const FLOOR_HEIGHT: f32 = -1.5;
    pub const FLOOR_SIZE: f32 = 100.0;

    pub fn new() -> Self {
        let group = Transform::from_position(Self::GROUP_OFFSET);
        let mut scene = Scene::new();

        let totems = [-4.0_f32, 0.0, 4.0]
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                // Golden-angle spacing keeps the orbs out of phase.
                let phase = (i as f32 * 2.399_963).rem_euclid(std::f32::consts::TAU);
                let origin = group.then(&Transform::from_position(Vec3::new(x, 0.0, 0.0)));
                Totem::spawn(&mut scene, origin.position, phase)
            })
            .collect();

        let floor_local = Transform {
            position: Vec3::new(0.0, Self::FLOOR_HEIGHT, 0.0),
            rotation: Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
            scale: Vec3::new(Self::FLOOR_SIZE, Self::FLOOR_SIZE, 1.0),
        };
        let floor = scene.add(Drawable {
            mesh: MeshKind::Floor,
            transform: group.then(&floor_local),
            color: FLOOR_COLOR,
            visible: true,
        });

        Self {
            scene,
            totems,
            floor,
        }
    }

    pub fn floor_transform(&self) -> Transform {
        self.scene
            .get(self.floor)
            .map(|d| d.transform)
            .unwrap_or_default()
    }

    pub fn animate(&mut self, time: f32) {
        for totem in &self.totems {
            totem.animate(&mut self.scene, time);
        }
    }
}

impl Default for DemoScene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_layout() {
        let demo = DemoScene::new();
        assert_eq!(demo.totems.len(), 3);
        assert_eq!(demo.scene.len(), 7);
        let floor = demo.floor_transform();
        assert!(floor.position.abs_diff_eq(Vec3::new(0.0, -1.5, -5.0), 1e-5));
        assert!((floor.rotation * Vec3::Z).abs_diff_eq(Vec3::Y, 1e-5));
        assert_eq!(demo.totems[1].origin, Vec3::new(0.0, 0.0, -5.0));
    }

    #[test]
    fn orb_stays_on_its_orbit() {
        let demo = DemoScene::new();
        let totem = demo.totems[0];
        for t in [0.0, 0.7, 3.1, 12.0] {
            let offset = Totem::orb_offset(totem.phase, t);
            let horizontal = Vec3::new(offset.x, 0.0, offset.z).length();
            assert!((horizontal - Totem::ORBIT_RADIUS).abs() < 1e-4);
            assert!((0.0..=2.0).contains(&offset.y));
        }
    }

    #[test]
    fn animate_moves_orbs_only() {
        let mut demo = DemoScene::new();
        let before = demo.scene.clone();
        demo.animate(1.25);
        let totem = demo.totems[2];
        assert_ne!(
            demo.scene.get(totem.orb).unwrap().transform.position,
            before.get(totem.orb).unwrap().transform.position
        );
        assert_eq!(
            demo.scene.get(totem.pillar),
            before.get(totem.pillar)
        );
    }

    #[test]
    fn visibility_toggle() {
        let mut demo = DemoScene::new();
        assert!(demo.scene.is_visible(demo.floor));
        assert!(demo.scene.set_visible(demo.floor, false));
        assert_eq!(demo.scene.visible().count(), 6);
        assert!(!demo.scene.set_visible(DrawableId(99), false));
    }
}
