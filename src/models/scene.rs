use tracing::debug;

use crate::models::{
    common::{EPSILON, Position3D, Vector3D},
    traits::ISceneQuery,
};
use crate::scenario::{ObstacleConfig, SceneConfig};

/// 障害物
///
/// どちらも地表面から `height` までの鉛直な形状です。
#[derive(Debug, Clone, PartialEq)]
pub enum Obstacle {
    /// 円柱
    Pillar {
        center: Position3D,
        radius: f64,
        height: f64,
    },
    /// 鉛直な壁（線分）
    Wall {
        from: Position3D,
        to: Position3D,
        height: f64,
    },
}

impl Obstacle {
    /// レイとの交差パラメータ t（始点からの距離）を計算
    fn intersect(&self, origin: Position3D, direction: Vector3D) -> Option<f64> {
        let t = match self {
            Obstacle::Pillar { center, radius, .. } => ray_circle(origin, direction, *center, *radius)?,
            Obstacle::Wall { from, to, .. } => ray_segment(origin, direction, *from, *to)?,
        };

        let z = origin.z + direction.z * t;
        (z >= 0.0 && z <= self.height()).then_some(t)
    }

    pub fn height(&self) -> f64 {
        match self {
            Obstacle::Pillar { height, .. } | Obstacle::Wall { height, .. } => *height,
        }
    }
}

/// 地表面上の円との交差
///
/// 円の内部から出発したレイは交差しないものとします。
fn ray_circle(origin: Position3D, direction: Vector3D, center: Position3D, radius: f64) -> Option<f64> {
    let (dx, dy) = (direction.x, direction.y);
    let a = dx * dx + dy * dy;
    if a < EPSILON {
        return None;
    }

    let (ox, oy) = (origin.x - center.x, origin.y - center.y);
    let b = 2.0 * (ox * dx + oy * dy);
    let c = ox * ox + oy * oy - radius * radius;
    if c < 0.0 {
        return None;
    }

    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }

    let t = (-b - discriminant.sqrt()) / (2.0 * a);
    (t >= 0.0).then_some(t)
}

/// 地表面上の線分との交差
fn ray_segment(origin: Position3D, direction: Vector3D, from: Position3D, to: Position3D) -> Option<f64> {
    let (ex, ey) = (to.x - from.x, to.y - from.y);
    let denom = direction.x * ey - direction.y * ex;
    if denom.abs() < EPSILON {
        return None;
    }

    let (wx, wy) = (from.x - origin.x, from.y - origin.y);
    let t = (wx * ey - wy * ex) / denom;
    let s = (wx * direction.y - wy * direction.x) / denom;

    (t >= 0.0 && (0.0..=1.0).contains(&s)).then_some(t)
}

/// 障害物で構成されるシーン
#[derive(Debug, Clone, Default)]
pub struct ObstacleScene {
    pub obstacles: Vec<Obstacle>,
}

impl ObstacleScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// シナリオ設定からシーンを構築
    ///
    /// 部屋が指定されていれば外周の4枚の壁を追加します。
    pub fn from_config(config: &SceneConfig) -> Self {
        let mut scene = Self::new();

        if let Some(room) = &config.room {
            let corners = [
                Position3D::new(room.xmin_m, room.ymin_m, 0.0),
                Position3D::new(room.xmax_m, room.ymin_m, 0.0),
                Position3D::new(room.xmax_m, room.ymax_m, 0.0),
                Position3D::new(room.xmin_m, room.ymax_m, 0.0),
            ];
            for i in 0..corners.len() {
                scene.add_wall(corners[i], corners[(i + 1) % corners.len()], room.wall_height_m);
            }
        }

        for obstacle in &config.obstacles {
            match obstacle {
                ObstacleConfig::Pillar { center, radius_m, height_m } => {
                    scene.add_pillar(Position3D::new(center.x_m, center.y_m, 0.0), *radius_m, *height_m);
                }
                ObstacleConfig::Wall { from, to, height_m } => {
                    scene.add_wall(
                        Position3D::new(from.x_m, from.y_m, 0.0),
                        Position3D::new(to.x_m, to.y_m, 0.0),
                        *height_m,
                    );
                }
            }
        }

        debug!("シーン構築: 障害物 {} 個", scene.obstacles.len());
        scene
    }

    pub fn add_pillar(&mut self, center: Position3D, radius: f64, height: f64) {
        self.obstacles.push(Obstacle::Pillar { center, radius, height });
    }

    pub fn add_wall(&mut self, from: Position3D, to: Position3D, height: f64) {
        self.obstacles.push(Obstacle::Wall { from, to, height });
    }
}

impl ISceneQuery for ObstacleScene {
    fn raycast(&self, origin: Position3D, direction: Vector3D, max_distance: f64) -> Option<Position3D> {
        let direction = direction.normalize()?;

        self.obstacles
            .iter()
            .filter_map(|obstacle| obstacle.intersect(origin, direction))
            .filter(|t| *t <= max_distance)
            .min_by(|a, b| a.total_cmp(b))
            .map(|t| origin + direction * t)
    }
}
