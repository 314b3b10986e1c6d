use tracing::trace;

use crate::models::{
    common::{Position3D, Vector3D},
    traits::{IRayDebug, ISceneQuery},
};
use crate::scenario::SensorConfig;

/// 最短距離の初期値（まだ一度も走査していない状態）
pub const INITIAL_SHORT_DISTANCE: f64 = 1.0e6;

/// 走査で何も検出しなかった場合の最短距離
///
/// 走査開始時に読み取り値をこの値へリセットするため、
/// 全レイが外れた場合の最短距離は常にこの値になります。
pub const NO_HIT_DISTANCE: f64 = 0.0;

/// センサー読み取り値
///
/// `compute_shortest` のたびに丸ごと再計算されます（差分更新なし）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    /// 最短距離（m）
    pub min_distance: f64,
    /// 最短距離を与えた交差点（高さは `hit_height` に固定）。未検出ならNone
    pub hit_point: Option<Position3D>,
}

impl Default for SensorReading {
    fn default() -> Self {
        Self {
            min_distance: INITIAL_SHORT_DISTANCE,
            hit_point: None,
        }
    }
}

impl SensorReading {
    /// 走査開始時の読み取り値
    pub fn reset() -> Self {
        Self {
            min_distance: NO_HIT_DISTANCE,
            hit_point: None,
        }
    }
}

/// 扇状レイセンサー
///
/// エージェント前方に扇状にレイを放ち、最も近い障害物を報告します。
/// 既定では -10° から 0.5° 刻みで 40 本（+9.5° まで、左右非対称）。
#[derive(Debug, Clone)]
pub struct RayFanSensor {
    /// レイの本数
    pub ray_count: usize,
    /// 最初のレイの角度（度）
    pub start_angle_deg: f64,
    /// レイ間の角度（度）
    pub step_deg: f64,
    /// レイ始点の高さ（m）
    pub origin_height: f64,
    /// 記録する交差点の高さ（m）
    pub hit_height: f64,
    /// 最大探知距離（m）
    pub max_range: f64,
}

impl Default for RayFanSensor {
    fn default() -> Self {
        Self::from_config(&SensorConfig::default())
    }
}

impl RayFanSensor {
    pub fn from_config(config: &SensorConfig) -> Self {
        Self {
            ray_count: config.ray_count,
            start_angle_deg: config.start_angle_deg,
            step_deg: config.step_deg,
            origin_height: config.origin_height_m,
            hit_height: config.hit_height_m,
            max_range: config.max_range_m,
        }
    }

    /// 各レイの回転角（度）
    pub fn ray_angles(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.ray_count).map(move |i| self.start_angle_deg + self.step_deg * i as f64)
    }

    /// レイの始点（エージェント位置の高さを固定値に置き換えたもの）
    pub fn ray_origin(&self, origin_base: Position3D) -> Position3D {
        origin_base.with_z(self.origin_height)
    }

    fn rays(&self, origin_base: Position3D, forward: Vector3D, up: Vector3D) -> impl Iterator<Item = (Position3D, Vector3D)> + '_ {
        let origin = self.ray_origin(origin_base);
        self.ray_angles()
            .filter_map(move |angle| forward.rotate_about(&up, angle).normalize())
            .map(move |direction| (origin, direction))
    }

    /// 扇状走査による最短距離の計算
    ///
    /// 交差した全レイのうち、始点から交差点までの地表面距離が最小のものを
    /// 記録します。同距離の場合は先に走査したレイが優先されます。
    /// どのレイも交差しなければ `SensorReading::reset()` のままです。
    pub fn compute_shortest(
        &self,
        scene: &dyn ISceneQuery,
        origin_base: Position3D,
        forward: Vector3D,
        up: Vector3D,
        max_range: f64,
    ) -> SensorReading {
        let mut reading = SensorReading::reset();
        let mut first_time = true;

        for (origin, direction) in self.rays(origin_base, forward, up) {
            let Some(hit) = scene.raycast(origin, direction, max_range) else {
                continue;
            };
            let distance = origin.distance_xy(&hit);

            if first_time {
                reading.min_distance = distance;
                reading.hit_point = Some(hit.with_z(self.hit_height));
                first_time = false;
            } else if distance < reading.min_distance {
                reading.min_distance = distance;
                reading.hit_point = Some(hit.with_z(self.hit_height));
            }
        }

        trace!(
            "扇状走査: 最短距離 {:.3}m, 交差点 {:?}",
            reading.min_distance,
            reading.hit_point
        );

        reading
    }

    /// 診断用のレイ描画（判断ロジックには影響しない）
    pub fn draw_fan(
        &self,
        scene: &dyn ISceneQuery,
        origin_base: Position3D,
        forward: Vector3D,
        up: Vector3D,
        sink: &mut dyn IRayDebug,
    ) {
        for (origin, direction) in self.rays(origin_base, forward, up) {
            if let Some(hit) = scene.raycast(origin, direction, self.max_range) {
                sink.draw_segment(origin, hit);
            }
        }
    }
}
