use tracing::{debug, warn};

use crate::models::{
    common::{Position3D, Vector3D},
    sensor::{RayFanSensor, SensorReading},
    state_machine::{StateId, StateMachine, TickContext, Transition},
    traits::{IRayDebug, ISceneQuery},
};
use crate::scenario::BehaviorConfig;

/// 位置更新がない場合の移動距離の初期値
pub const INITIAL_MOVEMENT_DISTANCE: f64 = 0.0;

/// エージェントの幾何情報と感知結果
///
/// 行動状態から毎ティック更新されます。位置は外部（ルートモーション）が
/// 動かし、向きと各種計測値は状態側が更新します。
#[derive(Debug, Clone)]
pub struct AgentBody {
    /// 現在位置
    pub position: Position3D,
    /// 前方向（単位ベクトル）
    pub forward: Vector3D,
    /// 上方向（単位ベクトル）
    pub up: Vector3D,
    /// 扇状レイセンサー
    pub sensor: RayFanSensor,
    /// 直近の走査結果
    pub reading: SensorReading,
    /// 直近の交差点までの移動進捗距離（m）
    pub movement_distance: f64,
    /// 向き合わせ後に加える固定回転（度）
    pub heading_bias_deg: f64,
    /// 向き合わせを実行した回数
    pub alignment_count: u64,
    /// 最短距離走査を実行した回数
    pub scan_count: u64,
}

impl AgentBody {
    pub fn new(position: Position3D, forward: Vector3D, sensor: RayFanSensor, heading_bias_deg: f64) -> Self {
        Self {
            position,
            forward: forward.normalize().unwrap_or(Vector3D::new(1.0, 0.0, 0.0)),
            up: Vector3D::UP,
            sensor,
            reading: SensorReading::default(),
            movement_distance: INITIAL_MOVEMENT_DISTANCE,
            heading_bias_deg,
            alignment_count: 0,
            scan_count: 0,
        }
    }

    pub fn get_short_distance(&self) -> f64 {
        self.reading.min_distance
    }

    pub fn get_movement_distance(&self) -> f64 {
        self.movement_distance
    }

    pub fn get_hit_point(&self) -> Option<Position3D> {
        self.reading.hit_point
    }

    /// 扇状走査で最短距離を再計算
    ///
    /// 読み取り値は丸ごと置き換えられます。
    pub fn calculate_short_distance(&mut self, scene: &dyn ISceneQuery) -> f64 {
        let max_range = self.sensor.max_range;
        self.reading = self
            .sensor
            .compute_shortest(scene, self.position, self.forward, self.up, max_range);
        self.scan_count += 1;
        self.reading.min_distance
    }

    /// 移動進捗距離を再計算
    ///
    /// 現在位置（高さは交差点と同じ値に固定）から直近の交差点までの距離です。
    /// 交差点が未記録の場合は更新せず、前回の値を保持します。
    pub fn calculate_movement_distance(&mut self) -> f64 {
        if let Some(hit_point) = self.reading.hit_point {
            let line_origin = self.position.with_z(self.sensor.hit_height);
            self.movement_distance = line_origin.distance_3d(&hit_point);
        }
        self.movement_distance
    }

    /// 直近の交差点へ向きを合わせる
    ///
    /// 交差点が未記録の場合は何もしません。
    pub fn calculate_forward_direction(&mut self) -> bool {
        match self.reading.hit_point {
            Some(hit_point) => self.align_forward(hit_point),
            None => {
                debug!("交差点が未記録のため向き合わせを省略");
                false
            }
        }
    }

    /// 目標点へ向きを合わせる
    ///
    /// 目標点へのベクトルを水平面へ射影して前方向とし、さらに上方向まわりに
    /// `heading_bias_deg` だけ回転させます。射影後のベクトルがゼロになる場合
    /// （目標点が真上・真下）は向きを変更せずfalseを返します。
    pub fn align_forward(&mut self, target: Position3D) -> bool {
        let up = self.up.normalize().unwrap_or(Vector3D::UP);
        let to_target = target - self.position;
        let projected = to_target - up * to_target.dot(&up);

        let Some(direction) = projected.normalize() else {
            warn!(
                "向き合わせ対象がエージェント位置と一致するため省略: ({:.2}, {:.2})",
                target.x, target.y
            );
            return false;
        };

        self.forward = direction.rotate_about(&up, self.heading_bias_deg);
        self.alignment_count += 1;
        true
    }

    /// 診断用のレイ描画
    pub fn draw_rays(&self, scene: &dyn ISceneQuery, sink: &mut dyn IRayDebug) {
        self.sensor.draw_fan(scene, self.position, self.forward, self.up, sink);
    }
}

/// 徘徊エージェント
///
/// 幾何情報と、それを駆動するステートマシンをちょうど1つ所有します。
#[derive(Debug)]
pub struct Agent {
    pub id: String,
    pub body: AgentBody,
    state_machine: StateMachine,
}

impl Agent {
    pub fn new(id: String, body: AgentBody, behavior: &BehaviorConfig) -> Self {
        Self {
            id,
            body,
            state_machine: StateMachine::new(behavior),
        }
    }

    pub fn get_id(&self) -> String {
        self.id.clone()
    }

    /// 初期状態の開始処理
    pub fn start(&mut self, ctx: &mut TickContext<'_>) {
        self.state_machine.init(&mut self.body, ctx);
    }

    /// 1ティックの処理実行
    pub fn tick(&mut self, ctx: &mut TickContext<'_>) -> Option<Transition> {
        self.state_machine.tick(&mut self.body, ctx)
    }

    /// 番号指定による状態変更（未知の番号は無視）
    pub fn change_state(&mut self, raw_state: i32, ctx: &mut TickContext<'_>) -> bool {
        self.state_machine.request_state(raw_state, &mut self.body, ctx)
    }

    pub fn current_state(&self) -> StateId {
        self.state_machine.current_state()
    }
}
