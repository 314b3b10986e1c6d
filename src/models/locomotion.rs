use std::collections::{HashMap, VecDeque};

use tracing::trace;

use crate::models::{
    agent::AgentBody,
    traits::{AnimationCue, IAnimationCues},
};
use crate::scenario::LocomotionConfig;

/// 歩容
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gait {
    Standing,
    Walking,
    Running,
}

/// 保持するキュー受信履歴の件数
pub const CUE_HISTORY_LEN: usize = 32;

/// 受信したキューの記録
#[derive(Debug, Clone, PartialEq)]
pub struct CueEvent {
    /// 受信時刻（秒）
    pub timestamp: f64,
    pub cue: AnimationCue,
}

/// ルートモーションの簡易モデル
///
/// アニメーションキューを受け取り、描画側のルートモーションの代わりに
/// エージェントの位置と向きを動かします。判断ロジックへは位置・向きを
/// 通してのみ影響します。
#[derive(Debug, Clone)]
pub struct Locomotion {
    pub gait: Gait,
    /// 歩行速度（m/s）
    pub walk_speed: f64,
    /// 走行速度（m/s）
    pub run_speed: f64,
    /// 旋回角速度（度/秒）
    pub turn_rate_deg: f64,
    /// 残りの旋回角（度）
    pub pending_turn_deg: f64,
    /// 現在時刻（秒）
    pub clock: f64,
    /// 直近のキュー受信履歴（最大 `CUE_HISTORY_LEN` 件）
    pub cue_history: VecDeque<CueEvent>,
    cue_counts: HashMap<AnimationCue, usize>,
}

impl Locomotion {
    pub fn new(config: &LocomotionConfig) -> Self {
        Self {
            gait: Gait::Standing,
            walk_speed: config.walk_speed_mps,
            run_speed: config.run_speed_mps,
            turn_rate_deg: 90.0 / config.turn_duration_s,
            pending_turn_deg: 0.0,
            clock: 0.0,
            cue_history: VecDeque::with_capacity(CUE_HISTORY_LEN),
            cue_counts: HashMap::new(),
        }
    }

    /// 現在の歩容の速度
    pub fn speed(&self) -> f64 {
        match self.gait {
            Gait::Standing => 0.0,
            Gait::Walking => self.walk_speed,
            Gait::Running => self.run_speed,
        }
    }

    pub fn is_turning(&self) -> bool {
        self.pending_turn_deg > 0.0
    }

    /// キュー種別ごとの受信回数
    pub fn cue_count(&self, cue: AnimationCue) -> usize {
        self.cue_counts.get(&cue).copied().unwrap_or(0)
    }

    /// 1ティック分の移動と旋回
    ///
    /// 旋回中はその場で向きだけを変えます。
    pub fn advance(&mut self, body: &mut AgentBody, dt: f64) {
        self.clock += dt;

        if self.is_turning() {
            let step = (self.turn_rate_deg * dt).min(self.pending_turn_deg);
            body.forward = body.forward.rotate_about(&body.up, step);
            self.pending_turn_deg -= step;
            return;
        }

        let speed = self.speed();
        if speed > 0.0 {
            let step = body.forward.horizontal() * (speed * dt);
            body.position = body.position + step;
        }
    }
}

impl IAnimationCues for Locomotion {
    fn trigger(&mut self, cue: AnimationCue) {
        trace!("キュー受信: {} (t={:.2})", cue, self.clock);

        match cue {
            AnimationCue::StartWalk | AnimationCue::StopRun => self.gait = Gait::Walking,
            AnimationCue::StartRun => self.gait = Gait::Running,
            AnimationCue::StopWalk => self.gait = Gait::Standing,
            AnimationCue::LeftTurn90 => {
                self.gait = Gait::Standing;
                self.pending_turn_deg += 90.0;
            }
        }

        if self.cue_history.len() == CUE_HISTORY_LEN {
            self.cue_history.pop_front();
        }
        self.cue_history.push_back(CueEvent {
            timestamp: self.clock,
            cue,
        });
        *self.cue_counts.entry(cue).or_insert(0) += 1;
    }
}
