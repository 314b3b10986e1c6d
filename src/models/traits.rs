use std::fmt;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::models::agent::AgentBody;
use crate::models::common::*;
use crate::models::state_machine::{StateId, TickContext};

/// シーン問い合わせのインターフェース（物理・衝突システム側が提供）
pub trait ISceneQuery {
    /// レイキャスト
    ///
    /// `origin` から `direction` 方向へ `max_distance` までの範囲で
    /// 最初に交差した点を返します。交差しなければNone。
    fn raycast(&self, origin: Position3D, direction: Vector3D, max_distance: f64) -> Option<Position3D>;
}

/// アニメーションキュー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimationCue {
    StartWalk,
    StopWalk,
    StartRun,
    StopRun,
    LeftTurn90,
}

impl AnimationCue {
    pub const ALL: [AnimationCue; 5] = [
        AnimationCue::StartWalk,
        AnimationCue::StopWalk,
        AnimationCue::StartRun,
        AnimationCue::StopRun,
        AnimationCue::LeftTurn90,
    ];

    /// 描画側のトリガー名
    pub fn as_str(&self) -> &'static str {
        match self {
            AnimationCue::StartWalk => "StartWalk",
            AnimationCue::StopWalk => "StopWalk",
            AnimationCue::StartRun => "StartRun",
            AnimationCue::StopRun => "StopRun",
            AnimationCue::LeftTurn90 => "LeftTurn90",
        }
    }
}

impl fmt::Display for AnimationCue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// アニメーションキューの送信先インターフェース
///
/// 送りっぱなしで、再生完了の通知は受け取りません。
pub trait IAnimationCues {
    fn trigger(&mut self, cue: AnimationCue);
}

/// レイの診断描画インターフェース（任意）
pub trait IRayDebug {
    fn draw_segment(&mut self, from: Position3D, to: Position3D);
}

/// 旋回回数の乱数源インターフェース
pub trait ITurnSource {
    /// 追加旋回回数（{0, 1} の一様乱数）
    fn extra_turns(&mut self) -> u32;
}

/// StdRngによる旋回回数の乱数源
#[derive(Debug, Clone)]
pub struct RandomTurns {
    rng: StdRng,
}

impl RandomTurns {
    pub fn from_seed(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl ITurnSource for RandomTurns {
    fn extra_turns(&mut self) -> u32 {
        self.rng.gen_range(0..=1)
    }
}

/// 行動状態のインターフェース
///
/// 状態インスタンスはステートマシンの生存期間中ずっと再利用されます。
/// 活性化ごとにリセットが必要な内部データは `on_enter` で初期化すること。
pub trait IBehaviorState: fmt::Debug {
    /// 状態の識別子
    fn id(&self) -> StateId;

    /// 状態に入るときの処理
    fn on_enter(&mut self, _body: &mut AgentBody, _ctx: &mut TickContext<'_>) {}

    /// 状態から出るときの処理
    fn on_exit(&mut self, _body: &mut AgentBody, _ctx: &mut TickContext<'_>) {}

    /// 1ティックの処理実行
    ///
    /// 遷移が必要な場合は遷移先を返します。遷移はここからのみ発生します。
    fn on_tick(&mut self, body: &mut AgentBody, ctx: &mut TickContext<'_>) -> Option<StateId>;
}
