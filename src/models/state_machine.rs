use std::fmt;

use tracing::{debug, warn};

use crate::models::{
    agent::AgentBody,
    states::{EndRunningState, EndWalkingState, IdleState, RunningState, TurningState, WalkingState},
    traits::{IAnimationCues, IBehaviorState, IRayDebug, ISceneQuery, ITurnSource},
};
use crate::scenario::BehaviorConfig;

/// 行動状態の識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateId {
    Idle,
    Walking,
    Running,
    EndRunning,
    EndWalking,
    Turning,
}

impl StateId {
    pub const ALL: [StateId; 6] = [
        StateId::Idle,
        StateId::Walking,
        StateId::Running,
        StateId::EndRunning,
        StateId::EndWalking,
        StateId::Turning,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// 番号から状態を取得（範囲外ならNone）
    pub fn from_index(raw: i32) -> Option<StateId> {
        usize::try_from(raw).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StateId::Idle => "Idle",
            StateId::Walking => "Walking",
            StateId::Running => "Running",
            StateId::EndRunning => "EndRunning",
            StateId::EndWalking => "EndWalking",
            StateId::Turning => "Turning",
        }
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 状態遷移の記録
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: StateId,
    pub to: StateId,
}

/// 1ティック分の外部協調オブジェクト
///
/// シーン問い合わせ・アニメーションキュー・乱数源・診断描画と
/// 固定時間刻みをまとめて状態へ渡します。
pub struct TickContext<'a> {
    pub scene: &'a dyn ISceneQuery,
    pub cues: &'a mut dyn IAnimationCues,
    pub turns: &'a mut dyn ITurnSource,
    pub debug: Option<&'a mut dyn IRayDebug>,
    /// 固定時間刻み（秒）
    pub dt: f64,
}

impl<'a> TickContext<'a> {
    pub fn new(
        scene: &'a dyn ISceneQuery,
        cues: &'a mut dyn IAnimationCues,
        turns: &'a mut dyn ITurnSource,
        dt: f64,
    ) -> Self {
        Self {
            scene,
            cues,
            turns,
            debug: None,
            dt,
        }
    }

    pub fn with_debug(mut self, debug: &'a mut dyn IRayDebug) -> Self {
        self.debug = Some(debug);
        self
    }
}

/// 行動ステートマシン
///
/// 6つの状態インスタンスを初期化時に一度だけ生成し、以後は現在状態を
/// 切り替えるだけで再利用します。現在状態は常にちょうど1つです。
#[derive(Debug)]
pub struct StateMachine {
    states: [Box<dyn IBehaviorState>; 6],
    current: StateId,
}

impl StateMachine {
    /// 初期状態はIdle
    pub fn new(config: &BehaviorConfig) -> Self {
        let machine = Self {
            states: [
                Box::new(IdleState::new()),
                Box::new(WalkingState::new(config)),
                Box::new(RunningState::new(config)),
                Box::new(EndRunningState::new(config)),
                Box::new(EndWalkingState::new()),
                Box::new(TurningState::new(config)),
            ],
            current: StateId::Idle,
        };
        debug_assert!(
            StateId::ALL
                .iter()
                .zip(machine.states.iter())
                .all(|(id, state)| state.id() == *id)
        );
        machine
    }

    pub fn current_state(&self) -> StateId {
        self.current
    }

    /// 初期状態の開始処理を実行
    pub fn init(&mut self, body: &mut AgentBody, ctx: &mut TickContext<'_>) {
        debug!("ステートマシン開始: {}", self.current);
        self.states[self.current.index()].on_enter(body, ctx);
    }

    /// 状態遷移
    ///
    /// 旧状態の `on_exit` を必ず新状態の `on_enter` より先に実行します。
    pub fn change_state(&mut self, next: StateId, body: &mut AgentBody, ctx: &mut TickContext<'_>) -> Transition {
        let transition = Transition {
            from: self.current,
            to: next,
        };
        self.states[self.current.index()].on_exit(body, ctx);
        self.current = next;
        self.states[next.index()].on_enter(body, ctx);

        debug!("状態遷移: {} -> {}", transition.from, transition.to);
        transition
    }

    /// 番号指定の状態遷移要求
    ///
    /// 未知の番号は何もせず、現在状態を維持します。
    pub fn request_state(&mut self, raw_state: i32, body: &mut AgentBody, ctx: &mut TickContext<'_>) -> bool {
        match StateId::from_index(raw_state) {
            Some(next) => {
                self.change_state(next, body, ctx);
                true
            }
            None => {
                warn!("未知の状態番号 {} への遷移要求を無視 (現在: {})", raw_state, self.current);
                false
            }
        }
    }

    /// 現在状態の1ティック処理
    ///
    /// 診断描画先があれば最初にレイを描画し、その後に状態の処理を実行します。
    pub fn tick(&mut self, body: &mut AgentBody, ctx: &mut TickContext<'_>) -> Option<Transition> {
        if let Some(sink) = ctx.debug.as_deref_mut() {
            body.draw_rays(ctx.scene, sink);
        }

        let next = self.states[self.current.index()].on_tick(body, ctx)?;
        Some(self.change_state(next, body, ctx))
    }
}
