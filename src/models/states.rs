//! # 行動状態
//!
//! 徘徊サイクルを構成する6つの行動状態を提供します。
//!
//! ```text
//! Idle -> Walking -> (Running -> EndRunning) -> EndWalking -> Turning -> Walking ...
//! ```
//!
//! 各状態は `on_tick` の戻り値でのみ遷移を要求し、`on_enter`/`on_exit` からは
//! 遷移しません。内部データを持つ状態（Running, Turning）は `on_enter` で
//! それを初期化します。

use tracing::{debug, trace};

use crate::models::{
    agent::AgentBody,
    state_machine::{StateId, TickContext},
    traits::{AnimationCue, IBehaviorState},
};
use crate::scenario::BehaviorConfig;

/// 再走査で前方が塞がっていた場合に旋回タイマーへ設定する値
///
/// 旋回間隔より大きいため、次のティックで即座に追加旋回が発生します。
pub const FORCED_TURN_TIMER: f64 = 10.0;

/// 待機状態
///
/// 走査して最寄りの障害物へ向きを合わせ、1ティックで歩行へ移ります。
#[derive(Debug, Default)]
pub struct IdleState;

impl IdleState {
    pub fn new() -> Self {
        Self
    }
}

impl IBehaviorState for IdleState {
    fn id(&self) -> StateId {
        StateId::Idle
    }

    fn on_tick(&mut self, body: &mut AgentBody, ctx: &mut TickContext<'_>) -> Option<StateId> {
        body.calculate_short_distance(ctx.scene);
        body.calculate_forward_direction();

        Some(StateId::Walking)
    }
}

/// 歩行状態
#[derive(Debug)]
pub struct WalkingState {
    run_distance: f64,
    stop_distance: f64,
}

impl WalkingState {
    pub fn new(config: &BehaviorConfig) -> Self {
        Self {
            run_distance: config.run_distance_m,
            stop_distance: config.walk_stop_distance_m,
        }
    }
}

impl IBehaviorState for WalkingState {
    fn id(&self) -> StateId {
        StateId::Walking
    }

    fn on_enter(&mut self, _body: &mut AgentBody, ctx: &mut TickContext<'_>) {
        ctx.cues.trigger(AnimationCue::StartWalk);
    }

    fn on_tick(&mut self, body: &mut AgentBody, _ctx: &mut TickContext<'_>) -> Option<StateId> {
        body.calculate_movement_distance();

        if body.get_short_distance() > self.run_distance {
            body.calculate_forward_direction();
            return Some(StateId::Running);
        }

        if body.get_movement_distance() < self.stop_distance {
            return Some(StateId::EndWalking);
        }

        None
    }
}

/// 走行状態
///
/// 活性化後の最初のティックでのみ向きを合わせ直します。
#[derive(Debug)]
pub struct RunningState {
    stop_distance: f64,
    first_tick: bool,
}

impl RunningState {
    pub fn new(config: &BehaviorConfig) -> Self {
        Self {
            stop_distance: config.run_stop_distance_m,
            first_tick: true,
        }
    }
}

impl IBehaviorState for RunningState {
    fn id(&self) -> StateId {
        StateId::Running
    }

    fn on_enter(&mut self, _body: &mut AgentBody, ctx: &mut TickContext<'_>) {
        self.first_tick = true;
        ctx.cues.trigger(AnimationCue::StartRun);
    }

    fn on_tick(&mut self, body: &mut AgentBody, _ctx: &mut TickContext<'_>) -> Option<StateId> {
        if self.first_tick {
            body.calculate_forward_direction();
            self.first_tick = false;
        }

        body.calculate_movement_distance();

        (body.get_movement_distance() < self.stop_distance).then_some(StateId::EndRunning)
    }
}

/// 走行終了（減速）状態
#[derive(Debug)]
pub struct EndRunningState {
    stop_distance: f64,
}

impl EndRunningState {
    pub fn new(config: &BehaviorConfig) -> Self {
        Self {
            stop_distance: config.walk_stop_distance_m,
        }
    }
}

impl IBehaviorState for EndRunningState {
    fn id(&self) -> StateId {
        StateId::EndRunning
    }

    fn on_enter(&mut self, _body: &mut AgentBody, ctx: &mut TickContext<'_>) {
        ctx.cues.trigger(AnimationCue::StopRun);
    }

    fn on_tick(&mut self, body: &mut AgentBody, _ctx: &mut TickContext<'_>) -> Option<StateId> {
        body.calculate_movement_distance();

        (body.get_movement_distance() < self.stop_distance).then_some(StateId::EndWalking)
    }
}

/// 歩行終了状態
///
/// 直近の交差点へ向きを合わせ、1ティックで旋回へ移ります。
#[derive(Debug, Default)]
pub struct EndWalkingState;

impl EndWalkingState {
    pub fn new() -> Self {
        Self
    }
}

impl IBehaviorState for EndWalkingState {
    fn id(&self) -> StateId {
        StateId::EndWalking
    }

    fn on_enter(&mut self, _body: &mut AgentBody, ctx: &mut TickContext<'_>) {
        ctx.cues.trigger(AnimationCue::StopWalk);
    }

    fn on_tick(&mut self, body: &mut AgentBody, _ctx: &mut TickContext<'_>) -> Option<StateId> {
        body.calculate_forward_direction();

        Some(StateId::Turning)
    }
}

/// 旋回状態
///
/// 入るたびに追加旋回回数を乱数で決め、90°旋回キューを `turn_interval` 秒
/// 間隔で発行します。最後の旋回から `turn_interval` 秒後に再走査し、前方が
/// 開けていれば歩行へ戻ります。
#[derive(Debug)]
pub struct TurningState {
    turn_interval: f64,
    clear_distance: f64,
    /// 残りの追加旋回回数
    pub extra_turns: u32,
    /// 直近の旋回キューからの経過時間（秒）
    pub timer: f64,
}

impl TurningState {
    pub fn new(config: &BehaviorConfig) -> Self {
        Self {
            turn_interval: config.turn_interval_s,
            clear_distance: config.turn_clear_distance_m,
            extra_turns: 0,
            timer: 0.0,
        }
    }
}

impl IBehaviorState for TurningState {
    fn id(&self) -> StateId {
        StateId::Turning
    }

    fn on_enter(&mut self, _body: &mut AgentBody, ctx: &mut TickContext<'_>) {
        self.extra_turns = ctx.turns.extra_turns();
        self.timer = 0.0;

        debug!("旋回開始: 追加旋回 {} 回", self.extra_turns);
        ctx.cues.trigger(AnimationCue::LeftTurn90);
    }

    fn on_tick(&mut self, body: &mut AgentBody, ctx: &mut TickContext<'_>) -> Option<StateId> {
        self.timer += ctx.dt;

        if self.extra_turns > 0 && self.timer >= self.turn_interval {
            self.extra_turns -= 1;
            self.timer = 0.0;
            trace!("追加旋回: 残り {} 回", self.extra_turns);
            ctx.cues.trigger(AnimationCue::LeftTurn90);
        } else if self.extra_turns == 0 && self.timer >= self.turn_interval {
            let distance = body.calculate_short_distance(ctx.scene);

            if distance > self.clear_distance {
                body.calculate_forward_direction();
                return Some(StateId::Walking);
            }

            debug!("旋回後も前方が塞がっている ({:.2}m): 追加旋回", distance);
            self.extra_turns = 1;
            self.timer = FORCED_TURN_TIMER;
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        common::{Position3D, Vector3D},
        scene::ObstacleScene,
        sensor::RayFanSensor,
        state_machine::StateMachine,
        traits::{IAnimationCues, ITurnSource},
    };

    #[derive(Default)]
    struct CueLog(Vec<AnimationCue>);

    impl IAnimationCues for CueLog {
        fn trigger(&mut self, cue: AnimationCue) {
            self.0.push(cue);
        }
    }

    impl CueLog {
        fn count(&self, cue: AnimationCue) -> usize {
            self.0.iter().filter(|c| **c == cue).count()
        }
    }

    struct FixedTurns(u32);

    impl ITurnSource for FixedTurns {
        fn extra_turns(&mut self) -> u32 {
            self.0
        }
    }

    /// エージェント正面（+x方向）の x = distance に壁があるシーン
    fn wall_ahead(distance: f64) -> ObstacleScene {
        let mut scene = ObstacleScene::new();
        scene.add_wall(Position3D::new(distance, -100.0, 0.0), Position3D::new(distance, 100.0, 0.0), 3.0);
        scene
    }

    fn body() -> AgentBody {
        AgentBody::new(Position3D::default(), Vector3D::new(1.0, 0.0, 0.0), RayFanSensor::default(), 1.0)
    }

    fn config() -> BehaviorConfig {
        BehaviorConfig::default()
    }

    #[test]
    fn test_idle_always_goes_to_walking() {
        let scene = ObstacleScene::new();
        let mut cues = CueLog::default();
        let mut turns = FixedTurns(0);
        let mut ctx = TickContext::new(&scene, &mut cues, &mut turns, 0.02);
        let mut body = body();

        assert_eq!(IdleState::new().on_tick(&mut body, &mut ctx), Some(StateId::Walking));
        assert_eq!(body.scan_count, 1);
    }

    #[test]
    fn test_scenario_a_open_space_runs() {
        let scene = wall_ahead(15.0);
        let mut cues = CueLog::default();
        let mut turns = FixedTurns(0);
        let mut ctx = TickContext::new(&scene, &mut cues, &mut turns, 0.02);
        let mut body = body();
        let mut machine = StateMachine::new(&config());
        machine.init(&mut body, &mut ctx);

        machine.tick(&mut body, &mut ctx);
        assert_eq!(machine.current_state(), StateId::Walking);
        assert!((body.get_short_distance() - 15.0).abs() < 1e-9);

        let transition = machine.tick(&mut body, &mut ctx).unwrap();
        assert_eq!(transition.to, StateId::Running);
        drop(ctx);
        assert_eq!(cues.0, vec![AnimationCue::StartWalk, AnimationCue::StartRun]);
    }

    #[test]
    fn test_scenario_b_close_obstacle_ends_walking() {
        let scene = wall_ahead(8.0);
        let mut cues = CueLog::default();
        let mut turns = FixedTurns(0);
        let mut ctx = TickContext::new(&scene, &mut cues, &mut turns, 0.02);
        let mut body = body();
        let mut machine = StateMachine::new(&config());
        machine.init(&mut body, &mut ctx);
        machine.tick(&mut body, &mut ctx);

        // 壁へ向かって少しずつ前進
        let mut ticks = 0;
        while machine.current_state() == StateId::Walking {
            assert!(ticks < 1000, "walking never ended");
            body.position = body.position + body.forward * 0.05;
            machine.tick(&mut body, &mut ctx);
            ticks += 1;
        }

        assert_eq!(machine.current_state(), StateId::EndWalking);
        assert!(body.get_movement_distance() < 2.8);
        assert!(ticks > 1);
    }

    #[test]
    fn test_walking_stays_while_far() {
        let scene = wall_ahead(8.0);
        let mut cues = CueLog::default();
        let mut turns = FixedTurns(0);
        let mut ctx = TickContext::new(&scene, &mut cues, &mut turns, 0.02);
        let mut body = body();
        body.calculate_short_distance(&scene);

        let mut walking = WalkingState::new(&config());
        assert_eq!(walking.on_tick(&mut body, &mut ctx), None);
        assert!((body.get_movement_distance() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_walking_does_not_run_at_exact_run_distance() {
        let scene = wall_ahead(11.0);
        let mut cues = CueLog::default();
        let mut turns = FixedTurns(0);
        let mut ctx = TickContext::new(&scene, &mut cues, &mut turns, 0.02);
        let mut body = body();
        body.calculate_short_distance(&scene);
        assert_eq!(body.get_short_distance(), 11.0);

        let mut walking = WalkingState::new(&config());
        assert_eq!(walking.on_tick(&mut body, &mut ctx), None);
        assert_eq!(body.alignment_count, 0);
    }

    #[test]
    fn test_running_realigns_once_per_activation() {
        let scene = wall_ahead(20.0);
        let mut cues = CueLog::default();
        let mut turns = FixedTurns(0);
        let mut ctx = TickContext::new(&scene, &mut cues, &mut turns, 0.02);
        let mut body = body();
        body.calculate_short_distance(&scene);

        let mut running = RunningState::new(&config());
        for _ in 0..2 {
            running.on_enter(&mut body, &mut ctx);
            let before = body.alignment_count;
            for _ in 0..5 {
                assert_eq!(running.on_tick(&mut body, &mut ctx), None);
            }
            assert_eq!(body.alignment_count, before + 1);
        }
    }

    #[test]
    fn test_running_ends_below_threshold() {
        let scene = wall_ahead(20.0);
        let mut cues = CueLog::default();
        let mut turns = FixedTurns(0);
        let mut ctx = TickContext::new(&scene, &mut cues, &mut turns, 0.02);
        let mut body = body();
        body.calculate_short_distance(&scene);

        let mut running = RunningState::new(&config());
        running.on_enter(&mut body, &mut ctx);
        assert_eq!(running.on_tick(&mut body, &mut ctx), None);

        body.position = Position3D::new(14.5, 0.0, 0.0);
        assert_eq!(running.on_tick(&mut body, &mut ctx), Some(StateId::EndRunning));
    }

    #[test]
    fn test_running_continues_at_exact_stop_distance() {
        let scene = wall_ahead(20.0);
        let mut cues = CueLog::default();
        let mut turns = FixedTurns(0);
        let mut ctx = TickContext::new(&scene, &mut cues, &mut turns, 0.02);
        let mut body = body();
        body.calculate_short_distance(&scene);

        let mut running = RunningState::new(&config());
        running.on_enter(&mut body, &mut ctx);
        body.position = Position3D::new(14.0, 0.0, 0.0);
        assert_eq!(running.on_tick(&mut body, &mut ctx), None);
        assert_eq!(body.get_movement_distance(), 6.0);
    }

    #[test]
    fn test_end_running_waits_for_walk_stop_distance() {
        let scene = wall_ahead(10.0);
        let mut cues = CueLog::default();
        let mut turns = FixedTurns(0);
        let mut ctx = TickContext::new(&scene, &mut cues, &mut turns, 0.02);
        let mut body = body();
        body.calculate_short_distance(&scene);

        let mut end_running = EndRunningState::new(&config());
        body.position = Position3D::new(5.0, 0.0, 0.0);
        assert_eq!(end_running.on_tick(&mut body, &mut ctx), None);
        body.position = Position3D::new(7.5, 0.0, 0.0);
        assert_eq!(end_running.on_tick(&mut body, &mut ctx), Some(StateId::EndWalking));
    }

    #[test]
    fn test_end_walking_realigns_once_and_turns() {
        let scene = wall_ahead(10.0);
        let mut cues = CueLog::default();
        let mut turns = FixedTurns(0);
        let mut ctx = TickContext::new(&scene, &mut cues, &mut turns, 0.02);
        let mut body = body();
        body.calculate_short_distance(&scene);

        let mut end_walking = EndWalkingState::new();
        end_walking.on_enter(&mut body, &mut ctx);
        assert_eq!(end_walking.on_tick(&mut body, &mut ctx), Some(StateId::Turning));
        assert_eq!(body.alignment_count, 1);
        drop(ctx);
        assert_eq!(cues.0, vec![AnimationCue::StopWalk]);
    }

    #[test]
    fn test_scenario_c_single_turn_then_walk() {
        let scene = wall_ahead(6.0);
        let mut cues = CueLog::default();
        let mut turns = FixedTurns(0);
        let mut ctx = TickContext::new(&scene, &mut cues, &mut turns, 0.25);
        let mut body = body();

        let mut turning = TurningState::new(&config());
        turning.on_enter(&mut body, &mut ctx);
        assert_eq!(turning.extra_turns, 0);

        // 0.25秒刻みで7ティック = 1.75秒（まだ判定しない）
        for _ in 0..7 {
            assert_eq!(turning.on_tick(&mut body, &mut ctx), None);
        }
        assert_eq!(body.scan_count, 0);

        assert_eq!(turning.on_tick(&mut body, &mut ctx), Some(StateId::Walking));
        assert!((body.get_short_distance() - 6.0).abs() < 1e-9);
        assert_eq!(body.alignment_count, 1);
        assert!((body.forward.heading_deg() - 1.0).abs() < 1e-9);
        drop(ctx);
        assert_eq!(cues.count(AnimationCue::LeftTurn90), 1);
    }

    #[test]
    fn test_scenario_d_extra_turn_resets_timer() {
        let scene = wall_ahead(6.0);
        let mut cues = CueLog::default();
        let mut turns = FixedTurns(1);
        let mut ctx = TickContext::new(&scene, &mut cues, &mut turns, 0.25);
        let mut body = body();

        let mut turning = TurningState::new(&config());
        turning.on_enter(&mut body, &mut ctx);
        assert_eq!(turning.extra_turns, 1);

        for _ in 0..7 {
            turning.on_tick(&mut body, &mut ctx);
        }
        assert_eq!(turning.extra_turns, 1);

        // 1.8秒経過で追加旋回
        assert_eq!(turning.on_tick(&mut body, &mut ctx), None);
        assert_eq!(turning.extra_turns, 0);
        assert_eq!(turning.timer, 0.0);
        assert_eq!(body.scan_count, 0);

        for _ in 0..7 {
            assert_eq!(turning.on_tick(&mut body, &mut ctx), None);
        }
        assert_eq!(body.scan_count, 0);
        assert_eq!(turning.on_tick(&mut body, &mut ctx), Some(StateId::Walking));
        assert_eq!(body.scan_count, 1);
        drop(ctx);
        assert_eq!(cues.count(AnimationCue::LeftTurn90), 2);
    }

    #[test]
    fn test_blocked_after_turn_forces_extra_turn() {
        let scene = wall_ahead(4.0);
        let mut cues = CueLog::default();
        let mut turns = FixedTurns(0);
        let mut ctx = TickContext::new(&scene, &mut cues, &mut turns, 0.25);
        let mut body = body();

        let mut turning = TurningState::new(&config());
        turning.on_enter(&mut body, &mut ctx);
        for _ in 0..8 {
            assert_eq!(turning.on_tick(&mut body, &mut ctx), None);
        }
        assert_eq!(body.scan_count, 1);
        assert_eq!(turning.extra_turns, 1);
        assert_eq!(turning.timer, FORCED_TURN_TIMER);

        // 次のティックで即座に追加旋回
        assert_eq!(turning.on_tick(&mut body, &mut ctx), None);
        assert_eq!(turning.extra_turns, 0);

        // 塞がったままなら歩行へは戻らない
        for _ in 0..40 {
            assert_eq!(turning.on_tick(&mut body, &mut ctx), None);
        }
        drop(ctx);
        assert!(cues.count(AnimationCue::LeftTurn90) >= 3);
    }

    #[test]
    fn test_turning_at_exact_clear_distance_forces_extra_turn() {
        let scene = wall_ahead(5.0);
        let mut cues = CueLog::default();
        let mut turns = FixedTurns(0);
        let mut ctx = TickContext::new(&scene, &mut cues, &mut turns, 0.25);
        let mut body = body();

        let mut turning = TurningState::new(&config());
        turning.on_enter(&mut body, &mut ctx);
        for _ in 0..8 {
            assert_eq!(turning.on_tick(&mut body, &mut ctx), None);
        }
        assert_eq!(body.get_short_distance(), 5.0);
        assert_eq!(body.alignment_count, 0);
        assert_eq!(turning.extra_turns, 1);
        assert_eq!(turning.timer, FORCED_TURN_TIMER);
    }

    #[test]
    fn test_turning_reset_on_reentry() {
        let scene = wall_ahead(4.0);
        let mut cues = CueLog::default();
        let mut turns = FixedTurns(0);
        let mut ctx = TickContext::new(&scene, &mut cues, &mut turns, 0.25);
        let mut body = body();

        let mut turning = TurningState::new(&config());
        turning.on_enter(&mut body, &mut ctx);
        for _ in 0..8 {
            turning.on_tick(&mut body, &mut ctx);
        }
        assert_eq!(turning.timer, FORCED_TURN_TIMER);

        turning.on_enter(&mut body, &mut ctx);
        assert_eq!(turning.extra_turns, 0);
        assert_eq!(turning.timer, 0.0);
    }
}
