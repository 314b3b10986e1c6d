//! # Simulation モジュール
//!
//! 徘徊エージェントの固定時間刻みシミュレーションを提供します。
//!
//! 各時間刻みで現在の行動状態の処理を1回だけ実行し、その後にルートモーション
//! （`Locomotion`）でエージェントを動かします。
//!
//! ## シミュレーション処理順序
//!
//! 1. **行動処理**: 現在状態の `on_tick`（必要なら感知、遷移）
//! 2. **ルートモーション**: 受信したキューに従って位置・向きを更新
//!
//! ## 使用例
//!
//! ```rust
//! use wandersim::simulation::SimulationEngine;
//! use wandersim::scenario::ScenarioConfig;
//!
//! let config = ScenarioConfig::from_file("scenarios/wander_room.yaml")?;
//!
//! let mut engine = SimulationEngine::new(config, 1);
//! engine.initialize()?;
//! engine.run()?;
//! ```

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tracing::{debug, info, trace};

use crate::models::*;
use crate::scenario::*;

/// 実行統計
#[derive(Debug, Clone, Default)]
pub struct SimulationStats {
    /// 総ステップ数
    pub step_count: u64,
    /// シミュレーション時刻（秒）
    pub simulated_time: f64,
    /// 遷移先ごとの遷移回数
    pub transitions: HashMap<StateId, u64>,
    /// キューごとの発行回数
    pub cues: HashMap<AnimationCue, usize>,
    /// 完了した徘徊サイクル数（Turning -> Walking の回数）
    pub cycles_completed: u64,
    /// 最短距離走査の回数
    pub scans: u64,
    /// 向き合わせの回数
    pub alignments: u64,
    /// 診断描画したレイの本数
    pub ray_segments: u64,
}

impl SimulationStats {
    pub fn transitions_to(&self, state: StateId) -> u64 {
        self.transitions.get(&state).copied().unwrap_or(0)
    }
}

/// 保持する直近の状態遷移の件数
pub const TRANSITION_HISTORY_LEN: usize = 64;

/// レイの診断描画をtraceログへ出力する描画先
#[derive(Debug, Default)]
pub struct RayTrace {
    pub segments: u64,
}

impl IRayDebug for RayTrace {
    fn draw_segment(&mut self, from: Position3D, to: Position3D) {
        self.segments += 1;
        trace!(
            "レイ: ({:.2}, {:.2}, {:.2}) -> ({:.2}, {:.2}, {:.2})",
            from.x, from.y, from.z, to.x, to.y, to.z
        );
    }
}

pub struct SimulationEngine {
    pub current_time: f64,
    pub dt: f64,
    pub max_time: f64,
    pub step_count: u64,

    pub agent: Agent,
    pub scene: ObstacleScene,
    pub locomotion: Locomotion,
    pub turns: RandomTurns,
    /// 診断描画先（有効時のみ）
    pub ray_trace: Option<RayTrace>,
    /// 直近の状態遷移（最大 `TRANSITION_HISTORY_LEN` 件）
    pub recent_transitions: VecDeque<(f64, Transition)>,
    transition_counts: HashMap<StateId, u64>,
    cycles_completed: u64,
    /// 初期化直後に要求する状態番号
    initial_state_request: Option<i32>,

    pub scenario_config: ScenarioConfig,
    pub verbose_level: u8,
    initialized: bool,
}

impl SimulationEngine {
    pub fn new(scenario: ScenarioConfig, verbose_level: u8) -> Self {
        let agent_config = &scenario.agent;
        let body = AgentBody::new(
            Position3D::new(agent_config.position.x_m, agent_config.position.y_m, 0.0),
            Vector3D::from_heading_deg(agent_config.heading_deg),
            RayFanSensor::from_config(&scenario.sensor),
            scenario.behavior.heading_bias_deg,
        );
        let agent = Agent::new(agent_config.id.clone(), body, &scenario.behavior);

        Self {
            current_time: 0.0,
            dt: scenario.sim.dt_s,
            max_time: scenario.sim.t_max_s,
            step_count: 0,
            agent,
            scene: ObstacleScene::from_config(&scenario.scene),
            locomotion: Locomotion::new(&scenario.locomotion),
            turns: RandomTurns::from_seed(scenario.sim.seed),
            ray_trace: None,
            recent_transitions: VecDeque::with_capacity(TRANSITION_HISTORY_LEN),
            transition_counts: HashMap::new(),
            cycles_completed: 0,
            initial_state_request: None,
            scenario_config: scenario,
            verbose_level,
            initialized: false,
        }
    }

    /// レイの診断描画を有効化
    pub fn with_ray_trace(mut self) -> Self {
        self.ray_trace = Some(RayTrace::default());
        self
    }

    /// 初期化直後に番号指定で状態を要求（未知の番号は無視される）
    pub fn with_initial_state(mut self, raw_state: i32) -> Self {
        self.initial_state_request = Some(raw_state);
        self
    }

    /// 初期状態の開始処理
    pub fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.initialized {
            return Ok(());
        }

        let mut ctx = TickContext::new(&self.scene, &mut self.locomotion, &mut self.turns, self.dt);
        self.agent.start(&mut ctx);
        if let Some(raw_state) = self.initial_state_request {
            if self.agent.change_state(raw_state, &mut ctx) {
                info!("初期状態を {} に変更", self.agent.current_state());
            }
        }
        self.initialized = true;

        if self.verbose_level > 0 {
            info!("初期化完了:");
            info!("  シナリオ: {}", self.scenario_config.meta.name);
            info!("  エージェント: {}", self.agent.get_id());
            info!("  障害物: {}個", self.scene.obstacles.len());
            info!("  初期状態: {}", self.agent.current_state());
        }

        Ok(())
    }

    /// シミュレーションを最後まで実行（待ち時間なし）
    pub fn run(&mut self) -> Result<SimulationStats, Box<dyn std::error::Error>> {
        self.initialize()?;
        info!("=== シミュレーション実行開始 ===");

        while self.current_time < self.max_time {
            self.step();
            self.report_progress();
        }

        self.finish()
    }

    /// 実時間に合わせてシミュレーションを実行
    pub async fn run_realtime(&mut self) -> Result<SimulationStats, Box<dyn std::error::Error>> {
        self.initialize()?;
        info!("=== シミュレーション実行開始（実時間） ===");

        let mut interval = tokio::time::interval(Duration::from_secs_f64(self.dt));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while self.current_time < self.max_time {
            interval.tick().await;
            self.step();
            self.report_progress();
        }

        self.finish()
    }

    fn report_progress(&self) {
        if self.verbose_level > 2 {
            trace!(
                "時刻: {:.2}秒 (ステップ: {}) 状態: {}",
                self.current_time,
                self.step_count,
                self.agent.current_state()
            );
        }

        // 約10秒ごと
        let progress_every = (10.0 / self.dt).round().clamp(1.0, u64::MAX as f64) as u64;
        if self.step_count % progress_every == 0 && self.verbose_level > 0 {
            let progress = (self.current_time / self.max_time) * 100.0;
            info!(
                "進行状況: {:.1}% ({:.1}/{:.1}秒) 状態: {} 位置: ({:.2}, {:.2}) 方位: {:.1}°",
                progress,
                self.current_time,
                self.max_time,
                self.agent.current_state(),
                self.agent.body.position.x,
                self.agent.body.position.y,
                math_utils::normalize_angle(self.agent.body.forward.heading_deg())
            );
        }
    }

    fn finish(&self) -> Result<SimulationStats, Box<dyn std::error::Error>> {
        let stats = self.stats();
        info!("=== シミュレーション完了 ===");
        info!("実行時間: {:.1}秒", stats.simulated_time);
        info!("総ステップ数: {}", stats.step_count);
        info!("徘徊サイクル: {}回", stats.cycles_completed);
        Ok(stats)
    }

    /// 1時間刻み分の処理
    pub fn step(&mut self) -> Option<Transition> {
        let transition = {
            let mut ctx = TickContext::new(&self.scene, &mut self.locomotion, &mut self.turns, self.dt);
            if let Some(sink) = self.ray_trace.as_mut() {
                ctx = ctx.with_debug(sink);
            }
            self.agent.tick(&mut ctx)
        };

        if let Some(t) = transition {
            if self.verbose_level > 1 {
                debug!(
                    "t={:.2}s {} -> {} (最短距離 {:.2}m, 移動進捗 {:.2}m, 交差点 {:?})",
                    self.current_time,
                    t.from,
                    t.to,
                    self.agent.body.get_short_distance(),
                    self.agent.body.get_movement_distance(),
                    self.agent.body.get_hit_point()
                );
            }
            self.record_transition(t);
        }

        self.locomotion.advance(&mut self.agent.body, self.dt);

        self.current_time += self.dt;
        self.step_count += 1;
        transition
    }

    fn record_transition(&mut self, t: Transition) {
        *self.transition_counts.entry(t.to).or_insert(0) += 1;
        if t.from == StateId::Turning && t.to == StateId::Walking {
            self.cycles_completed += 1;
        }

        if self.recent_transitions.len() == TRANSITION_HISTORY_LEN {
            self.recent_transitions.pop_front();
        }
        self.recent_transitions.push_back((self.current_time, t));
    }

    /// 実行統計の集計
    pub fn stats(&self) -> SimulationStats {
        let cues = AnimationCue::ALL
            .iter()
            .map(|cue| (*cue, self.locomotion.cue_count(*cue)))
            .collect();

        SimulationStats {
            step_count: self.step_count,
            simulated_time: self.current_time,
            transitions: self.transition_counts.clone(),
            cues,
            cycles_completed: self.cycles_completed,
            scans: self.agent.body.scan_count,
            alignments: self.agent.body.alignment_count,
            ray_segments: self.ray_trace.as_ref().map_or(0, |sink| sink.segments),
        }
    }
}

/// 統計の表示
pub fn print_stats(stats: &SimulationStats) {
    println!("=== 実行統計 ===");
    println!("総ステップ数: {}", stats.step_count);
    println!("シミュレーション時刻: {:.2}秒", stats.simulated_time);
    println!("徘徊サイクル: {}回", stats.cycles_completed);
    println!("最短距離走査: {}回 / 向き合わせ: {}回", stats.scans, stats.alignments);
    if stats.ray_segments > 0 {
        println!("診断レイ描画: {}本", stats.ray_segments);
    }
    println!("状態遷移:");
    for state in StateId::ALL {
        println!("  -> {:<10} {}回", state.as_str(), stats.transitions_to(state));
    }
    println!("アニメーションキュー:");
    for cue in AnimationCue::ALL {
        println!("  {:<10} {}回", cue.as_str(), stats.cues.get(&cue).copied().unwrap_or(0));
    }
}
