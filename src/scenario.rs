use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// シナリオメタデータ
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    pub description: String,
}

/// シミュレーション設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    pub dt_s: f64,
    pub t_max_s: f64,
    pub seed: u64,
}

/// 地表面上の点
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct PointConfig {
    pub x_m: f64,
    pub y_m: f64,
}

/// エージェント設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    pub id: String,
    pub position: PointConfig,
    /// 初期方位（度、+x軸から反時計回り）
    pub heading_deg: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            id: "avatar".to_string(),
            position: PointConfig::default(),
            heading_deg: 0.0,
        }
    }
}

/// 扇状レイセンサー設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SensorConfig {
    pub max_range_m: f64,
    pub ray_count: usize,
    pub start_angle_deg: f64,
    pub step_deg: f64,
    pub origin_height_m: f64,
    pub hit_height_m: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            max_range_m: 100.0,
            ray_count: 40,
            start_angle_deg: -10.0,
            step_deg: 0.5,
            origin_height_m: 0.2,
            hit_height_m: 0.4,
        }
    }
}

/// 行動しきい値設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// 歩行から走行へ移る最短距離（これより大きい場合）
    pub run_distance_m: f64,
    /// 歩行・減速を終える移動進捗距離（これ未満の場合）
    pub walk_stop_distance_m: f64,
    /// 走行を終える移動進捗距離（これ未満の場合）
    pub run_stop_distance_m: f64,
    /// 旋回後に歩行へ戻れる最短距離（これより大きい場合）
    pub turn_clear_distance_m: f64,
    /// 旋回キューの間隔（秒）
    pub turn_interval_s: f64,
    /// 向き合わせ後の固定回転（度）
    pub heading_bias_deg: f64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            run_distance_m: 11.0,
            walk_stop_distance_m: 2.8,
            run_stop_distance_m: 6.0,
            turn_clear_distance_m: 5.0,
            turn_interval_s: 1.8,
            heading_bias_deg: 1.0,
        }
    }
}

/// ルートモーション設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LocomotionConfig {
    pub walk_speed_mps: f64,
    pub run_speed_mps: f64,
    /// 90°旋回に要する時間（秒）
    pub turn_duration_s: f64,
}

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            walk_speed_mps: 1.4,
            run_speed_mps: 3.5,
            turn_duration_s: 1.8,
        }
    }
}

/// 部屋（外周の壁）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoomConfig {
    pub xmin_m: f64,
    pub xmax_m: f64,
    pub ymin_m: f64,
    pub ymax_m: f64,
    #[serde(default = "default_wall_height")]
    pub wall_height_m: f64,
}

fn default_wall_height() -> f64 {
    2.5
}

/// 障害物設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObstacleConfig {
    Pillar {
        center: PointConfig,
        radius_m: f64,
        #[serde(default = "default_wall_height")]
        height_m: f64,
    },
    Wall {
        from: PointConfig,
        to: PointConfig,
        #[serde(default = "default_wall_height")]
        height_m: f64,
    },
}

/// シーン設定
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SceneConfig {
    #[serde(default)]
    pub room: Option<RoomConfig>,
    #[serde(default)]
    pub obstacles: Vec<ObstacleConfig>,
}

/// 完全なシナリオ設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioConfig {
    pub meta: ScenarioMeta,
    pub sim: SimulationConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
    #[serde(default)]
    pub locomotion: LocomotionConfig,
    pub scene: SceneConfig,
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        // ファイル存在チェック
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path).map_err(|e| ScenarioError::IoError(path.to_path_buf(), e))?;

        let config: ScenarioConfig =
            serde_yaml::from_str(&contents).map_err(|e| ScenarioError::ParseError(path.to_path_buf(), e))?;

        config.validate()?;

        Ok(config)
    }

    /// YAML文字列からシナリオ設定を読み込み
    pub fn from_yaml_str(contents: &str) -> Result<Self, ScenarioError> {
        let config: ScenarioConfig =
            serde_yaml::from_str(contents).map_err(|e| ScenarioError::ParseError(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// 標準入力からシナリオ設定を読み込み
    pub fn from_stdin() -> Result<Self, ScenarioError> {
        let contents = std::io::read_to_string(std::io::stdin())
            .map_err(|e| ScenarioError::IoError(PathBuf::from("<stdin>"), e))?;
        Self::from_yaml_str(&contents)
    }

    /// 組み込みのデモシナリオ（柱のある部屋）
    pub fn built_in() -> Self {
        let pillar = |x_m: f64, y_m: f64, radius_m: f64| ObstacleConfig::Pillar {
            center: PointConfig { x_m, y_m },
            radius_m,
            height_m: 2.5,
        };

        Self {
            meta: ScenarioMeta {
                version: "1.0".to_string(),
                name: "built-in room".to_string(),
                description: "柱が3本ある 30m x 20m の部屋を徘徊する".to_string(),
            },
            sim: SimulationConfig {
                dt_s: 0.02,
                t_max_s: 120.0,
                seed: 42,
            },
            agent: AgentConfig::default(),
            sensor: SensorConfig::default(),
            behavior: BehaviorConfig::default(),
            locomotion: LocomotionConfig::default(),
            scene: SceneConfig {
                room: Some(RoomConfig {
                    xmin_m: -15.0,
                    xmax_m: 15.0,
                    ymin_m: -10.0,
                    ymax_m: 10.0,
                    wall_height_m: default_wall_height(),
                }),
                obstacles: vec![pillar(6.0, 4.0, 1.0), pillar(-7.0, -3.0, 1.5), pillar(2.0, -6.0, 0.8)],
            },
        }
    }

    /// 設定の基本的な検証
    ///
    /// 数値はすべて有限値であることを要求します（NaN・無限大は不可）。
    pub fn validate(&self) -> Result<(), ScenarioError> {
        // 時間設定の検証
        require_positive("sim.dt_s", self.sim.dt_s)?;
        if self.sim.dt_s < MIN_DT_S {
            return Err(ScenarioError::ValidationError(format!(
                "sim.dt_s must be at least {} (got {})",
                MIN_DT_S, self.sim.dt_s
            )));
        }
        require_positive("sim.t_max_s", self.sim.t_max_s)?;

        // エージェント初期値の検証
        require_finite("agent.position.x_m", self.agent.position.x_m)?;
        require_finite("agent.position.y_m", self.agent.position.y_m)?;
        require_finite("agent.heading_deg", self.agent.heading_deg)?;

        // センサー設定の検証
        if self.sensor.ray_count == 0 {
            return Err(ScenarioError::ValidationError("sensor.ray_count must be at least 1".to_string()));
        }
        require_positive("sensor.max_range_m", self.sensor.max_range_m)?;
        require_finite("sensor.start_angle_deg", self.sensor.start_angle_deg)?;
        require_finite("sensor.step_deg", self.sensor.step_deg)?;
        require_finite("sensor.origin_height_m", self.sensor.origin_height_m)?;
        require_finite("sensor.hit_height_m", self.sensor.hit_height_m)?;

        // しきい値の検証
        let behavior = &self.behavior;
        require_non_negative("behavior.run_distance_m", behavior.run_distance_m)?;
        require_non_negative("behavior.walk_stop_distance_m", behavior.walk_stop_distance_m)?;
        require_non_negative("behavior.run_stop_distance_m", behavior.run_stop_distance_m)?;
        require_non_negative("behavior.turn_clear_distance_m", behavior.turn_clear_distance_m)?;
        require_positive("behavior.turn_interval_s", behavior.turn_interval_s)?;
        require_finite("behavior.heading_bias_deg", behavior.heading_bias_deg)?;

        // ルートモーションの検証
        let locomotion = &self.locomotion;
        require_non_negative("locomotion.walk_speed_mps", locomotion.walk_speed_mps)?;
        require_non_negative("locomotion.run_speed_mps", locomotion.run_speed_mps)?;
        require_positive("locomotion.turn_duration_s", locomotion.turn_duration_s)?;

        // 部屋の検証
        if let Some(room) = &self.scene.room {
            for (name, value) in [
                ("room.xmin_m", room.xmin_m),
                ("room.xmax_m", room.xmax_m),
                ("room.ymin_m", room.ymin_m),
                ("room.ymax_m", room.ymax_m),
            ] {
                require_finite(name, value)?;
            }
            if room.xmin_m >= room.xmax_m || room.ymin_m >= room.ymax_m {
                return Err(ScenarioError::ValidationError("Invalid room bounds".to_string()));
            }
            require_positive("room.wall_height_m", room.wall_height_m)?;
            let pos = &self.agent.position;
            if pos.x_m <= room.xmin_m || pos.x_m >= room.xmax_m || pos.y_m <= room.ymin_m || pos.y_m >= room.ymax_m {
                return Err(ScenarioError::ValidationError("Agent outside room bounds".to_string()));
            }
        }

        // 障害物の検証
        for (index, obstacle) in self.scene.obstacles.iter().enumerate() {
            match obstacle {
                ObstacleConfig::Pillar {
                    center,
                    radius_m,
                    height_m,
                } => {
                    if !is_finite_point(center) || !is_positive(*radius_m) || !is_positive(*height_m) {
                        return Err(ScenarioError::ValidationError(format!(
                            "Obstacle {} (pillar) needs a finite center and positive radius and height",
                            index
                        )));
                    }
                }
                ObstacleConfig::Wall { from, to, height_m } => {
                    if !is_finite_point(from) || !is_finite_point(to) || from == to || !is_positive(*height_m) {
                        return Err(ScenarioError::ValidationError(format!(
                            "Obstacle {} (wall) needs distinct finite end points and positive height",
                            index
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== シミュレーション設定 ===");
        println!("時間刻み: {:.3}秒", self.sim.dt_s);
        println!("最大時間: {:.1}秒 ({:.1}分)", self.sim.t_max_s, self.sim.t_max_s / 60.0);
        println!("シード値: {}", self.sim.seed);
        println!();

        println!("=== エージェント ===");
        println!("ID: {}", self.agent.id);
        println!(
            "初期位置: ({:.1}, {:.1}) 方位 {:.1}°",
            self.agent.position.x_m, self.agent.position.y_m, self.agent.heading_deg
        );
        println!(
            "センサー: {}本 / {:.1}°〜 {:.1}°刻み / 最大 {:.0}m",
            self.sensor.ray_count, self.sensor.start_angle_deg, self.sensor.step_deg, self.sensor.max_range_m
        );
        println!();

        println!("=== シーン ===");
        match &self.scene.room {
            Some(room) => println!(
                "部屋: x {:.1}〜{:.1}m, y {:.1}〜{:.1}m",
                room.xmin_m, room.xmax_m, room.ymin_m, room.ymax_m
            ),
            None => println!("部屋: なし"),
        }
        println!("障害物: {}個", self.scene.obstacles.len());
    }
}

/// 時間刻みの下限（秒）
pub const MIN_DT_S: f64 = 1.0e-4;

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn is_finite_point(point: &PointConfig) -> bool {
    point.x_m.is_finite() && point.y_m.is_finite()
}

fn require_finite(name: &str, value: f64) -> Result<(), ScenarioError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ScenarioError::ValidationError(format!("{} must be finite (got {})", name, value)))
    }
}

fn require_positive(name: &str, value: f64) -> Result<(), ScenarioError> {
    if is_positive(value) {
        Ok(())
    } else {
        Err(ScenarioError::ValidationError(format!("{} must be positive (got {})", name, value)))
    }
}

fn require_non_negative(name: &str, value: f64) -> Result<(), ScenarioError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ScenarioError::ValidationError(format!("{} must not be negative (got {})", name, value)))
    }
}

/// シナリオ読み込みエラー
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("シナリオファイルが見つかりません: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("ファイル読み込みエラー {}: {}", .0.display(), .1)]
    IoError(PathBuf, #[source] std::io::Error),
    #[error("YAML解析エラー {}: {}", .0.display(), .1)]
    ParseError(PathBuf, #[source] serde_yaml::Error),
    #[error("設定検証エラー: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
meta:
  version: "1.0"
  name: test
  description: minimal
sim:
  dt_s: 0.02
  t_max_s: 10.0
  seed: 1
scene:
  room: { xmin_m: -5.0, xmax_m: 5.0, ymin_m: -5.0, ymax_m: 5.0 }
  obstacles:
    - kind: pillar
      center: { x_m: 2.0, y_m: 0.0 }
      radius_m: 0.5
    - kind: wall
      from: { x_m: -3.0, y_m: -3.0 }
      to: { x_m: -3.0, y_m: 3.0 }
      height_m: 1.0
"#;

    #[test]
    fn test_parse_minimal_with_defaults() {
        let config = ScenarioConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.sensor.ray_count, 40);
        assert_eq!(config.behavior.run_distance_m, 11.0);
        assert_eq!(config.behavior.turn_interval_s, 1.8);
        assert_eq!(config.agent.id, "avatar");
        assert_eq!(config.scene.obstacles.len(), 2);
        assert_eq!(config.scene.room.as_ref().unwrap().wall_height_m, 2.5);
        assert!(matches!(config.scene.obstacles[1], ObstacleConfig::Wall { height_m, .. } if height_m == 1.0));
    }

    #[test]
    fn test_validation_rejects_bad_dt() {
        let yaml = MINIMAL.replace("dt_s: 0.02", "dt_s: 0.0");
        let err = ScenarioConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, ScenarioError::ValidationError(_)));
    }

    #[test]
    fn test_validation_rejects_nan_dt() {
        let yaml = MINIMAL.replace("dt_s: 0.02", "dt_s: .nan");
        let err = ScenarioConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, ScenarioError::ValidationError(ref msg) if msg.contains("dt_s")));
    }

    #[test]
    fn test_validation_rejects_infinite_t_max() {
        let yaml = MINIMAL.replace("t_max_s: 10.0", "t_max_s: .inf");
        let err = ScenarioConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, ScenarioError::ValidationError(_)));
    }

    #[test]
    fn test_validation_rejects_tiny_dt() {
        let mut config = ScenarioConfig::built_in();
        config.sim.dt_s = 1e-20;
        config.sim.t_max_s = 1e-20;
        assert!(matches!(config.validate(), Err(ScenarioError::ValidationError(_))));

        config.sim.dt_s = MIN_DT_S;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_non_finite_behavior_and_locomotion() {
        let mut config = ScenarioConfig::built_in();
        config.behavior.turn_interval_s = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = ScenarioConfig::built_in();
        config.behavior.run_distance_m = f64::INFINITY;
        assert!(config.validate().is_err());

        let mut config = ScenarioConfig::built_in();
        config.locomotion.walk_speed_mps = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = ScenarioConfig::built_in();
        config.locomotion.turn_duration_s = f64::INFINITY;
        assert!(config.validate().is_err());

        let mut config = ScenarioConfig::built_in();
        config.scene.obstacles.push(ObstacleConfig::Pillar {
            center: PointConfig { x_m: f64::NAN, y_m: 0.0 },
            radius_m: 1.0,
            height_m: 2.0,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_agent_outside_room() {
        let mut config = ScenarioConfig::built_in();
        config.agent.position = PointConfig { x_m: 50.0, y_m: 0.0 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_rays() {
        let mut config = ScenarioConfig::built_in();
        config.sensor.ray_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_obstacle_kind_is_parse_error() {
        let yaml = MINIMAL.replace("kind: pillar", "kind: tree");
        let err = ScenarioConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, ScenarioError::ParseError(..)));
    }

    #[test]
    fn test_missing_file() {
        let err = ScenarioConfig::from_file("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, ScenarioError::FileNotFound(_)));
        assert!(err.to_string().contains("exist.yaml"));
    }

    #[test]
    fn test_shipped_scenarios_load() {
        for name in ["wander_room.yaml", "narrow_corridor.yaml"] {
            let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(name);
            let config = ScenarioConfig::from_file(&path).unwrap();
            assert!(config.scene.room.is_some(), "{}", name);
        }
    }

    #[test]
    fn test_built_in_is_valid() {
        assert!(ScenarioConfig::built_in().validate().is_ok());
    }
}
