// 基本的なデータ型と数学ユーティリティ
pub mod common;

// 外部協調オブジェクトと行動状態のインターフェース（trait）定義
pub mod traits;

// 感知・エージェント・行動
pub mod sensor;
pub mod agent;
pub mod state_machine;
pub mod states;

// エンジン側の代替実装（シーン・ルートモーション）
pub mod scene;
pub mod locomotion;

// 便利な re-export
pub use common::*;
pub use traits::*;
pub use sensor::RayFanSensor;
pub use agent::{Agent, AgentBody};
pub use state_machine::{StateId, TickContext, Transition};
pub use scene::ObstacleScene;
pub use locomotion::Locomotion;
