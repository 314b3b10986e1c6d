use std::ops::{Add, Mul, Neg, Sub};

/// ゼロベクトル判定に使う許容誤差
pub const EPSILON: f64 = 1.0e-9;

/// 3次元ベクトル（位置・方向の両方に使用）
///
/// x, y が地表面、z が高さ方向（上方向）です。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3D {
    pub x: f64, // m
    pub y: f64, // m
    pub z: f64, // m (height)
}

/// 位置として使う場合の別名
pub type Position3D = Vector3D;

impl Vector3D {
    pub const UP: Self = Self { x: 0.0, y: 0.0, z: 1.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// 地表面上の方位角（度）から単位ベクトルを作成
    pub fn from_heading_deg(heading_deg: f64) -> Self {
        let rad = heading_deg.to_radians();
        Self::new(rad.cos(), rad.sin(), 0.0)
    }

    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// ベクトルの長さ
    pub fn magnitude(&self) -> f64 {
        (self.x.powi(2) + self.y.powi(2) + self.z.powi(2)).sqrt()
    }

    /// 正規化（長さがほぼゼロの場合はNone）
    pub fn normalize(&self) -> Option<Self> {
        let mag = self.magnitude();
        if mag < EPSILON {
            None
        } else {
            Some(Self::new(self.x / mag, self.y / mag, self.z / mag))
        }
    }

    /// XY平面（地表面）での2次元距離を計算
    pub fn distance_xy(&self, other: &Self) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// 3次元距離を計算
    pub fn distance_3d(&self, other: &Self) -> f64 {
        (*self - *other).magnitude()
    }

    /// 高さだけを差し替えたコピー
    pub fn with_z(&self, z: f64) -> Self {
        Self::new(self.x, self.y, z)
    }

    /// 地表面への射影（高さ成分をゼロにする）
    pub fn horizontal(&self) -> Self {
        self.with_z(0.0)
    }

    /// 任意軸まわりの回転（ロドリゲスの回転公式）
    ///
    /// 右手系で、軸の正方向から見て反時計回りが正の角度です。
    /// 軸がゼロベクトルの場合は回転しません。
    pub fn rotate_about(&self, axis: &Self, angle_deg: f64) -> Self {
        let Some(k) = axis.normalize() else {
            return *self;
        };
        let (sin, cos) = math_utils::deg_to_rad(angle_deg).sin_cos();
        *self * cos + k.cross(self) * sin + k * (k.dot(self) * (1.0 - cos))
    }

    /// XY平面での方位角（度）
    pub fn heading_deg(&self) -> f64 {
        math_utils::rad_to_deg(self.y.atan2(self.x))
    }
}

impl Add for Vector3D {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Vector3D {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f64> for Vector3D {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl Neg for Vector3D {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// 数学ユーティリティ関数
pub mod math_utils {
    /// 度をラジアンに変換
    pub fn deg_to_rad(degrees: f64) -> f64 {
        degrees * std::f64::consts::PI / 180.0
    }

    /// ラジアンを度に変換
    pub fn rad_to_deg(radians: f64) -> f64 {
        radians * 180.0 / std::f64::consts::PI
    }

    /// 角度を-180度〜180度の範囲に正規化
    pub fn normalize_angle(angle_deg: f64) -> f64 {
        let mut normalized = angle_deg % 360.0;
        if normalized > 180.0 {
            normalized -= 360.0;
        } else if normalized <= -180.0 {
            normalized += 360.0;
        }
        normalized
    }
}
