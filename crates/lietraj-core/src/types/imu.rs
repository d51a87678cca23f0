use serde::{Deserialize, Serialize};

use crate::{Real, Vec3};

/// One IMU reading.
///
/// `gyro` is the angular rate in rad/s and `acce` the specific force in m/s²,
/// both expressed in the sensor frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuFrame {
    pub timestamp: Real,
    pub gyro: Vec3,
    pub acce: Vec3,
}

impl ImuFrame {
    pub fn new(timestamp: Real, gyro: Vec3, acce: Vec3) -> Self {
        Self {
            timestamp,
            gyro,
            acce,
        }
    }

    /// A frame carrying only a gyroscope reading.
    pub fn gyro_only(timestamp: Real, gyro: Vec3) -> Self {
        Self::new(timestamp, gyro, Vec3::zeros())
    }
}
