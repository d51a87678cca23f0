mod imu;
mod pose;

pub use imu::ImuFrame;
pub use pose::Pose;
