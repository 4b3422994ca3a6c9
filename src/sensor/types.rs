//! Sensor kinds and the readings produced for each native sample.

use serde::{Deserialize, Serialize};

/// Motion sensors exposed by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SensorType {
    Accelerometer,
    Gyroscope,
    /// Acceleration with gravity removed ("user acceleration").
    LinearAcceleration,
    Magnetometer,
}

impl SensorType {
    /// All sensor types, in channel registration order.
    pub const ALL: [SensorType; 4] = [
        SensorType::Accelerometer,
        SensorType::Gyroscope,
        SensorType::LinearAcceleration,
        SensorType::Magnetometer,
    ];

    /// Short lowercase name used in configuration and channel identifiers.
    pub fn name(&self) -> &'static str {
        match self {
            SensorType::Accelerometer => "accelerometer",
            SensorType::Gyroscope => "gyroscope",
            SensorType::LinearAcceleration => "user_accel",
            SensorType::Magnetometer => "magnetometer",
        }
    }

    /// Parse a sensor name; accepts the channel name and a few aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "accelerometer" | "accel" => Some(SensorType::Accelerometer),
            "gyroscope" | "gyro" => Some(SensorType::Gyroscope),
            "user_accel" | "linear_acceleration" | "linear" => {
                Some(SensorType::LinearAcceleration)
            }
            "magnetometer" | "mag" => Some(SensorType::Magnetometer),
            _ => None,
        }
    }
}

impl std::fmt::Display for SensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One sample from a motion sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Native sample timestamp in microseconds
    pub timestamp_micros: u64,
}

impl SensorReading {
    pub fn new(x: f64, y: f64, z: f64, timestamp_micros: u64) -> Self {
        Self {
            x,
            y,
            z,
            timestamp_micros,
        }
    }

    /// Euclidean norm of the three axes.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_names_round_trip() {
        for sensor in SensorType::ALL {
            assert_eq!(SensorType::from_name(sensor.name()), Some(sensor));
        }
        assert_eq!(SensorType::from_name("barometer"), None);
    }

    #[test]
    fn test_reading_magnitude() {
        let reading = SensorReading::new(3.0, 4.0, 0.0, 1);
        assert!((reading.magnitude() - 5.0).abs() < 0.001);
    }
}
