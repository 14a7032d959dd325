//! Unit/Frame Normalizer – raw sensor groups to canonical SI messages.
//!
//! Every conversion is a pure function of the current sample; nothing here
//! remembers a previous frame. Absence of a group simply skips that output
//! message.
//!
//! # Angle convention
//!
//! The phone reports device Euler angles `(alpha, beta, gamma)` in degrees.
//! The canonical mapping used everywhere in this crate is
//! `alpha → yaw (Z)`, `beta → pitch (Y)`, `gamma → roll (X)`, composed in
//! ZYX intrinsic order: `q = qz(yaw) ⊗ qy(pitch) ⊗ qx(roll)`.

use phonelink_types::{
    BatteryMessage, ChargeStatus, Covariance3, CovarianceType, EulerAngles, GpsFixMessage,
    ImuMessage, MotionMessage, NormalizedMessage, OrientationMessage, Quaternion, SensorSample,
    Vector3,
};

/// Standard gravity used for the g → m/s² conversion.
pub const STANDARD_GRAVITY: f64 = 9.81;

/// Horizontal accuracy (metres) assumed when a GPS fix omits it.
pub const DEFAULT_GPS_ACCURACY: f64 = 10.0;

/// Fixed variance marker for IMU angular velocity and linear acceleration.
const IMU_RATE_VARIANCE: f64 = 0.01;

/// Produce every normalized message the sample's present groups allow.
///
/// An IMU message requires both accelerometer and gyroscope; all other
/// messages depend on a single group. An empty sample yields an empty vec.
pub fn normalize(sample: &SensorSample) -> Vec<NormalizedMessage> {
    let mut out = Vec::new();

    if let (Some(accel), Some(gyro)) = (sample.accelerometer, sample.gyroscope) {
        out.push(NormalizedMessage::Imu(imu_message(
            accel,
            gyro,
            sample.orientation.as_ref(),
        )));
    }
    if let Some(gps) = sample.gps {
        out.push(NormalizedMessage::GpsFix(gps_message(
            gps.latitude,
            gps.longitude,
            gps.altitude,
            gps.accuracy,
        )));
    }
    if let Some(battery) = sample.battery {
        out.push(NormalizedMessage::Battery(BatteryMessage {
            // Raw 0–1 fraction, deliberately unclamped.
            percentage: battery.level.unwrap_or(0.0),
            voltage: battery.voltage.unwrap_or(0.0),
            status: match battery.charging {
                Some(true) => ChargeStatus::Charging,
                Some(false) => ChargeStatus::NotCharging,
                None => ChargeStatus::Unknown,
            },
            present: true,
        }));
    }
    if let Some(motion) = sample.device_motion {
        out.push(NormalizedMessage::Motion(MotionMessage {
            // userAcceleration is already in m/s²; no g-scaling.
            linear: motion.user_acceleration.unwrap_or_default(),
            angular: motion
                .rotation_rate
                .map(deg_vec_to_rad)
                .unwrap_or_default(),
        }));
    }
    if let Some(orientation) = &sample.orientation {
        out.push(NormalizedMessage::Orientation(OrientationMessage {
            quaternion: orientation_quaternion(orientation),
        }));
    }

    out
}

// ────────────────────────────────────────────────────────────────────────────
// Conversions
// ────────────────────────────────────────────────────────────────────────────

/// g → m/s², component-wise.
pub fn g_to_ms2(v: Vector3) -> Vector3 {
    Vector3::new(
        v.x * STANDARD_GRAVITY,
        v.y * STANDARD_GRAVITY,
        v.z * STANDARD_GRAVITY,
    )
}

/// deg/s → rad/s, component-wise.
pub fn deg_vec_to_rad(v: Vector3) -> Vector3 {
    Vector3::new(v.x.to_radians(), v.y.to_radians(), v.z.to_radians())
}

/// Build a unit quaternion from yaw/pitch/roll in radians via the ZYX
/// intrinsic half-angle composition.
pub fn euler_to_quaternion(yaw: f64, pitch: f64, roll: f64) -> Quaternion {
    let (sy, cy) = (yaw * 0.5).sin_cos();
    let (sp, cp) = (pitch * 0.5).sin_cos();
    let (sr, cr) = (roll * 0.5).sin_cos();

    Quaternion::new(
        cy * cp * cr + sy * sp * sr,
        cy * cp * sr - sy * sp * cr,
        sy * cp * sr + cy * sp * cr,
        sy * cp * cr - cy * sp * sr,
    )
}

/// Apply the canonical `alpha→yaw, beta→pitch, gamma→roll` mapping to a
/// degree-valued Euler triple.
fn orientation_quaternion(angles: &EulerAngles) -> Quaternion {
    euler_to_quaternion(
        angles.alpha.to_radians(),
        angles.beta.to_radians(),
        angles.gamma.to_radians(),
    )
}

fn imu_message(accel: Vector3, gyro: Vector3, orientation: Option<&EulerAngles>) -> ImuMessage {
    // Orientation covariance: -1 in [0] marks "no estimate" when the phone
    // did not report angles alongside this frame.
    let mut orientation_covariance: Covariance3 = [0.0; 9];
    orientation_covariance[0] = -1.0;
    let mut rate_covariance: Covariance3 = [0.0; 9];
    rate_covariance[0] = IMU_RATE_VARIANCE;

    ImuMessage {
        linear_acceleration: g_to_ms2(accel),
        angular_velocity: deg_vec_to_rad(gyro),
        orientation: orientation.map(orientation_quaternion),
        orientation_covariance,
        angular_velocity_covariance: rate_covariance,
        linear_acceleration_covariance: rate_covariance,
    }
}

fn gps_message(
    latitude: f64,
    longitude: f64,
    altitude: Option<f64>,
    accuracy: Option<f64>,
) -> GpsFixMessage {
    let accuracy = accuracy.unwrap_or(DEFAULT_GPS_ACCURACY);
    let variance = accuracy * accuracy;
    let mut covariance: Covariance3 = [0.0; 9];
    covariance[0] = variance;
    covariance[4] = variance;
    covariance[8] = variance;

    GpsFixMessage {
        latitude,
        longitude,
        altitude: altitude.unwrap_or(0.0),
        position_covariance: covariance,
        position_covariance_type: CovarianceType::DiagonalKnown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phonelink_types::{BatteryReading, DeviceMotion, GpsReading};
    use std::f64::consts::PI;

    fn battery_only_sample(level: f64) -> SensorSample {
        SensorSample {
            battery: Some(BatteryReading {
                level: Some(level),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn one_g_is_exactly_9_81() {
        let v = g_to_ms2(Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(v.x, 9.81);
    }

    #[test]
    fn deg_180_per_s_is_pi_rad() {
        let v = deg_vec_to_rad(Vector3::new(180.0, 0.0, 0.0));
        assert!((v.x - PI).abs() < 1e-9);
    }

    #[test]
    fn quaternion_norm_is_unit_across_angle_grid() {
        for alpha in [-720.0, -180.0, -33.3, 0.0, 12.5, 90.0, 359.9, 1080.0] {
            for beta in [-180.0, -45.0, 0.0, 60.0, 179.0] {
                for gamma in [-90.0, 0.0, 30.0, 270.0] {
                    let q = orientation_quaternion(&EulerAngles { alpha, beta, gamma });
                    assert!(
                        (q.norm() - 1.0).abs() <= 1e-6,
                        "norm {} for ({alpha}, {beta}, {gamma})",
                        q.norm()
                    );
                }
            }
        }
    }

    #[test]
    fn zero_angles_give_identity_quaternion() {
        let q = euler_to_quaternion(0.0, 0.0, 0.0);
        assert!((q.w - 1.0).abs() < 1e-12);
        assert!(q.x.abs() < 1e-12 && q.y.abs() < 1e-12 && q.z.abs() < 1e-12);
    }

    #[test]
    fn pure_yaw_rotates_about_z() {
        // 90° yaw: q = (cos45°, 0, 0, sin45°).
        let q = euler_to_quaternion((90.0f64).to_radians(), 0.0, 0.0);
        assert!((q.w - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-9);
        assert!(q.x.abs() < 1e-9);
        assert!(q.y.abs() < 1e-9);
        assert!((q.z - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-9);
    }

    #[test]
    fn battery_only_sample_yields_exactly_one_message() {
        let messages = normalize(&battery_only_sample(0.8));
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            NormalizedMessage::Battery(b) => {
                assert!((b.percentage - 0.8).abs() < f64::EPSILON);
                assert_eq!(b.status, ChargeStatus::Unknown);
                assert!(b.present);
            }
            other => panic!("expected Battery, got {other:?}"),
        }
    }

    #[test]
    fn battery_percentage_is_not_clamped() {
        // Some clients report 0–100; the normalizer passes it through.
        let messages = normalize(&battery_only_sample(87.0));
        let NormalizedMessage::Battery(b) = &messages[0] else {
            panic!("expected Battery");
        };
        assert!((b.percentage - 87.0).abs() < f64::EPSILON);
    }

    #[test]
    fn charging_flag_maps_to_status() {
        let mut sample = battery_only_sample(0.5);
        sample.battery.as_mut().unwrap().charging = Some(true);
        let NormalizedMessage::Battery(b) = &normalize(&sample)[0] else {
            panic!("expected Battery");
        };
        assert_eq!(b.status, ChargeStatus::Charging);

        sample.battery.as_mut().unwrap().charging = Some(false);
        let NormalizedMessage::Battery(b) = &normalize(&sample)[0] else {
            panic!("expected Battery");
        };
        assert_eq!(b.status, ChargeStatus::NotCharging);
    }

    #[test]
    fn empty_sample_yields_nothing() {
        assert!(normalize(&SensorSample::default()).is_empty());
    }

    #[test]
    fn accelerometer_alone_yields_no_imu() {
        let sample = SensorSample {
            accelerometer: Some(Vector3::new(0.0, 0.0, 1.0)),
            ..Default::default()
        };
        assert!(normalize(&sample).is_empty());
    }

    #[test]
    fn imu_converts_both_axes_groups() {
        let sample = SensorSample {
            accelerometer: Some(Vector3::new(1.0, 0.0, -1.0)),
            gyroscope: Some(Vector3::new(180.0, 90.0, 0.0)),
            ..Default::default()
        };
        let messages = normalize(&sample);
        assert_eq!(messages.len(), 1);
        let NormalizedMessage::Imu(imu) = &messages[0] else {
            panic!("expected Imu");
        };
        assert_eq!(imu.linear_acceleration.x, 9.81);
        assert_eq!(imu.linear_acceleration.z, -9.81);
        assert!((imu.angular_velocity.x - PI).abs() < 1e-9);
        assert!((imu.angular_velocity.y - PI / 2.0).abs() < 1e-9);
        assert!(imu.orientation.is_none());
        assert_eq!(imu.orientation_covariance[0], -1.0);
        assert_eq!(imu.angular_velocity_covariance[0], 0.01);
        assert_eq!(imu.linear_acceleration_covariance[0], 0.01);
    }

    #[test]
    fn imu_with_orientation_carries_unit_quaternion() {
        let sample = SensorSample {
            accelerometer: Some(Vector3::new(0.0, 0.0, 1.0)),
            gyroscope: Some(Vector3::zero()),
            orientation: Some(EulerAngles {
                alpha: 90.0,
                beta: 45.0,
                gamma: -30.0,
            }),
            ..Default::default()
        };
        // Both an IMU and a standalone orientation message are produced, and
        // they carry the same quaternion from the same canonical mapping.
        let messages = normalize(&sample);
        assert_eq!(messages.len(), 2);
        let NormalizedMessage::Imu(imu) = &messages[0] else {
            panic!("expected Imu first");
        };
        let NormalizedMessage::Orientation(o) = &messages[1] else {
            panic!("expected Orientation second");
        };
        let q = imu.orientation.unwrap();
        assert!((q.norm() - 1.0).abs() <= 1e-6);
        assert_eq!(q, o.quaternion);
    }

    #[test]
    fn gps_covariance_is_accuracy_squared() {
        let sample = SensorSample {
            gps: Some(GpsReading {
                latitude: 37.0,
                longitude: -122.0,
                altitude: None,
                accuracy: Some(5.0),
            }),
            ..Default::default()
        };
        let NormalizedMessage::GpsFix(fix) = &normalize(&sample)[0] else {
            panic!("expected GpsFix");
        };
        assert_eq!(fix.latitude, 37.0);
        assert_eq!(fix.longitude, -122.0);
        assert_eq!(fix.altitude, 0.0);
        assert_eq!(fix.position_covariance[0], 25.0);
        assert_eq!(fix.position_covariance[4], 25.0);
        assert_eq!(fix.position_covariance[8], 25.0);
        assert_eq!(fix.position_covariance[1], 0.0);
        assert_eq!(fix.position_covariance_type, CovarianceType::DiagonalKnown);
    }

    #[test]
    fn gps_without_accuracy_uses_default() {
        let sample = SensorSample {
            gps: Some(GpsReading {
                latitude: 1.0,
                longitude: 2.0,
                altitude: Some(100.0),
                accuracy: None,
            }),
            ..Default::default()
        };
        let NormalizedMessage::GpsFix(fix) = &normalize(&sample)[0] else {
            panic!("expected GpsFix");
        };
        assert_eq!(fix.position_covariance[0], 100.0); // 10.0²
        assert_eq!(fix.altitude, 100.0);
    }

    #[test]
    fn motion_rotation_rate_converts_but_linear_passes_through() {
        let sample = SensorSample {
            device_motion: Some(DeviceMotion {
                user_acceleration: Some(Vector3::new(0.5, 0.0, 0.0)),
                rotation_rate: Some(Vector3::new(180.0, 0.0, 0.0)),
            }),
            ..Default::default()
        };
        let NormalizedMessage::Motion(twist) = &normalize(&sample)[0] else {
            panic!("expected Motion");
        };
        // Already SI; must not be multiplied by 9.81.
        assert_eq!(twist.linear.x, 0.5);
        assert!((twist.angular.x - PI).abs() < 1e-9);
    }

    #[test]
    fn motion_with_only_rotation_rate_zeroes_linear() {
        let sample = SensorSample {
            device_motion: Some(DeviceMotion {
                user_acceleration: None,
                rotation_rate: Some(Vector3::new(0.0, 0.0, 90.0)),
            }),
            ..Default::default()
        };
        let NormalizedMessage::Motion(twist) = &normalize(&sample)[0] else {
            panic!("expected Motion");
        };
        assert_eq!(twist.linear, Vector3::zero());
        assert!((twist.angular.z - PI / 2.0).abs() < 1e-9);
    }

    #[test]
    fn normalize_is_pure_across_repeated_calls() {
        let sample = SensorSample {
            accelerometer: Some(Vector3::new(0.3, 0.1, 0.9)),
            gyroscope: Some(Vector3::new(5.0, -5.0, 0.0)),
            ..Default::default()
        };
        assert_eq!(normalize(&sample), normalize(&sample));
    }
}
