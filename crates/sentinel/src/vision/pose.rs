//! Pose policies over the head-pose primitive.

use sentinel_common::constants::{CENTER_YAW_LIMIT_DEG, TURN_YAW_MIN_DEG};
use sentinel_common::{ChallengeAction, Gaze, HeadPose};

/// Does `pose` satisfy the liveness `action`? Yaw only; pitch is ignored.
pub fn satisfies(action: ChallengeAction, pose: &HeadPose) -> bool {
    if !pose.detected {
        return false;
    }

    let yaw = pose.yaw;
    match action {
        ChallengeAction::LookCenter => (-CENTER_YAW_LIMIT_DEG..=CENTER_YAW_LIMIT_DEG).contains(&yaw),
        ChallengeAction::TurnLeft => yaw < -TURN_YAW_MIN_DEG,
        ChallengeAction::TurnRight => yaw > TURN_YAW_MIN_DEG,
    }
}

/// Classify gaze for proctoring. Undetected faces count as looking away.
pub fn classify_gaze(pose: &HeadPose, angle_limit_deg: f64) -> Gaze {
    if !pose.detected || pose.yaw.abs() > angle_limit_deg || pose.pitch.abs() > angle_limit_deg {
        Gaze::Off
    } else {
        Gaze::Center
    }
}
