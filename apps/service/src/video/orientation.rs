//! Orientation math for captured frames.

use super::camera::CameraFacing;

/// Rotation tagged on each captured frame so the far end displays it upright.
pub fn frame_rotation(facing: CameraFacing, sensor_orientation: u32, display_rotation: u32) -> u32 {
    let sensor = sensor_orientation % 360;
    let display = display_rotation % 360;
    match facing {
        CameraFacing::Front => (sensor + display) % 360,
        CameraFacing::Back => (sensor + 360 - display) % 360,
    }
}

/// Rotation applied to the local preview. Front cameras are mirrored, so the
/// compensation runs the other way.
pub fn display_orientation(facing: CameraFacing, sensor_orientation: u32, display_rotation: u32) -> u32 {
    match facing {
        CameraFacing::Front => {
            let rotation = frame_rotation(facing, sensor_orientation, display_rotation);
            (360 - rotation) % 360
        }
        CameraFacing::Back => frame_rotation(facing, sensor_orientation, display_rotation),
    }
}

/// Frame dimensions as seen by the engine after `rotation` is applied.
pub fn rotated_size(width: u32, height: u32, rotation: u32) -> (u32, u32) {
    if rotation % 180 == 90 {
        (height, width)
    } else {
        (width, height)
    }
}
