//! Blocking drive-base primitives.
//!
//! This is the hardware boundary: a handful of motor and sensor calls with
//! no error channel beyond the sample itself. All retry and recovery logic
//! lives in the controller above.

/// Left drive motor.
pub const MOTOR_LEFT: u8 = 0x01;
/// Right drive motor.
pub const MOTOR_RIGHT: u8 = 0x02;
/// Both drive motors.
pub const MOTOR_BOTH: u8 = MOTOR_LEFT | MOTOR_RIGHT;

/// Drive-base abstraction.
///
/// Timed commands are issued to the base and complete on their own;
/// [`Drive::wait_idle`] blocks on the completion signal so that no two
/// maneuvers ever overlap and no sample is taken mid-maneuver.
pub trait Drive {
    /// Start the motors in `ports` at `power` percent and return.
    fn start(&mut self, ports: u8, power: i8);

    /// Stop all motors. `brake` holds position instead of coasting.
    fn stop_all(&mut self, brake: bool);

    /// Issue a timed command: ramp up, run, ramp down (milliseconds).
    fn timed(&mut self, ports: u8, power: i8, ramp_up_ms: u32, run_ms: u32, ramp_down_ms: u32);

    /// Block until every issued timed command has run to completion.
    fn wait_idle(&mut self);

    /// Latest raw color sample from the downward sensor, as RGB.
    fn read_color(&mut self) -> [i32; 3];
}
