// src/navigation/drive.rs
// Differential drive: signed percent power per wheel mapped onto direction + 16-bit duty.

use log::trace;

use crate::hardware::{Direction, DriveCapability, MotorId};

/// Full-scale duty cycle
pub const MAX_DUTY: u16 = u16::MAX;

/// Map a percent power onto the duty range, clamping to 0..=100.
pub fn normalise_power(power: f32) -> u16 {
    let clamped = power.clamp(0.0, 100.0);
    (f32::from(MAX_DUTY) * (clamped / 100.0)) as u16
}

/// One wheel: remembers the commanded base power so corrections are applied around it.
#[derive(Debug, Clone)]
pub struct MotorChannel {
    motor: MotorId,
    bias: i32,
    base_power: f32,
    power: f32,
}

impl MotorChannel {
    pub fn new(motor: MotorId, bias: i32) -> Self {
        MotorChannel {
            motor,
            bias,
            base_power: 0.0,
            power: 0.0,
        }
    }

    /// Power the PD loop corrects around
    pub fn base_power(&self) -> f32 {
        self.base_power
    }

    /// Power last sent to the driver
    pub fn power(&self) -> f32 {
        self.power
    }

    fn sign(power: f32) -> f32 {
        if power >= 0.0 { 1.0 } else { -1.0 }
    }

    /// Set a new base power, positive forward.
    pub fn set_base(&mut self, drive: &mut dyn DriveCapability, power: f32) {
        self.base_power = power;
        self.write(drive, power);
    }

    /// Apply a correction on top of the base power; positive speeds the wheel up.
    pub fn correct_power(&mut self, drive: &mut dyn DriveCapability, correction: f32) {
        let power = self.base_power + correction * Self::sign(self.base_power);
        trace!("{:?} motor power: {}", self.motor, power);
        self.write(drive, power);
    }

    fn write(&mut self, drive: &mut dyn DriveCapability, power: f32) {
        self.power = power;
        let direction = if power >= 0.0 {
            Direction::Forward
        } else {
            Direction::Reverse
        };
        let duty = normalise_power(power.abs() - Self::sign(power) * self.bias as f32);
        drive.set(self.motor, direction, duty);
    }
}

/// Both wheels behind one driver.
pub struct TankDrive {
    drive: Box<dyn DriveCapability>,
    left: MotorChannel,
    right: MotorChannel,
}

impl TankDrive {
    pub fn new(drive: Box<dyn DriveCapability>, left_bias: i32, right_bias: i32) -> Self {
        TankDrive {
            drive,
            left: MotorChannel::new(MotorId::Left, left_bias),
            right: MotorChannel::new(MotorId::Right, right_bias),
        }
    }

    /// Both wheels at `left` and `right` percent power.
    pub fn set(&mut self, left: f32, right: f32) {
        self.left.set_base(self.drive.as_mut(), left);
        self.right.set_base(self.drive.as_mut(), right);
    }

    pub fn forward(&mut self, power: f32) {
        self.set(power, power);
    }

    pub fn reverse(&mut self, power: f32) {
        self.set(-power, -power);
    }

    pub fn stop(&mut self) {
        self.set(0.0, 0.0);
    }

    /// Spin anticlockwise on the spot
    pub fn spin_left(&mut self, power: f32) {
        self.set(-power, power);
    }

    /// Spin clockwise on the spot
    pub fn spin_right(&mut self, power: f32) {
        self.set(power, -power);
    }

    /// Steer by `correction`: positive slows the left wheel and speeds the right.
    pub fn correct(&mut self, correction: f32) {
        self.left.correct_power(self.drive.as_mut(), -correction);
        self.right.correct_power(self.drive.as_mut(), correction);
    }

    pub fn left(&self) -> &MotorChannel {
        &self.left
    }

    pub fn right(&self) -> &MotorChannel {
        &self.right
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::MockDriveCapability;
    use mockall::predicate::eq;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 0)]
    #[case(50.0, 32767)]
    #[case(100.0, 65535)]
    #[case(140.0, 65535)]
    #[case(-5.0, 0)]
    fn duty_mapping(#[case] power: f32, #[case] duty: u16) {
        assert_eq!(normalise_power(power), duty);
    }

    #[test]
    fn reverse_bias_is_added() {
        let mut drive = MockDriveCapability::new();
        drive
            .expect_set()
            .with(eq(MotorId::Left), eq(Direction::Reverse), eq(normalise_power(55.0)))
            .times(1)
            .return_const(());
        let mut channel = MotorChannel::new(MotorId::Left, 5);
        channel.set_base(&mut drive, -50.0);
    }

    #[test]
    fn correction_follows_travel_direction() {
        let mut drive = MockDriveCapability::new();
        drive.expect_set().return_const(());
        let mut channel = MotorChannel::new(MotorId::Right, 0);

        channel.set_base(&mut drive, 60.0);
        channel.correct_power(&mut drive, 10.0);
        assert_eq!(channel.power(), 70.0);

        channel.set_base(&mut drive, -60.0);
        channel.correct_power(&mut drive, 10.0);
        assert_eq!(channel.power(), -70.0);
        assert_eq!(channel.base_power(), -60.0);
    }

    #[test]
    fn tank_correction_is_antisymmetric() {
        let mut mock = MockDriveCapability::new();
        mock.expect_set().return_const(());
        let mut tank = TankDrive::new(Box::new(mock), 0, 0);
        tank.forward(95.0);
        tank.correct(20.0);
        assert_eq!(tank.left().power(), 75.0);
        assert_eq!(tank.right().power(), 115.0);
        assert_eq!(tank.left().base_power(), 95.0);
    }
}
