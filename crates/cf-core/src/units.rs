// cf-core/src/units.rs

use uom::si::f64::{
    ElectricCurrent as UomElectricCurrent, ElectricPotential as UomElectricPotential,
    Power as UomPower, Time as UomTime,
};

// Public canonical unit types (SI, f64)
pub type Current = UomElectricCurrent;
pub type Voltage = UomElectricPotential;
pub type Power = UomPower;
pub type Time = UomTime;

#[inline]
pub fn amps(v: f64) -> Current {
    use uom::si::electric_current::ampere;
    Current::new::<ampere>(v)
}

#[inline]
pub fn milliamps(v: f64) -> Current {
    use uom::si::electric_current::milliampere;
    Current::new::<milliampere>(v)
}

#[inline]
pub fn volts(v: f64) -> Voltage {
    use uom::si::electric_potential::volt;
    Voltage::new::<volt>(v)
}

#[inline]
pub fn millivolts(v: f64) -> Voltage {
    use uom::si::electric_potential::millivolt;
    Voltage::new::<millivolt>(v)
}

#[inline]
pub fn watts(v: f64) -> Power {
    use uom::si::power::watt;
    Power::new::<watt>(v)
}

#[inline]
pub fn s(v: f64) -> Time {
    use uom::si::time::second;
    Time::new::<second>(v)
}

// Accessors back to plain SI floats for the solver boundary.

#[inline]
pub fn as_amps(v: Current) -> f64 {
    use uom::si::electric_current::ampere;
    v.get::<ampere>()
}

#[inline]
pub fn as_volts(v: Voltage) -> f64 {
    use uom::si::electric_potential::volt;
    v.get::<volt>()
}

#[inline]
pub fn as_watts(v: Power) -> f64 {
    use uom::si::power::watt;
    v.get::<watt>()
}

#[inline]
pub fn as_seconds(v: Time) -> f64 {
    use uom::si::time::second;
    v.get::<second>()
}

pub mod constants {
    pub const SECONDS_PER_MINUTE: f64 = 60.0;
    pub const SECONDS_PER_HOUR: f64 = 3600.0;
    pub const SECONDS_PER_DAY: f64 = 24.0 * SECONDS_PER_HOUR;
    pub const SECONDS_PER_WEEK: f64 = 7.0 * SECONDS_PER_DAY;
}
