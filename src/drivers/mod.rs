//! Low-level peripheral access shared by the sensor drivers.

pub mod i2c_bus;
