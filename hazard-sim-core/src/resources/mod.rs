//! Provides the memory resources attached to the system bus: RAM and the testbench I/O device.

pub mod ram;
pub mod testbench_io;
