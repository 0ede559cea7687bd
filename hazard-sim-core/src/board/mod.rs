//! Provides the testbench board: one or more harts sharing RAM and the testbench I/O device.

mod system_bus;

use crate::address_map::{AddressMap, AddressMapError};
use crate::address_range::{AddressRange, InvalidBoundsError};
use crate::bus::Bus;
use crate::core::{self, Core, Step};
use crate::resources::ram::Ram;
use crate::resources::testbench_io::{self, TestbenchIo};
use crate::unit;
use log::{debug, warn};
use std::fmt::Debug;
use std::io::Write;
use system_bus::{Resource, SystemBus};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base address of RAM. Binaries are loaded here.
    pub ram_base: u32,
    /// RAM size in bytes, a nonzero multiple of 4.
    pub ram_size: u32,
    /// Base address of the testbench I/O device.
    pub io_base: u32,
    /// Number of harts, with IDs `0..harts`.
    pub harts: u32,
    /// Address every hart starts executing from.
    pub reset_vector: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ram_base: 0,
            ram_size: 16 * 1024 * unit::KIB,
            io_base: 0x8000_0000,
            harts: 1,
            reset_vector: 0x40,
        }
    }
}

/// RISC-V hardware platform matching the simulation testbench.
///
/// > A RISC-V hardware platform can contain one or more RISC-V-compatible processing cores together
/// > with other non-RISC-V-compatible cores, fixed-function accelerators, various physical memory
/// > structures, I/O devices, and an interconnect structure to allow the components to communicate.
///
/// All harts share the system bus. They are stepped one after another in order of hart ID, so
/// within a cycle hart 0 observes memory before any later hart modifies it.
#[derive(Debug)]
pub struct Board<W: Write + Debug> {
    harts: Vec<Core>,
    system_bus: SystemBus<W>,
}

impl<W: Write + Debug> Board<W> {
    /// Build a board. Console output of the I/O device goes to `out`, in traced form if `trace` is
    /// set.
    pub fn new(config: Config, out: W, trace: bool) -> Result<Self, BoardError> {
        if config.harts == 0 {
            return Err(BoardError::NoHarts);
        }
        let ram = Ram::new(config.ram_size).ok_or(BoardError::InvalidRamSize(config.ram_size))?;
        let memory_map = AddressMap::try_from(vec![
            (
                AddressRange::from_base_size(config.ram_base, config.ram_size)?,
                Resource::Ram,
            ),
            (
                AddressRange::from_base_size(config.io_base, testbench_io::WINDOW_SIZE)?,
                Resource::TestbenchIo,
            ),
        ])?;

        let harts = (0..config.harts)
            .map(|hart_id| {
                Core::new(core::Config {
                    hart_id,
                    reset_vector: config.reset_vector,
                    ..core::Config::default()
                })
            })
            .collect();

        Ok(Self {
            harts,
            system_bus: SystemBus {
                memory_map,
                ram,
                io: TestbenchIo::new(out, trace),
            },
        })
    }

    pub fn harts(&self) -> &[Core] {
        &self.harts
    }

    pub fn hart_mut(&mut self, hart_id: usize) -> Option<&mut Core> {
        self.harts.get_mut(hart_id)
    }

    pub fn ram(&self) -> &Ram {
        &self.system_bus.ram
    }

    pub fn io(&self) -> &TestbenchIo<W> {
        &self.system_bus.io
    }

    /// Copy a flat binary to the start of RAM.
    pub fn load_binary(&mut self, image: &[u8]) -> Result<(), BoardError> {
        if !self.system_bus.ram.load(image) {
            warn!(
                "Binary of {} bytes does not fit in {} bytes of RAM",
                image.len(),
                self.system_bus.ram.len()
            );
            return Err(BoardError::BinaryTooLarge {
                size: image.len(),
                capacity: self.system_bus.ram.len(),
            });
        }
        debug!("Loaded {} bytes into RAM", image.len());
        Ok(())
    }

    /// Returns the exit code written by the guest, once it has requested a halt.
    pub fn exit_code(&self) -> Option<u32> {
        self.system_bus.io.exit_code()
    }

    /// Simulate one cycle of every hart, in order of hart ID. Returns the step of each hart.
    pub fn step(&mut self) -> Vec<Step> {
        let io = &self.system_bus.io;
        let timer = io.timer_irq_pending();
        for hart in &mut self.harts {
            hart.set_interrupt_lines(io.soft_irq_pending(hart.config().hart_id), timer);
            let lines = hart.config().num_irqs.min(testbench_io::NUM_IRQ_LINES);
            for irq in 0..lines {
                hart.set_external_irq(irq, io.irq_line(irq));
            }
        }

        let mut steps = Vec::with_capacity(self.harts.len());
        for index in 0..self.harts.len() {
            let step = self.harts[index].step(&mut self.system_bus);
            for (other_index, other) in self.harts.iter_mut().enumerate() {
                if other_index == index {
                    continue;
                }
                for &address in &step.stores {
                    other.observe_store(address);
                }
                if step.unblock {
                    other.unblock();
                }
            }
            steps.push(step);
        }

        self.system_bus.io.step();
        steps
    }

    /// Read a byte through the system bus, as a debugger would. Unmapped or unreadable bytes read
    /// as `0`.
    pub fn read_byte(&mut self, address: u32) -> u8 {
        self.system_bus.read_byte(address).unwrap_or(0)
    }

    /// Write a hex dump of `start..end` to `out`, 16 bytes per line.
    pub fn dump(&mut self, out: &mut impl Write, start: u32, end: u32) -> std::io::Result<()> {
        writeln!(out, "Dumping memory from {start:08x} to {end:08x}:")?;
        for i in 0..end.wrapping_sub(start) {
            let byte = self.read_byte(start.wrapping_add(i));
            let separator = if i % 16 == 15 { '\n' } else { ' ' };
            write!(out, "{byte:02x}{separator}")?;
        }
        writeln!(out)
    }
}

#[derive(Error, Debug)]
pub enum BoardError {
    #[error("a board needs at least one hart")]
    NoHarts,
    #[error("invalid RAM size {0:#x}, must be a nonzero multiple of 4 bytes")]
    InvalidRamSize(u32),
    #[error(transparent)]
    InvalidBounds(#[from] InvalidBoundsError),
    #[error(transparent)]
    AddressMap(#[from] AddressMapError),
    #[error("Binary file ({size} bytes) is larger than memory ({capacity} bytes)")]
    BinaryTooLarge { size: usize, capacity: u32 },
}
