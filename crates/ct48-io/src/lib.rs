//! Platform primitives consumed by the `ct48fb` driver.
//!
//! The driver never touches hardware directly. Everything it needs from the host (port I/O,
//! the mapped video memory aperture, exclusive ownership of I/O ranges, PCI BAR lookup and
//! short busy delays) goes through the traits in this crate, so the same driver code can run
//! against real hardware or against the software chip model in `ct48-emu`.

/// Port I/O access.
///
/// `size` is the access width in bytes and is always one of `1`, `2` or `4`. Values wider than
/// the access are truncated by the implementation.
pub trait PortIo {
    fn read(&mut self, port: u16, size: u8) -> u32;
    fn write(&mut self, port: u16, size: u8, value: u32);

    fn read_u8(&mut self, port: u16) -> u8 {
        self.read(port, 1) as u8
    }

    fn write_u8(&mut self, port: u16, value: u8) {
        self.write(port, 1, u32::from(value));
    }

    fn read_u32(&mut self, port: u16) -> u32 {
        self.read(port, 4)
    }

    fn write_u32(&mut self, port: u16, value: u32) {
        self.write(port, 4, value);
    }
}

/// A mapped video memory aperture.
///
/// Offsets are relative to the start of the mapping. Multi-byte accesses are little-endian,
/// matching the chip's linear aperture.
pub trait VideoMemory {
    /// Size of the mapping in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&mut self, offset: usize, size: usize) -> u64;
    fn write(&mut self, offset: usize, size: usize, value: u64);

    fn read_u8(&mut self, offset: usize) -> u8 {
        self.read(offset, 1) as u8
    }

    fn write_u8(&mut self, offset: usize, value: u8) {
        self.write(offset, 1, u64::from(value));
    }

    fn read_u16(&mut self, offset: usize) -> u16 {
        self.read(offset, 2) as u16
    }

    fn write_u16(&mut self, offset: usize, value: u16) {
        self.write(offset, 2, u64::from(value));
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        self.write(offset, 4, u64::from(value));
    }

    /// Copies `src` into the aperture starting at `offset`.
    fn write_bytes(&mut self, offset: usize, src: &[u8]) {
        for (i, b) in src.iter().enumerate() {
            self.write_u8(offset + i, *b);
        }
    }
}

/// Host services needed to bring the adapter up and tear it down.
///
/// Claims made through `request_*` must be balanced by the matching `release_*`; the driver
/// keeps a ledger and unwinds it on every exit path.
pub trait Platform: PortIo {
    type Memory: VideoMemory;

    /// Claims `len` I/O ports starting at `start`. Returns `false` if any port in the range is
    /// already owned.
    fn request_io_region(&mut self, start: u16, len: u16, owner: &'static str) -> bool;
    fn release_io_region(&mut self, start: u16, len: u16);

    /// Claims a physical memory range. Returns `false` if the range is already owned.
    fn request_mem_region(&mut self, base: u64, len: usize, owner: &'static str) -> bool;
    fn release_mem_region(&mut self, base: u64, len: usize);

    /// Maps `len` bytes of physical memory at `base`. Dropping the returned value unmaps it.
    fn map_video_memory(&mut self, base: u64, len: usize) -> Option<Self::Memory>;

    /// Enables the PCI function matching `vendor:device` and returns its BAR0 base.
    fn pci_enable_bar0(&mut self, vendor: u16, device: u16) -> Option<u64>;

    /// Busy-waits for at least `us` microseconds.
    fn delay_us(&mut self, us: u32);
}
