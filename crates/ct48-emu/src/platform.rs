use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use ct48_io::{Platform, PortIo, VideoMemory};

use crate::chip::{ChipConfig, Ct48Chip};

const PCI_VENDOR_ID_CT: u16 = 0x102C;
const PCI_DEVICE_ID_CT_65548: u16 = 0x00DC;

/// Owner recorded for ranges taken with [`EmuPlatform::occupy_io`] / [`EmuPlatform::occupy_mem`].
const FOREIGN_OWNER: &str = "foreign";

#[derive(Debug, Default)]
struct Host {
    io_regions: Vec<(u16, u16, &'static str)>,
    mem_regions: Vec<(u64, usize, &'static str)>,
    fail_map: bool,
    live_mappings: usize,
    delays: Vec<u32>,
}

fn overlaps(a_start: u64, a_len: u64, b_start: u64, b_len: u64) -> bool {
    a_start < b_start + b_len && b_start < a_start + a_len
}

/// Host services backed by a shared [`Ct48Chip`].
///
/// Clones share the same chip and host state, so a test can hand one clone to the driver and
/// inspect the hardware through another.
#[derive(Debug, Clone)]
pub struct EmuPlatform {
    chip: Rc<RefCell<Ct48Chip>>,
    host: Rc<RefCell<Host>>,
}

impl EmuPlatform {
    pub fn new(config: ChipConfig) -> Self {
        Self {
            chip: Rc::new(RefCell::new(Ct48Chip::new(config))),
            host: Rc::new(RefCell::new(Host::default())),
        }
    }

    pub fn chip(&self) -> RefMut<'_, Ct48Chip> {
        self.chip.borrow_mut()
    }

    /// Marks an I/O range as owned by someone else.
    pub fn occupy_io(&self, start: u16, len: u16) {
        self.host
            .borrow_mut()
            .io_regions
            .push((start, len, FOREIGN_OWNER));
    }

    /// Marks a physical memory range as owned by someone else.
    pub fn occupy_mem(&self, base: u64, len: usize) {
        self.host
            .borrow_mut()
            .mem_regions
            .push((base, len, FOREIGN_OWNER));
    }

    /// Makes every subsequent mapping request fail.
    pub fn fail_mappings(&self, fail: bool) {
        self.host.borrow_mut().fail_map = fail;
    }

    /// I/O ranges currently held by `owner`, in claim order.
    pub fn io_claims(&self, owner: &str) -> Vec<(u16, u16)> {
        self.host
            .borrow()
            .io_regions
            .iter()
            .filter(|(_, _, o)| *o == owner)
            .map(|(start, len, _)| (*start, *len))
            .collect()
    }

    /// Memory ranges currently held by `owner`, in claim order.
    pub fn mem_claims(&self, owner: &str) -> Vec<(u64, usize)> {
        self.host
            .borrow()
            .mem_regions
            .iter()
            .filter(|(_, _, o)| *o == owner)
            .map(|(base, len, _)| (*base, *len))
            .collect()
    }

    /// Video memory mappings not yet dropped.
    pub fn live_mappings(&self) -> usize {
        self.host.borrow().live_mappings
    }

    /// Every [`Platform::delay_us`] request, oldest first.
    pub fn delays(&self) -> Vec<u32> {
        self.host.borrow().delays.clone()
    }
}

impl PortIo for EmuPlatform {
    fn read(&mut self, port: u16, size: u8) -> u32 {
        self.chip.borrow_mut().io_read(port, size)
    }

    fn write(&mut self, port: u16, size: u8, value: u32) {
        self.chip.borrow_mut().io_write(port, size, value);
    }
}

impl Platform for EmuPlatform {
    type Memory = EmuVram;

    fn request_io_region(&mut self, start: u16, len: u16, owner: &'static str) -> bool {
        let mut host = self.host.borrow_mut();
        let busy = host.io_regions.iter().any(|(s, l, _)| {
            overlaps(
                u64::from(*s),
                u64::from(*l),
                u64::from(start),
                u64::from(len),
            )
        });
        if busy {
            return false;
        }
        host.io_regions.push((start, len, owner));
        true
    }

    fn release_io_region(&mut self, start: u16, len: u16) {
        let mut host = self.host.borrow_mut();
        if let Some(pos) = host
            .io_regions
            .iter()
            .position(|(s, l, _)| *s == start && *l == len)
        {
            host.io_regions.remove(pos);
        }
    }

    fn request_mem_region(&mut self, base: u64, len: usize, owner: &'static str) -> bool {
        let mut host = self.host.borrow_mut();
        let busy = host
            .mem_regions
            .iter()
            .any(|(b, l, _)| overlaps(*b, *l as u64, base, len as u64));
        if busy {
            return false;
        }
        host.mem_regions.push((base, len, owner));
        true
    }

    fn release_mem_region(&mut self, base: u64, len: usize) {
        let mut host = self.host.borrow_mut();
        if let Some(pos) = host
            .mem_regions
            .iter()
            .position(|(b, l, _)| *b == base && *l == len)
        {
            host.mem_regions.remove(pos);
        }
    }

    fn map_video_memory(&mut self, _base: u64, len: usize) -> Option<EmuVram> {
        let mut host = self.host.borrow_mut();
        if host.fail_map {
            return None;
        }
        host.live_mappings += 1;
        let len = len.min(self.chip.borrow().vram.len());
        Some(EmuVram {
            chip: Rc::clone(&self.chip),
            host: Rc::clone(&self.host),
            len,
        })
    }

    fn pci_enable_bar0(&mut self, vendor: u16, device: u16) -> Option<u64> {
        if vendor != PCI_VENDOR_ID_CT || device != PCI_DEVICE_ID_CT_65548 {
            return None;
        }
        self.chip.borrow().config().pci_bar0
    }

    fn delay_us(&mut self, us: u32) {
        self.host.borrow_mut().delays.push(us);
    }
}

/// A mapping of the model's video memory. Writes may feed the drawing engine instead of memory
/// while it waits for system-memory source data.
#[derive(Debug)]
pub struct EmuVram {
    chip: Rc<RefCell<Ct48Chip>>,
    host: Rc<RefCell<Host>>,
    len: usize,
}

impl VideoMemory for EmuVram {
    fn len(&self) -> usize {
        self.len
    }

    fn read(&mut self, offset: usize, size: usize) -> u64 {
        if offset + size > self.len {
            return u64::MAX;
        }
        self.chip.borrow().vram_read(offset, size)
    }

    fn write(&mut self, offset: usize, size: usize, value: u64) {
        if offset + size > self.len {
            return;
        }
        self.chip.borrow_mut().vram_write(offset, size, value);
    }
}

impl Drop for EmuVram {
    fn drop(&mut self) {
        let mut host = self.host.borrow_mut();
        host.live_mappings = host.live_mappings.saturating_sub(1);
    }
}
