//! Flash abstraction layer context
//!
//! [`Fal`] is the registry that binds partitions to flash devices. It holds
//! borrowed references only: devices and partition tables are owned by the
//! caller and must outlive the context (the `'a` lifetime).
//!
//! Lifecycle:
//!
//! ```text
//! Empty --register*--> Registered --init()--> Initialized
//!                          ^                       |
//!                          +-------deinit()--------+
//! ```
//!
//! Registration changes are only accepted while not initialized. `deinit()`
//! clears the resolution cache but keeps every registration, so a later
//! `init()` brings the same configuration back up.
//!
//! The mutable state sits behind the lock kind `L`. Every operation that
//! touches it takes the lock without waiting and fails with
//! [`Error::Busy`] on contention. Device operations themselves run with
//! the lock released.

mod cache;
mod io;
mod lookup;
mod registry;
mod table;

use crate::config;
use crate::device::{Capabilities, FlashDevice};
use crate::error::{Error, Result};
use crate::lock::{FlagLock, LockKind};
use crate::partition::Partition;
use core::sync::atomic::{AtomicBool, Ordering};

/// A partition resolved to the device holding it
#[derive(Clone, Copy)]
pub(crate) struct CacheEntry<'a> {
    pub(crate) partition: &'a Partition<'a>,
    pub(crate) device: &'a dyn FlashDevice,
}

/// Registry slots and resolution cache
pub(crate) struct State<'a, const DEVICES: usize, const TABLES: usize, const CACHE: usize> {
    pub(crate) devices: [Option<&'a dyn FlashDevice>; DEVICES],
    pub(crate) tables: [Option<&'a [Partition<'a>]>; TABLES],
    pub(crate) cache: heapless::Vec<CacheEntry<'a>, CACHE>,
}

impl<'a, const DEVICES: usize, const TABLES: usize, const CACHE: usize>
    State<'a, DEVICES, TABLES, CACHE>
{
    fn new() -> Self {
        Self {
            devices: [None; DEVICES],
            tables: [None; TABLES],
            cache: heapless::Vec::new(),
        }
    }

    /// Nothing registered at all
    pub(crate) fn is_empty(&self) -> bool {
        self.devices.iter().all(Option::is_none) && self.tables.iter().all(Option::is_none)
    }
}

/// Flash abstraction layer context
///
/// Capacities are compile-time parameters: `DEVICES` device slots, `TABLES`
/// partition table slots and `CACHE` resolution cache entries. `L` selects
/// the lock guarding the state (see [`crate::lock`]).
pub struct Fal<
    'a,
    L: LockKind = FlagLock,
    const DEVICES: usize = { config::DEVICE_SLOTS },
    const TABLES: usize = { config::TABLE_SLOTS },
    const CACHE: usize = { config::CACHE_SLOTS },
> {
    initialized: AtomicBool,
    state: L::Cell<State<'a, DEVICES, TABLES, CACHE>>,
}

impl<'a, L: LockKind, const DEVICES: usize, const TABLES: usize, const CACHE: usize>
    Fal<'a, L, DEVICES, TABLES, CACHE>
{
    /// Create an empty context
    pub fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            state: L::new(State::new()),
        }
    }

    /// Take the state lock without waiting
    pub(crate) fn lock(&self) -> Result<L::Guard<'_, State<'a, DEVICES, TABLES, CACHE>>> {
        L::try_lock(&self.state).ok_or_else(|| {
            log::debug!("Context lock is held elsewhere");
            Error::Busy
        })
    }

    /// Check whether `init()` has completed
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Initialize every registered device and build the resolution cache
    ///
    /// Devices advertising [`Capabilities::INIT`] are initialized in slot
    /// order; the first failure aborts with that device's error. A partition
    /// whose offset lies beyond its device aborts with [`Error::Fail`] and
    /// must be treated as a fatal misconfiguration.
    ///
    /// On failure, every device brought up by this call is shut down again
    /// (if it advertises [`Capabilities::DEINIT`]), so `init()` can simply be
    /// retried once the cause is fixed.
    ///
    /// # Errors
    /// * `AlreadyInitialized` - `init()` already succeeded
    /// * `NotRegistered` - no device or partition table registered
    /// * `Busy` - the context lock is held elsewhere
    pub fn init(&self) -> Result<()> {
        let mut state = self.lock()?;

        if self.is_initialized() {
            return Err(Error::AlreadyInitialized);
        }
        if state.is_empty() {
            return Err(Error::NotRegistered);
        }

        for (i, device) in state.devices.iter().flatten().enumerate() {
            if !device.capabilities().contains(Capabilities::INIT) {
                continue;
            }
            if let Err(e) = device.init() {
                log::error!("Flash device {} failed to initialize: {}", device.name(), e);
                let _ = shut_down(initializable(state.devices.iter().flatten().copied().take(i)));
                return Err(e);
            }
            let geometry = device.geometry();
            log::debug!(
                "Flash device {} | addr: 0x{:08X} | len: 0x{:08X} | sector: 0x{:08X} | initialized",
                device.name(),
                geometry.base_addr,
                geometry.len,
                geometry.sector_size
            );
        }

        if let Err(e) = state.rebuild() {
            log::error!("Partition initialization failed");
            let _ = shut_down(initializable(state.devices.iter().flatten().copied()));
            return Err(e);
        }

        self.initialized.store(true, Ordering::Release);
        log::debug!("Initialized with {} cached partition(s)", state.cache.len());
        Ok(())
    }

    /// Tear the context down
    ///
    /// Devices advertising [`Capabilities::DEINIT`] are shut down; all of
    /// them are visited even if one fails, and the first failure is
    /// returned. The cache and the initialized flag are cleared in any case.
    /// Registrations are kept.
    ///
    /// # Errors
    /// * `NotRegistered` - no device or partition table registered
    /// * `NotInitialized` - `init()` has not succeeded
    /// * `Busy` - the context lock is held elsewhere
    pub fn deinit(&self) -> Result<()> {
        let mut state = self.lock()?;

        if state.is_empty() {
            return Err(Error::NotRegistered);
        }
        if !self.is_initialized() {
            return Err(Error::NotInitialized);
        }

        let result = shut_down(state.devices.iter().flatten().copied());

        state.cache.clear();
        self.initialized.store(false, Ordering::Release);
        result
    }
}

/// Devices `init()` brings up
fn initializable<'d>(
    devices: impl Iterator<Item = &'d dyn FlashDevice>,
) -> impl Iterator<Item = &'d dyn FlashDevice> {
    devices.filter(|device| device.capabilities().contains(Capabilities::INIT))
}

/// Deinitialize devices advertising `DEINIT`
///
/// All of them are visited even if one fails; the first failure is returned.
fn shut_down<'d>(devices: impl Iterator<Item = &'d dyn FlashDevice>) -> Result<()> {
    let mut result = Ok(());
    for device in devices {
        if !device.capabilities().contains(Capabilities::DEINIT) {
            continue;
        }
        match device.deinit() {
            Ok(()) => log::debug!("Flash device {} deinitialized", device.name()),
            Err(e) => {
                log::error!("Flash device {} failed to deinitialize: {}", device.name(), e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
    }
    result
}

impl<L: LockKind, const DEVICES: usize, const TABLES: usize, const CACHE: usize> Default
    for Fal<'_, L, DEVICES, TABLES, CACHE>
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::FlashGeometry;
    use crate::lock::NoLock;
    use crate::testing::RamFlash;
    use core::sync::atomic::{AtomicUsize, Ordering};

    static TABLE: [Partition<'static>; 2] = [
        Partition::new("bl", "ram", 0, 0x1000),
        Partition::new("app", "ram", 0x1000, 0x3000),
    ];

    #[test]
    fn test_init_requires_registration() {
        let fal: Fal<'_> = Fal::new();
        assert_eq!(fal.init(), Err(Error::NotRegistered));
        assert_eq!(fal.deinit(), Err(Error::NotRegistered));
        assert!(!fal.is_initialized());
    }

    #[test]
    fn test_init_twice() {
        let flash = RamFlash::new("ram", 0x4000);
        let fal: Fal<'_> = Fal::new();
        fal.register_flash_device(&flash).unwrap();
        fal.register_partition_table(&TABLE).unwrap();

        assert_eq!(fal.init(), Ok(()));
        assert_eq!(fal.init(), Err(Error::AlreadyInitialized));
        assert_eq!(flash.init_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_deinit_before_init() {
        let flash = RamFlash::new("ram", 0x4000);
        let fal: Fal<'_> = Fal::new();
        fal.register_flash_device(&flash).unwrap();
        assert_eq!(fal.deinit(), Err(Error::NotInitialized));
        assert_eq!(flash.deinit_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_device_init_failure_aborts() {
        let flash = RamFlash::new("ram", 0x4000);
        flash.fail_init.store(true, Ordering::SeqCst);
        let fal: Fal<'_> = Fal::new();
        fal.register_flash_device(&flash).unwrap();

        assert_eq!(fal.init(), Err(Error::Fail));
        assert!(!fal.is_initialized());
    }

    #[test]
    fn test_failed_device_init_shuts_down_earlier_devices() {
        let first = RamFlash::new("ram0", 0x4000);
        let second = RamFlash::new("ram1", 0x4000);
        second.fail_init.store(true, Ordering::SeqCst);
        let fal: Fal<'_> = Fal::new();
        fal.register_flash_device(&first).unwrap();
        fal.register_flash_device(&second).unwrap();

        assert_eq!(fal.init(), Err(Error::Fail));
        assert_eq!(first.deinit_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.deinit_calls.load(Ordering::SeqCst), 0);
    }

    // a partition past the end of its device fails init; fixing the tables
    // and retrying must not bring devices up twice without a shutdown
    #[test]
    fn test_failed_rebuild_shuts_devices_down() {
        static BAD: [Partition<'static>; 1] = [Partition::new("beyond", "ram", 0x4000, 0x100)];
        let flash = RamFlash::new("ram", 0x4000);
        let fal: Fal<'_> = Fal::new();
        fal.register_flash_device(&flash).unwrap();
        fal.register_partition_table(&BAD).unwrap();

        assert_eq!(fal.init(), Err(Error::Fail));
        assert!(!fal.is_initialized());
        assert_eq!(flash.init_calls.load(Ordering::SeqCst), 1);
        assert_eq!(flash.deinit_calls.load(Ordering::SeqCst), 1);

        fal.unregister_partition_table(&BAD).unwrap();
        fal.register_partition_table(&TABLE).unwrap();
        fal.init().unwrap();
        assert_eq!(flash.init_calls.load(Ordering::SeqCst), 2);
        assert_eq!(flash.deinit_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_init_skips_devices_without_init() {
        let flash = RamFlash::new("ram", 0x4000).with_capabilities(Capabilities::REQUIRED);
        let fal: Fal<'_, NoLock> = Fal::new();
        fal.register_flash_device(&flash).unwrap();

        fal.init().unwrap();
        fal.deinit().unwrap();
        assert_eq!(flash.init_calls.load(Ordering::SeqCst), 0);
        assert_eq!(flash.deinit_calls.load(Ordering::SeqCst), 0);
    }

    // deinit only pauses the context: registrations survive and the next
    // init() brings the same partitions back.
    #[test]
    fn test_deinit_keeps_registrations() {
        let flash = RamFlash::new("ram", 0x4000);
        let fal: Fal<'_> = Fal::new();
        fal.register_flash_device(&flash).unwrap();
        fal.register_partition_table(&TABLE).unwrap();
        fal.init().unwrap();
        assert_eq!(fal.cached_count(), Ok(2));

        fal.deinit().unwrap();
        assert!(!fal.is_initialized());
        assert_eq!(fal.cached_count(), Ok(0));
        assert_eq!(fal.device_count(), Ok(1));
        assert_eq!(fal.partition_count(), Ok(2));
        assert_eq!(flash.deinit_calls.load(Ordering::SeqCst), 1);

        fal.init().unwrap();
        assert_eq!(fal.cached_count(), Ok(2));
        assert_eq!(flash.init_calls.load(Ordering::SeqCst), 2);
    }

    struct PlainFlash {
        init_calls: AtomicUsize,
    }

    impl FlashDevice for PlainFlash {
        fn name(&self) -> &str {
            "plain"
        }

        fn geometry(&self) -> FlashGeometry {
            FlashGeometry {
                len: 0x1000,
                sector_size: 0x1000,
                ..Default::default()
            }
        }

        fn init(&self) -> Result<()> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn read(&self, _offset: u32, _buf: &mut [u8]) -> Result<()> {
            Ok(())
        }

        fn write(&self, _offset: u32, _data: &[u8]) -> Result<()> {
            Ok(())
        }

        fn erase(&self, _offset: u32, _len: u32) -> Result<()> {
            Ok(())
        }
    }

    // init() is gated on the advertised capabilities, not on the override
    #[test]
    fn test_init_needs_advertised_capability() {
        let flash = PlainFlash {
            init_calls: AtomicUsize::new(0),
        };
        let fal: Fal<'_> = Fal::new();
        fal.register_flash_device(&flash).unwrap();

        fal.init().unwrap();
        assert_eq!(flash.init_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_busy_while_locked() {
        let flash = RamFlash::new("ram", 0x4000);
        let fal: Fal<'_> = Fal::new();
        fal.register_flash_device(&flash).unwrap();

        let _guard = fal.lock().unwrap();
        assert_eq!(fal.init(), Err(Error::Busy));
        assert!(!fal.is_initialized());
    }
}
