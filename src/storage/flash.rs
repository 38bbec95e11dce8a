//! Persistent configuration in internal flash.
//!
//! The [`DeviceConfig`] record lives in a small key-value map managed by
//! `sequential-storage`, which handles wear levelling and garbage
//! collection across the reserved sectors.
//!
//! Storage layout:
//!   - One item under [`KEY_DEVICE_CONFIG`], holding the postcard-encoded
//!     record.
//!   - A factory reset erases the whole range.

use core::ops::Range;

use embedded_storage::nor_flash::{self as blocking, NorFlashErrorKind};
use embedded_storage_async::nor_flash::{ErrorType, NorFlash, ReadNorFlash};

use crate::config::{STORAGE_FLASH_SECTORS, STORAGE_FLASH_START};
use crate::error::Error;
use crate::lifecycle::ConfigStore;
use crate::storage::record::{DeviceConfig, MAX_RECORD_SIZE};

/// Erase sector size of the ESP32-C3's SPI flash.
const FLASH_SECTOR_SIZE: u32 = 4096;

const STORAGE_RANGE: Range<u32> =
    STORAGE_FLASH_START..STORAGE_FLASH_START + STORAGE_FLASH_SECTORS * FLASH_SECTOR_SIZE;

const KEY_DEVICE_CONFIG: u8 = 0x01;

/// Item plus key and map header overhead.
const SCRATCH_SIZE: usize = MAX_RECORD_SIZE + 32;

/// Presents a blocking NOR flash driver through the async traits
/// `sequential-storage` expects. Every call completes before it returns.
pub struct BlockingFlash<F> {
    inner: F,
}

impl<F> BlockingFlash<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

fn kind<E: core::fmt::Debug>(e: E) -> NorFlashErrorKind {
    warn!("flash op failed: {:?}", defmt::Debug2Format(&e));
    NorFlashErrorKind::Other
}

impl<F: blocking::ErrorType> ErrorType for BlockingFlash<F> {
    type Error = NorFlashErrorKind;
}

impl<F: blocking::ReadNorFlash> ReadNorFlash for BlockingFlash<F> {
    const READ_SIZE: usize = F::READ_SIZE;

    async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.inner.read(offset, bytes).map_err(kind)
    }

    fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

impl<F: blocking::NorFlash> NorFlash for BlockingFlash<F> {
    const WRITE_SIZE: usize = F::WRITE_SIZE;
    const ERASE_SIZE: usize = F::ERASE_SIZE;

    async fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        self.inner.erase(from, to).map_err(kind)
    }

    async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.inner.write(offset, bytes).map_err(kind)
    }
}

/// [`ConfigStore`] over a flash range.
pub struct FlashConfigStore<F> {
    flash: F,
    configured: bool,
}

impl<F: NorFlash> FlashConfigStore<F> {
    pub fn new(flash: F) -> Self {
        Self {
            flash,
            configured: false,
        }
    }
}

impl<F: NorFlash> ConfigStore for FlashConfigStore<F> {
    async fn load(&mut self) -> Result<DeviceConfig, Error> {
        let mut buf = [0u8; SCRATCH_SIZE];

        let fetched = sequential_storage::map::fetch_item::<u8, &[u8], _>(
            &mut self.flash,
            STORAGE_RANGE,
            &mut sequential_storage::cache::NoCache::new(),
            &mut buf,
            &KEY_DEVICE_CONFIG,
        )
        .await
        .map_err(|e| {
            error!("flash read error: {:?}", defmt::Debug2Format(&e));
            Error::Storage
        })?;

        let config = match fetched {
            Some(data) => DeviceConfig::decode(data)?,
            None => {
                info!("no stored configuration");
                DeviceConfig::default()
            }
        };
        self.configured = config.configured;
        Ok(config)
    }

    async fn save(&mut self, config: &DeviceConfig) -> Result<(), Error> {
        let mut scratch = [0u8; SCRATCH_SIZE];
        let mut record = [0u8; MAX_RECORD_SIZE];
        let item: &[u8] = config.encode(&mut record)?;

        sequential_storage::map::store_item::<u8, &[u8], _>(
            &mut self.flash,
            STORAGE_RANGE,
            &mut sequential_storage::cache::NoCache::new(),
            &mut scratch,
            &KEY_DEVICE_CONFIG,
            &item,
        )
        .await
        .map_err(|e| {
            error!("flash write error: {:?}", defmt::Debug2Format(&e));
            Error::Storage
        })?;

        info!("saved configuration ({} bytes)", item.len());
        self.configured = config.configured;
        Ok(())
    }

    async fn clear(&mut self) -> Result<(), Error> {
        sequential_storage::erase_all(&mut self.flash, STORAGE_RANGE)
            .await
            .map_err(|e| {
                error!("flash erase error: {:?}", defmt::Debug2Format(&e));
                Error::Storage
            })?;
        info!("configuration erased");
        self.configured = false;
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.configured
    }
}
