//! DS2484 single-channel I2C to 1-Wire bridge
//!
//! The bridge executes 1-Wire primitives on behalf of the host and reports
//! their outcome in its status register. Every primitive leaves the read
//! pointer on the status register, so polling for completion is a plain I2C
//! read.

use core::convert::Infallible;

use embedded_hal::{
    blocking::i2c::{Read, Write},
    digital::v2::OutputPin,
};

use crate::bus::traits::{OneWire, PowerChange};

// Function commands
const CMD_DRST: u8 = 0xF0;
const CMD_SRP: u8 = 0xE1;
const CMD_WCFG: u8 = 0xD2;
const CMD_1WRS: u8 = 0xB4;
const CMD_1WSB: u8 = 0x87;
const CMD_1WWB: u8 = 0xA5;
const CMD_1WRB: u8 = 0x96;

// Read pointer codes
const REG_STATUS: u8 = 0xF0;
const REG_DATA: u8 = 0xE1;

// Status register bits
const STATUS_1WB: u8 = 0x01;
const STATUS_PPD: u8 = 0x02;
const STATUS_RST: u8 = 0x10;
const STATUS_SBR: u8 = 0x20;

// Device configuration bits
const DEVICE_APU: u8 = 0x01;

// Single bit byte
const BIT_SET: u8 = 0x80;

/// Possible errors in bridge operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ds2484Error {
    /// I2C transfer error
    I2c,
    /// SLPZ pin error
    Gpio,
    /// 1-Wire busy flag did not clear in time
    Timeout,
    /// Device reset was not acknowledged
    Reset,
    /// Configuration read back differs from the one written
    Config,
    /// Unlock without a matching lock
    Unlock,
}

/// Bridge configuration
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ds2484Config {
    /// 7-bit I2C address
    pub address: u8,
    /// Enable the active pull-up on the 1-Wire line
    pub active_pullup: bool,
    /// Number of devices wired to the bus
    pub peripheral_count: usize,
    /// Status reads before a busy primitive is declared stuck
    pub poll_limit: u16,
}

impl Default for Ds2484Config {
    fn default() -> Self {
        Self {
            address: 0x18,
            active_pullup: true,
            peripheral_count: 1,
            poll_limit: 1000,
        }
    }
}

/// Placeholder for boards that keep SLPZ tied high
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NoPin;

impl OutputPin for NoPin {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// DS2484 driver
///
/// SLPZ is active low: driving it low puts the bridge to sleep.
pub struct Ds2484<I2C, SLPZ>
where
    I2C: Read + Write,
    SLPZ: OutputPin,
{
    i2c: I2C,
    slpz: Option<SLPZ>,
    config: Ds2484Config,
    lock_depth: u8,
    active: bool,
}

impl<I2C, SLPZ> Ds2484<I2C, SLPZ>
where
    I2C: Read + Write,
    SLPZ: OutputPin,
{
    /// Wake the bridge, reset it and apply the configuration
    pub fn new(
        i2c: I2C,
        slpz: Option<SLPZ>,
        config: Ds2484Config,
    ) -> Result<Self, Ds2484Error> {
        let mut bridge = Self {
            i2c,
            slpz,
            config,
            lock_depth: 0,
            active: false,
        };

        bridge.set_sleep(false)?;
        bridge.active = true;

        bridge.reset_device()?;

        let mut device = 0;
        if bridge.config.active_pullup {
            device |= DEVICE_APU;
        }
        bridge.write_config(device)?;

        debug!(
            "DS2484 initialized with {} device(s)",
            bridge.config.peripheral_count
        );

        Ok(bridge)
    }

    /// Release the I2C bus and SLPZ pin
    pub fn free(self) -> (I2C, Option<SLPZ>) {
        (self.i2c, self.slpz)
    }

    /// Current lock nesting depth
    pub fn lock_depth(&self) -> u8 {
        self.lock_depth
    }

    /// Send a function command with an optional parameter byte
    fn exec(&mut self, cmd: u8, param: Option<u8>) -> Result<(), Ds2484Error> {
        let address = self.config.address;
        let result = match param {
            Some(param) => self.i2c.write(address, &[cmd, param]),
            None => self.i2c.write(address, &[cmd]),
        };
        result.map_err(|_| Ds2484Error::I2c)
    }

    /// Read the register selected by `pointer`, or the current one
    fn read_register(&mut self, pointer: Option<u8>) -> Result<u8, Ds2484Error> {
        if let Some(pointer) = pointer {
            self.exec(CMD_SRP, Some(pointer))?;
        }
        let mut buffer = [0u8; 1];
        self.i2c
            .read(self.config.address, &mut buffer)
            .map_err(|_| Ds2484Error::I2c)?;
        Ok(buffer[0])
    }

    /// Sample the status register, `WouldBlock` while a primitive is running
    fn poll_status(&mut self) -> nb::Result<u8, Ds2484Error> {
        let status = self.read_register(None)?;
        if status & STATUS_1WB != 0 {
            return Err(nb::Error::WouldBlock);
        }
        Ok(status)
    }

    /// Wait for the running primitive to complete
    fn wait_idle(&mut self) -> Result<u8, Ds2484Error> {
        for _ in 0..self.config.poll_limit {
            match self.poll_status() {
                Ok(status) => return Ok(status),
                Err(nb::Error::WouldBlock) => core::hint::spin_loop(),
                Err(nb::Error::Other(err)) => return Err(err),
            }
        }
        error!("DS2484 stuck busy");
        Err(Ds2484Error::Timeout)
    }

    fn reset_device(&mut self) -> Result<(), Ds2484Error> {
        self.exec(CMD_DRST, None)?;
        let status = self.read_register(None)?;
        if status & STATUS_RST == 0 {
            error!("DS2484 reset not acknowledged: {=u8:#x}", status);
            return Err(Ds2484Error::Reset);
        }
        Ok(())
    }

    fn write_config(&mut self, device: u8) -> Result<(), Ds2484Error> {
        // Upper nibble must carry the one's complement of the lower nibble
        let reg = (device & 0x0F) | (!device << 4);
        self.exec(CMD_WCFG, Some(reg))?;

        let readback = self.read_register(None)?;
        debug!("Device configuration: {=u8:#x}", readback);
        if readback != device & 0x0F {
            return Err(Ds2484Error::Config);
        }
        Ok(())
    }

    fn set_sleep(&mut self, sleep: bool) -> Result<(), Ds2484Error> {
        if let Some(pin) = self.slpz.as_mut() {
            let result = if sleep { pin.set_low() } else { pin.set_high() };
            result.map_err(|_| Ds2484Error::Gpio)?;
        }
        Ok(())
    }

    /// Generate one time slot, returns the sampled line level
    fn single_bit(&mut self, bit: bool) -> Result<bool, Ds2484Error> {
        self.exec(CMD_1WSB, Some(if bit { BIT_SET } else { 0 }))?;
        let status = self.wait_idle()?;
        Ok(status & STATUS_SBR != 0)
    }
}

impl<I2C, SLPZ> OneWire for Ds2484<I2C, SLPZ>
where
    I2C: Read + Write,
    SLPZ: OutputPin,
{
    type Error = Ds2484Error;

    fn reset(&mut self) -> Result<bool, Self::Error> {
        self.exec(CMD_1WRS, None)?;
        let status = self.wait_idle()?;
        Ok(status & STATUS_PPD != 0)
    }

    fn read_bit(&mut self) -> Result<bool, Self::Error> {
        self.single_bit(true)
    }

    fn write_bit(&mut self, bit: bool) -> Result<(), Self::Error> {
        self.single_bit(bit).map(|_| ())
    }

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        self.exec(CMD_1WRB, None)?;
        self.wait_idle()?;
        self.read_register(Some(REG_DATA))
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.exec(CMD_1WWB, Some(byte))?;
        self.wait_idle()?;
        Ok(())
    }

    fn lock(&mut self) -> Result<(), Self::Error> {
        self.lock_depth = self.lock_depth.saturating_add(1);
        Ok(())
    }

    fn unlock(&mut self) -> Result<(), Self::Error> {
        if self.lock_depth == 0 {
            return Err(Ds2484Error::Unlock);
        }
        self.lock_depth -= 1;
        Ok(())
    }

    fn resume(&mut self) -> Result<PowerChange, Self::Error> {
        if self.active {
            return Ok(PowerChange::Already);
        }
        self.set_sleep(false)?;
        self.active = true;
        Ok(PowerChange::Changed)
    }

    fn suspend(&mut self) -> Result<PowerChange, Self::Error> {
        if !self.active {
            return Ok(PowerChange::Already);
        }

        // Let a running primitive finish before cutting power
        self.exec(CMD_SRP, Some(REG_STATUS))?;
        self.wait_idle()?;

        self.set_sleep(true)?;
        self.active = false;
        Ok(PowerChange::Changed)
    }

    fn peripheral_count(&self) -> usize {
        self.config.peripheral_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Register level model of the bridge
    struct FakeBridge {
        pointer: u8,
        status: u8,
        data: u8,
        device: u8,
        presence: bool,
        busy_reads: u16,
        rx: [u8; 4],
        rx_pos: usize,
        written: [u8; 16],
        written_len: usize,
        commands: [u8; 32],
        commands_len: usize,
    }

    impl FakeBridge {
        fn new(presence: bool) -> Self {
            Self {
                pointer: REG_STATUS,
                status: 0,
                data: 0,
                device: 0,
                presence,
                busy_reads: 0,
                rx: [0x28, 0xAA, 0x55, 0x00],
                rx_pos: 0,
                written: [0; 16],
                written_len: 0,
                commands: [0; 32],
                commands_len: 0,
            }
        }

        fn written(&self) -> &[u8] {
            &self.written[..self.written_len]
        }
    }

    impl Write for FakeBridge {
        type Error = ();

        fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), ()> {
            if address != 0x18 {
                return Err(());
            }
            let cmd = bytes[0];
            if self.commands_len < self.commands.len() {
                self.commands[self.commands_len] = cmd;
                self.commands_len += 1;
            }
            let param = bytes.get(1).copied();

            match cmd {
                CMD_DRST => {
                    self.status = STATUS_RST;
                    self.device = 0;
                    self.pointer = REG_STATUS;
                }
                CMD_WCFG => {
                    let reg = param.ok_or(())?;
                    if (reg >> 4) == (!reg & 0x0F) {
                        self.device = reg & 0x0F;
                    }
                    self.pointer = 0xC3;
                }
                CMD_SRP => self.pointer = param.ok_or(())?,
                CMD_1WRS => {
                    self.status = if self.presence { STATUS_PPD } else { 0 };
                    self.pointer = REG_STATUS;
                }
                CMD_1WSB => {
                    // Nobody pulls the line, the sampled level is the written one
                    let bit = param.ok_or(())? & BIT_SET != 0;
                    self.status = if bit { STATUS_SBR } else { 0 };
                    self.pointer = REG_STATUS;
                }
                CMD_1WWB => {
                    self.written[self.written_len] = param.ok_or(())?;
                    self.written_len += 1;
                    self.status = 0;
                    self.pointer = REG_STATUS;
                }
                CMD_1WRB => {
                    self.data = self.rx[self.rx_pos % self.rx.len()];
                    self.rx_pos += 1;
                    self.status = 0;
                    self.pointer = REG_STATUS;
                }
                _ => return Err(()),
            }
            Ok(())
        }
    }

    impl Read for FakeBridge {
        type Error = ();

        fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), ()> {
            if address != 0x18 {
                return Err(());
            }
            buffer[0] = match self.pointer {
                REG_STATUS => {
                    if self.busy_reads > 0 {
                        self.busy_reads -= 1;
                        self.status | STATUS_1WB
                    } else {
                        self.status
                    }
                }
                REG_DATA => self.data,
                0xC3 => self.device,
                _ => 0xFF,
            };
            Ok(())
        }
    }

    struct FakePin {
        high: bool,
    }

    impl OutputPin for FakePin {
        type Error = Infallible;

        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.high = true;
            Ok(())
        }
    }

    fn bridge(presence: bool) -> Ds2484<FakeBridge, FakePin> {
        Ds2484::new(
            FakeBridge::new(presence),
            Some(FakePin { high: false }),
            Ds2484Config::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_init_sequence() {
        let (fake, pin) = bridge(true).free();
        assert_eq!(&fake.commands[..2], &[CMD_DRST, CMD_WCFG]);
        assert_eq!(fake.device, DEVICE_APU);
        assert!(pin.unwrap().high);
    }

    #[test]
    fn test_rejected_config() {
        struct Stubborn(FakeBridge);

        impl Write for Stubborn {
            type Error = ();
            fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), ()> {
                if bytes[0] == CMD_WCFG {
                    return Ok(());
                }
                self.0.write(address, bytes)
            }
        }

        impl Read for Stubborn {
            type Error = ();
            fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), ()> {
                self.0.read(address, buffer)
            }
        }

        let result = Ds2484::new(
            Stubborn(FakeBridge::new(true)),
            None::<NoPin>,
            Ds2484Config::default(),
        );
        assert!(matches!(result, Err(Ds2484Error::Config)));
    }

    #[test]
    fn test_reset_reports_presence() {
        assert_eq!(bridge(true).reset(), Ok(true));
        assert_eq!(bridge(false).reset(), Ok(false));
    }

    #[test]
    fn test_busy_polling() {
        let mut ds = bridge(true);
        ds.i2c.busy_reads = 5;
        assert_eq!(ds.reset(), Ok(true));

        ds.i2c.busy_reads = u16::MAX;
        assert_eq!(ds.reset(), Err(Ds2484Error::Timeout));
    }

    #[test]
    fn test_bits_and_bytes() {
        let mut ds = bridge(true);
        assert_eq!(ds.read_bit(), Ok(true));
        assert_eq!(ds.write_bit(false), Ok(()));

        ds.write_byte(0xCC).unwrap();
        ds.write_block(&[0x44, 0xBE]).unwrap();
        assert_eq!(ds.read_byte(), Ok(0x28));

        let mut buf = [0u8; 2];
        ds.read_block(&mut buf).unwrap();
        assert_eq!(buf, [0xAA, 0x55]);

        let (fake, _) = ds.free();
        assert_eq!(fake.written(), &[0xCC, 0x44, 0xBE]);
    }

    #[test]
    fn test_lock_depth() {
        let mut ds = bridge(true);
        ds.lock().unwrap();
        ds.lock().unwrap();
        assert_eq!(ds.lock_depth(), 2);
        ds.unlock().unwrap();
        ds.unlock().unwrap();
        assert_eq!(ds.unlock(), Err(Ds2484Error::Unlock));
    }

    #[test]
    fn test_power_transitions() {
        let mut ds = bridge(true);
        assert_eq!(ds.resume(), Ok(PowerChange::Already));
        assert_eq!(ds.suspend(), Ok(PowerChange::Changed));
        assert!(!ds.slpz.as_ref().unwrap().high);
        assert_eq!(ds.suspend(), Ok(PowerChange::Already));
        assert_eq!(ds.resume(), Ok(PowerChange::Changed));
        assert!(ds.slpz.as_ref().unwrap().high);
    }

    #[cfg(feature = "defmt")]
    #[test]
    fn test_public_types_are_loggable() {
        fn loggable<T: defmt::Format>() {}
        loggable::<Ds2484Config>();
        loggable::<NoPin>();
        loggable::<Ds2484Error>();
    }
}
