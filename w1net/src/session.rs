//! Bus session manager
//!
//! A session brackets a series of bus transactions with power sequencing and
//! bus ownership. [`Session::acquire`] locks the bus, wakes the bus master and
//! checks the line; [`Session::release`] sends sleep-sensitive devices to
//! sleep, powers the master down and unlocks the bus. Scans and addressing
//! commands are only accepted in between.

use embedded_hal::blocking::delay::DelayMs;
use heapless::Vec;

use crate::{
    bus::{OneWire, PowerChange},
    command,
    config::SessionConfig,
    error::{Error, Report, Warning},
    rom::Rom,
    search::{self, ALL_FAMILIES},
};

/// Default capacity of the scan record
pub const DEFAULT_RECORD_SIZE: usize = 16;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    /// Bus not owned, master may be powered down
    Idle,
    /// Bus locked and powered, ready for transactions
    Acquired,
}

/// Session over one 1-Wire bus
///
/// `N` bounds the number of identifiers a single scan can report.
pub struct Session<B, D, const N: usize = DEFAULT_RECORD_SIZE>
where
    B: OneWire,
    D: DelayMs<u8>,
{
    bus: B,
    delay: D,
    config: SessionConfig,
    state: SessionState,
    /// A device of the quirk family was seen by the last scan
    quirk: bool,
    /// Identifiers of the scan in progress
    record: Vec<Rom, N>,
}

impl<B, D> Session<B, D, DEFAULT_RECORD_SIZE>
where
    B: OneWire,
    D: DelayMs<u8>,
{
    /// Create a session with the default scan record capacity
    pub fn new(bus: B, delay: D, config: SessionConfig) -> Self {
        Self::with_capacity(bus, delay, config)
    }
}

impl<B, D, const N: usize> Session<B, D, N>
where
    B: OneWire,
    D: DelayMs<u8>,
{
    /// Create a session whose scan record holds `N` identifiers
    pub fn with_capacity(bus: B, delay: D, config: SessionConfig) -> Self {
        Self {
            bus,
            delay,
            config,
            state: SessionState::Idle,
            quirk: false,
            record: Vec::new(),
        }
    }

    /// Give back the bus master and delay provider
    pub fn free(self) -> (B, D) {
        (self.bus, self.delay)
    }

    /// Get current session state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Get session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// True if the last scan found a device that needs an explicit sleep
    pub fn is_quirk_present(&self) -> bool {
        self.quirk
    }

    /// Access the bus master
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Access the bus master mutably
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Take the bus and power it up
    ///
    /// On failure the bus is unlocked again before the error is returned.
    pub fn acquire(&mut self) -> Result<(), Error<B::Error>> {
        if self.state == SessionState::Acquired {
            error!("Session already acquired");
            return Err(Error::AlreadyAcquired);
        }

        if let Err(err) = self.bus.lock() {
            error!("Bus lock failed");
            return Err(Error::Bus(err));
        }

        if let Err(err) = self.power_up() {
            if self.bus.unlock().is_err() {
                error!("Bus unlock failed");
            }
            return Err(err);
        }

        self.state = SessionState::Acquired;
        Ok(())
    }

    fn power_up(&mut self) -> Result<(), Error<B::Error>> {
        match self.bus.resume() {
            Ok(PowerChange::Changed) => {}
            Ok(PowerChange::Already) => debug!("Bus master already active"),
            Err(err) => {
                error!("Bus master resume failed");
                return Err(Error::Bus(err));
            }
        }

        self.delay.delay_ms(self.config.settle_delay_ms);

        // Only the line itself is checked here, an empty bus is fine
        match self.bus.reset() {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!("No presence pulse after acquire");
                Ok(())
            }
            Err(err) => {
                error!("Bus reset failed");
                Err(Error::Bus(err))
            }
        }
    }

    /// Power the bus down and give it up
    ///
    /// A failed sleep request to the quirk family is reported as a warning.
    /// Suspend and unlock always run; the first of their errors is fatal.
    pub fn release(&mut self) -> Report<(), B::Error> {
        let mut report = Report::new(());

        if self.state != SessionState::Acquired {
            report.fail(Error::NotAcquired);
            return report;
        }

        if self.quirk {
            if let Err(err) = self.quiesce() {
                warn!("Quirk device sleep request failed: {}", err.kind());
                report.warn(Warning::Quiescence(err));
            }
        }

        match self.bus.suspend() {
            Ok(PowerChange::Changed) => {}
            Ok(PowerChange::Already) => debug!("Bus master already suspended"),
            Err(err) => {
                error!("Bus master suspend failed");
                report.fail(Error::Bus(err));
            }
        }

        if let Err(err) = self.bus.unlock() {
            error!("Bus unlock failed");
            report.fail(Error::Bus(err));
        }

        self.state = SessionState::Idle;
        self.quirk = false;
        report
    }

    /// Ask the quirk family to enter sleep mode
    fn quiesce(&mut self) -> Result<(), Error<B::Error>> {
        if !self.bus.reset().map_err(Error::Bus)? {
            debug!("Nothing to quiesce, bus is empty");
            return Ok(());
        }
        command::skip_rom(&mut self.bus)?;
        self.bus
            .write_block(&[self.config.sleep_command])
            .map_err(Error::Bus)
    }

    /// Enumerate the bus and report every identifier to `callback`
    ///
    /// The search runs to completion before the first callback. A search
    /// failure still reports the identifiers found before it. Rejections from
    /// `callback` are collected as warnings and do not stop the iteration.
    /// Identifiers that do not fit into the scan record are reported as
    /// [`Warning::RecordFull`] instead. `value` holds the number of
    /// identifiers discovered.
    pub fn scan<F, C>(&mut self, mut callback: F) -> Report<usize, B::Error>
    where
        F: FnMut(Rom) -> Result<(), C>,
    {
        let mut report = Report::new(0);

        if self.state != SessionState::Acquired {
            report.fail(Error::NotAcquired);
            return report;
        }

        self.quirk = false;
        self.record.clear();

        let Self {
            bus,
            config,
            quirk,
            record,
            ..
        } = self;
        let quirk_family = config.quirk_family;
        let mut discovered = 0;

        let searched = search::search_all(bus, config.search, ALL_FAMILIES, |rom| {
            discovered += 1;
            if rom.family == quirk_family {
                *quirk = true;
            }
            if record.push(rom).is_err() {
                error!("Scan record full");
                report.warn(Warning::RecordFull(rom));
            }
        });

        report.value = discovered;
        match searched {
            Ok(found) => debug!("Found {} device(s)", found),
            Err(err) => {
                error!("ROM search failed: {}", err.kind());
                report.fail(err);
            }
        }

        for rom in record.iter() {
            if callback(*rom).is_err() {
                error!("Scan callback failed for {=u64:#x}", rom.to_u64());
                report.warn(Warning::Callback(*rom));
            }
        }

        record.clear();
        report
    }

    fn ensure_acquired(&self) -> Result<(), Error<B::Error>> {
        match self.state {
            SessionState::Acquired => Ok(()),
            SessionState::Idle => Err(Error::NotAcquired),
        }
    }

    /// READ ROM, see [`command::read_rom`]
    pub fn read_rom(&mut self) -> Result<Rom, Error<B::Error>> {
        self.ensure_acquired()?;
        command::read_rom(&mut self.bus)
    }

    /// MATCH ROM, see [`command::match_rom`]
    pub fn match_rom(&mut self, rom: &Rom) -> Result<(), Error<B::Error>> {
        self.ensure_acquired()?;
        command::match_rom(&mut self.bus, rom)
    }

    /// SKIP ROM, see [`command::skip_rom`]
    pub fn skip_rom(&mut self) -> Result<(), Error<B::Error>> {
        self.ensure_acquired()?;
        command::skip_rom(&mut self.bus)
    }

    /// RESUME, see [`command::resume`]
    pub fn resume(&mut self) -> Result<(), Error<B::Error>> {
        self.ensure_acquired()?;
        command::resume(&mut self.bus)
    }

    /// Reset and select, see [`command::reset_select`]
    pub fn reset_select(&mut self, rom: &Rom) -> Result<(), Error<B::Error>> {
        self.ensure_acquired()?;
        command::reset_select(&mut self.bus, rom)
    }

    /// Addressed transaction, see [`command::write_read`]
    pub fn write_read(
        &mut self,
        rom: &Rom,
        write: &[u8],
        read: Option<&mut [u8]>,
    ) -> Result<(), Error<B::Error>> {
        self.ensure_acquired()?;
        command::write_read(&mut self.bus, rom, write, read)
    }
}
