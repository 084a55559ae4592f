//! ROM search
//!
//! Binary tree singulation of every device on the bus. During a search pass
//! each participating device drives its next ROM bit and then its
//! complement; the open drain line reads as the logical AND of all drivers.
//! The master picks a branch and writes it back, devices on the other branch
//! drop out until the next reset. One pass therefore walks one root-to-leaf
//! path of the 64 level tree and yields exactly one identifier; the
//! [`SearchCursor`] remembers the deepest branch still to be explored so the
//! next pass can resume the depth first traversal.

use crate::{
    bus::{locked, OneWire},
    command::{CMD_SEARCH_ALARM, CMD_SEARCH_ROM},
    error::Error,
    rom::Rom,
};

/// Family filter value that matches every device
pub const ALL_FAMILIES: u8 = 0x00;

/// Number of bits in a ROM identifier
const ROM_BITS: u8 = 64;

/// Which devices take part in a search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SearchCommand {
    /// Every device on the bus
    Normal,
    /// Only devices with an active alarm condition
    Alarm,
}

impl SearchCommand {
    /// Command byte sent after the reset
    pub fn opcode(self) -> u8 {
        match self {
            SearchCommand::Normal => CMD_SEARCH_ROM,
            SearchCommand::Alarm => CMD_SEARCH_ALARM,
        }
    }
}

/// Search progress carried from one pass to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Discrepancy {
    /// No pass has run yet
    Init,
    /// Deepest bit position (1..=64) whose `0` branch is still unexplored
    At(u8),
    /// The last pass found the final device of the traversal
    LastDevice,
    /// No device took part in the last pass
    NoDevice,
}

impl Discrepancy {
    /// Numeric position used by the branch decision
    fn position(self) -> u8 {
        match self {
            Discrepancy::Init => 0,
            Discrepancy::At(position) => position,
            Discrepancy::LastDevice => ROM_BITS + 1,
            Discrepancy::NoDevice => ROM_BITS + 2,
        }
    }
}

/// Mutable state of one full bus search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SearchCursor {
    /// Branch to revisit on the next pass, or a terminal marker
    pub last_discrepancy: Discrepancy,
    /// Bits chosen so far; bit `i` holds ROM bit `i + 1`
    pub rom_bits: u64,
}

impl SearchCursor {
    /// Cursor for the first pass of a new search
    pub const fn new() -> Self {
        Self {
            last_discrepancy: Discrepancy::Init,
            rom_bits: 0,
        }
    }

    /// Identifier produced by the last pass, if it found one
    pub fn found(&self) -> Option<Rom> {
        match self.last_discrepancy {
            Discrepancy::At(_) | Discrepancy::LastDevice => {
                Some(Rom::from_search_bits(self.rom_bits))
            }
            Discrepancy::Init | Discrepancy::NoDevice => None,
        }
    }

    /// True once no further pass can produce a new identifier
    pub fn is_done(&self) -> bool {
        matches!(
            self.last_discrepancy,
            Discrepancy::LastDevice | Discrepancy::NoDevice
        )
    }
}

impl Default for SearchCursor {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one search pass starting from `cursor`
///
/// Returns the cursor to feed into the next pass. The bus is not locked here,
/// callers doing several passes must hold the lock across all of them.
pub fn search_one_pass<B>(
    bus: &mut B,
    command: SearchCommand,
    cursor: SearchCursor,
) -> Result<SearchCursor, Error<B::Error>>
where
    B: OneWire + ?Sized,
{
    let mut next = cursor;

    if !bus.reset().map_err(Error::Bus)? {
        next.last_discrepancy = Discrepancy::NoDevice;
        return Ok(next);
    }

    bus.write_byte(command.opcode()).map_err(Error::Bus)?;

    let last = cursor.last_discrepancy.position();
    let mut next_discrepancy = Discrepancy::LastDevice;

    for position in 1..=ROM_BITS {
        let mask = 1u64 << (position - 1);

        let id_bit = bus.read_bit().map_err(Error::Bus)?;
        let complement_bit = bus.read_bit().map_err(Error::Bus)?;

        let chosen = match (id_bit, complement_bit) {
            (true, true) => {
                debug!("No device participating");
                next.last_discrepancy = Discrepancy::NoDevice;
                return Ok(next);
            }
            // Every remaining device agrees on this bit
            (bit, _) if id_bit != complement_bit => bit,
            // Discrepancy: take the 1 branch when entering new ground or
            // when replaying a path that took it before
            _ => {
                if position > last || (position < last && next.rom_bits & mask != 0) {
                    next_discrepancy = Discrepancy::At(position);
                    true
                } else {
                    false
                }
            }
        };

        bus.write_bit(chosen).map_err(Error::Bus)?;
        if chosen {
            next.rom_bits |= mask;
        } else {
            next.rom_bits &= !mask;
        }
    }

    next.last_discrepancy = next_discrepancy;
    Ok(next)
}

/// Enumerate every device answering `command`
///
/// `callback` runs once per discovered identifier, in discovery order. The bus
/// stays locked for the whole search. Returns the number of identifiers found;
/// an empty bus is not an error.
///
/// `family` is accepted for interface parity with family filtered searches
/// but is not applied: every device is reported regardless of its family.
pub fn search_all<B, F>(
    bus: &mut B,
    command: SearchCommand,
    family: u8,
    mut callback: F,
) -> Result<usize, Error<B::Error>>
where
    B: OneWire + ?Sized,
    F: FnMut(Rom),
{
    // TODO: apply the family filter by presetting the first 8 search bits
    let _ = family;

    locked(bus, |bus| {
        let mut cursor = SearchCursor::new();
        let mut found = 0;

        loop {
            cursor = search_one_pass(bus, command, cursor)?;
            let rom = match cursor.found() {
                Some(rom) => rom,
                None => break,
            };

            found += 1;
            debug!("ROM found: nr.{}, {=u64:#x}", found, rom.to_u64());
            callback(rom);

            if cursor.is_done() {
                break;
            }
        }

        Ok(found)
    })
}

/// Enumerate every device on the bus
pub fn search_rom<B, F>(bus: &mut B, callback: F) -> Result<usize, Error<B::Error>>
where
    B: OneWire + ?Sized,
    F: FnMut(Rom),
{
    search_all(bus, SearchCommand::Normal, ALL_FAMILIES, callback)
}

/// Enumerate every device with an active alarm condition
pub fn search_alarm<B, F>(bus: &mut B, callback: F) -> Result<usize, Error<B::Error>>
where
    B: OneWire + ?Sized,
    F: FnMut(Rom),
{
    search_all(bus, SearchCommand::Alarm, ALL_FAMILIES, callback)
}
