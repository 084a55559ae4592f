//! ROM function commands
//!
//! Every transaction starts with a reset followed by one of these commands,
//! which decides which devices listen to the function command that follows.

use crate::{
    bus::{locked, OneWire},
    error::Error,
    rom::Rom,
};

/// Address every device at once
pub const CMD_SKIP_ROM: u8 = 0xCC;
/// Address the device whose identifier follows
pub const CMD_MATCH_ROM: u8 = 0x55;
/// Address the device selected by the previous MATCH ROM
pub const CMD_RESUME: u8 = 0xA5;
/// Read the identifier of the only device on the bus
pub const CMD_READ_ROM: u8 = 0x33;
/// Start a ROM search
pub const CMD_SEARCH_ROM: u8 = 0xF0;
/// Start a ROM search limited to alarmed devices
pub const CMD_SEARCH_ALARM: u8 = 0xEC;

/// Reset the bus, a missing presence pulse is an error
fn reset_present<B>(bus: &mut B) -> Result<(), Error<B::Error>>
where
    B: OneWire + ?Sized,
{
    if bus.reset().map_err(Error::Bus)? {
        Ok(())
    } else {
        Err(Error::NoPresence)
    }
}

/// Read the identifier of the single device on the bus
///
/// With more than one device the responses collide and the checksum will
/// almost certainly fail.
pub fn read_rom<B>(bus: &mut B) -> Result<Rom, Error<B::Error>>
where
    B: OneWire + ?Sized,
{
    locked(bus, |bus| {
        reset_present(bus)?;
        bus.write_byte(CMD_READ_ROM).map_err(Error::Bus)?;

        let mut bytes = [0u8; Rom::SIZE];
        bus.read_block(&mut bytes).map_err(Error::Bus)?;

        let rom = Rom::from_bytes(bytes);
        if !rom.is_valid() {
            warn!("READ ROM checksum mismatch: {=u64:#x}", rom.to_u64());
            return Err(Error::ChecksumMismatch);
        }
        Ok(rom)
    })
}

/// Select the device with identifier `rom`
///
/// Every other device ignores the bus until the next reset.
pub fn match_rom<B>(bus: &mut B, rom: &Rom) -> Result<(), Error<B::Error>>
where
    B: OneWire + ?Sized,
{
    locked(bus, |bus| {
        reset_present(bus)?;
        bus.write_byte(CMD_MATCH_ROM).map_err(Error::Bus)?;
        bus.write_block(&rom.to_bytes()).map_err(Error::Bus)
    })
}

/// Select every device on the bus
pub fn skip_rom<B>(bus: &mut B) -> Result<(), Error<B::Error>>
where
    B: OneWire + ?Sized,
{
    locked(bus, |bus| {
        reset_present(bus)?;
        bus.write_byte(CMD_SKIP_ROM).map_err(Error::Bus)
    })
}

/// Select again the device addressed by the last MATCH ROM
pub fn resume<B>(bus: &mut B) -> Result<(), Error<B::Error>>
where
    B: OneWire + ?Sized,
{
    locked(bus, |bus| {
        reset_present(bus)?;
        bus.write_byte(CMD_RESUME).map_err(Error::Bus)
    })
}

/// Reset the bus and select `rom`
///
/// Uses MATCH ROM on a multidrop bus and the shorter SKIP ROM when the board
/// declares a single device.
pub fn reset_select<B>(bus: &mut B, rom: &Rom) -> Result<(), Error<B::Error>>
where
    B: OneWire + ?Sized,
{
    locked(bus, |bus| {
        reset_present(bus)?;
        if bus.peripheral_count() > 1 {
            bus.write_byte(CMD_MATCH_ROM).map_err(Error::Bus)?;
            bus.write_block(&rom.to_bytes()).map_err(Error::Bus)
        } else {
            bus.write_byte(CMD_SKIP_ROM).map_err(Error::Bus)
        }
    })
}

/// Select `rom`, send `write` and optionally read the response into `read`
pub fn write_read<B>(
    bus: &mut B,
    rom: &Rom,
    write: &[u8],
    read: Option<&mut [u8]>,
) -> Result<(), Error<B::Error>>
where
    B: OneWire + ?Sized,
{
    locked(bus, |bus| {
        reset_select(bus, rom)?;
        bus.write_block(write).map_err(Error::Bus)?;
        if let Some(read) = read {
            bus.read_block(read).map_err(Error::Bus)?;
        }
        Ok(())
    })
}
