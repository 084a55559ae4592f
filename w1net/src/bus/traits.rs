/// Outcome of a power state request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerChange {
    /// The transport switched state
    Changed,
    /// The transport was already in the requested state
    Already,
}

/// Generic 1-Wire bus master interface
///
/// Only the bit level primitives, locking and power control are mandatory.
/// Byte and block transfers default to LSB-first sequences of single bits,
/// bridge chips with native byte commands override them.
pub trait OneWire {
    /// Error type for bus operations
    type Error;

    /// Issue a reset pulse, returns true if at least one device answered
    /// with a presence pulse
    fn reset(&mut self) -> Result<bool, Self::Error>;

    /// Read a single time slot
    fn read_bit(&mut self) -> Result<bool, Self::Error>;

    /// Write a single time slot
    fn write_bit(&mut self, bit: bool) -> Result<(), Self::Error>;

    /// Read one byte, least significant bit first
    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        let mut byte = 0u8;
        for i in 0..8 {
            if self.read_bit()? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    /// Write one byte, least significant bit first
    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        for i in 0..8 {
            self.write_bit((byte >> i) & 0x01 == 0x01)?;
        }
        Ok(())
    }

    /// Fill `buffer` with bytes read from the bus
    fn read_block(&mut self, buffer: &mut [u8]) -> Result<(), Self::Error> {
        for byte in buffer.iter_mut() {
            *byte = self.read_byte()?;
        }
        Ok(())
    }

    /// Write every byte of `buffer` to the bus
    fn write_block(&mut self, buffer: &[u8]) -> Result<(), Self::Error> {
        for byte in buffer {
            self.write_byte(*byte)?;
        }
        Ok(())
    }

    /// Take exclusive ownership of the bus, nesting is allowed
    fn lock(&mut self) -> Result<(), Self::Error>;

    /// Release one level of bus ownership
    fn unlock(&mut self) -> Result<(), Self::Error>;

    /// Bring the bus master out of its low power state
    fn resume(&mut self) -> Result<PowerChange, Self::Error>;

    /// Put the bus master into its low power state
    fn suspend(&mut self) -> Result<PowerChange, Self::Error>;

    /// Number of devices the board declares on this bus
    fn peripheral_count(&self) -> usize;
}
