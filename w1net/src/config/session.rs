use crate::search::SearchCommand;

/// Family code of the DS28E17 1-Wire to I2C bridge
pub const DS28E17_FAMILY: u8 = 0x19;

/// DS28E17 "enable sleep mode" device command
pub const DS28E17_ENABLE_SLEEP: u8 = 0x1E;

/// Session manager configuration
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionConfig {
    /// Delay between resuming the bus master and the first reset, in ms
    pub settle_delay_ms: u8,
    /// Family that must be sent to sleep before the bus is powered down
    pub quirk_family: u8,
    /// Command byte that puts the quirk family to sleep
    pub sleep_command: u8,
    /// Search flavour used by [`Session::scan`](crate::session::Session::scan)
    pub search: SearchCommand,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 3,
            quirk_family: DS28E17_FAMILY,
            sleep_command: DS28E17_ENABLE_SLEEP,
            search: SearchCommand::Normal,
        }
    }
}
