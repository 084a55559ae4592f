/// Bus master trait
pub mod traits;
/// DS2484 I2C bridge driver
pub mod ds2484;

pub use ds2484::{Ds2484, Ds2484Config, Ds2484Error, NoPin};
pub use traits::{OneWire, PowerChange};

use crate::error::Error;

/// Run `op` with the bus locked
///
/// The bus is unlocked on every exit path. An error from `op` takes precedence
/// over an error from unlocking.
pub(crate) fn locked<B, T, F>(bus: &mut B, op: F) -> Result<T, Error<B::Error>>
where
    B: OneWire + ?Sized,
    F: FnOnce(&mut B) -> Result<T, Error<B::Error>>,
{
    bus.lock().map_err(Error::Bus)?;
    let result = op(bus);
    let unlocked = bus.unlock();

    match (result, unlocked) {
        (Ok(value), Ok(())) => Ok(value),
        (Err(err), _) => Err(err),
        (Ok(_), Err(err)) => {
            error!("Bus unlock failed");
            Err(Error::Bus(err))
        }
    }
}
