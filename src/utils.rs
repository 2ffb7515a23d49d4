use std::fmt::{self, Display, Formatter};

/// Displays a frame as uppercase byte pairs, e.g. `08 03 19`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HexBytes<'a>(pub(crate) &'a [u8]);

impl Display for HexBytes<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Some((first, rest)) = self.0.split_first() else {
            return f.write_str("<empty>");
        };
        write!(f, "{first:02X}")?;
        for byte in rest {
            write!(f, " {byte:02X}")?;
        }
        Ok(())
    }
}

/// Displays an advertised RSSI in dBm.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SignalStrength(pub(crate) Option<i16>);

impl Display for SignalStrength {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(dbm) => write!(f, "{dbm} dBm"),
            None => f.write_str("unknown"),
        }
    }
}
