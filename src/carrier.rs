use crate::constants::SPEED_OF_LIGHT_M_S;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Eq, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Carrier {
    /// L1 (GPS/QZSS/SBAS) same frequency as E1
    #[default]
    L1,
    /// L2 (GPS/QZSS)
    L2,
    /// L5 (GPS/QZSS/SBAS) same frequency as E5A
    L5,
    /// E1 (Galileo)
    E1,
    /// E5A (Galileo) same frequency as L5
    E5A,
    /// B1I (BDS)
    B1I,
}

impl std::fmt::Display for Carrier {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        match self {
            Self::L1 => write!(f, "L1"),
            Self::L2 => write!(f, "L2"),
            Self::L5 => write!(f, "L5"),
            Self::E1 => write!(f, "E1"),
            Self::E5A => write!(f, "E5A"),
            Self::B1I => write!(f, "B1I"),
        }
    }
}

impl Carrier {
    /// Returns carrier frequency in Hertz
    pub fn frequency(&self) -> f64 {
        match self {
            Self::L1 | Self::E1 => 1575.42E6_f64,
            Self::L2 => 1227.60E6_f64,
            Self::L5 | Self::E5A => 1176.45E6_f64,
            Self::B1I => 1561.098E6_f64,
        }
    }

    /// Returns carrier wavelength in meters
    pub fn wavelength(&self) -> f64 {
        SPEED_OF_LIGHT_M_S / self.frequency()
    }
}

#[cfg(test)]
mod test {
    use super::Carrier;

    #[test]
    fn l1_wavelength() {
        assert!((Carrier::L1.wavelength() - 0.19029367).abs() < 1E-6);
    }
}
