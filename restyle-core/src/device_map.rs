use std::{fmt, str::FromStr};

/// Which compute device the backend is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeviceMap {
    ForceCpu,
    Ordinal(usize),
}

impl Default for DeviceMap {
    fn default() -> Self {
        Self::Ordinal(0)
    }
}

impl FromStr for DeviceMap {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("cpu") {
            return Ok(Self::ForceCpu);
        }
        s.parse::<usize>()
            .map(Self::Ordinal)
            .map_err(|_| format!("expected `cpu` or a device ordinal, got `{s}`"))
    }
}

impl fmt::Display for DeviceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForceCpu => f.write_str("cpu"),
            Self::Ordinal(ordinal) => write!(f, "{ordinal}"),
        }
    }
}
