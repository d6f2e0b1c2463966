use std::fmt::Display;

/// Side of the book.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

impl Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            match self {
                Side::Bid => write!(f, "B"),
                Side::Ask => write!(f, "A"),
            }
        } else {
            match self {
                Side::Bid => write!(f, "Bid"),
                Side::Ask => write!(f, "Ask"),
            }
        }
    }
}

impl std::str::FromStr for Side {
    type Err = crate::error::DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bid" | "bids" | "buy" => Ok(Side::Bid),
            "ask" | "asks" | "sell" => Ok(Side::Ask),
            _ => Err(crate::error::DataError::InvalidArgument(format!("invalid side: {}", s))),
        }
    }
}
