//! Lot/native to decimal conversions.

/// Converts between lot-denominated values stored on-chain and decimal
/// prices/quantities shown to callers.
///
/// Built from a venue's lot sizes and the decimals of both mints. A venue
/// whose mint decimals were not found in token metadata still converts, using
/// the default of 9, and reports [`Converter::is_approximate`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Converter {
    base_lot_size: u64,
    quote_lot_size: u64,
    base_decimals: u8,
    quote_decimals: u8,
    approximate: bool,
}

impl Converter {
    pub fn new(base_lot_size: u64, quote_lot_size: u64, base_decimals: u8, quote_decimals: u8) -> Self {
        Self { base_lot_size, quote_lot_size, base_decimals, quote_decimals, approximate: false }
    }

    pub fn with_approximate(self, approximate: bool) -> Self { Self { approximate, ..self } }

    pub fn base_lot_size(&self) -> u64 { self.base_lot_size }

    pub fn quote_lot_size(&self) -> u64 { self.quote_lot_size }

    pub fn base_decimals(&self) -> u8 { self.base_decimals }

    pub fn quote_decimals(&self) -> u8 { self.quote_decimals }

    /// Whether any of the decimals is a default rather than real metadata.
    pub fn is_approximate(&self) -> bool { self.approximate }

    fn base_multiplier(&self) -> f64 { 10f64.powi(self.base_decimals as i32) }

    fn quote_multiplier(&self) -> f64 { 10f64.powi(self.quote_decimals as i32) }

    /// Price in quote units per base unit from price in lots.
    pub fn price_from_lots(&self, price_lots: u64) -> f64 {
        if self.base_lot_size == 0 {
            return 0.0;
        }
        (price_lots as f64 * self.quote_lot_size as f64 * self.base_multiplier())
            / (self.base_lot_size as f64 * self.quote_multiplier())
    }

    /// Quantity in base units from quantity in lots.
    pub fn quantity_from_lots(&self, quantity_lots: u64) -> f64 {
        quantity_lots as f64 * self.base_lot_size as f64 / self.base_multiplier()
    }

    /// Base units from native (smallest denomination) amount.
    pub fn base_from_native(&self, native: u64) -> f64 { native as f64 / self.base_multiplier() }

    /// Quote units from native (smallest denomination) amount.
    pub fn quote_from_native(&self, native: u64) -> f64 { native as f64 / self.quote_multiplier() }

    /// Price of a fill given native quote paid/received per native base.
    pub fn price_from_natives(&self, quote_native: u64, base_native: u64) -> f64 {
        if base_native == 0 {
            return 0.0;
        }
        (quote_native as f64 * self.base_multiplier())
            / (self.quote_multiplier() * base_native as f64)
    }

    /// Price in lots of a fill given native quote per native base, rounded down.
    pub fn price_lots_from_natives(&self, quote_native: u64, base_native: u64) -> u64 {
        let denominator = self.quote_lot_size as u128 * base_native as u128;
        if denominator == 0 {
            return 0;
        }
        (quote_native as u128 * self.base_lot_size as u128 / denominator) as u64
    }

    /// Quantity in lots from native base amount, rounded down.
    pub fn quantity_lots_from_native(&self, base_native: u64) -> u64 {
        base_native.checked_div(self.base_lot_size).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lots_conversion() {
        // 0.001 base per lot, 0.000001 quote per lot
        let converter = Converter::new(1_000_000, 1, 9, 6);
        assert_eq!(converter.price_from_lots(10_000), 10.0);
        assert_eq!(converter.quantity_from_lots(1_000), 1.0);
        assert_eq!(converter.price_lots_from_natives(10_000_000, 1_000_000_000), 10_000);
        assert_eq!(converter.quantity_lots_from_native(1_000_000_000), 1_000);
    }

    #[test]
    fn natives_conversion() {
        let converter = Converter::new(100, 10, 6, 6);
        assert_eq!(converter.price_from_natives(25_000_000, 10_000_000), 2.5);
        assert_eq!(converter.base_from_native(1_500_000), 1.5);
        assert_eq!(converter.quote_from_native(250_000), 0.25);
    }

    #[test]
    fn degenerate_lot_sizes() {
        let converter = Converter::new(0, 0, 9, 9);
        assert_eq!(converter.price_from_lots(5), 0.0);
        assert_eq!(converter.quantity_lots_from_native(5), 0);
        assert_eq!(converter.price_lots_from_natives(5, 5), 0);
        assert_eq!(converter.price_from_natives(5, 0), 0.0);
    }

    #[test]
    fn approximate_flag() {
        let converter = Converter::new(1, 1, 9, 9);
        assert!(!converter.is_approximate());
        assert!(converter.with_approximate(true).is_approximate());
    }
}
