use serde::Serialize;

/// One mandi quote, price in rupees per quintal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MarketPrice {
    pub commodity: &'static str,
    pub price_per_quintal: u32,
    pub mandi: &'static str,
    pub date: &'static str,
}

const fn quote(commodity: &'static str, price: u32, mandi: &'static str) -> MarketPrice {
    MarketPrice { commodity, price_per_quintal: price, mandi, date: "2025-01-15" }
}

const PUNJAB_MANDI_PRICES: &[MarketPrice] = &[
    quote("Wheat", 2450, "Patiala"),
    quote("Rice (Basmati)", 3200, "Amritsar"),
    quote("Maize", 1950, "Ludhiana"),
    quote("Cotton", 6800, "Bathinda"),
    quote("Mustard", 5800, "Sangrur"),
    quote("Gram", 5200, "Moga"),
    quote("Potato", 1800, "Jalandhar"),
    quote("Bajra", 2200, "Fazilka"),
    quote("Sugarcane", 340, "Hoshiarpur"),
    quote("Vegetables", 2800, "Kapurthala"),
];

/// Static quote list, optionally narrowed to one mandi district (case-insensitive).
pub fn market_prices(district: Option<&str>) -> Vec<MarketPrice> {
    let filter = district.map(str::trim).filter(|district| !district.is_empty());
    PUNJAB_MANDI_PRICES
        .iter()
        .filter(|quote| filter.map_or(true, |district| quote.mandi.eq_ignore_ascii_case(district)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::market_prices;

    #[test]
    fn unfiltered_list_has_every_quote() {
        assert_eq!(market_prices(None).len(), 10);
        assert_eq!(market_prices(Some("  ")).len(), 10);
    }

    #[test]
    fn district_filter_ignores_case() {
        let prices = market_prices(Some("patiala"));

        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0].commodity, "Wheat");
        assert_eq!(prices[0].price_per_quintal, 2450);
    }

    #[test]
    fn unknown_district_yields_empty_list() {
        assert!(market_prices(Some("Atlantis")).is_empty());
    }
}
