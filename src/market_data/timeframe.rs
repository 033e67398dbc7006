//! Historical-query timeframes and their per-provider query parameters.

/// Fixed set of history windows the API accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    OneDay,
    OneWeek,
    OneMonth,
    OneYear,
    FiveYears,
    All,
}

impl Timeframe {
    pub fn parse(s: &str) -> Option<Timeframe> {
        match s.to_ascii_uppercase().as_str() {
            "1D" => Some(Timeframe::OneDay),
            "1W" => Some(Timeframe::OneWeek),
            "1M" => Some(Timeframe::OneMonth),
            "1Y" => Some(Timeframe::OneYear),
            "5Y" => Some(Timeframe::FiveYears),
            "ALL" => Some(Timeframe::All),
            _ => None,
        }
    }

    /// How many points a history response is truncated to.
    pub fn data_points(self) -> usize {
        match self {
            Timeframe::OneDay => 78, // 6.5 trading hours of 5-minute bars
            Timeframe::OneWeek => 5,
            Timeframe::OneMonth => 22,
            Timeframe::OneYear => 52,
            Timeframe::FiveYears => 260,
            Timeframe::All => 520,
        }
    }

    /// Alpha-Vantage-style time-series function for this window.
    pub(crate) fn alpha_function(self) -> &'static str {
        match self {
            Timeframe::OneDay => "TIME_SERIES_INTRADAY",
            Timeframe::OneWeek | Timeframe::OneMonth => "TIME_SERIES_DAILY",
            Timeframe::OneYear | Timeframe::FiveYears | Timeframe::All => "TIME_SERIES_WEEKLY",
        }
    }

    /// Intraday queries carry an explicit interval parameter.
    pub(crate) fn alpha_interval(self) -> Option<&'static str> {
        match self {
            Timeframe::OneDay => Some("5min"),
            _ => None,
        }
    }

    pub(crate) fn yahoo_range(self) -> &'static str {
        match self {
            Timeframe::OneDay => "1d",
            Timeframe::OneWeek => "5d",
            Timeframe::OneMonth => "1mo",
            Timeframe::OneYear => "1y",
            Timeframe::FiveYears => "5y",
            Timeframe::All => "max",
        }
    }

    pub(crate) fn yahoo_interval(self) -> &'static str {
        match self {
            Timeframe::OneDay => "5m",
            Timeframe::OneWeek => "15m",
            Timeframe::OneMonth => "1d",
            Timeframe::OneYear => "1d",
            Timeframe::FiveYears => "1wk",
            Timeframe::All => "1mo",
        }
    }
}
