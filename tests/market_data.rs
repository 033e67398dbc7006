//! Quote provider fallback tests against stubbed provider endpoints.

use std::time::Duration;

use rust_decimal_macros::dec;
use serde_json::json;
use trading_sim::config::MarketDataConfig;
use trading_sim::error::AppError;
use trading_sim::market_data::{self, QuoteClient, Timeframe};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> QuoteClient {
    QuoteClient::new(MarketDataConfig {
        alpha_vantage_api_key: "test-key".into(),
        alpha_vantage_base_url: format!("{}/query", server.uri()),
        yahoo_api_key: "test-key".into(),
        yahoo_base_url: server.uri(),
        request_timeout: Duration::from_secs(2),
    })
    .unwrap()
}

fn alpha_quote_body(price: &str) -> serde_json::Value {
    json!({
        "Global Quote": {
            "01. symbol": "AAPL",
            "02. open": "189.50",
            "03. high": "191.00",
            "04. low": "188.00",
            "05. price": price,
            "06. volume": "51234567"
        }
    })
}

fn yahoo_chart_body(price: f64) -> serde_json::Value {
    json!({
        "chart": {
            "result": [{
                "meta": {
                    "regularMarketPrice": price,
                    "regularMarketOpen": price - 1.0,
                    "regularMarketDayHigh": price + 1.0,
                    "regularMarketDayLow": price - 2.0,
                    "regularMarketVolume": 1000
                }
            }]
        }
    })
}

#[tokio::test]
async fn primary_provider_quote_is_used_when_present() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("function", "GLOBAL_QUOTE"))
        .and(query_param("symbol", "AAPL"))
        .respond_with(ResponseTemplate::new(200).set_body_json(alpha_quote_body("190.25")))
        .mount(&server)
        .await;

    let quote = client_for(&server).fetch_quote("aapl").await.unwrap();
    assert_eq!(quote.price, dec!(190.25));
    assert_eq!(quote.open, dec!(189.50));
    assert_eq!(quote.volume, 51234567);
}

#[tokio::test]
async fn empty_primary_payload_falls_back_to_secondary() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Global Quote": {} })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stock/v3/get-chart"))
        .and(query_param("symbol", "AAPL"))
        .respond_with(ResponseTemplate::new(200).set_body_json(yahoo_chart_body(190.5)))
        .expect(1)
        .mount(&server)
        .await;

    let quote = client_for(&server).fetch_quote("AAPL").await.unwrap();
    assert_eq!(quote.price, dec!(190.5));
}

#[tokio::test]
async fn unparseable_primary_price_falls_back_instead_of_caching_zero() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(alpha_quote_body("N/A")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stock/v3/get-chart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(yahoo_chart_body(42.0)))
        .expect(1)
        .mount(&server)
        .await;

    let quote = client_for(&server).fetch_quote("AAPL").await.unwrap();
    assert_eq!(quote.price, dec!(42));
}

#[tokio::test]
async fn rate_limited_primary_falls_back_to_secondary() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Note": "Thank you for using our API, the standard limit is 25 requests per day"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stock/v3/get-chart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(yahoo_chart_body(99.0)))
        .mount(&server)
        .await;

    let quote = client_for(&server).fetch_quote("AAPL").await.unwrap();
    assert_eq!(quote.price, dec!(99));
}

#[tokio::test]
async fn both_providers_failing_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = client_for(&server).fetch_quote("AAPL").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn domestic_symbols_are_venue_qualified_for_providers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("symbol", "RELIANCE.BSE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(alpha_quote_body("2900.00")))
        .expect(1)
        .mount(&server)
        .await;

    let quote = client_for(&server).fetch_quote("RELIANCE").await.unwrap();
    assert_eq!(quote.price, dec!(2900.00));
}

#[tokio::test]
async fn history_is_newest_first_and_truncated_to_timeframe() {
    let server = MockServer::start().await;
    let mut series = serde_json::Map::new();
    for day in 1..=30 {
        series.insert(
            format!("2024-01-{day:02}"),
            json!({
                "1. open": "10.00",
                "2. high": "11.00",
                "3. low": "9.00",
                "4. close": format!("{day}.50"),
                "5. volume": "1000"
            }),
        );
    }
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("function", "TIME_SERIES_DAILY"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "Time Series (Daily)": serde_json::Value::Object(series) })),
        )
        .mount(&server)
        .await;

    let series = client_for(&server)
        .fetch_history("AAPL", Timeframe::OneMonth)
        .await
        .unwrap();
    assert_eq!(series.len(), 22);
    assert_eq!(series[0].price, dec!(30.50));
    assert_eq!(series[21].price, dec!(9.50));
    assert!(series[0].timestamp > series[21].timestamp);
}

#[tokio::test]
async fn history_falls_back_to_secondary_provider() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Error Message": "Invalid API call"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stock/v3/get-historical-data"))
        .and(query_param("range", "5d"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "prices": [
                { "date": 1704153600, "open": 11.0, "high": 12.0, "low": 10.0, "close": 11.5, "volume": 500.0 },
                { "date": 1704067200 },
                { "date": 1703980800, "open": 10.0, "high": 11.0, "low": 9.0, "close": 10.5, "volume": 400.0 }
            ]
        })))
        .mount(&server)
        .await;

    let series = client_for(&server)
        .fetch_history("AAPL", Timeframe::OneWeek)
        .await
        .unwrap();
    // The dividend-style row without close data is skipped.
    assert_eq!(series.len(), 2);
    assert_eq!(series[0].price, dec!(11.5));
    assert_eq!(series[1].price, dec!(10.5));
}

#[tokio::test]
async fn invalid_timeframe_is_rejected_without_any_request() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    let err = market_data::get_history(&client, "AAPL", "2X")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
}
