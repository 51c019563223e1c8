//! Binance public REST market data.
//!
//! Only two endpoints are used, both unauthenticated:
//! - `GET {base}/exchangeInfo` for the tradable symbol list
//! - `GET {base}/klines?symbol=&interval=&limit=` for candles
//!
//! Base URLs: `https://fapi.binance.com/fapi/v1` (futures) and
//! `https://api.binance.com/api/v3` (spot).
//!
//! Binance reports some failures with a 200 status and a JSON body of the
//! form `{"code": -1121, "msg": "Invalid symbol."}`. Those are treated as
//! "no data" for the symbol rather than as transport failures.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::MarketDataSource;
use crate::config::MarketConfig;
use crate::types::{Candle, CandleSeries, ScanError, SymbolClass, Timeframe};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const QUOTE_ASSET: &str = "USDT";
const TRADING_STATUS: &str = "TRADING";

/// Spot leveraged tokens, excluded from the spot universe.
const LEVERAGED_MARKERS: [&str; 4] = ["UP", "DOWN", "BEAR", "BULL"];

/// "Invalid symbol", returned for delisted pairs. Not worth a warning.
const INVALID_SYMBOL_CODE: i64 = -1121;

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    #[serde(default)]
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    #[serde(default)]
    status: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Binance REST client for one venue.
pub struct BinanceClient {
    http: Client,
    base_url: String,
    class: SymbolClass,
    max_retries: u32,
    retry_backoff: Duration,
}

impl BinanceClient {
    /// Create a client for the venue selected in `cfg`.
    pub fn new(cfg: &MarketConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .user_agent("ZONESCAN/0.1.0 (rsi-scanner)")
            .build()
            .context("Failed to build HTTP client for Binance")?;

        Ok(Self {
            http,
            base_url: cfg.base_url().trim_end_matches('/').to_string(),
            class: cfg.venue,
            max_retries: cfg.max_retries,
            retry_backoff: Duration::from_millis(cfg.retry_backoff_ms),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -- Internal helpers ------------------------------------------------

    /// Send a GET, retrying transport failures up to `max_retries` times
    /// with linear backoff. HTTP error statuses are not retried.
    async fn send(&self, url: &str) -> Result<reqwest::Response> {
        let mut attempt = 0u32;
        loop {
            match self.http.get(url).send().await {
                Ok(resp) => return Ok(resp),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    let wait = self.retry_backoff * attempt;
                    warn!(
                        url,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "Binance request failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) if e.is_timeout() => {
                    return Err(ScanError::Timeout(url.to_string()).into());
                }
                Err(e) => return Err(ScanError::Transport(format!("{url}: {e}")).into()),
            }
        }
    }

    /// Fetch and decode a JSON body. `Ok(None)` for Binance business errors.
    async fn fetch_json(&self, url: &str) -> Result<Option<Value>> {
        debug!(url, "Fetching Binance data");

        let resp = self.send(url).await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(ScanError::Transport(format!("HTTP {status} from {url}: {snippet}")).into());
        }

        let body: Value = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse Binance response from {url}"))?;

        if let Some(ScanError::Provider { code, message }) = business_error(&body) {
            if code != INVALID_SYMBOL_CODE {
                warn!(url, code, message = %message, "Binance API error");
            }
            return Ok(None);
        }

        Ok(Some(body))
    }
}

#[async_trait]
impl MarketDataSource for BinanceClient {
    async fn list_symbols(&self) -> Result<Vec<String>> {
        let url = format!("{}/exchangeInfo", self.base_url);
        let body = self
            .fetch_json(&url)
            .await?
            .ok_or_else(|| ScanError::SymbolList(format!("{} exchangeInfo returned an error", self.class)))?;

        let symbols = parse_symbols(body, self.class)?;
        debug!(count = symbols.len(), venue = %self.class, "Binance symbols listed");
        Ok(symbols)
    }

    async fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Result<Option<CandleSeries>> {
        let url = format!(
            "{}/klines?symbol={symbol}&interval={}&limit={limit}",
            self.base_url,
            timeframe.as_str()
        );

        match self.fetch_json(&url).await? {
            Some(body) => parse_klines(&body)
                .map(Some)
                .with_context(|| format!("Bad kline payload for {symbol} {timeframe}")),
            None => Ok(None),
        }
    }

    fn class(&self) -> SymbolClass {
        self.class
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// `Some(Provider)` when the body is a Binance error object with a negative code.
fn business_error(body: &Value) -> Option<ScanError> {
    let code = body.as_object()?.get("code")?.as_i64()?;
    if code >= 0 {
        return None;
    }
    let message = body
        .get("msg")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(ScanError::Provider { code, message })
}

/// Filter `exchangeInfo` down to tradable USDT pairs for the venue.
fn parse_symbols(body: Value, class: SymbolClass) -> Result<Vec<String>> {
    let info: ExchangeInfo = serde_json::from_value(body)
        .map_err(|e| ScanError::SymbolList(format!("invalid exchangeInfo body: {e}")))?;

    Ok(info
        .symbols
        .into_iter()
        .filter(|s| s.symbol.ends_with(QUOTE_ASSET) && s.status == TRADING_STATUS)
        .filter(|s| {
            class != SymbolClass::Spot || !LEVERAGED_MARKERS.iter().any(|m| s.symbol.contains(m))
        })
        .map(|s| s.symbol)
        .collect())
}

/// Kline rows are heterogeneous arrays:
/// `[openTime, "open", "high", "low", "close", "volume", closeTime, ...]`.
fn parse_klines(body: &Value) -> Result<CandleSeries> {
    let rows = body.as_array().context("kline payload is not an array")?;
    let candles = rows
        .iter()
        .enumerate()
        .map(|(i, row)| parse_kline_row(row).with_context(|| format!("kline row {i}")))
        .collect::<Result<Vec<_>>>()?;
    Ok(CandleSeries::new(candles))
}

fn parse_kline_row(row: &Value) -> Result<Candle> {
    let cols = row.as_array().context("row is not an array")?;
    let num = |idx: usize| -> Result<f64> {
        let v = cols.get(idx).with_context(|| format!("missing column {idx}"))?;
        match v {
            Value::String(s) => s
                .parse::<f64>()
                .with_context(|| format!("column {idx} is not numeric: {s}")),
            Value::Number(n) => n.as_f64().with_context(|| format!("column {idx} out of range")),
            other => anyhow::bail!("column {idx} has unexpected type: {other}"),
        }
    };
    let time = |idx: usize| -> Result<i64> {
        cols.get(idx)
            .and_then(Value::as_i64)
            .with_context(|| format!("column {idx} is not a timestamp"))
    };

    Ok(Candle {
        open_time: time(0)?,
        open: num(1)?,
        high: num(2)?,
        low: num(3)?,
        close: num(4)?,
        volume: num(5)?,
        close_time: time(6)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// How the local server answers each request.
    #[derive(Clone)]
    enum Reply {
        Status(&'static str, &'static str),
        Drop,
        Hang,
    }

    /// Serve `reply` on a loopback port. Returns the base URL and a counter
    /// of requests received.
    async fn serve(reply: Reply) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else { break };
                let reply = reply.clone();
                let counter = counter.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match stream.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    counter.fetch_add(1, Ordering::SeqCst);

                    match reply {
                        Reply::Status(status, body) => {
                            let resp = format!(
                                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                                body.len()
                            );
                            let _ = stream.write_all(resp.as_bytes()).await;
                            let _ = stream.shutdown().await;
                        }
                        Reply::Drop => drop(stream),
                        Reply::Hang => {
                            tokio::time::sleep(Duration::from_secs(30)).await;
                            drop(stream);
                        }
                    }
                });
            }
        });

        (format!("http://{addr}"), hits)
    }

    fn client_for(base: String, max_retries: u32) -> BinanceClient {
        let cfg = MarketConfig {
            futures_base_url: base,
            request_timeout_secs: 1,
            max_retries,
            retry_backoff_ms: 10,
            ..MarketConfig::default()
        };
        BinanceClient::new(&cfg).unwrap()
    }

    fn exchange_info() -> Value {
        json!({
            "timezone": "UTC",
            "symbols": [
                {"symbol": "BTCUSDT", "status": "TRADING"},
                {"symbol": "ETHBTC", "status": "TRADING"},
                {"symbol": "LUNAUSDT", "status": "BREAK"},
                {"symbol": "BTCUPUSDT", "status": "TRADING"},
                {"symbol": "ETHBEARUSDT", "status": "TRADING"},
                {"symbol": "SOLUSDT", "status": "TRADING"}
            ]
        })
    }

    #[test]
    fn test_parse_symbols_futures() {
        let symbols = parse_symbols(exchange_info(), SymbolClass::Futures).unwrap();
        assert_eq!(symbols, vec!["BTCUSDT", "BTCUPUSDT", "ETHBEARUSDT", "SOLUSDT"]);
    }

    #[test]
    fn test_parse_symbols_spot_drops_leveraged_tokens() {
        let symbols = parse_symbols(exchange_info(), SymbolClass::Spot).unwrap();
        assert_eq!(symbols, vec!["BTCUSDT", "SOLUSDT"]);
    }

    #[test]
    fn test_parse_symbols_rejects_garbage() {
        assert!(parse_symbols(json!({"symbols": "nope"}), SymbolClass::Futures).is_err());
        // Missing list is an empty universe, not a parse error.
        assert!(parse_symbols(json!({}), SymbolClass::Futures).unwrap().is_empty());
    }

    #[test]
    fn test_parse_klines() {
        let body = json!([
            [1700000000000i64, "1.0", "1.5", "0.9", "1.2", "1000.5", 1700000899999i64, "1200", 10, "1", "1", "0"],
            [1700000900000i64, "1.2", "1.3", "1.1", "1.25", "800", 1700001799999i64, "1000", 8, "1", "1", "0"]
        ]);
        let series = parse_klines(&body).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.closes(), vec![1.2, 1.25]);
        assert_eq!(series.volumes(), vec![1000.5, 800.0]);
        assert_eq!(series.candles[0].open_time, 1_700_000_000_000);
        assert_eq!(series.candles[1].close_time, 1_700_001_799_999);
    }

    #[test]
    fn test_parse_klines_accepts_numbers() {
        let body = json!([[0, 1.0, 2.0, 0.5, 1.5, 10, 59999]]);
        let series = parse_klines(&body).unwrap();
        assert_eq!(series.last_close(), Some(1.5));
    }

    #[test]
    fn test_parse_klines_bad_rows() {
        assert!(parse_klines(&json!({"not": "rows"})).is_err());
        assert!(parse_klines(&json!([[0, "1", "1"]])).is_err());
        assert!(parse_klines(&json!([[0, "1", "1", "1", "abc", "1", 1]])).is_err());
        assert!(parse_klines(&json!([])).unwrap().is_empty());
    }

    #[test]
    fn test_business_error() {
        let err = business_error(&json!({"code": -1121, "msg": "Invalid symbol."}));
        match err {
            Some(ScanError::Provider { code, message }) => {
                assert_eq!(code, -1121);
                assert_eq!(message, "Invalid symbol.");
            }
            other => panic!("expected provider error, got {other:?}"),
        }
        assert!(business_error(&json!({"code": 0, "msg": "ok"})).is_none());
        assert!(business_error(&json!([[0, "1"]])).is_none());
        assert!(business_error(&exchange_info()).is_none());
    }

    #[test]
    fn test_client_uses_venue_base_url() {
        let spot = MarketConfig {
            venue: SymbolClass::Spot,
            spot_base_url: "https://api.binance.com/api/v3/".to_string(),
            ..MarketConfig::default()
        };
        let client = BinanceClient::new(&spot).unwrap();
        assert_eq!(client.base_url(), "https://api.binance.com/api/v3");
        assert_eq!(client.class(), SymbolClass::Spot);

        let futures = BinanceClient::new(&MarketConfig::default()).unwrap();
        assert_eq!(futures.base_url(), "https://fapi.binance.com/fapi/v1");
        assert_eq!(futures.class(), SymbolClass::Futures);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let cfg = MarketConfig {
            futures_base_url: "http://127.0.0.1:1".to_string(),
            request_timeout_secs: 2,
            ..MarketConfig::default()
        };
        let client = BinanceClient::new(&cfg).unwrap();
        let err = client.list_symbols().await.unwrap_err();
        assert!(err.downcast_ref::<ScanError>().is_some());
    }

    #[tokio::test]
    async fn test_invalid_symbol_body_is_no_data() {
        let (base, hits) = serve(Reply::Status("200 OK", r#"{"code":-1121,"msg":"Invalid symbol."}"#)).await;
        let client = client_for(base, 3);

        let series = client.get_candles("GONEUSDT", Timeframe::H1, 100).await.unwrap();
        assert!(series.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_klines_over_http() {
        let (base, _) = serve(Reply::Status(
            "200 OK",
            r#"[[0,"1.0","1.5","0.9","1.2","1000",899999],[900000,"1.2","1.3","1.1","1.25","800",1799999]]"#,
        ))
        .await;
        let client = client_for(base, 0);

        let series = client.get_candles("BTCUSDT", Timeframe::M15, 2).await.unwrap().unwrap();
        assert_eq!(series.closes(), vec![1.2, 1.25]);
    }

    #[tokio::test]
    async fn test_error_exchange_info_is_symbol_list_error() {
        let (base, _) = serve(Reply::Status("200 OK", r#"{"code":-1003,"msg":"Too many requests."}"#)).await;
        let client = client_for(base, 0);

        let err = client.list_symbols().await.unwrap_err();
        assert!(matches!(err.downcast_ref::<ScanError>(), Some(ScanError::SymbolList(_))));
    }

    #[tokio::test]
    async fn test_http_error_status_is_not_retried() {
        let (base, hits) = serve(Reply::Status("500 Internal Server Error", r#"{"error":"boom"}"#)).await;
        let client = client_for(base, 3);

        let err = client.get_candles("BTCUSDT", Timeframe::H4, 100).await.unwrap_err();
        match err.downcast_ref::<ScanError>() {
            Some(ScanError::Transport(msg)) => assert!(msg.contains("HTTP 500"), "{msg}"),
            other => panic!("expected transport error, got {other:?}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropped_connections_are_retried() {
        let (base, hits) = serve(Reply::Drop).await;
        let client = client_for(base, 2);

        let err = client.get_candles("BTCUSDT", Timeframe::D1, 100).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<ScanError>(), Some(ScanError::Transport(_))));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let (base, hits) = serve(Reply::Hang).await;
        let client = client_for(base, 0);

        let err = client.get_candles("BTCUSDT", Timeframe::H8, 100).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<ScanError>(), Some(ScanError::Timeout(_))));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
