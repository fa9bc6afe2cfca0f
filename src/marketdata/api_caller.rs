use std::collections::HashMap;

use chrono::{Duration, NaiveDate, NaiveTime, TimeZone};

use super::response;
use crate::constants;
use crate::http::client::{self, RequestError};
use crate::model;

/// Fetches the daily bar for one ticker on one trading day from the
/// Yahoo chart API. `Ok(None)` means the ticker had no data for that
/// day (not listed, suspended, or a non-trading day).
pub async fn daily_bar(
    ticker: &str,    // Yahoo symbol, e.g. AGL.JO.
    date: NaiveDate, // Trading day, exchange-local.
) -> Result<Option<model::OhlcvRecord>, RequestError> {
    let start = constants::JSE_TZ
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .single()
        .ok_or_else(|| RequestError::Other(format!("ambiguous local midnight for {date}")))?;
    let end = start + Duration::days(1);

    let period1 = start.timestamp().to_string();
    let period2 = end.timestamp().to_string();
    let params = HashMap::from([
        ("period1", period1.as_str()),
        ("period2", period2.as_str()),
        ("interval", "1d"),
        ("events", "history"),
    ]);

    let url = format!("{}/{}", constants::YAHOO_CHART_URL, ticker);
    let resp = client::get_json::<response::ChartResponse>(&url, params).await?;

    if let Some(err) = resp.chart.error {
        return Err(RequestError::Other(format!("{}: {}", err.code, err.description)));
    }

    let result = match resp.chart.result.and_then(|mut results| {
        if results.is_empty() { None } else { Some(results.remove(0)) }
    }) {
        Some(result) => result,
        None => return Ok(None),
    };

    Ok(record_for_date(ticker, date, &result))
}

// Maps the parallel chart arrays onto the canonical record for the
// requested day. The close is required; a nulled close slot means no bar.
fn record_for_date(
    ticker: &str,
    date: NaiveDate,
    result: &response::ChartResult,
) -> Option<model::OhlcvRecord> {
    let timestamps = result.timestamp.as_ref()?;
    let quote = result.indicators.quote.first()?;

    let index = timestamps.iter().position(|ts| {
        constants::JSE_TZ
            .timestamp_opt(*ts, 0)
            .single()
            .map(|dt| dt.date_naive() == date)
            .unwrap_or(false)
    })?;

    let closing_price = quote.close.get(index).copied().flatten()?;
    Some(model::OhlcvRecord {
        trade_date: date,
        ticker: ticker.to_string(),
        company_name: None,
        opening_price: quote.open.get(index).copied().flatten(),
        high: quote.high.get(index).copied().flatten(),
        low: quote.low.get(index).copied().flatten(),
        closing_price,
        volume: quote.volume.get(index).copied().flatten(),
    })
}
