//! Exchange snapshot CSV records.
//!
//! # Column layout
//!
//! | Index | Field |
//! |-------|-------|
//! | 0 | tradingDay (YYYYMMDD) |
//! | 1 | tradeTime (HHMMSS) |
//! | 4 | instrument code |
//! | 8 | last price |
//! | 12 / 13 | market-wide bid / ask volume |
//! | 17 + 4(i-1) .. 20 + 4(i-1) | bp_i, bv_i, ap_i, av_i for i = 1..=5 |
//!
//! Columns not listed (receive time, MIC, cumulative counters, ...) are
//! ignored. Lines may carry trailing columns beyond index 36.

use chrono::NaiveDate;

use crate::error::{FactorError, Result};
use crate::types::{Snapshot, TradeTime, BOOK_LEVELS};

/// Minimum number of comma-separated fields in a data line.
pub const MIN_FIELDS: usize = 37;

const COL_TRADING_DAY: usize = 0;
const COL_TRADE_TIME: usize = 1;
const COL_CODE: usize = 4;
const COL_LAST: usize = 8;
const COL_MARKET_BID_VOL: usize = 12;
const COL_MARKET_ASK_VOL: usize = 13;
const COL_FIRST_LEVEL: usize = 17;
const FIELDS_PER_LEVEL: usize = 4;

/// Whether `line` is a header or blank line rather than data.
#[inline]
pub fn is_header_or_blank(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with("tradingDay") || trimmed.starts_with("tradeTime")
}

/// Parse one CSV line.
///
/// Returns `Ok(None)` for header and blank lines, and
/// [`FactorError::MalformedRecord`] when a required field is missing or does
/// not parse.
pub fn parse_line(line: &str) -> Result<Option<Snapshot>> {
    if is_header_or_blank(line) {
        return Ok(None);
    }

    let fields: Vec<&str> = line.trim_end().split(',').map(str::trim).collect();
    if fields.len() < MIN_FIELDS {
        return Err(FactorError::malformed(format!(
            "expected at least {} fields, got {}",
            MIN_FIELDS,
            fields.len()
        )));
    }

    let trading_day: u32 = parse_field(&fields, COL_TRADING_DAY, "tradingDay")?;
    validate_trading_day(trading_day)?;

    let raw_time: u32 = parse_field(&fields, COL_TRADE_TIME, "tradeTime")?;
    let trade_time = TradeTime::from_hhmmss(raw_time)?;

    let instrument = fields[COL_CODE];
    if instrument.is_empty() {
        return Err(FactorError::malformed("empty instrument code"));
    }

    let mut snapshot = Snapshot::new(trading_day, trade_time, instrument);
    snapshot.last_price = parse_field(&fields, COL_LAST, "last")?;
    snapshot.market_bid_volume = parse_field(&fields, COL_MARKET_BID_VOL, "tBidVol")?;
    snapshot.market_ask_volume = parse_field(&fields, COL_MARKET_ASK_VOL, "tAskVol")?;

    for i in 0..BOOK_LEVELS {
        let base = COL_FIRST_LEVEL + i * FIELDS_PER_LEVEL;
        snapshot.bid_prices[i] = parse_field(&fields, base, "bp")?;
        snapshot.bid_volumes[i] = parse_field(&fields, base + 1, "bv")?;
        snapshot.ask_prices[i] = parse_field(&fields, base + 2, "ap")?;
        snapshot.ask_volumes[i] = parse_field(&fields, base + 3, "av")?;
    }

    Ok(Some(snapshot))
}

/// Render a snapshot as a data line in the same layout.
///
/// Ignored columns are written as `0`, and `MIC` as an empty field.
pub fn to_csv_line(snapshot: &Snapshot) -> String {
    let mut fields = vec![String::from("0"); MIN_FIELDS];
    fields[COL_TRADING_DAY] = snapshot.trading_day.to_string();
    fields[COL_TRADE_TIME] = snapshot.trade_time.hhmmss().to_string();
    fields[3] = String::new();
    fields[COL_CODE] = snapshot.instrument.clone();
    fields[COL_LAST] = snapshot.last_price.to_string();
    fields[COL_MARKET_BID_VOL] = snapshot.market_bid_volume.to_string();
    fields[COL_MARKET_ASK_VOL] = snapshot.market_ask_volume.to_string();

    for i in 0..BOOK_LEVELS {
        let base = COL_FIRST_LEVEL + i * FIELDS_PER_LEVEL;
        fields[base] = snapshot.bid_prices[i].to_string();
        fields[base + 1] = snapshot.bid_volumes[i].to_string();
        fields[base + 2] = snapshot.ask_prices[i].to_string();
        fields[base + 3] = snapshot.ask_volumes[i].to_string();
    }

    fields.join(",")
}

/// Header line matching [`to_csv_line`].
pub fn csv_header() -> &'static str {
    "tradingDay,tradeTime,recvTime,MIC,code,cumCnt,cumVol,turnover,last,open,high,low,\
     tBidVol,tAskVol,wBidPrc,wAskPrc,openInterest,\
     bp1,bv1,ap1,av1,bp2,bv2,ap2,av2,bp3,bv3,ap3,av3,bp4,bv4,ap4,av4,bp5,bv5,ap5,av5"
}

fn parse_field<T: std::str::FromStr>(fields: &[&str], idx: usize, name: &str) -> Result<T> {
    let raw = fields[idx];
    raw.parse().map_err(|_| {
        FactorError::malformed(format!("field {} ({}) is not a number: '{}'", idx, name, raw))
    })
}

fn validate_trading_day(day: u32) -> Result<()> {
    let year = (day / 10_000) as i32;
    let month = (day / 100) % 100;
    let dom = day % 100;
    if NaiveDate::from_ymd_opt(year, month, dom).is_none() {
        return Err(FactorError::malformed(format!(
            "tradingDay {} is not a calendar date",
            day
        )));
    }
    Ok(())
}
