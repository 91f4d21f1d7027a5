use anyhow::{bail, ensure, Context};
use chrono::{Local, NaiveDate};

/// Accepts `YYYY-MM-DD`, `YYYYMMDD`, `YYYY-MM`, `YYYY`, optionally followed by a validated time
/// and UTC offset. Offsets are not applied to the date.
pub fn parse_iso_date(raw: &str) -> anyhow::Result<NaiveDate> {
    let s = raw.trim();
    ensure!(!s.is_empty(), "empty date");

    let (date, time) = match s.find(|c| c == 'T' || c == ' ') {
        Some(i) => (&s[..i], Some(&s[i + 1..])),
        None => (s, None),
    };

    let parsed = match time {
        None => parse_date(date)?,
        Some(time) => {
            ensure!(
                date.len() == 10 || date.len() == 8,
                "date-time needs a full date: {s}"
            );
            let parsed = parse_date(date)?;
            check_time(time).with_context(|| format!("invalid time in {s}"))?;
            parsed
        }
    };
    Ok(parsed)
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    let bytes = s.as_bytes();
    let digits = |r: std::ops::Range<usize>| bytes[r].iter().all(u8::is_ascii_digit);

    let (year, month, day) = match bytes.len() {
        10 if digits(0..4) && bytes[4] == b'-' && digits(5..7) && bytes[7] == b'-' && digits(8..10) => {
            (&s[0..4], &s[5..7], &s[8..10])
        }
        8 if digits(0..8) => (&s[0..4], &s[4..6], &s[6..8]),
        7 if digits(0..4) && bytes[4] == b'-' && digits(5..7) => (&s[0..4], &s[5..7], "01"),
        4 if digits(0..4) => (s, "01", "01"),
        _ => bail!("not an ISO-8601 date: {s}"),
    };

    NaiveDate::from_ymd_opt(year.parse()?, month.parse()?, day.parse()?)
        .with_context(|| format!("no such calendar date: {s}"))
}

fn check_time(s: &str) -> anyhow::Result<()> {
    let s = s.strip_suffix('Z').unwrap_or(s);
    let (clock, offset) = match s.find(|c| c == '+' || c == '-') {
        Some(i) => (&s[..i], Some(&s[i + 1..])),
        None => (s, None),
    };

    let (clock, fraction) = match clock.find(|c| c == '.' || c == ',') {
        Some(i) => (&clock[..i], Some(&clock[i + 1..])),
        None => (clock, None),
    };

    let fields = clock_fields(clock)?;
    ensure!(!fields.is_empty() && fields.len() <= 3, "bad clock: {clock}");
    for (value, limit) in fields.iter().zip([24, 60, 60]) {
        ensure!(*value < limit, "clock field out of range: {clock}");
    }
    if let Some(fraction) = fraction {
        ensure!(
            fields.len() == 3 && !fraction.is_empty() && fraction.bytes().all(|b| b.is_ascii_digit()),
            "bad fractional seconds: {fraction}"
        );
    }

    if let Some(offset) = offset {
        let fields = clock_fields(offset)?;
        ensure!(
            matches!(fields.as_slice(), [h] | [h, _] if *h < 24)
                && fields.get(1).map_or(true, |m| *m < 60),
            "bad UTC offset: {offset}"
        );
    }
    Ok(())
}

// "08:15:00" or "081500" into [8, 15, 0].
fn clock_fields(s: &str) -> anyhow::Result<Vec<u32>> {
    let parts: Vec<&str> = if s.contains(':') {
        s.split(':').collect()
    } else {
        ensure!(s.len() % 2 == 0 && s.is_ascii(), "bad clock: {s}");
        (0..s.len()).step_by(2).map(|i| &s[i..i + 2]).collect()
    };
    parts
        .iter()
        .map(|p| {
            ensure!(p.len() == 2 && p.bytes().all(|b| b.is_ascii_digit()), "bad clock: {s}");
            Ok(p.parse::<u32>()?)
        })
        .collect()
}
