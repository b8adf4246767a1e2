//! Fixed-width UTC text timestamps, so lexicographic and chronological order coincide.

use time::{
	OffsetDateTime, PrimitiveDateTime, UtcOffset, format_description::FormatItem,
	macros::format_description,
};

use crate::{Error, Result};

const FORMAT: &[FormatItem<'static>] =
	format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z");

/// Current time at the precision the store keeps.
pub fn now() -> OffsetDateTime {
	truncate(OffsetDateTime::now_utc())
}

pub fn truncate(value: OffsetDateTime) -> OffsetDateTime {
	let value = value.to_offset(UtcOffset::UTC);
	let micros = value.nanosecond() / 1_000;

	value.replace_nanosecond(micros * 1_000).unwrap_or(value)
}

pub fn format(value: OffsetDateTime) -> Result<String> {
	Ok(value.to_offset(UtcOffset::UTC).format(FORMAT)?)
}

pub fn parse(raw: &str) -> Result<OffsetDateTime> {
	PrimitiveDateTime::parse(raw, FORMAT)
		.map(PrimitiveDateTime::assume_utc)
		.map_err(|source| Error::Timestamp { raw: raw.to_string(), source })
}

pub fn parse_opt(raw: Option<&str>) -> Result<Option<OffsetDateTime>> {
	raw.map(parse).transpose()
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use super::*;

	#[test]
	fn formats_fixed_width_utc() {
		let value = datetime!(2026-03-04 05:06:07.123456789 +02:00);

		assert_eq!(format(value).expect("Failed to format."), "2026-03-04T03:06:07.123456Z");
	}

	#[test]
	fn parse_inverts_format_after_truncation() {
		let value = truncate(datetime!(2026-03-04 05:06:07.987654321 UTC));
		let raw = format(value).expect("Failed to format.");

		assert_eq!(parse(&raw).expect("Failed to parse."), value);
	}

	#[test]
	fn text_order_follows_time_order() {
		let earlier = format(datetime!(2026-03-04 09:59:59.999999 UTC)).expect("Failed to format.");
		let later = format(datetime!(2026-03-04 10:00:00 UTC)).expect("Failed to format.");

		assert!(earlier < later);
	}

	#[test]
	fn rejects_malformed_text() {
		assert!(matches!(parse("yesterday"), Err(Error::Timestamp { .. })));
	}
}
