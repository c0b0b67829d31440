use chrono::{DateTime, Utc};

/// Convert a node block timestamp (seconds since the Unix epoch) into a UTC datetime.
pub fn timestamp_to_datetime(timestamp_secs: u64) -> Option<DateTime<Utc>> {
	let secs = i64::try_from(timestamp_secs).ok()?;
	DateTime::from_timestamp(secs, 0)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn converts_seconds() {
		let dt = timestamp_to_datetime(1_700_000_000).unwrap();
		assert_eq!(dt.timestamp(), 1_700_000_000);
		assert_eq!(timestamp_to_datetime(u64::MAX), None);
	}
}
