//! Logger initialization for the server.

use std::{fmt::Write, str::FromStr, sync::Once};

use jiff::{Zoned, tz::TimeZone};
use logforth::{append::Stderr, filter::EnvFilter, layout::Layout};

static INIT: Once = Once::new();

/// Single-line layout: UTC timestamp, level, module target, message.
///
/// Plain text only; proxy logs normally land in a collector, not a
/// terminal, and the per-request lines already carry the request id.
#[derive(Debug)]
struct ProxyLayout;

impl Layout for ProxyLayout {
    fn format(
        &self,
        record: &log::Record<'_>,
        _diagnostics: &[Box<dyn logforth::diagnostic::Diagnostic>],
    ) -> anyhow::Result<Vec<u8>> {
        let now = Zoned::now().with_time_zone(TimeZone::UTC);

        let mut line = String::new();

        write!(
            line,
            "{} {:<5} {}: {}",
            now.strftime("%Y-%m-%dT%H:%M:%S%.3fZ"),
            record.level(),
            record.target(),
            record.args()
        )?;

        Ok(line.into_bytes())
    }
}

/// Initialize the stderr logger. The filter should be a string like "info"
/// or "translator=debug,server=debug".
pub(crate) fn init(log_filter: &str) {
    let log_filter = log_filter.to_owned();

    INIT.call_once(move || {
        logforth::builder()
            .dispatch(move |dispatch| {
                let filter = EnvFilter::from_str(&log_filter)
                    .unwrap_or_else(|_| EnvFilter::from_str("info").expect("default filter should be valid"));

                dispatch
                    .filter(filter)
                    .append(Stderr::default().with_layout(ProxyLayout))
            })
            .apply();
    });
}
