//! Scaling decoded readings to milli-units and writing them to the sink.

use log::{info, warn};
use serde::Serialize;

use crate::errors::PipelineError;
use crate::sink::RegisterSink;
use crate::sml::extract::unit_symbol;
use crate::sml::{DecodedValue, MetricPattern};

/// Registers hold values in thousandths of the reading's unit.
const MILLI_EXPONENT: i32 = 3;

/// `round(value * 10^scaler * 1000)`, truncated to the low 32 bits.
///
/// Readings that do not fit wrap the same way a plain 32-bit register write
/// would. A Wh counter at scaler 0 overflows past about 2.1 MWh.
pub fn scale_to_milli(value: i64, scaler: i8) -> i32 {
    let scaled = (value as f64 * 10f64.powi(i32::from(scaler) + MILLI_EXPONENT)).round();
    scaled as i64 as i32
}

/// One successful register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Published {
    pub index: usize,
    pub name: &'static str,
    pub value: i32,
}

/// What publishing one datagram's readings produced.
#[derive(Debug, Default, Serialize)]
pub struct PublishReport {
    pub published: Vec<Published>,
    /// Metrics that were present but could not be written.
    #[serde(skip)]
    pub failures: Vec<(usize, PipelineError)>,
}

/// Publish every present reading to its positional register.
///
/// `values[i]` belongs to `metrics[i]`. Missing readings are skipped; a
/// reading without a register or with a failed write is logged and dropped
/// while the remaining readings are still published.
pub fn publish_all<K: RegisterSink + ?Sized>(
    metrics: &[MetricPattern],
    values: &[Option<DecodedValue>],
    sink: &mut K,
) -> PublishReport {
    let mut report = PublishReport::default();
    let slots = sink.slot_count();

    for (index, (metric, decoded)) in metrics.iter().zip(values).enumerate() {
        let Some(decoded) = decoded else {
            continue;
        };
        if index >= slots {
            warn!(
                "Number of metrics exceeds the {} available register slots; ignoring metric {}",
                slots, metric.name
            );
            report
                .failures
                .push((index, PipelineError::SlotOverflow { index, slots }));
            continue;
        }

        let value = scale_to_milli(decoded.value, decoded.scaler);
        match sink.publish(index, value) {
            Ok(()) => {
                info!(
                    "Published metric {} = {} (raw {} {} scaler {})",
                    metric.name,
                    value,
                    decoded.value,
                    unit_symbol(decoded.unit),
                    decoded.scaler
                );
                report.published.push(Published {
                    index,
                    name: metric.name,
                    value,
                });
            }
            Err(e) => {
                warn!("Failed to publish metric {}: {}", metric.name, e);
                report.failures.push((index, e.into()));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RegisterBank;
    use crate::sml::METRICS;

    fn dv(value: i64, scaler: i8) -> Option<DecodedValue> {
        Some(DecodedValue {
            value,
            unit: 0x1E,
            scaler,
        })
    }

    #[test]
    fn scaling_rounds_to_milli_units() {
        assert_eq!(scale_to_milli(916, -1), 91_600);
        assert_eq!(scale_to_milli(916, 0), 916_000);
        assert_eq!(scale_to_milli(12346, -4), 1235);
        assert_eq!(scale_to_milli(-12346, -4), -1235);
        assert_eq!(scale_to_milli(-200, 0), -200_000);
        assert_eq!(scale_to_milli(7, -6), 0);
    }

    #[test]
    fn out_of_range_wraps_to_low_32_bits() {
        let big = i64::from(i32::MAX) + 1;
        assert_eq!(scale_to_milli(big, -3), i32::MIN);
    }

    #[test]
    fn skips_absent_and_reports_slot_overflow() {
        let mut bank = RegisterBank::new(1);
        let values = [dv(916, -1), None, dv(5, 0)];
        let report = publish_all(METRICS, &values, &mut bank);
        assert_eq!(
            report.published,
            vec![Published {
                index: 0,
                name: "power_in",
                value: 91_600
            }]
        );
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            report.failures[0],
            (2, PipelineError::SlotOverflow { index: 2, slots: 1 })
        ));
        assert_eq!(bank.get(0), Some(91_600));
        assert_eq!(bank.writes(), 1);
    }
}
