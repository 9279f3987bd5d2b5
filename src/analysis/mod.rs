/// Analysis layer: alignment of model output against observations and the
/// goodness-of-fit statistics over the reconciled pairs.

pub mod align;
pub mod stats;

use crate::data::error::DataError;
use crate::data::model::Bundle;

use align::{AlignOptions, AlignedTable};
use stats::{calc_stats, Stats};

/// Extract, align, and compute metrics in one call.
///
/// `model_key`/`obs_key` select datasets in the bundle; the queries select a
/// channel each (exact name before substring). Returns the aligned table and
/// its statistics; zero overlap is a valid result (`stats.n == 0`), not an
/// error.
pub fn compare(
    bundle: &Bundle,
    model_key: &str,
    model_query: &str,
    obs_key: &str,
    obs_query: &str,
    options: &AlignOptions,
) -> Result<(AlignedTable, Stats), DataError> {
    let model = bundle.series(model_key, model_query)?;
    let obs = bundle.series(obs_key, obs_query)?;

    let table = align::align(&model, &obs, options);
    let stats = calc_stats(&table.model_values(), &table.obs_values());

    log::info!(
        "Compared {model_key}:'{}' against {obs_key}:'{}' — {} aligned pairs",
        model.name,
        obs.name,
        stats.n
    );

    Ok((table, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Channel, ChannelGroup, Dataset, Timestamp};
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn ts(h: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn bundle() -> Bundle {
        let mut bundle = Bundle::default();
        bundle.insert(Dataset {
            name: "maob1.csv".into(),
            path: PathBuf::from("maob1.csv"),
            groups: vec![ChannelGroup::new(
                "",
                vec![ts(0), ts(1), ts(2)],
                vec![Channel::new(
                    "Current speed",
                    Some("m/s".into()),
                    vec![1.0, 2.0, 3.0],
                )],
            )
            .unwrap()],
        });
        bundle.insert(Dataset {
            name: "adcp.json".into(),
            path: PathBuf::from("adcp.json"),
            groups: vec![ChannelGroup::new(
                "Bins[0]",
                vec![ts(0), ts(2)],
                vec![Channel::new("Speed", None, vec![1.1, 2.9])],
            )
            .unwrap()],
        });
        bundle
    }

    #[test]
    fn end_to_end_inner_compare() {
        let opts = AlignOptions {
            method: align::AlignMethod::Inner,
            ..Default::default()
        };
        let (table, stats) =
            compare(&bundle(), "maob1", "current speed", "adcp", "Speed", &opts).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(stats.n, 2);
        let bias = stats.gof.unwrap().bias;
        assert!((bias - (-0.05)).abs() < 1e-12);
    }

    #[test]
    fn unknown_key_propagates() {
        let err = compare(
            &bundle(),
            "nope",
            "speed",
            "adcp",
            "Speed",
            &AlignOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DataError::DatasetNotFound { .. }));
    }
}
