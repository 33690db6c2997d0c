//! Text and JSON rendering of merged views and chart series.

use carousel_core::chart::{BinSize, DataPoint, display_value, format_value};
use carousel_core::merge::AggregatedView;
use carousel_core::types::InteractionType;

/// One line per event, newest first:
/// `2026-01-01T00:05:00Z  ahk   sale     g1/n1  5000000000`.
pub fn format_view(view: &AggregatedView) -> String {
    if view.is_empty() {
        return "no recent activity\n".to_string();
    }
    let mut out = String::new();
    for item in &view.events {
        let event = &item.event;
        let kind = match event.interaction {
            InteractionType::Sale => "sale",
            InteractionType::Listing => "listing",
        };
        let price = event.price_meta.as_deref().unwrap_or("-");
        out.push_str(&format!(
            "{}  {:<4}  {:<7}  {}/{}  {}\n",
            event.timestamp.format("%Y-%m-%dT%H:%M:%SZ"),
            item.source.as_str(),
            kind,
            event.group_id,
            event.entity_id,
            price,
        ));
    }
    out
}

pub fn format_view_json(view: &AggregatedView) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(view)?)
}

fn format_bin_size(size: BinSize) -> String {
    let parts: Vec<String> = [
        (size.weeks, "w"),
        (size.days, "d"),
        (size.hours, "h"),
        (size.minutes, "m"),
    ]
    .iter()
    .filter_map(|(n, unit)| n.map(|n| format!("{n}{unit}")))
    .collect();
    if parts.is_empty() {
        "1d".to_string()
    } else {
        parts.join("")
    }
}

pub fn format_series(size: BinSize, points: &[DataPoint], decimals: Option<u32>) -> String {
    let mut out = format!("bin {} | {} points\n", format_bin_size(size), points.len());
    for point in points {
        let value = match decimals {
            Some(d) => display_value(point.value, d),
            None => point.value,
        };
        out.push_str(&format!("{}  {}\n", point.timestamp, format_value(value)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use carousel_core::types::{EventRecord, SourceId, SourcedEvent};
    use chrono::TimeZone;

    fn view() -> AggregatedView {
        AggregatedView {
            events: vec![SourcedEvent {
                source: SourceId::Ksm,
                event: EventRecord {
                    entity_id: "n1".to_string(),
                    group_id: "g1".to_string(),
                    timestamp: chrono::Utc
                        .timestamp_millis_opt(1_767_225_900_000)
                        .single()
                        .expect("ts"),
                    interaction: InteractionType::Listing,
                    price_meta: Some("12".to_string()),
                    latest_sale_price: None,
                    entity_name: None,
                    group_name: None,
                },
            }],
            display_cap: 30,
        }
    }

    #[test]
    fn text_line_per_event() {
        let text = format_view(&view());
        assert_eq!(text, "2026-01-01T00:05:00Z  ksm   listing  g1/n1  12\n");
    }

    #[test]
    fn empty_view_says_so() {
        assert_eq!(format_view(&AggregatedView::empty(30)), "no recent activity\n");
    }

    #[test]
    fn json_carries_source_and_event() {
        let json: serde_json::Value =
            serde_json::from_str(&format_view_json(&view()).expect("json")).expect("parse");
        assert_eq!(json["events"][0]["source"], "ksm");
        assert_eq!(json["events"][0]["entity_id"], "n1");
    }

    #[test]
    fn series_scales_by_decimals() {
        let points = [DataPoint {
            timestamp: 60_000,
            value: 1_234_567_890_000.0,
        }];
        let text = format_series(BinSize::minutes(5), &points, Some(12));
        assert_eq!(text, "bin 5m | 1 points\n60000  1.2346\n");
    }

    #[test]
    fn series_prints_integers_bare_and_fractions_fixed() {
        let points = [
            DataPoint {
                timestamp: 0,
                value: 42.0,
            },
            DataPoint {
                timestamp: 120_000,
                value: 10.5,
            },
        ];
        let text = format_series(BinSize::minutes(2), &points, None);
        assert_eq!(text, "bin 2m | 2 points\n0  42\n120000  10.5000\n");
    }
}
