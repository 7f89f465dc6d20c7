// ═══════════════════════════════════════════════════════════════════
// Model Tests — Metal, Period, PriceSnapshot, PriceSeries, Holding, Settings
// ═══════════════════════════════════════════════════════════════════

use chrono::{NaiveDate, TimeZone, Utc};
use metalstack_core::errors::SeriesError;
use metalstack_core::models::holding::{Holding, HoldingsSummary};
use metalstack_core::models::metal::Metal;
use metalstack_core::models::period::Period;
use metalstack_core::models::price::{PricePoint, PriceSeries, PriceSnapshot};
use metalstack_core::models::settings::Settings;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn point(y: i32, m: u32, day: u32, price: f64) -> PricePoint {
    PricePoint {
        date: d(y, m, day),
        price,
    }
}

// ═══════════════════════════════════════════════════════════════════
// Metal
// ═══════════════════════════════════════════════════════════════════

mod metal {
    use super::*;

    #[test]
    fn all_in_display_order() {
        assert_eq!(
            Metal::ALL,
            [Metal::Gold, Metal::Silver, Metal::Platinum, Metal::Palladium]
        );
    }

    #[test]
    fn api_names_are_lowercase() {
        assert_eq!(Metal::Gold.api_name(), "gold");
        assert_eq!(Metal::Silver.api_name(), "silver");
        assert_eq!(Metal::Platinum.api_name(), "platinum");
        assert_eq!(Metal::Palladium.api_name(), "palladium");
    }

    #[test]
    fn display_is_full_name() {
        assert_eq!(Metal::Platinum.to_string(), "Platinum");
        assert_eq!(Metal::Palladium.short_name(), "Pall");
    }

    #[test]
    fn from_name_is_case_insensitive() {
        assert_eq!(Metal::from_name("GOLD"), Some(Metal::Gold));
        assert_eq!(Metal::from_name(" silver "), Some(Metal::Silver));
        assert_eq!(Metal::from_name("copper"), None);
    }

    #[test]
    fn from_str_error_lists_choices() {
        let err = "tin".parse::<Metal>().unwrap_err();
        assert!(err.contains("tin"));
        assert!(err.contains("palladium"));
    }

    #[test]
    fn serde_lowercase() {
        let json = serde_json::to_string(&Metal::Silver).unwrap();
        assert_eq!(json, "\"silver\"");
        let back: Metal = serde_json::from_str("\"platinum\"").unwrap();
        assert_eq!(back, Metal::Platinum);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Period
// ═══════════════════════════════════════════════════════════════════

mod period {
    use super::*;

    #[test]
    fn five_next_steps_return_to_start() {
        for start in Period::ALL {
            let mut p = start;
            for _ in 0..5 {
                p = p.next();
            }
            assert_eq!(p, start);
        }
    }

    #[test]
    fn five_prev_steps_return_to_start() {
        for start in Period::ALL {
            let mut p = start;
            for _ in 0..5 {
                p = p.prev();
            }
            assert_eq!(p, start);
        }
    }

    #[test]
    fn next_and_prev_are_inverse() {
        for p in Period::ALL {
            assert_eq!(p.next().prev(), p);
            assert_eq!(p.prev().next(), p);
        }
    }

    #[test]
    fn wraps_at_both_ends() {
        assert_eq!(Period::FiveYear.next(), Period::OneWeek);
        assert_eq!(Period::OneWeek.prev(), Period::FiveYear);
    }

    #[test]
    fn labels_round_trip() {
        for p in Period::ALL {
            assert_eq!(Period::from_label(p.label()), Some(p));
            assert_eq!(p.label().parse::<Period>().unwrap(), p);
        }
        assert_eq!(Period::from_label("YTD"), Some(Period::YearToDate));
        assert_eq!(Period::from_label("3d"), None);
    }

    #[test]
    fn start_dates() {
        let today = d(2026, 3, 15);
        assert_eq!(Period::OneWeek.start_date(today), d(2026, 3, 8));
        assert_eq!(Period::OneMonth.start_date(today), d(2026, 2, 13));
        assert_eq!(Period::YearToDate.start_date(today), d(2026, 1, 1));
        assert_eq!(Period::OneYear.start_date(today), d(2025, 3, 15));
        assert_eq!(Period::FiveYear.start_date(today), d(2021, 3, 16));
    }

    #[test]
    fn serde_uses_labels() {
        assert_eq!(serde_json::to_string(&Period::YearToDate).unwrap(), "\"ytd\"");
        let p: Period = serde_json::from_str("\"5y\"").unwrap();
        assert_eq!(p, Period::FiveYear);
    }
}

// ═══════════════════════════════════════════════════════════════════
// PriceSeries
// ═══════════════════════════════════════════════════════════════════

mod price_series {
    use super::*;

    #[test]
    fn ordered_points_accepted() {
        let series = PriceSeries::new(vec![
            point(2026, 1, 1, 100.0),
            point(2026, 1, 2, 110.0),
            point(2026, 1, 3, 105.0),
        ])
        .unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.prices(), vec![100.0, 110.0, 105.0]);
        assert_eq!(series.bounds(), Some((100.0, 110.0)));
    }

    #[test]
    fn equal_dates_accepted() {
        assert!(PriceSeries::new(vec![point(2026, 1, 1, 1.0), point(2026, 1, 1, 2.0)]).is_ok());
    }

    #[test]
    fn out_of_order_rejected_with_index() {
        let err = PriceSeries::new(vec![
            point(2026, 1, 1, 100.0),
            point(2026, 1, 3, 110.0),
            point(2026, 1, 2, 105.0),
        ])
        .unwrap_err();
        assert_eq!(err, SeriesError::OutOfOrder { index: 2 });
    }

    #[test]
    fn from_unsorted_sorts_and_keeps_last_duplicate() {
        let series = PriceSeries::from_unsorted(vec![
            point(2026, 1, 3, 3.0),
            point(2026, 1, 1, 1.0),
            point(2026, 1, 3, 33.0),
            point(2026, 1, 2, 2.0),
        ]);
        assert_eq!(series.prices(), vec![1.0, 2.0, 33.0]);
    }

    #[test]
    fn empty_has_no_bounds() {
        let series = PriceSeries::empty();
        assert!(series.is_empty());
        assert_eq!(series.bounds(), None);
        assert!(series.first().is_none());
    }

    #[test]
    fn deserialize_rejects_out_of_order() {
        let json = r#"[{"date":"2026-01-02","price":1.0},{"date":"2026-01-01","price":2.0}]"#;
        assert!(serde_json::from_str::<PriceSeries>(json).is_err());
    }

    #[test]
    fn live_point_replaces_same_day() {
        let series = PriceSeries::new(vec![point(2026, 1, 1, 100.0), point(2026, 1, 2, 101.0)]).unwrap();
        let live = series.with_live_point(d(2026, 1, 2), 120.0);
        assert_eq!(live.prices(), vec![100.0, 120.0]);
    }

    #[test]
    fn live_point_appends_later_day() {
        let series = PriceSeries::new(vec![point(2026, 1, 1, 100.0)]).unwrap();
        let live = series.with_live_point(d(2026, 1, 5), 90.0);
        assert_eq!(live.len(), 2);
        assert_eq!(live.last().unwrap().date, d(2026, 1, 5));
    }

    #[test]
    fn live_point_ignores_earlier_day() {
        let series = PriceSeries::new(vec![point(2026, 1, 5, 100.0)]).unwrap();
        assert_eq!(series.with_live_point(d(2026, 1, 1), 1.0), series);
    }
}

// ═══════════════════════════════════════════════════════════════════
// PriceSnapshot
// ═══════════════════════════════════════════════════════════════════

mod price_snapshot {
    use super::*;

    #[test]
    fn spot_defaults() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let s = PriceSnapshot::spot(Metal::Gold, 2345.5, at);
        assert_eq!(s.currency, "USD");
        assert_eq!(s.bid, None);
        assert_eq!(s.change, 0.0);
        assert_eq!(s.fetched_at, at);
    }

    #[test]
    fn missing_optional_fields_deserialize() {
        let json = r#"{"metal":"gold","price_per_unit":2000.0,"currency":"USD","fetched_at":"2026-01-01T00:00:00Z"}"#;
        let s: PriceSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(s.metal, Metal::Gold);
        assert_eq!(s.ask, None);
        assert_eq!(s.change_pct, 0.0);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Holding / Settings
// ═══════════════════════════════════════════════════════════════════

mod holding {
    use super::*;

    #[test]
    fn total_weight_multiplies_quantity() {
        let h = Holding::new("Maple Leaf", Metal::Silver, 1.0, 25);
        assert_eq!(h.total_weight_oz(), 25.0);
        assert_eq!(h.spot_value(30.0), 750.0);
    }

    #[test]
    fn with_year() {
        let h = Holding::new("Eagle", Metal::Gold, 1.0, 1).with_year(2021);
        assert_eq!(h.year, Some(2021));
    }

    #[test]
    fn legacy_item_without_id_or_quantity() {
        let json = r#"{"name":"Bar","metal":"platinum","weight_oz":10.0}"#;
        let h: Holding = serde_json::from_str(json).unwrap();
        assert_eq!(h.quantity, 1);
        assert_eq!(h.year, None);
        assert_eq!(h.metal, Metal::Platinum);
    }

    #[test]
    fn summary_default_is_empty() {
        let s = HoldingsSummary::default();
        assert_eq!(s.total_items, 0);
        assert!(s.by_metal.is_empty());
    }
}

mod settings {
    use super::*;

    #[test]
    fn default_is_gold_one_month() {
        let s = Settings::default();
        assert_eq!(s.last_metal, Metal::Gold);
        assert_eq!(s.last_period, Period::OneMonth);
    }

    #[test]
    fn file_field_names() {
        let s = Settings {
            last_metal: Metal::Silver,
            last_period: Period::OneYear,
        };
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"last_selected_metal\":\"silver\""));
        assert!(json.contains("\"chart_period\":\"1y\""));
    }

    #[test]
    fn missing_fields_fall_back() {
        let s: Settings = serde_json::from_str(r#"{"chart_period":"5y"}"#).unwrap();
        assert_eq!(s.last_metal, Metal::Gold);
        assert_eq!(s.last_period, Period::FiveYear);
    }
}
