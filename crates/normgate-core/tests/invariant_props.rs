//! Property-based checks over the pure engines: cleaning idempotence,
//! pagination reconstruction, filter parsing, transition legality.

use proptest::prelude::*;
use serde_json::{json, Value};

use normgate_core::extract::{parse_result_items, strip_code_fence};
use normgate_core::model::{validate_transition, TaskStatus};
use normgate_core::paginate::{paginate, PageRequest};
use normgate_core::store::parse_status_filter;

proptest! {
    /// clean(clean(x)) == clean(x) for arbitrary text.
    #[test]
    fn prop_fence_stripping_is_idempotent(text in ".{0,200}") {
        let once = strip_code_fence(&text);
        prop_assert_eq!(strip_code_fence(&once), once);
    }

    /// Fencing then cleaning a JSON array recovers the original rows.
    #[test]
    fn prop_fenced_array_round_trips(sns in proptest::collection::vec(0i64..10_000, 0..40)) {
        let rows: Vec<Value> = sns.iter().map(|sn| json!({"sn": sn})).collect();
        let bare = serde_json::to_string(&rows).unwrap();
        let fenced = format!("```json\n{bare}\n```");
        prop_assert_eq!(strip_code_fence(&fenced), bare.clone());

        let parsed = parse_result_items(&fenced);
        if rows.is_empty() {
            // An empty array still parses as an (empty) row list.
            prop_assert_eq!(parsed.map(|p| p.len()), Some(0));
        } else {
            prop_assert_eq!(parsed.unwrap().len(), rows.len());
        }
    }

    /// Concatenating pages 1..=total_pages reproduces the sorted list for
    /// any total and page size.
    #[test]
    fn prop_pages_concatenate_to_sorted_list(
        total in 0usize..250,
        per_page in 1i64..=100,
    ) {
        let rows: Vec<Value> = (0..total).rev().map(|sn| json!({"sn": sn})).collect();
        let mut collected = Vec::new();
        let mut page = 1i64;
        loop {
            let request = PageRequest::new(page, per_page, "sn", "asc");
            let (items, info) = paginate(rows.clone(), &request);
            collected.extend(items);
            if !info.has_next {
                break;
            }
            page += 1;
        }
        let sns: Vec<i64> = collected.iter().map(|i| i["sn"].as_i64().unwrap()).collect();
        prop_assert_eq!(sns, (0..total as i64).collect::<Vec<_>>());
    }

    /// A page past the end clamps to the last page (or stays empty when
    /// there are no rows).
    #[test]
    fn prop_overflow_page_clamps(
        total in 0usize..250,
        per_page in 1i64..=100,
        overshoot in 1i64..50,
    ) {
        let rows: Vec<Value> = (0..total).map(|sn| json!({"sn": sn})).collect();
        let total_pages = (total as i64 + per_page - 1) / per_page;
        let request = PageRequest::new(total_pages + overshoot, per_page, "sn", "asc");
        let (items, info) = paginate(rows, &request);
        if total == 0 {
            prop_assert!(items.is_empty());
            prop_assert_eq!(info.total_pages, 0);
        } else {
            prop_assert_eq!(i64::from(info.current_page), total_pages);
            prop_assert!(!items.is_empty());
        }
    }

    /// The status filter only ever yields known states, in input order,
    /// and unknown tokens never fail the parse.
    #[test]
    fn prop_status_filter_is_total(raw in "[a-zA-Z, ]{0,60}") {
        let parsed = parse_status_filter(&raw);
        for status in &parsed {
            prop_assert!(TaskStatus::ALL.contains(status));
        }
        prop_assert!(parsed.len() <= raw.split(',').count());
    }

    /// Terminal states admit no transition, and every legal transition
    /// starts from a non-terminal state.
    #[test]
    fn prop_terminal_states_are_absorbing(from in 0usize..6, to in 0usize..6) {
        let from = TaskStatus::ALL[from];
        let to = TaskStatus::ALL[to];
        let legal = validate_transition(from, to).is_ok();
        if from.is_terminal() {
            prop_assert!(!legal);
        }
        if legal {
            prop_assert!(!from.is_terminal());
            prop_assert!(from != to);
        }
    }
}
