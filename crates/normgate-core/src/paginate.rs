//! Result pagination: gate, sort, slice.
//!
//! Only three task types carry row-shaped results, and only a completed
//! task has anything to page over. Required fields per type are checked for
//! warnings only; rows are never dropped.

use serde_json::{json, Value};
use tracing::warn;

use normgate_error::TaskError;

use crate::extract::extract_items;
use crate::model::{Task, TaskResult, TaskStatus};

/// Maximum rows per page.
pub const MAX_PER_PAGE: u32 = 100;
/// Default rows per page.
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Sort direction over the `sn` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Ascending (default).
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortOrder {
    /// Parse `asc`/`desc` (case-insensitive); anything else is ascending.
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("desc") {
            Self::Desc
        } else {
            Self::Asc
        }
    }
}

/// Pagination request, already normalised.
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    /// Page size in `[1, 100]`.
    pub per_page: u32,
    /// Sort key; only `sn` sorts, other values preserve input order.
    pub sort_by: String,
    /// Sort direction.
    pub sort_order: SortOrder,
}

impl PageRequest {
    /// Normalise raw query values: `page < 1` becomes 1, `per_page` outside
    /// `[1, 100]` falls back to the default.
    pub fn new(page: i64, per_page: i64, sort_by: &str, sort_order: &str) -> Self {
        Self {
            page: if page < 1 { 1 } else { page as u32 },
            per_page: if (1..=i64::from(MAX_PER_PAGE)).contains(&per_page) {
                per_page as u32
            } else {
                DEFAULT_PER_PAGE
            },
            sort_by: sort_by.to_string(),
            sort_order: SortOrder::parse(sort_order),
        }
    }
}

/// Required fields per paginatable task type, used for warnings only.
pub fn required_fields(task_type: crate::model::TaskType) -> &'static [&'static str] {
    use crate::model::TaskType;
    match task_type {
        TaskType::Review => &[
            "sn",
            "issueLocation",
            "originalText",
            "issueDescription",
            "recommendedModification",
        ],
        TaskType::Recommendation => &["sn", "projectName", "originalText", "referenceStandard"],
        TaskType::Compliance => &[
            "sn",
            "projectName",
            "originalText",
            "isCompliant",
            "suggestedRewrite",
            "referenceStandard",
        ],
        _ => &["sn"],
    }
}

fn numeric_sn(item: &Value) -> Option<i64> {
    match item.get("sn") {
        None | Some(Value::Null) => Some(0),
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        Some(_) => None,
    }
}

fn string_sn(item: &Value) -> String {
    match item.get("sn") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Sort rows by `sn`: numerically when every value parses, by string
/// otherwise. Sorting is stable so equal keys preserve input order.
pub fn sort_items(items: &mut [Value], order: SortOrder) {
    let all_numeric = items.iter().all(|item| numeric_sn(item).is_some());
    if all_numeric {
        items.sort_by_key(|item| numeric_sn(item).unwrap_or(0));
    } else {
        items.sort_by_key(string_sn);
    }
    if order == SortOrder::Desc {
        items.reverse();
    }
}

/// Page metadata in the wire shape.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Pagination {
    /// Effective page after clamping.
    pub current_page: u32,
    /// Page size.
    pub per_page: u32,
    /// Total row count.
    pub total_items: usize,
    /// Total page count.
    pub total_pages: u32,
    /// Whether a later page exists.
    pub has_next: bool,
    /// Whether an earlier page exists.
    pub has_prev: bool,
}

/// Slice `items` for the requested page. A page past the end clamps to the
/// last page when any rows exist.
pub fn paginate(mut items: Vec<Value>, request: &PageRequest) -> (Vec<Value>, Pagination) {
    if request.sort_by == "sn" {
        sort_items(&mut items, request.sort_order);
    }

    let total_items = items.len();
    let per_page = request.per_page;
    let total_pages = (total_items as u32).div_ceil(per_page);

    let mut page = request.page;
    if page > total_pages && total_pages > 0 {
        page = total_pages;
    }

    let start = ((page - 1) * per_page) as usize;
    let page_items: Vec<Value> = items.into_iter().skip(start).take(per_page as usize).collect();

    let pagination = Pagination {
        current_page: page,
        per_page,
        total_items,
        total_pages,
        has_next: page < total_pages,
        has_prev: page > 1,
    };
    (page_items, pagination)
}

fn task_info(task: &Task) -> Value {
    json!({
        "id": task.id,
        "task_type": task.task_type.as_str(),
        "task_type_display": task.task_type.display_name(),
        "status": task.status.as_str(),
        "status_display": task.status.display_name(),
        "title": task.title,
        "created_at": task.created_at.and_utc().to_rfc3339(),
        "updated_at": task.updated_at.and_utc().to_rfc3339(),
    })
}

/// Full pagination pipeline over a task's latest result: gate by type and
/// status, extract rows, warn on missing fields, sort, slice.
pub fn paginate_result(
    task: &Task,
    latest: Option<&TaskResult>,
    request: &PageRequest,
) -> Result<Value, TaskError> {
    if !task.task_type.supports_pagination() {
        return Err(TaskError::NotPaginatable {
            display: task.task_type.display_name().to_string(),
        });
    }
    if task.status != TaskStatus::Completed {
        return Err(TaskError::NotCompleted {
            display: task.status.display_name().to_string(),
        });
    }

    let Some(latest) = latest else {
        let (items, pagination) = paginate(Vec::new(), request);
        return Ok(json!({
            "items": items,
            "pagination": pagination,
            "task_info": task_info(task),
        }));
    };

    let items = extract_items(latest.answer.as_deref(), latest.full_response.as_deref())
        .ok_or(TaskError::EmptyResult)?;

    let expected = required_fields(task.task_type);
    for (index, item) in items.iter().enumerate() {
        let Some(object) = item.as_object() else {
            warn!(task_id = %task.id, row = index + 1, "result row is not an object");
            continue;
        };
        let missing: Vec<&str> = expected
            .iter()
            .copied()
            .filter(|field| !object.contains_key(*field))
            .collect();
        if !missing.is_empty() {
            warn!(
                task_id = %task.id,
                row = index + 1,
                missing = ?missing,
                "result row is missing required fields"
            );
        }
    }

    let (page_items, pagination) = paginate(items, request);
    Ok(json!({
        "items": page_items,
        "pagination": pagination,
        "task_info": task_info(task),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TaskStatus, TaskType};
    use serde_json::json;

    fn rows(n: usize) -> Vec<Value> {
        (1..=n).map(|sn| json!({"sn": sn})).collect()
    }

    fn request(page: i64, per_page: i64) -> PageRequest {
        PageRequest::new(page, per_page, "sn", "asc")
    }

    #[test]
    fn test_per_page_normalisation_boundaries() {
        assert_eq!(request(1, 0).per_page, DEFAULT_PER_PAGE);
        assert_eq!(request(1, 1).per_page, 1);
        assert_eq!(request(1, 100).per_page, 100);
        assert_eq!(request(1, 101).per_page, DEFAULT_PER_PAGE);
    }

    #[test]
    fn test_page_normalisation() {
        assert_eq!(request(0, 10).page, 1);
        assert_eq!(request(-3, 10).page, 1);
    }

    #[test]
    fn test_concatenated_pages_reconstruct_sorted_list() {
        for per_page in [1, 3, 7, 20, 100] {
            let mut collected = Vec::new();
            let total = 23;
            let mut page = 1;
            loop {
                let (items, info) = paginate(rows(total), &request(page, i64::from(per_page)));
                collected.extend(items);
                if !info.has_next {
                    break;
                }
                page += 1;
            }
            let sns: Vec<i64> = collected.iter().map(|i| i["sn"].as_i64().unwrap()).collect();
            assert_eq!(sns, (1..=total as i64).collect::<Vec<_>>(), "per_page={per_page}");
        }
    }

    #[test]
    fn test_page_past_end_clamps_to_last() {
        let (items, info) = paginate(rows(25), &request(99, 10));
        assert_eq!(info.current_page, 3);
        assert_eq!(items.len(), 5);
        assert!(info.has_prev);
        assert!(!info.has_next);
    }

    #[test]
    fn test_empty_set_returns_zero_pages() {
        let (items, info) = paginate(Vec::new(), &request(5, 10));
        assert!(items.is_empty());
        assert_eq!(info.total_pages, 0);
        assert_eq!(info.current_page, 5);
        assert!(!info.has_next);
    }

    #[test]
    fn test_numeric_sort_handles_string_numbers() {
        let items = vec![json!({"sn": "10"}), json!({"sn": 2}), json!({"sn": "1"})];
        let (sorted, _) = paginate(items, &request(1, 10));
        let sns: Vec<String> = sorted.iter().map(|i| i["sn"].to_string()).collect();
        assert_eq!(sns, vec!["\"1\"", "2", "\"10\""]);
    }

    #[test]
    fn test_string_sort_fallback() {
        let items = vec![json!({"sn": "b"}), json!({"sn": "a"}), json!({"sn": 3})];
        let (sorted, _) = paginate(items, &request(1, 10));
        assert_eq!(sorted[0]["sn"], 3); // "3" < "a" < "b"
    }

    #[test]
    fn test_descending_order() {
        let mut items = rows(3);
        sort_items(&mut items, SortOrder::Desc);
        let sns: Vec<i64> = items.iter().map(|i| i["sn"].as_i64().unwrap()).collect();
        assert_eq!(sns, vec![3, 2, 1]);
    }

    fn completed_task(task_type: TaskType) -> Task {
        Task {
            id: "t-1".into(),
            user_id: "u-1".into(),
            task_type,
            title: "测试".into(),
            description: None,
            status: TaskStatus::Completed,
            created_at: chrono::Utc::now().naive_utc(),
            updated_at: chrono::Utc::now().naive_utc(),
        }
    }

    fn result_with_answer(answer: &str) -> TaskResult {
        TaskResult {
            id: "r-1".into(),
            task_id: "t-1".into(),
            user_id: "u-1".into(),
            message_id: None,
            conversation_id: None,
            mode: None,
            answer: Some(answer.to_string()),
            result_metadata: None,
            full_response: None,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_paginate_result_rejects_unsupported_type() {
        let task = completed_task(TaskType::Interpretation);
        let err = paginate_result(&task, None, &request(1, 20)).unwrap_err();
        assert!(matches!(err, TaskError::NotPaginatable { .. }));
    }

    #[test]
    fn test_paginate_result_rejects_incomplete_task() {
        let mut task = completed_task(TaskType::Review);
        task.status = TaskStatus::Processing;
        let err = paginate_result(&task, None, &request(1, 20)).unwrap_err();
        assert!(matches!(err, TaskError::NotCompleted { .. }));
    }

    #[test]
    fn test_paginate_result_no_results_yields_empty_page() {
        let task = completed_task(TaskType::Review);
        let value = paginate_result(&task, None, &request(1, 20)).unwrap();
        assert_eq!(value["pagination"]["total_items"], 0);
        assert_eq!(value["task_info"]["task_type"], "standard_review");
    }

    #[test]
    fn test_paginate_result_multi_fenced_answer() {
        let task = completed_task(TaskType::Review);
        let answer = "```json\n{\"sn\":1,\"sn_data\":\"a\"}\n```\n```json\n{\"sn\":2,\"sn_data\":\"b\"}\n```";
        let result = result_with_answer(answer);
        let value = paginate_result(&task, Some(&result), &request(1, 5)).unwrap();
        assert_eq!(value["pagination"]["total_items"], 2);
        assert_eq!(value["items"][0]["sn"], 1);
        assert_eq!(value["items"][1]["sn"], 2);
    }

    #[test]
    fn test_paginate_result_unparseable_answer_is_an_error() {
        let task = completed_task(TaskType::Review);
        let result = result_with_answer("完全不是JSON的内容");
        let err = paginate_result(&task, Some(&result), &request(1, 5)).unwrap_err();
        assert!(matches!(err, TaskError::EmptyResult));
    }
}
