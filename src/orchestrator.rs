use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::content_type::ContentType;
use crate::error::Result;
use crate::report::{ChangeReport, SubmissionStatus};

/// Lifecycle of one item in a bulk run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Pending,
    InProgress,
    Succeeded,
    Failed,
    Skipped,
}

impl ItemState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemState::Succeeded | ItemState::Failed | ItemState::Skipped)
    }

    pub fn can_transition_to(&self, next: ItemState) -> bool {
        matches!(
            (self, next),
            (ItemState::Pending, ItemState::InProgress)
                | (ItemState::Pending, ItemState::Skipped)
                | (ItemState::InProgress, ItemState::Succeeded)
                | (ItemState::InProgress, ItemState::Failed)
                | (ItemState::InProgress, ItemState::Skipped)
        )
    }
}

/// Final state of one item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub item_id: String,
    pub state: ItemState,
    /// Failure message, or why the item was skipped.
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ChangeReport>,
}

impl ItemOutcome {
    fn pending(item_id: String) -> Self {
        Self {
            item_id,
            state: ItemState::Pending,
            error: None,
            report: None,
        }
    }

    fn advance(&mut self, next: ItemState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal item transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkCounts {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BulkCounts {
    fn tally(outcomes: &[ItemOutcome]) -> Self {
        let count = |state: ItemState| outcomes.iter().filter(|o| o.state == state).count();
        Self {
            total: outcomes.len(),
            succeeded: count(ItemState::Succeeded),
            failed: count(ItemState::Failed),
            skipped: count(ItemState::Skipped),
        }
    }
}

/// Per-item outcomes of a bulk run, plus aggregate counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkReport {
    pub content_type: ContentType,
    pub outcomes: Vec<ItemOutcome>,
    pub counts: BulkCounts,
    /// True when the iteration cap ended the run early.
    pub stopped_at_limit: bool,
}

impl BulkReport {
    pub fn outcome(&self, item_id: &str) -> Option<&ItemOutcome> {
        self.outcomes.iter().find(|o| o.item_id == item_id)
    }
}

/// Transforms and submits a single bulk item.
#[allow(async_fn_in_trait)]
pub trait ItemProcessor {
    /// Identifier reported for `item`.
    fn item_id(&self, content_type: ContentType, item: &Value) -> String;

    async fn process(&mut self, content_type: ContentType, item: Value) -> Result<ChangeReport>;
}

/// Runs items through an [`ItemProcessor`] one at a time. A failing item is
/// recorded and the run moves on; only a configuration error stops it.
#[derive(Debug, Clone, Default)]
pub struct BulkOrchestrator {
    max_iterations: Option<usize>,
}

impl BulkOrchestrator {
    pub fn new(max_iterations: Option<usize>) -> Self {
        Self { max_iterations }
    }

    pub async fn run<P, I>(&self, content_type: ContentType, items: I, processor: &mut P) -> Result<BulkReport>
    where
        P: ItemProcessor,
        I: IntoIterator<Item = Value>,
    {
        let mut outcomes = Vec::new();
        let mut stopped_at_limit = false;

        for (index, item) in items.into_iter().enumerate() {
            let mut outcome = ItemOutcome::pending(processor.item_id(content_type, &item));

            if self.max_iterations.is_some_and(|max| index >= max) {
                stopped_at_limit = true;
                outcome.advance(ItemState::Skipped);
                outcome.error = Some("iteration limit reached".to_string());
                outcomes.push(outcome);
                continue;
            }

            outcome.advance(ItemState::InProgress);
            match processor.process(content_type, item).await {
                Ok(report) => {
                    if let SubmissionStatus::Skipped { reason } = &report.submission {
                        outcome.advance(ItemState::Skipped);
                        outcome.error = Some(reason.clone());
                    } else {
                        outcome.advance(ItemState::Succeeded);
                    }
                    outcome.report = Some(report);
                }
                Err(e) if !e.is_item_recoverable() => return Err(e),
                Err(e) => {
                    warn!(%content_type, item_id = %outcome.item_id, error = %e, "item failed, continuing");
                    outcome.advance(ItemState::Failed);
                    outcome.error = Some(e.to_string());
                }
            }
            outcomes.push(outcome);
        }

        let counts = BulkCounts::tally(&outcomes);
        info!(
            %content_type,
            total = counts.total,
            succeeded = counts.succeeded,
            failed = counts.failed,
            skipped = counts.skipped,
            "bulk run finished"
        );
        Ok(BulkReport {
            content_type,
            outcomes,
            counts,
            stopped_at_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransferError;
    use crate::resolver::ReferenceKind;
    use crate::session::TransformSession;
    use serde_json::json;

    /// Fails items whose `fail` field names an error.
    struct ScriptedProcessor {
        processed: Vec<String>,
    }

    impl ItemProcessor for ScriptedProcessor {
        fn item_id(&self, _content_type: ContentType, item: &Value) -> String {
            item["_id"].as_str().unwrap_or_default().to_string()
        }

        async fn process(&mut self, content_type: ContentType, item: Value) -> Result<ChangeReport> {
            let id = self.item_id(content_type, &item);
            self.processed.push(id.clone());
            match item["fail"].as_str() {
                Some("missing") => Err(TransferError::MissingReference {
                    kind: ReferenceKind::Distributor,
                    id: "D404".to_string(),
                }),
                Some("unsupported") => Err(TransferError::UnsupportedType("podcast".to_string())),
                Some("skip") => {
                    let mut report = ChangeReport::new(content_type, id, &TransformSession::new("a", "b"));
                    report.submission = SubmissionStatus::Skipped { reason: "gallery redirect".to_string() };
                    Ok(report)
                }
                _ => Ok(ChangeReport::new(content_type, id, &TransformSession::new("a", "b"))),
            }
        }
    }

    fn processor() -> ScriptedProcessor {
        ScriptedProcessor { processed: Vec::new() }
    }

    #[test]
    fn test_item_state_transitions() {
        assert!(ItemState::Pending.can_transition_to(ItemState::InProgress));
        assert!(ItemState::Pending.can_transition_to(ItemState::Skipped));
        assert!(ItemState::InProgress.can_transition_to(ItemState::Failed));
        assert!(!ItemState::Pending.can_transition_to(ItemState::Succeeded));
        assert!(!ItemState::Succeeded.can_transition_to(ItemState::Failed));
        assert!(ItemState::Skipped.is_terminal());
        assert!(!ItemState::InProgress.is_terminal());
    }

    #[tokio::test]
    async fn test_failed_item_does_not_stop_run() {
        let items = vec![
            json!({"_id": "A1"}),
            json!({"_id": "A2", "fail": "missing"}),
            json!({"_id": "A3"}),
        ];
        let mut processor = processor();
        let report = BulkOrchestrator::new(None)
            .run(ContentType::Author, items, &mut processor)
            .await
            .unwrap();

        assert_eq!(processor.processed, vec!["A1", "A2", "A3"]);
        assert_eq!(report.counts, BulkCounts { total: 3, succeeded: 2, failed: 1, skipped: 0 });
        let failed = report.outcome("A2").unwrap();
        assert_eq!(failed.state, ItemState::Failed);
        assert!(failed.error.as_deref().unwrap().contains("D404"));
        assert!(!report.stopped_at_limit);
    }

    #[tokio::test]
    async fn test_iteration_limit_skips_remaining_items() {
        let items = (1..=5).map(|i| json!({"_id": format!("A{i}")}));
        let mut processor = processor();
        let report = BulkOrchestrator::new(Some(2))
            .run(ContentType::Author, items, &mut processor)
            .await
            .unwrap();

        assert_eq!(processor.processed.len(), 2);
        assert_eq!(report.counts, BulkCounts { total: 5, succeeded: 2, failed: 0, skipped: 3 });
        assert!(report.stopped_at_limit);
        assert_eq!(report.outcome("A5").unwrap().state, ItemState::Skipped);
    }

    #[tokio::test]
    async fn test_skipped_submission_marks_item_skipped() {
        let items = vec![json!({"_id": "R1", "fail": "skip"})];
        let report = BulkOrchestrator::default()
            .run(ContentType::Redirect, items, &mut processor())
            .await
            .unwrap();
        assert_eq!(report.outcomes[0].state, ItemState::Skipped);
        assert_eq!(report.outcomes[0].error.as_deref(), Some("gallery redirect"));
    }

    #[tokio::test]
    async fn test_configuration_error_aborts_run() {
        let items = vec![json!({"_id": "A1", "fail": "unsupported"}), json!({"_id": "A2"})];
        let mut processor = processor();
        let err = BulkOrchestrator::default()
            .run(ContentType::Author, items, &mut processor)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::UnsupportedType(_)));
        assert_eq!(processor.processed, vec!["A1"]);
    }
}
