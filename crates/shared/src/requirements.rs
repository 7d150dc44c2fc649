use std::collections::{HashMap, HashSet};

use crate::{
    domain::{DocumentId, Requirement, RequirementId},
    protocol::{ReconcileSummary, RequirementItem, SearchResultItem},
};

/// Region rows replace nationwide rows for the same document. Ordered by
/// sort order, then document id.
pub fn merge_overrides(
    nationwide: Vec<SearchResultItem>,
    regional: Vec<SearchResultItem>,
) -> Vec<SearchResultItem> {
    let mut merged: Vec<SearchResultItem> = Vec::with_capacity(nationwide.len() + regional.len());
    let mut slots: HashMap<DocumentId, usize> = HashMap::new();

    for item in nationwide.into_iter().chain(regional) {
        match slots.get(&item.document_id) {
            Some(&slot) => merged[slot] = item,
            None => {
                slots.insert(item.document_id, merged.len());
                merged.push(item);
            }
        }
    }

    merged.sort_by(|a, b| {
        a.sort_order
            .cmp(&b.sort_order)
            .then(a.document_id.cmp(&b.document_id))
    });
    merged
}

// Last occurrence wins, first position kept.
pub fn dedupe_items(items: &[RequirementItem]) -> Vec<RequirementItem> {
    let mut deduped: Vec<RequirementItem> = Vec::with_capacity(items.len());
    let mut slots: HashMap<DocumentId, usize> = HashMap::new();
    for item in items {
        match slots.get(&item.document_id) {
            Some(&slot) => deduped[slot] = item.clone(),
            None => {
                slots.insert(item.document_id, deduped.len());
                deduped.push(item.clone());
            }
        }
    }
    deduped
}

pub fn referenced_documents(items: &[RequirementItem]) -> Vec<DocumentId> {
    let mut ids: Vec<DocumentId> = items.iter().map(|item| item.document_id).collect();
    ids.sort();
    ids.dedup();
    ids
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowChange {
    Insert(RequirementItem),
    Update {
        requirement_id: RequirementId,
        item: RequirementItem,
    },
    SoftDelete(RequirementId),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub changes: Vec<RowChange>,
    pub unchanged: usize,
}

impl ReconcilePlan {
    pub fn summary(&self) -> ReconcileSummary {
        let mut summary = ReconcileSummary {
            unchanged: self.unchanged,
            ..ReconcileSummary::default()
        };
        for change in &self.changes {
            match change {
                RowChange::Insert(_) => summary.inserted += 1,
                RowChange::Update { .. } => summary.updated += 1,
                RowChange::SoftDelete(_) => summary.soft_deleted += 1,
            }
        }
        summary
    }
}

/// `existing` must hold every row of the scope, soft-deleted ones included.
pub fn plan_reconciliation(existing: &[Requirement], desired: &[RequirementItem]) -> ReconcilePlan {
    let desired = dedupe_items(desired);
    let by_document: HashMap<DocumentId, &Requirement> = existing
        .iter()
        .map(|row| (row.document_id, row))
        .collect();

    let mut plan = ReconcilePlan::default();
    for item in &desired {
        match by_document.get(&item.document_id) {
            Some(row) if row_matches(row, item) => plan.unchanged += 1,
            Some(row) => plan.changes.push(RowChange::Update {
                requirement_id: row.requirement_id,
                item: item.clone(),
            }),
            None => plan.changes.push(RowChange::Insert(item.clone())),
        }
    }

    let wanted: HashSet<DocumentId> = desired.iter().map(|item| item.document_id).collect();
    for row in existing {
        if !row.is_deleted && !wanted.contains(&row.document_id) {
            plan.changes.push(RowChange::SoftDelete(row.requirement_id));
        }
    }

    plan
}

fn row_matches(row: &Requirement, item: &RequirementItem) -> bool {
    !row.is_deleted
        && row.sort_order == item.sort_order
        && row.step_description == item.step_description
}
