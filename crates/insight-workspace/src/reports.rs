//! The canvas: open report tabs plus the catalog of every report generated
//! in this workspace.

use std::collections::HashMap;

use tracing::debug;

use insight_core::types::{Report, ReportId};

use crate::error::WorkspaceError;

/// Open reports in tab order, the active tab, and an immutable catalog.
///
/// The catalog keeps every report ever opened so activity references stay
/// resolvable after their tab is closed. The active id is always `None` or
/// an id in the open set.
#[derive(Debug, Clone, Default)]
pub struct ReportStore {
    catalog: HashMap<ReportId, Report>,
    open: Vec<ReportId>,
    active: Option<ReportId>,
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `report` as the active tab.
    ///
    /// A report whose id is already open is not added again; the existing
    /// tab is activated instead.
    pub fn open(&mut self, report: Report) -> ReportId {
        let id = report.id.clone();
        self.catalog.entry(id.clone()).or_insert(report);
        if !self.is_open(&id) {
            self.open.push(id.clone());
            debug!(report = %id, tabs = self.open.len(), "Report opened");
        }
        self.active = Some(id.clone());
        id
    }

    pub fn activate(&mut self, id: &ReportId) -> Result<(), WorkspaceError> {
        if !self.is_open(id) {
            return Err(WorkspaceError::ReportNotOpen(id.clone()));
        }
        self.active = Some(id.clone());
        Ok(())
    }

    /// Remove a tab. Closing the active tab leaves no tab active.
    pub fn close(&mut self, id: &ReportId) -> Result<(), WorkspaceError> {
        let position = self
            .open
            .iter()
            .position(|open| open == id)
            .ok_or_else(|| WorkspaceError::ReportNotOpen(id.clone()))?;
        self.open.remove(position);
        if self.active.as_ref() == Some(id) {
            self.active = None;
        }
        debug!(report = %id, tabs = self.open.len(), "Report closed");
        Ok(())
    }

    /// Close every tab. The catalog is kept.
    pub fn clear_open(&mut self) {
        self.open.clear();
        self.active = None;
    }

    /// Bring a catalogued report back as the active tab.
    pub fn reopen(&mut self, id: &ReportId) -> Result<(), WorkspaceError> {
        if !self.catalog.contains_key(id) {
            return Err(WorkspaceError::ReportNotFound(id.clone()));
        }
        if !self.is_open(id) {
            self.open.push(id.clone());
        }
        self.active = Some(id.clone());
        Ok(())
    }

    pub fn get(&self, id: &ReportId) -> Option<&Report> {
        self.catalog.get(id)
    }

    pub fn is_open(&self, id: &ReportId) -> bool {
        self.open.contains(id)
    }

    pub fn open_ids(&self) -> &[ReportId] {
        &self.open
    }

    /// Open reports in tab order.
    pub fn open_reports(&self) -> impl Iterator<Item = &Report> {
        self.open.iter().filter_map(|id| self.catalog.get(id))
    }

    pub fn active_id(&self) -> Option<&ReportId> {
        self.active.as_ref()
    }

    pub fn active_report(&self) -> Option<&Report> {
        self.active.as_ref().and_then(|id| self.catalog.get(id))
    }

    pub fn catalog_len(&self) -> usize {
        self.catalog.len()
    }
}
