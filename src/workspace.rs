use crate::config::FlavpConfig;
use crate::engine::calc_purchase;
use crate::error::{FlavpError, Result};
use crate::ingestion::{import_workbook, ImportSummary, WorkbookReader};
use crate::ledger::recalc_ledger;
use crate::options::{with_default_status, with_default_tipo};
use crate::reports::{dashboard_kpis, DashboardKpis};
use crate::schema::{AppState, ComputedBlock, Item, LedgerEntry, MetaOptions, Purchase};
use crate::store::{export_document, load_state, parse_document, save_state, KeyValueStore, MemoryStore};
use crate::utils::{or_zero, uid, DEFAULT_TAXA_PRESUMIDO};
use crate::xlsx::XlsxWorkbook;
use chrono::{NaiveDate, Utc};
use log::{debug, info};
use std::path::Path;

/// Item labels a hand-made purchase starts with.
const DRAFT_CAIXAS: [&str; 4] = ["Caixa 2", "Caixa 3", "Caixa 4", "Caixa 5"];

// The editor's working copy; only `save_editing` moves it into the state.
#[derive(Debug, Clone)]
struct Draft {
    purchase: Purchase,
    is_new: bool,
}

/// Owns the application state, the store it is persisted to and the editing session.
///
/// Every committing operation recomputes all purchases and the ledger balance, writes the
/// result to the store and only then swaps it in, so a failed write leaves the previous
/// state in place.
pub struct Workspace<S: KeyValueStore> {
    config: FlavpConfig,
    store: S,
    state: AppState,
    selected_purchase_id: Option<String>,
    draft: Option<Draft>,
}

impl Workspace<MemoryStore> {
    pub fn in_memory() -> Result<Self> {
        Self::open(FlavpConfig::default(), MemoryStore::new())
    }
}

impl<S: KeyValueStore> Workspace<S> {
    /// Loads whatever the store holds (falling back to an empty state), restores the
    /// default vocabularies, selects the first purchase and recomputes.
    pub fn open(config: FlavpConfig, store: S) -> Result<Self> {
        config.validate()?;
        let mut state = load_state(&store, &config.storage_key);
        state.meta = with_defaults(&state.meta);

        let mut workspace = Self {
            config,
            store,
            state: AppState::default(),
            selected_purchase_id: None,
            draft: None,
        };
        workspace.selected_purchase_id = state.purchases.first().map(|p| p.id.clone());
        workspace.commit(state)?;
        Ok(workspace)
    }

    pub fn config(&self) -> &FlavpConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn purchases(&self) -> &[Purchase] {
        &self.state.purchases
    }

    pub fn ledger(&self) -> &[LedgerEntry] {
        &self.state.ledger
    }

    pub fn meta(&self) -> &MetaOptions {
        &self.state.meta
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn dashboard(&self) -> DashboardKpis {
        dashboard_kpis(&self.state.purchases, &self.state.ledger)
    }

    pub fn purchase(&self, id: &str) -> Option<&Purchase> {
        self.state.purchases.iter().find(|p| p.id == id)
    }

    pub fn selected_purchase(&self) -> Option<&Purchase> {
        self.selected_purchase_id
            .as_deref()
            .and_then(|id| self.purchase(id))
    }

    pub fn select_purchase(&mut self, id: &str) -> Result<()> {
        if self.purchase(id).is_none() {
            return Err(FlavpError::UnknownPurchase(id.to_string()));
        }
        self.selected_purchase_id = Some(id.to_string());
        Ok(())
    }

    /// Recomputes everything from the current state and persists it.
    pub fn recalc_all(&mut self) -> Result<()> {
        self.commit(self.state.clone())
    }

    fn commit(&mut self, next: AppState) -> Result<()> {
        let next = AppState {
            purchases: next.purchases.iter().map(calc_purchase).collect(),
            ledger: recalc_ledger(&next.ledger),
            meta: next.meta,
        };
        save_state(&mut self.store, &self.config.storage_key, &next)?;
        self.state = next;
        Ok(())
    }

    /// Replaces purchases, ledger and vocabularies with the workbook's content.
    pub fn import_workbook(&mut self, reader: &impl WorkbookReader) -> Result<ImportSummary> {
        let imported = import_workbook(reader);
        let next = AppState {
            purchases: imported.purchases,
            ledger: imported.ledger,
            meta: imported.meta,
        };

        let selected = next.purchases.first().map(|p| p.id.clone());
        self.commit(next)?;
        self.selected_purchase_id = selected;
        self.draft = None;

        let summary = ImportSummary {
            sheet_names: imported.sheet_names,
            purchase_count: self.state.purchases.len(),
            ledger_count: self.state.ledger.len(),
        };
        info!(
            "Imported workbook: {} purchases, {} ledger rows",
            summary.purchase_count, summary.ledger_count
        );
        Ok(summary)
    }

    pub fn import_xlsx_file(&mut self, path: impl AsRef<Path>) -> Result<ImportSummary> {
        let workbook = XlsxWorkbook::open(path)?;
        self.import_workbook(&workbook)
    }

    pub fn import_xlsx_bytes(&mut self, bytes: Vec<u8>) -> Result<ImportSummary> {
        let workbook = XlsxWorkbook::from_bytes(bytes)?;
        self.import_workbook(&workbook)
    }

    /// The export document; offer it under [`FlavpConfig::export_file_name`].
    pub fn export_json(&self) -> Result<String> {
        export_document(&self.state)
    }

    /// Replaces the state with a previously exported document. Invalid JSON is an error
    /// and changes nothing.
    pub fn import_json(&mut self, text: &str) -> Result<()> {
        let mut next = parse_document(text)?;
        next.meta = with_defaults(&next.meta);

        let selected = next.purchases.first().map(|p| p.id.clone());
        self.commit(next)?;
        self.selected_purchase_id = selected;
        self.draft = None;
        info!("Imported JSON document with {} purchases", self.state.purchases.len());
        Ok(())
    }

    /// Starts a hand-made purchase: no numbers yet, default presumed-tax rate and four
    /// empty boxes. It joins the list only when saved.
    pub fn new_purchase(&mut self) -> &mut Purchase {
        let purchase = Purchase {
            id: uid("purchase"),
            taxa_presumido: Some(DEFAULT_TAXA_PRESUMIDO),
            items: DRAFT_CAIXAS
                .iter()
                .map(|caixa| Item::new(uid("item"), *caixa))
                .collect(),
            ..Default::default()
        };
        self.selected_purchase_id = Some(purchase.id.clone());
        let draft = self.draft.insert(Draft {
            purchase,
            is_new: true,
        });
        &mut draft.purchase
    }

    /// Opens a working copy of an existing purchase. An open copy of the same purchase
    /// is kept rather than reset.
    pub fn edit_purchase(&mut self, id: &str) -> Result<&mut Purchase> {
        let reuse = matches!(&self.draft, Some(d) if !d.is_new && d.purchase.id == id);
        if !reuse {
            let original = self
                .purchase(id)
                .cloned()
                .ok_or_else(|| FlavpError::UnknownPurchase(id.to_string()))?;
            self.draft = Some(Draft {
                purchase: original,
                is_new: false,
            });
        }
        self.selected_purchase_id = Some(id.to_string());
        self.draft
            .as_mut()
            .map(|d| &mut d.purchase)
            .ok_or(FlavpError::NoActiveEdit)
    }

    pub fn editing(&self) -> Option<&Purchase> {
        self.draft.as_ref().map(|d| &d.purchase)
    }

    pub fn editing_mut(&mut self) -> Option<&mut Purchase> {
        self.draft.as_mut().map(|d| &mut d.purchase)
    }

    /// Live totals for the working copy, without committing anything.
    pub fn preview(&self) -> Option<ComputedBlock> {
        self.editing().and_then(|p| calc_purchase(p).computed)
    }

    /// Commits the working copy: a new purchase goes to the top of the list, an existing
    /// one replaces its previous version.
    pub fn save_editing(&mut self) -> Result<&Purchase> {
        let draft = self.draft.as_ref().ok_or(FlavpError::NoActiveEdit)?;
        let saved = calc_purchase(&draft.purchase);
        let id = saved.id.clone();

        let mut next = self.state.clone();
        if draft.is_new {
            next.purchases.insert(0, saved);
        } else {
            let slot = next
                .purchases
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| FlavpError::UnknownPurchase(id.clone()))?;
            *slot = saved;
        }

        self.commit(next)?;
        self.draft = None;
        self.selected_purchase_id = Some(id.clone());
        info!("Saved purchase {}", id);

        self.purchase(&id)
            .ok_or(FlavpError::UnknownPurchase(id))
    }

    pub fn cancel_editing(&mut self) {
        if let Some(draft) = self.draft.take() {
            debug!("Discarded edits to purchase {}", draft.purchase.id);
            if draft.is_new {
                self.selected_purchase_id = None;
            }
        }
    }

    /// Deletes a purchase once `confirm` agrees. Returns `Ok(false)` when declined.
    pub fn delete_purchase(&mut self, id: &str, confirm: impl FnOnce() -> bool) -> Result<bool> {
        if self.purchase(id).is_none() {
            return Err(FlavpError::UnknownPurchase(id.to_string()));
        }
        if !confirm() {
            return Ok(false);
        }

        let mut next = self.state.clone();
        next.purchases.retain(|p| p.id != id);
        self.commit(next)?;

        if self.draft.as_ref().is_some_and(|d| d.purchase.id == id) {
            self.draft = None;
        }
        if self.selected_purchase_id.as_deref() == Some(id) {
            self.selected_purchase_id = self.state.purchases.first().map(|p| p.id.clone());
        }
        info!("Deleted purchase {}", id);
        Ok(true)
    }

    /// Appends a cash entry (dated today unless given). Missing amounts are stored as zero.
    pub fn add_ledger_entry(
        &mut self,
        historico: &str,
        debito: Option<f64>,
        credito: Option<f64>,
        date: Option<NaiveDate>,
    ) -> Result<&LedgerEntry> {
        let date = date.unwrap_or_else(|| Utc::now().date_naive());
        let entry = LedgerEntry::new(
            date.format("%Y-%m-%d").to_string(),
            historico,
            Some(or_zero(debito)),
            Some(or_zero(credito)),
        );

        let mut next = self.state.clone();
        next.ledger.push(entry);
        self.commit(next)?;

        self.state.ledger.last().ok_or_else(|| {
            FlavpError::Store("ledger entry missing after commit".to_string())
        })
    }

    /// Wipes the persisted state once `confirm` agrees. Returns `Ok(false)` when declined.
    pub fn clear_all(&mut self, confirm: impl FnOnce() -> bool) -> Result<bool> {
        if !confirm() {
            return Ok(false);
        }
        self.store.remove(&self.config.storage_key)?;
        self.state = AppState {
            meta: with_defaults(&MetaOptions::default()),
            ..Default::default()
        };
        self.selected_purchase_id = None;
        self.draft = None;
        info!("Cleared all saved data");
        Ok(true)
    }
}

fn with_defaults(meta: &MetaOptions) -> MetaOptions {
    MetaOptions {
        status_options: with_default_status(&meta.status_options),
        tipo_options: with_default_tipo(&meta.tipo_options),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace_with_purchase() -> (Workspace<MemoryStore>, String) {
        let mut ws = Workspace::in_memory().unwrap();
        let draft = ws.new_purchase();
        draft.referencia = "FL-AV-P-010".to_string();
        draft.tx_comercial = Some(5.0);
        draft.items[0].quantidade = Some(10.0);
        draft.items[0].dollar = Some(2.0);
        let id = ws.save_editing().unwrap().id.clone();
        (ws, id)
    }

    #[test]
    fn test_open_empty_store_has_default_vocabularies() {
        let ws = Workspace::in_memory().unwrap();
        assert!(ws.purchases().is_empty());
        assert_eq!(
            ws.meta().status_options,
            vec!["Carregando", "Concluído", "Viajando"]
        );
        assert_eq!(ws.meta().tipo_options, vec!["Moradas", "VALCATORCE INCA"]);
        assert!(ws.selected_purchase().is_none());
    }

    #[test]
    fn test_new_purchase_draft_shape() {
        let mut ws = Workspace::in_memory().unwrap();
        let draft = ws.new_purchase().clone();

        assert_eq!(draft.taxa_presumido, Some(0.0291));
        assert!(draft.tx_comercial.is_none());
        let labels: Vec<&str> = draft.items.iter().map(|i| i.caixa.as_str()).collect();
        assert_eq!(labels, vec!["Caixa 2", "Caixa 3", "Caixa 4", "Caixa 5"]);
        assert!(ws.purchases().is_empty());
        assert!(ws.preview().is_some());
    }

    #[test]
    fn test_save_new_purchase_prepends_and_persists() {
        let (mut ws, first_id) = workspace_with_purchase();
        ws.new_purchase().referencia = "FL-AV-P-011".to_string();
        ws.save_editing().unwrap();

        assert_eq!(ws.purchases().len(), 2);
        assert_eq!(ws.purchases()[0].referencia, "FL-AV-P-011");
        assert_eq!(ws.purchases()[1].id, first_id);
        assert!(ws.editing().is_none());

        let stored = load_state(ws.store(), &ws.config().storage_key);
        assert_eq!(stored.purchases.len(), 2);
        assert_eq!(stored.purchases[1].computed.unwrap().total_custo, 100.0);
    }

    #[test]
    fn test_edit_is_isolated_until_saved() {
        let (mut ws, id) = workspace_with_purchase();

        ws.edit_purchase(&id).unwrap().tx_comercial = Some(6.0);
        assert_eq!(ws.purchase(&id).unwrap().tx_comercial, Some(5.0));
        assert_eq!(ws.preview().unwrap().total_custo, 120.0);

        // Reopening the same purchase keeps the pending edit
        assert_eq!(ws.edit_purchase(&id).unwrap().tx_comercial, Some(6.0));

        ws.save_editing().unwrap();
        assert_eq!(ws.purchase(&id).unwrap().computed.unwrap().total_custo, 120.0);
    }

    #[test]
    fn test_cancel_discards_edits() {
        let (mut ws, id) = workspace_with_purchase();
        ws.edit_purchase(&id).unwrap().referencia = "changed".to_string();
        ws.cancel_editing();

        assert!(ws.editing().is_none());
        assert_eq!(ws.purchase(&id).unwrap().referencia, "FL-AV-P-010");
        assert!(matches!(ws.save_editing(), Err(FlavpError::NoActiveEdit)));
    }

    #[test]
    fn test_delete_requires_confirmation() {
        let (mut ws, id) = workspace_with_purchase();

        assert!(!ws.delete_purchase(&id, || false).unwrap());
        assert_eq!(ws.purchases().len(), 1);

        assert!(ws.delete_purchase(&id, || true).unwrap());
        assert!(ws.purchases().is_empty());
        assert!(ws.selected_purchase().is_none());
        assert!(matches!(
            ws.delete_purchase(&id, || true),
            Err(FlavpError::UnknownPurchase(_))
        ));
    }

    #[test]
    fn test_add_ledger_entry_appends_and_folds() {
        let mut ws = Workspace::in_memory().unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 4, 2);

        ws.add_ledger_entry("Aporte", Some(100.0), None, day).unwrap();
        let entry = ws.add_ledger_entry("Frete", None, Some(30.0), day).unwrap();

        assert_eq!(entry.data, "2024-04-02");
        assert_eq!(entry.debito, Some(0.0));
        assert_eq!(entry.saldo, 70.0);
        assert_eq!(ws.dashboard().saldo_atual, 70.0);
    }

    #[test]
    fn test_clear_all() {
        let (mut ws, _) = workspace_with_purchase();

        assert!(!ws.clear_all(|| false).unwrap());
        assert_eq!(ws.purchases().len(), 1);

        assert!(ws.clear_all(|| true).unwrap());
        assert!(ws.purchases().is_empty());
        assert_eq!(ws.meta().tipo_options, vec!["Moradas", "VALCATORCE INCA"]);
        assert_eq!(ws.store().get(&ws.config().storage_key).unwrap(), None);
    }

    #[test]
    fn test_import_json_rejects_invalid_document() {
        let (mut ws, id) = workspace_with_purchase();
        assert!(ws.import_json("{ broken").is_err());
        assert!(ws.purchase(&id).is_some());
    }
}
