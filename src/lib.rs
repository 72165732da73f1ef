//! # FL-AV-P Ledger
//!
//! Purchase costing and cash-ledger bookkeeping for an import business whose books live in
//! an Excel workbook: one sheet per purchase (`FL-AV-P-001`, `FL-AV-P-002`, ...), an
//! alternate `Modelo Cebola` sheet and a cash sheet `CAIXA FL-AV-P`.
//!
//! ## Core Concepts
//!
//! - **Purchase**: header rates and totals plus up to four item rows, read at fixed cells
//! - **Cost engine**: pure function deriving every per-item figure and the `K20`..`K33` totals
//! - **Ledger**: cash entries with a running balance folded in storage order
//! - **Reconciliation**: ledger rows mentioning `FL-AV-P-NNN` take that purchase's `K33` as credit
//! - **Workspace**: the application state, its store and the purchase editor
//!
//! ## Example
//!
//! ```rust,ignore
//! use flavp_ledger::*;
//!
//! let mut workspace = open_workspace(FlavpConfig::default())?;
//! let summary = workspace.import_xlsx_file("FL-AV-P.xlsx");
//! println!("{}", describe_import(&summary));
//!
//! let kpis = workspace.dashboard();
//! println!("Saldo atual: {}", fmt_money(kpis.saldo_atual));
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod ledger;
pub mod options;
pub mod reports;
pub mod schema;
pub mod store;
pub mod utils;
pub mod workspace;
pub mod xlsx;

pub use config::FlavpConfig;
pub use engine::calc_purchase;
pub use error::{FlavpError, Result};
pub use ingestion::{
    describe_import, find_reference, import_workbook, parse_ledger_sheet, parse_purchase_sheet,
    reconcile_ledger, CellValue, ImportSummary, ImportedWorkbook, MemoryWorkbook,
    WorkbookReader,
};
pub use ledger::{current_saldo, recalc_ledger};
pub use options::{collate_pt_br, union_sort, unique_non_empty};
pub use reports::*;
pub use schema::*;
pub use store::{
    export_document, load_state, parse_document, save_state, FileStore, KeyValueStore,
    MemoryStore,
};
pub use utils::{fmt_money, fmt_num, uid};
pub use workspace::Workspace;
pub use xlsx::XlsxWorkbook;

use log::info;

/// Opens the file-backed workspace described by `config`, creating its data directory
/// when needed.
pub fn open_workspace(config: FlavpConfig) -> Result<Workspace<FileStore>> {
    config.validate()?;
    let store = FileStore::new(&config.data_dir)?;
    info!(
        "Opening workspace '{}' in {}",
        config.storage_key,
        config.data_dir.display()
    );
    Workspace::open(config, store)
}

/// Reads a configuration file and opens the workspace it points to.
pub fn open_workspace_from_config_file(path: impl AsRef<std::path::Path>) -> Result<Workspace<FileStore>> {
    open_workspace(FlavpConfig::from_json_file(path)?)
}
