use crate::engine::calc_purchase;
use crate::options::{with_default_status, with_default_tipo};
use crate::schema::{Item, LedgerEntry, MetaOptions, Purchase};
use crate::utils::{
    excel_serial_to_date, parse_date_text, parse_number_text, uid, DEFAULT_TAXA_PRESUMIDO,
};
use chrono::NaiveDateTime;
use log::{debug, info};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Sheets with this prefix hold one standard purchase each.
pub const PURCHASE_SHEET_PREFIX: &str = "FL-AV-P-";

/// The alternate-model purchase sheet.
pub const MODELO_CEBOLA_SHEET: &str = "Modelo Cebola";

/// The cash ledger sheet.
pub const LEDGER_SHEET: &str = "CAIXA FL-AV-P";

const ITEM_ROWS: [u32; 4] = [16, 17, 18, 19];
const LEDGER_FIRST_ROW: u32 = 6;
const LEDGER_LAST_ROW: u32 = 200;

/// A raw cell value as the workbook stores it.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// Numeric reading of the cell: finite numbers pass, numeric text is parsed,
    /// booleans are 1/0, empty text and everything else is absent.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n).filter(|v| v.is_finite()),
            CellValue::Text(s) if s.is_empty() => None,
            CellValue::Text(s) => parse_number_text(s),
            CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            CellValue::DateTime(_) => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            CellValue::Text(s) => !s.is_empty(),
            CellValue::Number(n) => *n != 0.0 && !n.is_nan(),
            CellValue::Bool(b) => *b,
            CellValue::DateTime(_) => true,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

/// Read access to a workbook by sheet name and A1 address.
pub trait WorkbookReader {
    /// Sheet names in workbook order.
    fn sheet_names(&self) -> Vec<String>;

    /// The value stored at `addr`, or `None` for a missing sheet or an empty cell.
    fn get_cell(&self, sheet: &str, addr: &str) -> Option<CellValue>;

    fn has_sheet(&self, name: &str) -> bool {
        self.sheet_names().iter().any(|n| n == name)
    }

    /// The cell as `YYYY-MM-DD`. Handles native dates, 1900-system serial numbers and
    /// date text; anything else is an empty string.
    fn get_date(&self, sheet: &str, addr: &str) -> String {
        let date = match self.get_cell(sheet, addr) {
            Some(CellValue::DateTime(dt)) => Some(dt.date()),
            Some(CellValue::Number(n)) => excel_serial_to_date(n),
            Some(CellValue::Text(s)) => parse_date_text(&s),
            Some(CellValue::Bool(_)) | None => None,
        };
        date.map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }
}

/// A workbook held entirely in memory. Handy for building workbooks by hand.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkbook {
    sheets: Vec<(String, HashMap<String, CellValue>)>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an empty sheet unless one with that name already exists.
    pub fn add_sheet(&mut self, name: &str) -> &mut Self {
        if !self.sheets.iter().any(|(n, _)| n == name) {
            self.sheets.push((name.to_string(), HashMap::new()));
        }
        self
    }

    /// Stores a value, creating the sheet on first use.
    pub fn set(&mut self, sheet: &str, addr: &str, value: CellValue) -> &mut Self {
        self.add_sheet(sheet);
        if let Some((_, cells)) = self.sheets.iter_mut().find(|(n, _)| n == sheet) {
            cells.insert(addr.to_ascii_uppercase(), value);
        }
        self
    }

    pub fn set_text(&mut self, sheet: &str, addr: &str, text: &str) -> &mut Self {
        self.set(sheet, addr, CellValue::Text(text.to_string()))
    }

    pub fn set_number(&mut self, sheet: &str, addr: &str, n: f64) -> &mut Self {
        self.set(sheet, addr, CellValue::Number(n))
    }
}

impl WorkbookReader for MemoryWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(n, _)| n.clone()).collect()
    }

    fn get_cell(&self, sheet: &str, addr: &str) -> Option<CellValue> {
        self.sheets
            .iter()
            .find(|(n, _)| n == sheet)
            .and_then(|(_, cells)| cells.get(&addr.to_ascii_uppercase()))
            .cloned()
    }
}

/// Everything extracted from a workbook, ready to replace the application state.
#[derive(Debug, Clone)]
pub struct ImportedWorkbook {
    pub sheet_names: Vec<String>,
    pub purchases: Vec<Purchase>,
    pub ledger: Vec<LedgerEntry>,
    pub meta: MetaOptions,
}

/// What an import did, shown to the user once the new state is committed.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSummary {
    pub sheet_names: Vec<String>,
    pub purchase_count: usize,
    pub ledger_count: usize,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OK. Planilhas: {}\nCompras importadas: {}\nLançamentos no caixa: {}",
            self.sheet_names.join(", "),
            self.purchase_count,
            self.ledger_count
        )
    }
}

/// Renders an import outcome as the text of the import log.
pub fn describe_import(result: &crate::error::Result<ImportSummary>) -> String {
    match result {
        Ok(summary) => summary.to_string(),
        Err(e) => format!("ERRO: {}", e),
    }
}

fn cell_text(reader: &impl WorkbookReader, sheet: &str, addr: &str) -> String {
    reader
        .get_cell(sheet, addr)
        .map(|v| v.to_string())
        .unwrap_or_default()
}

fn cell_number(reader: &impl WorkbookReader, sheet: &str, addr: &str) -> Option<f64> {
    reader.get_cell(sheet, addr).and_then(|v| v.as_number())
}

/// Reads one purchase sheet at its fixed cell layout and computes it.
///
/// Returns `None` when the sheet does not exist.
pub fn parse_purchase_sheet(
    reader: &impl WorkbookReader,
    sheet_name: &str,
    modelo_cebola: bool,
) -> Option<Purchase> {
    if !reader.has_sheet(sheet_name) {
        return None;
    }

    let text = |addr: &str| cell_text(reader, sheet_name, addr);
    let number = |addr: &str| cell_number(reader, sheet_name, addr);

    let items = ITEM_ROWS
        .iter()
        .map(|row| Item {
            quantidade: number(&format!("B{}", row)),
            dollar: number(&format!("C{}", row)),
            dollar_pf: number(&format!("E{}", row)),
            venda: number(&format!("L{}", row)),
            ..Item::new(uid("item"), text(&format!("A{}", row)))
        })
        .collect();

    let purchase = Purchase {
        id: uid("purchase"),
        sheet_name: sheet_name.to_string(),
        modelo_cebola,
        numero_compra: number("B2"),
        referencia: text("B3"),
        data: reader.get_date(sheet_name, "B4"),
        fornecedor: text("B5"),
        exportador: text("B6"),
        proforma_num: text("B7"),
        fatura_num: text("B8"),
        status: text("B9"),
        importador: text("B10"),
        transportadora: text("B11"),
        tipo_cebola: text("B12"),
        tx_comercial: number("B13"),
        tx_paralelo: number("B14"),
        custo_frete_total: number("I20"),
        despacho_total: number("J20"),
        taxa_c_cambio: number("D21"),
        taxa_presumido: Some(number("N23").unwrap_or(DEFAULT_TAXA_PRESUMIDO)),
        lucro_operacional: number("L24"),
        despesas_operacionais: number("K32"),
        nfvf: text("P20"),
        items,
        computed: None,
    };

    debug!(
        "Parsed purchase sheet '{}' (ref '{}', modelo cebola: {})",
        sheet_name, purchase.referencia, modelo_cebola
    );

    Some(calc_purchase(&purchase))
}

/// Reads the cash ledger rows 6 to 200. A row is skipped only when date, description,
/// debit and credit are all empty.
pub fn parse_ledger_sheet(reader: &impl WorkbookReader, sheet_name: &str) -> Vec<LedgerEntry> {
    if !reader.has_sheet(sheet_name) {
        return Vec::new();
    }

    let mut rows = Vec::new();
    for r in LEDGER_FIRST_ROW..=LEDGER_LAST_ROW {
        let date_addr = format!("A{}", r);
        let data = reader.get_cell(sheet_name, &date_addr);
        let historico = reader.get_cell(sheet_name, &format!("B{}", r));
        let debito = reader.get_cell(sheet_name, &format!("C{}", r));
        let credito = reader.get_cell(sheet_name, &format!("D{}", r));

        if data.is_none() && historico.is_none() && debito.is_none() && credito.is_none() {
            continue;
        }

        rows.push(LedgerEntry {
            id: uid("ledger"),
            data: reader.get_date(sheet_name, &date_addr),
            historico: historico
                .filter(CellValue::is_truthy)
                .map(|v| v.to_string())
                .unwrap_or_default(),
            debito: debito.and_then(|v| v.as_number()),
            credito: credito.and_then(|v| v.as_number()),
            saldo: 0.0,
        });
    }

    debug!("Parsed {} ledger rows from '{}'", rows.len(), sheet_name);
    rows
}

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"FL-AV-P-[0-9]{3}").expect("reference pattern is valid"))
}

/// The first `FL-AV-P-` reference (exactly three digits) found in a description.
pub fn find_reference(text: &str) -> Option<&str> {
    reference_pattern().find(text).map(|m| m.as_str())
}

/// Writes each matched purchase's `K33` into the credit of ledger rows that mention its
/// reference. Rows without a reference, or whose reference has no purchase, are untouched.
/// When two purchases share a reference the later one wins.
pub fn reconcile_ledger(ledger: &[LedgerEntry], purchases: &[Purchase]) -> Vec<LedgerEntry> {
    let by_ref: HashMap<&str, &Purchase> = purchases
        .iter()
        .map(|p| (p.referencia.as_str(), p))
        .collect();

    ledger
        .iter()
        .map(|row| {
            let Some(purchase) = find_reference(&row.historico).and_then(|r| by_ref.get(r))
            else {
                return row.clone();
            };

            let credito = purchase.computed.map(|c| c.K33).or(row.credito);
            debug!(
                "Ledger row '{}' reconciled with purchase '{}'",
                row.historico, purchase.referencia
            );
            LedgerEntry {
                credito,
                ..row.clone()
            }
        })
        .collect()
}

fn is_purchase_sheet(name: &str) -> Option<bool> {
    if name.starts_with(PURCHASE_SHEET_PREFIX) {
        Some(false)
    } else if name == MODELO_CEBOLA_SHEET {
        Some(true)
    } else {
        None
    }
}

/// Extracts purchases, the reconciled ledger and the option vocabularies from a workbook.
///
/// Nothing is committed here; ledger balances are folded when the result is applied.
pub fn import_workbook(reader: &impl WorkbookReader) -> ImportedWorkbook {
    let sheet_names = reader.sheet_names();

    let mut purchases = Vec::new();
    let mut status_raw = Vec::new();
    let mut tipo_raw = Vec::new();

    for name in &sheet_names {
        let Some(modelo_cebola) = is_purchase_sheet(name) else {
            continue;
        };

        status_raw.push(cell_text(reader, name, "B9"));
        tipo_raw.push(cell_text(reader, name, "B12"));

        if let Some(purchase) = parse_purchase_sheet(reader, name, modelo_cebola) {
            purchases.push(purchase);
        }
    }

    let ledger = parse_ledger_sheet(reader, LEDGER_SHEET);
    let ledger = reconcile_ledger(&ledger, &purchases);

    let meta = MetaOptions {
        status_options: with_default_status(&status_raw),
        tipo_options: with_default_tipo(&tipo_raw),
    };

    info!(
        "Extracted {} purchases and {} ledger rows from {} sheets",
        purchases.len(),
        ledger.len(),
        sheet_names.len()
    );

    ImportedWorkbook {
        sheet_names,
        purchases,
        ledger,
        meta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ComputedBlock;

    fn purchase_with(referencia: &str, k33: Option<f64>) -> Purchase {
        Purchase {
            id: uid("purchase"),
            referencia: referencia.to_string(),
            computed: k33.map(|value| ComputedBlock {
                K33: value,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn ledger_row(historico: &str, credito: Option<f64>) -> LedgerEntry {
        LedgerEntry::new("2024-02-01", historico, None, credito)
    }

    #[test]
    fn test_find_reference() {
        assert_eq!(find_reference("Pagamento FL-AV-P-007"), Some("FL-AV-P-007"));
        assert_eq!(find_reference("FL-AV-P-0123 frete"), Some("FL-AV-P-012"));
        assert_eq!(find_reference("FL-AV-P-12"), None);
        assert_eq!(find_reference("fl-av-p-007"), None);
        assert_eq!(find_reference(""), None);
    }

    #[test]
    fn test_reconcile_overwrites_matching_credit() {
        let purchases = vec![purchase_with("FL-AV-P-007", Some(543.21))];
        let ledger = vec![
            ledger_row("Pagamento FL-AV-P-007", Some(10.0)),
            ledger_row("Pagamento diverso", Some(20.0)),
            ledger_row("Pagamento FL-AV-P-008", Some(30.0)),
        ];

        let result = reconcile_ledger(&ledger, &purchases);
        assert_eq!(result[0].credito, Some(543.21));
        assert_eq!(result[1].credito, Some(20.0));
        assert_eq!(result[2].credito, Some(30.0));
        assert_eq!(result[0].id, ledger[0].id);
    }

    #[test]
    fn test_reconcile_keeps_credit_without_computed_block() {
        let purchases = vec![purchase_with("FL-AV-P-007", None)];
        let ledger = vec![ledger_row("FL-AV-P-007", Some(12.5))];
        assert_eq!(reconcile_ledger(&ledger, &purchases)[0].credito, Some(12.5));
    }

    #[test]
    fn test_reconcile_last_duplicate_reference_wins() {
        let purchases = vec![
            purchase_with("FL-AV-P-001", Some(1.0)),
            purchase_with("FL-AV-P-001", Some(2.0)),
        ];
        let ledger = vec![ledger_row("Ref FL-AV-P-001", None)];
        assert_eq!(reconcile_ledger(&ledger, &purchases)[0].credito, Some(2.0));
    }

    #[test]
    fn test_cell_value_coercion() {
        assert_eq!(CellValue::Number(2.5).as_number(), Some(2.5));
        assert_eq!(CellValue::Text(" 4 ".into()).as_number(), Some(4.0));
        assert_eq!(CellValue::Text("".into()).as_number(), None);
        assert_eq!(CellValue::Text("n/a".into()).as_number(), None);
        assert_eq!(CellValue::Bool(true).as_number(), Some(1.0));
        assert_eq!(CellValue::Number(f64::NAN).as_number(), None);
        assert_eq!(CellValue::Number(7.0).to_string(), "7");
        assert_eq!(CellValue::Number(1.5).to_string(), "1.5");
    }

    #[test]
    fn test_get_date_variants() {
        let mut wb = MemoryWorkbook::new();
        wb.set_number("S", "A1", 45000.0)
            .set_text("S", "A2", "2024-05-06")
            .set_text("S", "A3", "sem data")
            .set(
                "S",
                "A4",
                CellValue::DateTime(
                    chrono::NaiveDate::from_ymd_opt(2023, 7, 1)
                        .unwrap()
                        .and_hms_opt(12, 0, 0)
                        .unwrap(),
                ),
            );

        assert_eq!(wb.get_date("S", "A1"), "2023-03-15");
        assert_eq!(wb.get_date("S", "A2"), "2024-05-06");
        assert_eq!(wb.get_date("S", "A3"), "");
        assert_eq!(wb.get_date("S", "A4"), "2023-07-01");
        assert_eq!(wb.get_date("S", "A5"), "");
        assert_eq!(wb.get_date("Missing", "A1"), "");
    }

    #[test]
    fn test_parse_purchase_sheet_layout() {
        let mut wb = MemoryWorkbook::new();
        wb.set_number("FL-AV-P-001", "B2", 1.0)
            .set_text("FL-AV-P-001", "B3", "FL-AV-P-001")
            .set_number("FL-AV-P-001", "B4", 45000.0)
            .set_text("FL-AV-P-001", "B9", "Viajando")
            .set_number("FL-AV-P-001", "B13", 5.0)
            .set_text("FL-AV-P-001", "A16", "Caixa 2")
            .set_number("FL-AV-P-001", "B16", 10.0)
            .set_number("FL-AV-P-001", "C16", 2.0)
            .set_number("FL-AV-P-001", "L16", 30.0)
            .set_number("FL-AV-P-001", "P20", 998.0);

        let purchase = parse_purchase_sheet(&wb, "FL-AV-P-001", false).unwrap();
        assert_eq!(purchase.numero_compra, Some(1.0));
        assert_eq!(purchase.referencia, "FL-AV-P-001");
        assert_eq!(purchase.data, "2023-03-15");
        assert_eq!(purchase.status, "Viajando");
        assert_eq!(purchase.fornecedor, "");
        assert_eq!(purchase.nfvf, "998");
        assert_eq!(purchase.taxa_presumido, Some(DEFAULT_TAXA_PRESUMIDO));
        assert_eq!(purchase.items.len(), 4);
        assert_eq!(purchase.items[0].caixa, "Caixa 2");
        assert_eq!(purchase.items[1].caixa, "");
        assert_eq!(purchase.items[1].quantidade, None);
        assert_eq!(purchase.computed.unwrap().total_qty, 10.0);
        assert_eq!(purchase.items[0].figures.fatura_em, 10.0);

        assert!(parse_purchase_sheet(&wb, "FL-AV-P-404", false).is_none());
    }

    #[test]
    fn test_parse_ledger_sheet_skips_only_blank_rows() {
        let mut wb = MemoryWorkbook::new();
        wb.set_text(LEDGER_SHEET, "B5", "header row is ignored")
            .set_number(LEDGER_SHEET, "A6", 45000.0)
            .set_text(LEDGER_SHEET, "B6", "Abertura")
            .set_number(LEDGER_SHEET, "C6", 100.0)
            .set_number(LEDGER_SHEET, "D8", 30.0)
            .set_number(LEDGER_SHEET, "B9", 0.0)
            .set_text(LEDGER_SHEET, "B200", "Última linha")
            .set_text(LEDGER_SHEET, "B201", "fora do intervalo");

        let rows = parse_ledger_sheet(&wb, LEDGER_SHEET);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].data, "2023-03-15");
        assert_eq!(rows[0].historico, "Abertura");
        assert_eq!(rows[0].debito, Some(100.0));
        assert_eq!(rows[1].historico, "");
        assert_eq!(rows[1].credito, Some(30.0));
        assert_eq!(rows[2].historico, "");
        assert_eq!(rows[3].historico, "Última linha");

        assert!(parse_ledger_sheet(&wb, "CAIXA").is_empty());
    }

    #[test]
    fn test_import_summary_text() {
        let summary = ImportSummary {
            sheet_names: vec!["FL-AV-P-001".into(), "CAIXA FL-AV-P".into()],
            purchase_count: 1,
            ledger_count: 3,
        };
        assert_eq!(
            summary.to_string(),
            "OK. Planilhas: FL-AV-P-001, CAIXA FL-AV-P\nCompras importadas: 1\nLançamentos no caixa: 3"
        );
        assert!(describe_import(&Err(crate::error::FlavpError::Workbook("corrupt".into())))
            .starts_with("ERRO: "));
    }
}
