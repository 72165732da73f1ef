//! Read-only aggregations behind the dashboard, the ledger month view and the charts.

use crate::ledger::current_saldo;
use crate::options::collate_pt_br;
use crate::schema::{LedgerEntry, Purchase};
use crate::utils::{or_zero, parse_date_text};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Status filter value that disables filtering.
pub const ALL_STATUSES: &str = "Todos";

const NO_CAIXA_LABEL: &str = "Sem Caixa";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardKpis {
    pub compras: usize,
    pub quantidade_total: f64,
    pub custo_fronteira_total: f64,
    pub lucro_operacional: f64,
    pub valor_final_total: f64,
    pub saldo_atual: f64,
}

pub fn dashboard_kpis(purchases: &[Purchase], ledger: &[LedgerEntry]) -> DashboardKpis {
    let sum = |f: fn(&Purchase) -> f64| purchases.iter().map(f).sum::<f64>();

    DashboardKpis {
        compras: purchases.len(),
        quantidade_total: sum(|p| p.computed.map_or(0.0, |c| c.total_qty)),
        custo_fronteira_total: sum(|p| p.computed.map_or(0.0, |c| c.K20)),
        lucro_operacional: sum(|p| or_zero(p.lucro_operacional)),
        valor_final_total: sum(|p| p.computed.map_or(0.0, |c| c.total_valor_final)),
        saldo_atual: current_saldo(ledger),
    }
}

/// Date a record is bucketed under. An empty date counts as 1970-01-01; text that is not
/// a date has none.
fn record_date(data: &str) -> Option<NaiveDate> {
    if data.is_empty() {
        Some(NaiveDate::default())
    } else {
        parse_date_text(data)
    }
}

fn sort_timestamp(data: &str) -> NaiveDate {
    record_date(data).unwrap_or_default()
}

/// Purchases newest first. Undated purchases sort as 1970-01-01; ties keep their order.
/// `status` filters on an exact match unless it is `None` or [`ALL_STATUSES`].
pub fn purchases_for_list<'a>(purchases: &'a [Purchase], status: Option<&str>) -> Vec<&'a Purchase> {
    let mut rows: Vec<&Purchase> = purchases
        .iter()
        .filter(|p| match status {
            None | Some(ALL_STATUSES) => true,
            Some(s) => p.status == s,
        })
        .collect();
    rows.sort_by_key(|p| std::cmp::Reverse(sort_timestamp(&p.data)));
    rows
}

fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((start, next.pred_opt()?))
}

fn in_month(data: &str, start: NaiveDate, end: NaiveDate) -> bool {
    record_date(data).is_some_and(|d| d >= start && d <= end)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerMonthSummary<'a> {
    pub rows: Vec<&'a LedgerEntry>,
    pub total_debito: f64,
    pub total_credito: f64,
    /// Balance of the last row, in storage order, dated on or before the month end.
    pub saldo_fim_do_mes: f64,
    pub lancamentos: usize,
}

pub fn ledger_month_summary(ledger: &[LedgerEntry], year: i32, month: u32) -> LedgerMonthSummary<'_> {
    let Some((start, end)) = month_bounds(year, month) else {
        return LedgerMonthSummary {
            rows: Vec::new(),
            total_debito: 0.0,
            total_credito: 0.0,
            saldo_fim_do_mes: 0.0,
            lancamentos: 0,
        };
    };

    let rows: Vec<&LedgerEntry> = ledger
        .iter()
        .filter(|r| in_month(&r.data, start, end))
        .collect();

    let saldo_fim_do_mes = ledger
        .iter()
        .filter(|r| record_date(&r.data).is_some_and(|d| d <= end))
        .last()
        .map_or(0.0, |r| r.saldo);

    LedgerMonthSummary {
        total_debito: rows.iter().map(|r| or_zero(r.debito)).sum(),
        total_credito: rows.iter().map(|r| or_zero(r.credito)).sum(),
        saldo_fim_do_mes,
        lancamentos: rows.len(),
        rows,
    }
}

/// Distinct years present in the ledger, newest first.
pub fn ledger_years(ledger: &[LedgerEntry]) -> Vec<i32> {
    let years: BTreeSet<i32> = ledger
        .iter()
        .filter_map(|r| record_date(&r.data))
        .map(|d| d.year())
        .collect();
    years.into_iter().rev().collect()
}

pub fn purchases_in_month(purchases: &[Purchase], year: i32, month: u32) -> Vec<&Purchase> {
    let Some((start, end)) = month_bounds(year, month) else {
        return Vec::new();
    };
    purchases
        .iter()
        .filter(|p| in_month(&p.data, start, end))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSegment {
    pub label: String,
    pub value: f64,
}

/// Cost composition across all purchases. Segments whose label is in `hidden` are left out.
pub fn cost_breakdown(purchases: &[Purchase], hidden: &[&str]) -> Vec<ChartSegment> {
    let sum = |f: fn(&Purchase) -> f64| purchases.iter().map(f).sum::<f64>();

    [
        ("Custo Fronteira", sum(|p| p.computed.map_or(0.0, |c| c.K20))),
        ("Presumido", sum(|p| p.computed.map_or(0.0, |c| c.L23))),
        ("Lucro Operacional", sum(|p| or_zero(p.lucro_operacional))),
        ("Despesas Operacionais", sum(|p| p.computed.map_or(0.0, |c| c.K32))),
    ]
    .into_iter()
    .filter(|(label, _)| !hidden.contains(label))
    .map(|(label, value)| ChartSegment {
        label: label.to_string(),
        value,
    })
    .collect()
}

/// Total quantity per item label over every purchase, sorted by label.
pub fn quantity_by_caixa(purchases: &[Purchase]) -> Vec<ChartSegment> {
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for item in purchases.iter().flat_map(|p| &p.items) {
        let label = if item.caixa.is_empty() {
            NO_CAIXA_LABEL
        } else {
            item.caixa.as_str()
        };
        *totals.entry(label.to_string()).or_insert(0.0) += or_zero(item.quantidade);
    }

    let mut segments: Vec<ChartSegment> = totals
        .into_iter()
        .map(|(label, value)| ChartSegment { label, value })
        .collect();
    segments.sort_by(|a, b| collate_pt_br(&a.label, &b.label));
    segments
}
