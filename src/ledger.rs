use crate::schema::LedgerEntry;
use crate::utils::{or_zero, uid};

/// Rewrites `saldo` over the whole ledger in storage order.
///
/// The first row's balance is its own debit minus credit; every later row adds its
/// debit and subtracts its credit from the previous balance. Rows are never re-sorted.
pub fn recalc_ledger(ledger: &[LedgerEntry]) -> Vec<LedgerEntry> {
    let mut saldo = 0.0;
    ledger
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            let movement = or_zero(row.debito) - or_zero(row.credito);
            saldo = if idx == 0 { movement } else { saldo + movement };
            LedgerEntry {
                saldo,
                ..row.clone()
            }
        })
        .collect()
}

/// Balance after the last row, or zero for an empty ledger.
pub fn current_saldo(ledger: &[LedgerEntry]) -> f64 {
    ledger.last().map(|row| row.saldo).unwrap_or(0.0)
}

impl LedgerEntry {
    /// A fresh row with a generated id; its balance is filled in by [`recalc_ledger`].
    pub fn new(
        data: impl Into<String>,
        historico: impl Into<String>,
        debito: Option<f64>,
        credito: Option<f64>,
    ) -> Self {
        Self {
            id: uid("ledger"),
            data: data.into(),
            historico: historico.into(),
            debito,
            credito,
            saldo: 0.0,
        }
    }
}
